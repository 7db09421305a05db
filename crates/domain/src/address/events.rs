//! Address book events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Address, UserId};

use super::AddressId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AddressBookEvent {
    AddressAdded(AddressAddedData),
    DefaultAddressChanged(DefaultAddressChangedData),
    AddressRemoved(AddressRemovedData),
}

impl DomainEvent for AddressBookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AddressBookEvent::AddressAdded(_) => "AddressAdded",
            AddressBookEvent::DefaultAddressChanged(_) => "DefaultAddressChanged",
            AddressBookEvent::AddressRemoved(_) => "AddressRemoved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressAddedData {
    pub book_id: AggregateId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub address: Address,
    /// When set, every other entry stops being the default.
    pub is_default: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultAddressChangedData {
    pub address_id: AddressId,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRemovedData {
    pub address_id: AddressId,
    pub removed_at: DateTime<Utc>,
}

impl AddressBookEvent {
    pub fn address_added(
        book_id: AggregateId,
        user_id: UserId,
        address_id: AddressId,
        address: Address,
        is_default: bool,
    ) -> Self {
        AddressBookEvent::AddressAdded(AddressAddedData {
            book_id,
            user_id,
            address_id,
            address,
            is_default,
            added_at: Utc::now(),
        })
    }

    pub fn default_changed(address_id: AddressId) -> Self {
        AddressBookEvent::DefaultAddressChanged(DefaultAddressChangedData {
            address_id,
            changed_at: Utc::now(),
        })
    }

    pub fn address_removed(address_id: AddressId) -> Self {
        AddressBookEvent::AddressRemoved(AddressRemovedData {
            address_id,
            removed_at: Utc::now(),
        })
    }
}
