use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Address, UserId};

use super::{AddressBookEvent, AddressError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(u32);

impl AddressId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AddressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: Address,
    pub is_default: bool,
}

/// Addresses of one user. At most one entry is the default, and there is
/// always one while the book is not empty.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    entries: Vec<AddressEntry>,
    next_id: u32,
}

impl Aggregate for AddressBook {
    type Event = AddressBookEvent;
    type Error = AddressError;

    fn aggregate_type() -> &'static str {
        "AddressBook"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AddressBookEvent::AddressAdded(data) => {
                self.id = Some(data.book_id);
                self.user_id = Some(data.user_id);
                if data.is_default {
                    self.entries.iter_mut().for_each(|e| e.is_default = false);
                }
                self.next_id = self.next_id.max(data.address_id.0 + 1);
                self.entries.push(AddressEntry {
                    id: data.address_id,
                    address: data.address,
                    is_default: data.is_default,
                });
            }
            AddressBookEvent::DefaultAddressChanged(data) => {
                for entry in &mut self.entries {
                    entry.is_default = entry.id == data.address_id;
                }
            }
            AddressBookEvent::AddressRemoved(data) => {
                self.entries.retain(|e| e.id != data.address_id);
            }
        }
    }
}

impl AddressBook {
    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::derived("address-book", user_id)
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn get(&self, address_id: AddressId) -> Option<&AddressEntry> {
        self.entries.iter().find(|e| e.id == address_id)
    }

    pub fn default_entry(&self) -> Option<&AddressEntry> {
        self.entries.iter().find(|e| e.is_default)
    }

    /// Adds an address. The first address of a book is always the default.
    pub fn add(
        &self,
        user_id: UserId,
        address: Address,
        make_default: bool,
    ) -> Result<Vec<AddressBookEvent>, AddressError> {
        if !address.is_deliverable() {
            return Err(AddressError::Incomplete);
        }
        let is_default = make_default || self.entries.is_empty();
        Ok(vec![AddressBookEvent::address_added(
            Self::id_for(user_id),
            user_id,
            AddressId::new(self.next_id.max(1)),
            address,
            is_default,
        )])
    }

    pub fn set_default(&self, address_id: AddressId) -> Result<Vec<AddressBookEvent>, AddressError> {
        let entry = self
            .get(address_id)
            .ok_or(AddressError::NotFound { address_id })?;
        if entry.is_default {
            return Ok(vec![]);
        }
        Ok(vec![AddressBookEvent::default_changed(address_id)])
    }

    /// Removes an address; removing the default promotes the oldest remaining one.
    pub fn remove(&self, address_id: AddressId) -> Result<Vec<AddressBookEvent>, AddressError> {
        let entry = self
            .get(address_id)
            .ok_or(AddressError::NotFound { address_id })?;

        let mut events = vec![AddressBookEvent::address_removed(address_id)];
        if entry.is_default
            && let Some(next) = self.entries.iter().find(|e| e.id != address_id)
        {
            events.push(AddressBookEvent::default_changed(next.id));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line1: &str) -> Address {
        Address {
            line1: line1.to_string(),
            line2: None,
            city: "Valparaíso".to_string(),
            state: None,
            zip: Some("2340000".to_string()),
            country: "CL".to_string(),
        }
    }

    fn book_with(addresses: &[(&str, bool)]) -> AddressBook {
        let mut book = AddressBook::default();
        for (line1, make_default) in addresses {
            let events = book
                .add(UserId::new(1), address(line1), *make_default)
                .unwrap();
            book.apply_events(events);
        }
        book
    }

    #[test]
    fn first_address_becomes_default() {
        let book = book_with(&[("Calle 1", false), ("Calle 2", false)]);
        assert_eq!(book.default_entry().unwrap().address.line1, "Calle 1");
    }

    #[test]
    fn only_one_default_at_a_time() {
        let mut book = book_with(&[("Calle 1", false), ("Calle 2", true)]);
        assert_eq!(book.entries().iter().filter(|e| e.is_default).count(), 1);

        let first = book.entries()[0].id;
        book.apply_events(book.set_default(first).unwrap());
        assert_eq!(book.default_entry().unwrap().id, first);
        assert_eq!(book.entries().iter().filter(|e| e.is_default).count(), 1);
    }

    #[test]
    fn removing_default_promotes_another() {
        let mut book = book_with(&[("Calle 1", false), ("Calle 2", false)]);
        let first = book.entries()[0].id;
        book.apply_events(book.remove(first).unwrap());

        assert_eq!(book.entries().len(), 1);
        assert!(book.entries()[0].is_default);
    }

    #[test]
    fn incomplete_address_is_rejected() {
        let result = AddressBook::default().add(UserId::new(1), address(" "), false);
        assert!(matches!(result, Err(AddressError::Incomplete)));
    }

    #[test]
    fn unknown_address_is_not_found() {
        let book = book_with(&[("Calle 1", false)]);
        assert!(matches!(
            book.remove(AddressId::new(42)),
            Err(AddressError::NotFound { .. })
        ));
    }
}
