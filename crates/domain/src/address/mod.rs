//! Per-user address book.

mod aggregate;
mod events;

pub use aggregate::{AddressBook, AddressEntry, AddressId};
pub use events::{AddressAddedData, AddressBookEvent, AddressRemovedData, DefaultAddressChangedData};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Address is incomplete: line1, city and country are required")]
    Incomplete,

    #[error("Address not found: {address_id}")]
    NotFound { address_id: AddressId },
}
