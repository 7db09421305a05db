//! Per-user address book.

use domain::{Address, AddressBook, AddressEntry, AddressId, CommandHandler, UserId};
use event_store::EventStore;

use crate::error::{FulfillmentError, Result};
use crate::views::AddressView;

#[derive(Clone)]
pub struct AddressService<S: EventStore> {
    handler: CommandHandler<S, AddressBook>,
}

impl<S: EventStore + Clone> AddressService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    fn views(book: &AddressBook) -> Vec<AddressView> {
        book.entries().iter().map(AddressView::from).collect()
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<AddressView>> {
        let book = self.handler.load(AddressBook::id_for(user_id)).await?;
        Ok(Self::views(&book))
    }

    /// Adds an address. A missing country defaults to Chile.
    pub async fn add(
        &self,
        user_id: UserId,
        mut address: Address,
        make_default: bool,
    ) -> Result<AddressView> {
        if address.country.trim().is_empty() {
            address.country = Address::DEFAULT_COUNTRY.to_string();
        }
        let result = self
            .handler
            .execute_as(
                AddressBook::id_for(user_id),
                Some(user_id.to_string()),
                |book| book.add(user_id, address, make_default),
            )
            .await?;
        result
            .aggregate
            .entries()
            .last()
            .map(AddressView::from)
            .ok_or_else(|| FulfillmentError::Internal("address was not recorded".into()))
    }

    pub async fn set_default(&self, user_id: UserId, address_id: AddressId) -> Result<Vec<AddressView>> {
        let result = self
            .handler
            .execute(AddressBook::id_for(user_id), |book| book.set_default(address_id))
            .await?;
        Ok(Self::views(&result.aggregate))
    }

    pub async fn remove(&self, user_id: UserId, address_id: AddressId) -> Result<()> {
        self.handler
            .execute(AddressBook::id_for(user_id), |book| book.remove(address_id))
            .await?;
        Ok(())
    }

    /// Looks up one of the user's addresses. Another user's address id is
    /// simply not in this book.
    pub(crate) async fn find(&self, user_id: UserId, address_id: AddressId) -> Result<Option<AddressEntry>> {
        let book = self.handler.load(AddressBook::id_for(user_id)).await?;
        Ok(book.get(address_id).cloned())
    }
}
