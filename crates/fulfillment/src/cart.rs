//! Cart aggregator: one cart per user, priced from the inventory side.

use std::sync::Arc;

use domain::{Cart, CartError, CartEvent, CommandHandler, LineId, Money, UserId, VariantId};
use event_store::EventStore;

use crate::error::Result;
use crate::retry::execute_retrying;
use crate::services::InventoryService;
use crate::settings::FulfillmentSettings;
use crate::views::CartView;

pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, Cart>,
    inventory: Arc<dyn InventoryService>,
    write_attempts: u32,
}

impl<S: EventStore + Clone> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            inventory: Arc::clone(&self.inventory),
            write_attempts: self.write_attempts,
        }
    }
}

impl<S: EventStore + Clone> CartService<S> {
    pub fn new(
        store: S,
        inventory: Arc<dyn InventoryService>,
        settings: &FulfillmentSettings,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            inventory,
            write_attempts: settings.write_attempts,
        }
    }

    /// Runs a cart command, retrying when a concurrent request for the same
    /// user wrote first. The command is re-evaluated against the fresh cart.
    async fn write<F>(&self, user_id: UserId, command: F) -> Result<Cart>
    where
        F: Fn(&Cart) -> std::result::Result<Vec<CartEvent>, CartError>,
    {
        let result = execute_retrying(
            &self.handler,
            Cart::id_for(user_id),
            Some(user_id.to_string()),
            self.write_attempts,
            command,
        )
        .await?;
        Ok(result.aggregate)
    }

    fn view(user_id: UserId, cart: &Cart) -> CartView {
        CartView::new(Cart::id_for(user_id), cart)
    }

    /// Returns the user's cart, creating it on first access.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<CartView> {
        let cart = self.write(user_id, |cart| cart.open(user_id)).await?;
        Ok(Self::view(user_id, &cart))
    }

    /// Adds `quantity` of a variant at the catalog's current price.
    ///
    /// An unreachable catalog does not fail the add: the line is priced at
    /// zero and an existing line keeps its cached price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<CartView> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }

        let price = match self.inventory.get_variant(variant_id).await {
            Ok(snapshot) => snapshot.price,
            Err(e) => {
                metrics::counter!("cart_price_fallback_total").increment(1);
                tracing::warn!(%variant_id, error = %e, "price lookup failed, caching zero");
                Money::zero()
            }
        };

        let cart = self
            .write(user_id, |cart| cart.add_item(user_id, variant_id, quantity, price))
            .await?;
        Ok(Self::view(user_id, &cart))
    }

    pub async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: LineId,
        quantity: i64,
    ) -> Result<CartView> {
        let cart = self
            .write(user_id, |cart| cart.update_quantity(line_id, quantity))
            .await?;
        Ok(Self::view(user_id, &cart))
    }

    /// Removes a line by id. A line that is not in the user's cart is `NotFound`.
    pub async fn remove_line(&self, user_id: UserId, line_id: LineId) -> Result<()> {
        self.write(user_id, |cart| cart.remove_line(line_id)).await?;
        Ok(())
    }

    /// Removes the line holding a variant, if there is one.
    pub async fn remove_variant(&self, user_id: UserId, variant_id: VariantId) -> Result<()> {
        self.write(user_id, |cart| cart.remove_variant(variant_id))
            .await?;
        Ok(())
    }

    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        self.write(user_id, |cart| cart.clear()).await?;
        Ok(())
    }
}
