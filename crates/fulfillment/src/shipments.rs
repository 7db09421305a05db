//! Shipment lifecycle: creation from an order, courier steps, evidence and
//! tracking.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Address, Aggregate, CommandHandler, DeliveryStatus, GeoPoint, Money, Shipment, ShipmentEvent,
    ShipmentError,
};
use event_store::EventStore;

use crate::caller::Caller;
use crate::error::{FulfillmentError, Result};
use crate::notifier::DeliveryNotifier;
use crate::services::{EvidenceStore, EvidenceUpload, OrderGateway};
use crate::views::{ShipmentView, TrackingView};

/// Form submitted by a courier closing a shipment.
#[derive(Debug, Clone, Default)]
pub struct DeliveryEvidence {
    /// Required when delivering, ignored when failing.
    pub receiver_name: Option<String>,
    pub note: Option<String>,
    pub photo: Option<EvidenceUpload>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A tracking update. The status is parsed from its wire name.
#[derive(Debug, Clone, Default)]
pub struct TrackingUpdate {
    pub status: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub note: Option<String>,
}

pub struct ShipmentService<S: EventStore> {
    handler: CommandHandler<S, Shipment>,
    orders: Arc<dyn OrderGateway>,
    evidence: Arc<dyn EvidenceStore>,
    notifier: DeliveryNotifier,
    delivery_rate: Money,
}

impl<S: EventStore + Clone> Clone for ShipmentService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            orders: Arc::clone(&self.orders),
            evidence: Arc::clone(&self.evidence),
            notifier: self.notifier.clone(),
            delivery_rate: self.delivery_rate,
        }
    }
}

impl<S: EventStore + Clone> ShipmentService<S> {
    pub fn new(
        store: S,
        orders: Arc<dyn OrderGateway>,
        evidence: Arc<dyn EvidenceStore>,
        notifier: DeliveryNotifier,
        delivery_rate: Money,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            orders,
            evidence,
            notifier,
            delivery_rate,
        }
    }

    /// Loads a shipment the caller may see.
    async fn load_accessible(&self, caller: &Caller, shipment_id: AggregateId) -> Result<Shipment> {
        let shipment = self
            .handler
            .load_existing(shipment_id)
            .await?
            .ok_or(FulfillmentError::NotFound("Shipment"))?;
        if !shipment.is_accessible_by(caller.user_id, caller.is_admin) {
            return Err(FulfillmentError::forbidden(
                "not allowed to access this shipment",
            ));
        }
        Ok(shipment)
    }

    async fn act<F>(&self, caller: &Caller, shipment_id: AggregateId, command: F) -> Result<Shipment>
    where
        F: FnOnce(&Shipment) -> std::result::Result<Vec<ShipmentEvent>, ShipmentError>,
    {
        self.load_accessible(caller, shipment_id).await?;
        let result = self
            .handler
            .execute_as(shipment_id, caller.actor(), command)
            .await?;
        Ok(result.aggregate)
    }

    /// Opens a shipment for an order the caller owns, priced at the delivery
    /// rate.
    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn create_from_order(&self, caller: &Caller, order_id: AggregateId) -> Result<ShipmentView> {
        let info = self.orders.delivery_info(order_id).await?;
        if info.user_id != caller.user_id {
            return Err(FulfillmentError::forbidden("order belongs to another user"));
        }

        let mut address = info.shipping_address;
        if address.country.trim().is_empty() {
            address.country = Address::DEFAULT_COUNTRY.to_string();
        }
        if !address.is_deliverable() {
            return Err(FulfillmentError::InvalidAddress(
                "line1, city and country are required".into(),
            ));
        }

        let shipment_id = AggregateId::new();
        let owner = info.user_id;
        let price = self.delivery_rate;
        let result = self
            .handler
            .execute_as(shipment_id, caller.actor(), |s| {
                s.create(shipment_id, order_id, owner, address, price, None)
            })
            .await?;

        metrics::counter!("shipment_created_total").increment(1);
        tracing::info!(%shipment_id, %order_id, "shipment created");
        Ok(ShipmentView::new(shipment_id, &result.aggregate))
    }

    pub async fn get(&self, caller: &Caller, shipment_id: AggregateId) -> Result<ShipmentView> {
        let shipment = self.load_accessible(caller, shipment_id).await?;
        Ok(ShipmentView::new(shipment_id, &shipment))
    }

    /// Shipments of the caller's orders, newest first. Admins see all.
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<ShipmentView>> {
        let mut shipments = self.list_where(|s| caller.is_admin || s.owner_id() == Some(caller.user_id)).await?;
        shipments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shipments)
    }

    /// Shipments currently assigned to the caller, most recently updated
    /// first. Admins see all.
    pub async fn list_assigned_to_me(&self, caller: &Caller) -> Result<Vec<ShipmentView>> {
        let mut shipments = self
            .list_where(|s| caller.is_admin || s.assigned_driver() == Some(caller.user_id))
            .await?;
        shipments.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(shipments)
    }

    async fn list_where(&self, keep: impl Fn(&Shipment) -> bool) -> Result<Vec<ShipmentView>> {
        Ok(self
            .handler
            .load_all()
            .await?
            .into_iter()
            .filter(|s| keep(s))
            .filter_map(|s| s.id().map(|id| ShipmentView::new(id, &s)))
            .collect())
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn start(&self, caller: &Caller, shipment_id: AggregateId) -> Result<ShipmentView> {
        let shipment = self.act(caller, shipment_id, |s| s.start()).await?;
        Ok(ShipmentView::new(shipment_id, &shipment))
    }

    /// Closes the shipment as delivered. Needs a receiver name and a photo;
    /// the photo is stored before the status changes and removed if the
    /// change is rejected.
    #[tracing::instrument(skip(self, evidence), fields(caller = %caller.user_id))]
    pub async fn delivered(
        &self,
        caller: &Caller,
        shipment_id: AggregateId,
        evidence: DeliveryEvidence,
    ) -> Result<ShipmentView> {
        let receiver = evidence
            .receiver_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FulfillmentError::validation("Receiver name is required"))?
            .to_string();
        let (photo, location) = Self::check_evidence(&evidence)?;

        self.ensure_closable(caller, shipment_id, "deliver").await?;
        let url = self.evidence.store(photo).await?;

        let note = evidence.note;
        let stored = url.clone();
        let shipment = self
            .act(caller, shipment_id, |s| {
                s.deliver(&receiver, url, note, location)
            })
            .await;
        let shipment = self.keep_evidence_if(shipment, &stored).await?;

        self.report(&shipment, DeliveryStatus::Delivered);
        metrics::counter!("shipment_delivered_total").increment(1);
        tracing::info!(%shipment_id, "shipment delivered");
        Ok(ShipmentView::new(shipment_id, &shipment))
    }

    /// Closes the shipment as failed. Needs a photo.
    #[tracing::instrument(skip(self, evidence), fields(caller = %caller.user_id))]
    pub async fn fail(
        &self,
        caller: &Caller,
        shipment_id: AggregateId,
        evidence: DeliveryEvidence,
    ) -> Result<ShipmentView> {
        let (photo, location) = Self::check_evidence(&evidence)?;

        self.ensure_closable(caller, shipment_id, "fail").await?;
        let url = self.evidence.store(photo).await?;

        let note = evidence.note;
        let stored = url.clone();
        let shipment = self
            .act(caller, shipment_id, |s| s.fail(url, note, location))
            .await;
        let shipment = self.keep_evidence_if(shipment, &stored).await?;

        self.report(&shipment, DeliveryStatus::Failed);
        metrics::counter!("shipment_failed_total").increment(1);
        tracing::info!(%shipment_id, "shipment failed");
        Ok(ShipmentView::new(shipment_id, &shipment))
    }

    fn check_evidence(evidence: &DeliveryEvidence) -> Result<(EvidenceUpload, Option<GeoPoint>)> {
        let photo = evidence
            .photo
            .clone()
            .filter(|p| !p.bytes.is_empty())
            .ok_or_else(|| FulfillmentError::validation("Photo is required"))?;
        let location = GeoPoint::from_parts(evidence.latitude, evidence.longitude)
            .map_err(|e| FulfillmentError::validation(e.to_string()))?;
        Ok((photo, location))
    }

    /// Drops the stored photo when the status change it belongs to was not
    /// recorded.
    async fn keep_evidence_if(&self, closed: Result<Shipment>, url: &str) -> Result<Shipment> {
        if closed.is_err() {
            match self.evidence.discard(url).await {
                Ok(()) => metrics::counter!("evidence_discarded_total").increment(1),
                Err(e) => tracing::warn!(%url, error = %e, "orphaned evidence could not be removed"),
            }
        }
        closed
    }

    /// Checks access and state before any photo is written.
    async fn ensure_closable(
        &self,
        caller: &Caller,
        shipment_id: AggregateId,
        action: &'static str,
    ) -> Result<()> {
        let shipment = self.load_accessible(caller, shipment_id).await?;
        Ok(shipment.ensure_open(action)?)
    }

    fn report(&self, shipment: &Shipment, status: DeliveryStatus) {
        let Some(order_id) = shipment.order_id() else {
            return;
        };
        let note = shipment.evidence().and_then(|e| e.note.clone());
        self.notifier.notify(order_id, status, note);
    }

    /// Cancels an open shipment. Cancelling a cancelled shipment returns it
    /// unchanged.
    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, shipment_id: AggregateId) -> Result<ShipmentView> {
        let shipment = self.act(caller, shipment_id, |s| s.cancel()).await?;
        Ok(ShipmentView::new(shipment_id, &shipment))
    }

    pub async fn track(
        &self,
        caller: &Caller,
        shipment_id: AggregateId,
        update: TrackingUpdate,
    ) -> Result<TrackingView> {
        let status = update
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<DeliveryStatus>)
            .transpose()
            .map_err(|e| FulfillmentError::validation(e.to_string()))?;
        let location = GeoPoint::from_parts(update.latitude, update.longitude)
            .map_err(|e| FulfillmentError::validation(e.to_string()))?;

        let note = update.note;
        let shipment = self
            .act(caller, shipment_id, |s| s.track(status, location, note))
            .await?;
        shipment
            .tracking()
            .last()
            .map(TrackingView::from)
            .ok_or_else(|| FulfillmentError::Internal("tracking entry was not recorded".into()))
    }

    /// Tracking history, oldest first.
    pub async fn list_tracking(&self, caller: &Caller, shipment_id: AggregateId) -> Result<Vec<TrackingView>> {
        let shipment = self.load_accessible(caller, shipment_id).await?;
        Ok(shipment.tracking().iter().map(TrackingView::from).collect())
    }
}
