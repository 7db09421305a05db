//! Route assignment engine.
//!
//! A route batches orders into shipments that one driver takes together.
//! Taking a route is two version-checked appends: first on the driver's
//! claim (one active route per driver), then on the route itself (one driver
//! per route). Whoever loses either race gets a conflict and the claim is
//! released again. A claim whose route never got taken, or has since been
//! closed, is dropped once it has settled.

use std::sync::Arc;

use chrono::Utc;
use common::AggregateId;
use domain::{
    Address, Aggregate, CommandHandler, DeliveryRoute, DriverClaim, Money, Shipment, UserId,
};
use event_store::EventStore;
use rust_decimal::Decimal;

use crate::caller::Caller;
use crate::error::{ErrorKind, FulfillmentError, Result};
use crate::retry::execute_retrying;
use crate::services::OrderGateway;
use crate::settings::FulfillmentSettings;
use crate::views::{RouteView, ShipmentView};

/// Input for [`RouteService::create_route`].
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub name: String,
    pub description: Option<String>,
    pub order_ids: Vec<AggregateId>,
    /// Replaces the rate-based total when given.
    pub total_price: Option<Decimal>,
}

/// An order checked and ready to become a route shipment.
struct RouteStop {
    order_id: AggregateId,
    owner: UserId,
    address: Address,
}

pub struct RouteService<S: EventStore> {
    routes: CommandHandler<S, DeliveryRoute>,
    claims: CommandHandler<S, DriverClaim>,
    shipments: CommandHandler<S, Shipment>,
    orders: Arc<dyn OrderGateway>,
    delivery_rate: Money,
    write_attempts: u32,
}

impl<S: EventStore + Clone> Clone for RouteService<S> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            claims: self.claims.clone(),
            shipments: self.shipments.clone(),
            orders: Arc::clone(&self.orders),
            delivery_rate: self.delivery_rate,
            write_attempts: self.write_attempts,
        }
    }
}

impl<S: EventStore + Clone> RouteService<S> {
    pub fn new(store: S, orders: Arc<dyn OrderGateway>, settings: &FulfillmentSettings) -> Self {
        Self {
            routes: CommandHandler::new(store.clone()),
            claims: CommandHandler::new(store.clone()),
            shipments: CommandHandler::new(store),
            orders,
            delivery_rate: settings.delivery_rate,
            write_attempts: settings.write_attempts,
        }
    }

    async fn load_route(&self, route_id: AggregateId) -> Result<DeliveryRoute> {
        self.routes
            .load_existing(route_id)
            .await?
            .ok_or(FulfillmentError::NotFound("Route"))
    }

    /// Creates a route and one pending shipment per order.
    ///
    /// Every order is looked up and its address checked before anything is
    /// written. If a shipment write still fails, the shipments already
    /// written are cancelled and the route is closed.
    #[tracing::instrument(skip(self, request), fields(caller = %caller.user_id, orders = request.order_ids.len()))]
    pub async fn create_route(&self, caller: &Caller, request: RouteRequest) -> Result<RouteView> {
        if !caller.is_admin {
            return Err(FulfillmentError::forbidden("only admins create routes"));
        }
        DeliveryRoute::validate_request(&request.name, &request.order_ids)?;

        let total_orders = u32::try_from(request.order_ids.len())
            .map_err(|_| FulfillmentError::validation("too many orders"))?;
        let total_price = match request.total_price {
            Some(amount) if amount.is_sign_negative() => {
                return Err(FulfillmentError::validation("total price cannot be negative"));
            }
            Some(amount) => Money::from_decimal(amount)
                .ok_or_else(|| FulfillmentError::validation("total price is out of range"))?,
            None => self.delivery_rate.multiply(total_orders),
        };

        // Phase 1: look everything up.
        let mut stops = Vec::with_capacity(request.order_ids.len());
        for order_id in &request.order_ids {
            let info = self.orders.delivery_info(*order_id).await?;
            let mut address = info.shipping_address;
            if address.country.trim().is_empty() {
                address.country = Address::DEFAULT_COUNTRY.to_string();
            }
            if !address.is_deliverable() {
                return Err(FulfillmentError::InvalidAddress(format!(
                    "order {order_id} has an incomplete address"
                )));
            }
            stops.push(RouteStop {
                order_id: *order_id,
                owner: info.user_id,
                address,
            });
        }

        // Phase 2: write.
        let route_id = AggregateId::new();
        let RouteRequest {
            name,
            description,
            order_ids,
            ..
        } = request;
        let created = self
            .routes
            .execute_as(route_id, caller.actor(), |r| {
                r.create(route_id, &name, description, order_ids, total_price, caller.user_id)
            })
            .await?;

        let mut written = Vec::with_capacity(stops.len());
        for stop in stops {
            let shipment_id = DeliveryRoute::shipment_id_for(route_id, stop.order_id);
            let price = self.delivery_rate;
            let outcome = self
                .shipments
                .execute_as(shipment_id, caller.actor(), |s| {
                    s.create(shipment_id, stop.order_id, stop.owner, stop.address, price, Some(route_id))
                })
                .await;
            if let Err(e) = outcome {
                tracing::error!(%route_id, %shipment_id, error = %e, "route shipment failed, compensating");
                self.compensate_creation(route_id, &written).await;
                return Err(e.into());
            }
            written.push(shipment_id);
        }

        metrics::counter!("route_created_total").increment(1);
        tracing::info!(%route_id, total_price = %total_price, "route created");
        Ok(RouteView::new(route_id, &created.aggregate))
    }

    /// Undoes a partly written route. Failures are logged; the original
    /// error is what the caller sees.
    async fn compensate_creation(&self, route_id: AggregateId, written: &[AggregateId]) {
        metrics::counter!("route_creation_compensated_total").increment(1);
        for shipment_id in written.iter().rev() {
            if let Err(e) = execute_retrying(
                &self.shipments,
                *shipment_id,
                None,
                self.write_attempts,
                |s| s.cancel(),
            )
            .await
            {
                tracing::error!(%route_id, %shipment_id, error = %e, "could not cancel route shipment");
            }
        }
        if let Err(e) =
            execute_retrying(&self.routes, route_id, None, self.write_attempts, |r| r.close()).await
        {
            tracing::error!(%route_id, error = %e, "could not close route");
        }
    }

    /// Active routes nobody has taken yet, newest first.
    pub async fn list_active(&self) -> Result<Vec<RouteView>> {
        let mut routes: Vec<DeliveryRoute> = self
            .routes
            .load_all()
            .await?
            .into_iter()
            .filter(DeliveryRoute::is_available)
            .collect();
        routes.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(routes
            .iter()
            .filter_map(|r| r.id().map(|id| RouteView::new(id, r)))
            .collect())
    }

    pub async fn get(&self, route_id: AggregateId) -> Result<RouteView> {
        let route = self.load_route(route_id).await?;
        Ok(RouteView::new(route_id, &route))
    }

    /// Hands the route and all of its shipments to the calling driver.
    #[tracing::instrument(skip(self), fields(driver = %caller.user_id))]
    pub async fn take_route(&self, caller: &Caller, route_id: AggregateId) -> Result<RouteView> {
        let result = self.claim_and_take(caller, route_id).await;
        match &result {
            Ok(_) => metrics::counter!("route_taken_total").increment(1),
            Err(e) if e.kind() == ErrorKind::Conflict => {
                metrics::counter!("route_take_conflicts_total").increment(1);
                tracing::info!(%route_id, error = %e, "route take lost");
            }
            Err(_) => {}
        }
        result
    }

    async fn claim_and_take(&self, caller: &Caller, route_id: AggregateId) -> Result<RouteView> {
        let driver = caller.user_id;

        // Fail before touching the claim when the route is plainly gone.
        let route = self.load_route(route_id).await?;
        route.take(driver)?;
        self.drop_abandoned_claim(driver, route_id).await?;

        let claim = self
            .claims
            .execute_as(DriverClaim::id_for(driver), caller.actor(), |c| {
                c.claim(driver, route_id)
            })
            .await
            .map_err(FulfillmentError::from)
            .map_err(Self::as_conflict)?;
        let claimed_now = !claim.events.is_empty();

        let taken = match self
            .routes
            .execute_as(route_id, caller.actor(), |r| r.take(driver))
            .await
        {
            Ok(taken) => taken,
            Err(e) => {
                if claimed_now {
                    self.release_claim(driver, route_id).await;
                }
                return Err(Self::as_conflict(e.into()));
            }
        };

        // The route is the driver's from here on. Every shipment is handed
        // over; one that cannot be is reported, and taking the route again
        // finishes the hand-over.
        let mut failed = None;
        for shipment_id in taken.aggregate.shipment_ids() {
            if let Err(e) = execute_retrying(
                &self.shipments,
                *shipment_id,
                caller.actor(),
                self.write_attempts,
                |s| s.attach_route_driver(driver),
            )
            .await
            {
                metrics::counter!("route_shipment_attach_failed_total").increment(1);
                tracing::error!(%route_id, %shipment_id, error = %e, "could not hand shipment to driver");
                failed.get_or_insert(e);
            }
        }
        if let Some(e) = failed {
            return Err(e);
        }

        tracing::info!(%route_id, driver = %driver, "route taken");
        Ok(RouteView::new(route_id, &taken.aggregate))
    }

    /// Releases a settled claim whose route is closed or was never taken by
    /// this driver, as left behind by a take that died between its two
    /// appends.
    async fn drop_abandoned_claim(&self, driver: UserId, route_id: AggregateId) -> Result<()> {
        let claim = self.claims.load(DriverClaim::id_for(driver)).await?;
        let Some(held) = claim.settled_route(Utc::now()).filter(|held| *held != route_id) else {
            return Ok(());
        };
        let abandoned = match self.routes.load_existing(held).await? {
            Some(route) => !route.is_active() || route.assigned_driver() != Some(driver),
            None => true,
        };
        if !abandoned {
            return Ok(());
        }

        metrics::counter!("route_claims_abandoned_total").increment(1);
        tracing::warn!(route_id = %held, driver = %driver, "dropping abandoned route claim");
        match self
            .claims
            .execute(DriverClaim::id_for(driver), |c| c.release(held))
            .await
        {
            Ok(_) => Ok(()),
            // Someone else moved the claim; the claim append below decides.
            Err(e) if e.is_concurrency_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// A lost version check is reported as the conflict it stands for.
    fn as_conflict(err: FulfillmentError) -> FulfillmentError {
        if err.is_concurrency_conflict() {
            FulfillmentError::conflict("route was taken concurrently")
        } else {
            err
        }
    }

    async fn release_claim(&self, driver: UserId, route_id: AggregateId) {
        if let Err(e) = self
            .claims
            .execute(DriverClaim::id_for(driver), |c| c.release(route_id))
            .await
        {
            tracing::error!(%route_id, driver = %driver, error = %e, "could not release driver claim");
        }
    }

    /// Shipments of a route, visible to admins and the route's driver.
    pub async fn shipments_by_route(
        &self,
        caller: &Caller,
        route_id: AggregateId,
    ) -> Result<Vec<ShipmentView>> {
        let route = self.load_route(route_id).await?;
        if !caller.is_admin && route.assigned_driver() != Some(caller.user_id) {
            return Err(FulfillmentError::forbidden("route is assigned to another driver"));
        }

        let mut views = Vec::with_capacity(route.shipment_ids().len());
        for shipment_id in route.shipment_ids() {
            if let Some(shipment) = self.shipments.load_existing(*shipment_id).await? {
                views.push(ShipmentView::new(*shipment_id, &shipment));
            }
        }
        Ok(views)
    }

    /// Deactivates the route and frees its driver to take another.
    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn close_route(&self, caller: &Caller, route_id: AggregateId) -> Result<RouteView> {
        let route = self.load_route(route_id).await?;
        let driver = route.assigned_driver();
        if !caller.is_admin && driver != Some(caller.user_id) {
            return Err(FulfillmentError::forbidden("route is assigned to another driver"));
        }

        let closed = self
            .routes
            .execute_as(route_id, caller.actor(), |r| r.close())
            .await?;
        if let Some(driver) = driver {
            self.claims
                .execute_as(DriverClaim::id_for(driver), caller.actor(), |c| c.release(route_id))
                .await?;
        }

        tracing::info!(%route_id, "route closed");
        Ok(RouteView::new(route_id, &closed.aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryOrderGateway;
    use crate::views::DeliveryInfo;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use domain::route::RouteClaimedData;
    use domain::{CLAIM_SETTLE_TIME, DeliveryStatus, DriverClaimEvent, OrderStatus};
    use event_store::{
        AppendOptions, EventEnvelope, EventStoreError, EventStream, InMemoryEventStore, Version,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (RouteService<InMemoryEventStore>, InMemoryOrderGateway) {
        setup_on(InMemoryEventStore::new())
    }

    fn setup_on<S: EventStore + Clone>(store: S) -> (RouteService<S>, InMemoryOrderGateway) {
        let gateway = InMemoryOrderGateway::new();
        let service = RouteService::new(
            store,
            Arc::new(gateway.clone()),
            &FulfillmentSettings::default(),
        );
        (service, gateway)
    }

    #[derive(Clone, Copy)]
    enum Fault {
        /// The append loses a version race.
        Conflict,
        /// The store refuses the append outright.
        Broken,
    }

    /// Store that fails chosen shipment appends and passes everything else
    /// through.
    #[derive(Clone, Default)]
    struct FaultyStore {
        inner: InMemoryEventStore,
        shipment_appends: Arc<AtomicUsize>,
        faults: Arc<Mutex<HashMap<usize, Fault>>>,
    }

    impl FaultyStore {
        /// Fails the `nth` shipment append from now on, counting from 1.
        fn fail_shipment_append(&self, nth: usize, fault: Fault) {
            let seen = self.shipment_appends.load(Ordering::SeqCst);
            self.faults.lock().unwrap().insert(seen + nth, fault);
        }
    }

    #[async_trait]
    impl EventStore for FaultyStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            let shipment = events
                .first()
                .filter(|e| e.aggregate_type == Shipment::aggregate_type());
            if let Some(first) = shipment {
                let nth = self.shipment_appends.fetch_add(1, Ordering::SeqCst) + 1;
                let fault = self.faults.lock().unwrap().remove(&nth);
                match fault {
                    Some(Fault::Conflict) => {
                        return Err(EventStoreError::ConcurrencyConflict {
                            aggregate_id: first.aggregate_id,
                            expected: options.expected_version.unwrap_or(Version::initial()),
                            actual: first.version,
                        });
                    }
                    Some(Fault::Broken) => {
                        return Err(EventStoreError::InvalidAppend("disk full".into()));
                    }
                    None => {}
                }
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }

        async fn load_streams(&self, aggregate_type: &str) -> event_store::Result<Vec<EventStream>> {
            self.inner.load_streams(aggregate_type).await
        }
    }

    fn order(gateway: &InMemoryOrderGateway, line1: &str) -> AggregateId {
        let order_id = AggregateId::new();
        gateway.insert(DeliveryInfo {
            order_id,
            user_id: UserId::new(7),
            status: OrderStatus::Paid,
            total_amount: Decimal::new(1000, 0),
            shipping_address: Address {
                line1: line1.into(),
                line2: None,
                city: "Antofagasta".into(),
                state: None,
                zip: None,
                country: "CL".into(),
            },
            items: vec![],
        });
        order_id
    }

    fn request(order_ids: Vec<AggregateId>) -> RouteRequest {
        RouteRequest {
            name: "Ruta Costera".into(),
            order_ids,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn prices_by_rate_unless_overridden() {
        let (service, gateway) = setup();
        let admin = Caller::admin(1);

        let ids = vec![order(&gateway, "A 1"), order(&gateway, "B 2")];
        let route = service.create_route(&admin, request(ids)).await.unwrap();
        assert_eq!(route.total_orders, 2);
        assert_eq!(route.total_price, Decimal::new(3800, 0));

        let ids = vec![order(&gateway, "C 3")];
        let route = service
            .create_route(
                &admin,
                RouteRequest {
                    total_price: Some(Decimal::new(250050, 2)),
                    ..request(ids)
                },
            )
            .await
            .unwrap();
        assert_eq!(route.total_price, Decimal::new(250050, 2));
    }

    #[tokio::test]
    async fn incomplete_address_writes_nothing() {
        let (service, gateway) = setup();
        let ids = vec![order(&gateway, "A 1"), order(&gateway, "  ")];

        let err = service
            .create_route(&Caller::admin(1), request(ids))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidAddress(_)));
        assert!(service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_order_fails_fast() {
        let (service, gateway) = setup();
        let ids = vec![order(&gateway, "A 1"), AggregateId::new()];

        let err = service
            .create_route(&Caller::admin(1), request(ids))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_admins_create_routes() {
        let (service, gateway) = setup();
        let ids = vec![order(&gateway, "A 1")];
        let err = service
            .create_route(&Caller::user(3), request(ids))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn take_hands_over_every_shipment() {
        let (service, gateway) = setup();
        let ids = vec![order(&gateway, "A 1"), order(&gateway, "B 2")];
        let route = service.create_route(&Caller::admin(1), request(ids)).await.unwrap();
        let driver = Caller::user(40);

        let taken = service.take_route(&driver, route.id).await.unwrap();
        assert_eq!(taken.assigned_user_id, Some(UserId::new(40)));
        assert!(service.list_active().await.unwrap().is_empty());

        let shipments = service.shipments_by_route(&driver, route.id).await.unwrap();
        assert_eq!(shipments.len(), 2);
        for s in &shipments {
            assert_eq!(s.status, DeliveryStatus::Assigned);
            assert_eq!(s.assigned_user_id, Some(UserId::new(40)));
        }

        let err = service
            .shipments_by_route(&Caller::user(41), route.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn second_driver_and_second_route_conflict() {
        let (service, gateway) = setup();
        let admin = Caller::admin(1);
        let first = service
            .create_route(&admin, request(vec![order(&gateway, "A 1")]))
            .await
            .unwrap();
        let second = service
            .create_route(&admin, request(vec![order(&gateway, "B 2")]))
            .await
            .unwrap();

        service.take_route(&Caller::user(40), first.id).await.unwrap();

        let err = service.take_route(&Caller::user(41), first.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = service.take_route(&Caller::user(40), second.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The losing driver's claim was released.
        service.take_route(&Caller::user(41), second.id).await.unwrap();
    }

    #[tokio::test]
    async fn closing_frees_the_driver() {
        let (service, gateway) = setup();
        let admin = Caller::admin(1);
        let driver = Caller::user(40);
        let first = service
            .create_route(&admin, request(vec![order(&gateway, "A 1")]))
            .await
            .unwrap();
        let second = service
            .create_route(&admin, request(vec![order(&gateway, "B 2")]))
            .await
            .unwrap();
        service.take_route(&driver, first.id).await.unwrap();

        let err = service.close_route(&Caller::user(41), first.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let closed = service.close_route(&driver, first.id).await.unwrap();
        assert!(!closed.active);
        service.take_route(&driver, second.id).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_requests() {
        let (service, gateway) = setup();
        let admin = Caller::admin(1);
        let id = order(&gateway, "A 1");

        for bad in [
            RouteRequest {
                name: " ".into(),
                ..request(vec![id])
            },
            request(vec![]),
            request(vec![id, id]),
            RouteRequest {
                total_price: Some(Decimal::new(-1, 0)),
                ..request(vec![id])
            },
        ] {
            let err = service.create_route(&admin, bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn failed_shipment_write_cancels_written_shipments_and_closes_route() {
        let store = FaultyStore::default();
        let (service, gateway) = setup_on(store.clone());
        let ids = vec![order(&gateway, "A 1"), order(&gateway, "B 2"), order(&gateway, "C 3")];
        store.fail_shipment_append(2, Fault::Broken);

        let err = service
            .create_route(&Caller::admin(1), request(ids))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let routes = CommandHandler::<_, DeliveryRoute>::new(store.clone())
            .load_all()
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert!(!routes[0].is_active());
        assert!(service.list_active().await.unwrap().is_empty());

        let shipments = CommandHandler::<_, Shipment>::new(store.clone())
            .load_all()
            .await
            .unwrap();
        assert_eq!(shipments.len(), 1);
        assert_eq!(shipments[0].status(), DeliveryStatus::Cancelled);
    }

    #[tokio::test]
    async fn hand_over_retries_shipments_that_lose_a_race() {
        let store = FaultyStore::default();
        let (service, gateway) = setup_on(store.clone());
        let ids = vec![order(&gateway, "A 1"), order(&gateway, "B 2")];
        let route = service.create_route(&Caller::admin(1), request(ids)).await.unwrap();
        store.fail_shipment_append(1, Fault::Conflict);

        let driver = Caller::user(40);
        service.take_route(&driver, route.id).await.unwrap();

        for s in service.shipments_by_route(&driver, route.id).await.unwrap() {
            assert_eq!(s.status, DeliveryStatus::Assigned);
            assert_eq!(s.assigned_user_id, Some(UserId::new(40)));
        }
    }

    #[tokio::test]
    async fn failed_hand_over_is_reported_and_finished_by_taking_again() {
        let store = FaultyStore::default();
        let (service, gateway) = setup_on(store.clone());
        let ids = vec![order(&gateway, "A 1"), order(&gateway, "B 2")];
        let route = service.create_route(&Caller::admin(1), request(ids)).await.unwrap();
        store.fail_shipment_append(1, Fault::Broken);

        let driver = Caller::user(40);
        let err = service.take_route(&driver, route.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let shipments = service.shipments_by_route(&driver, route.id).await.unwrap();
        let pending = shipments
            .iter()
            .filter(|s| s.status == DeliveryStatus::PendingPickup)
            .count();
        assert_eq!(pending, 1);

        service.take_route(&driver, route.id).await.unwrap();
        for s in service.shipments_by_route(&driver, route.id).await.unwrap() {
            assert_eq!(s.status, DeliveryStatus::Assigned);
        }
    }

    #[tokio::test]
    async fn abandoned_claim_does_not_block_the_driver() {
        let store = InMemoryEventStore::new();
        let (service, gateway) = setup_on(store.clone());
        let admin = Caller::admin(1);
        let driver = UserId::new(40);
        let never_taken = service
            .create_route(&admin, request(vec![order(&gateway, "A 1")]))
            .await
            .unwrap();
        let next = service
            .create_route(&admin, request(vec![order(&gateway, "B 2")]))
            .await
            .unwrap();

        // A take that wrote its claim and then died.
        let claim_id = DriverClaim::id_for(driver);
        CommandHandler::<_, DriverClaim>::new(store.clone())
            .execute(claim_id, |_| {
                Ok(vec![DriverClaimEvent::RouteClaimed(RouteClaimedData {
                    claim_id,
                    driver_id: driver,
                    route_id: never_taken.id,
                    claimed_at: Utc::now() - CLAIM_SETTLE_TIME - TimeDelta::seconds(1),
                })])
            })
            .await
            .unwrap();

        let taken = service.take_route(&Caller::user(40), next.id).await.unwrap();
        assert_eq!(taken.assigned_user_id, Some(driver));
        assert!(service.get(never_taken.id).await.unwrap().assigned_user_id.is_none());
    }

    #[tokio::test]
    async fn fresh_claim_on_another_route_still_conflicts() {
        let store = InMemoryEventStore::new();
        let (service, gateway) = setup_on(store.clone());
        let admin = Caller::admin(1);
        let driver = UserId::new(40);
        let in_flight = service
            .create_route(&admin, request(vec![order(&gateway, "A 1")]))
            .await
            .unwrap();
        let next = service
            .create_route(&admin, request(vec![order(&gateway, "B 2")]))
            .await
            .unwrap();

        CommandHandler::<_, DriverClaim>::new(store.clone())
            .execute(DriverClaim::id_for(driver), |c| c.claim(driver, in_flight.id))
            .await
            .unwrap();

        let err = service.take_route(&Caller::user(40), next.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
