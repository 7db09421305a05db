//! Integration tests for the fulfillment aggregates.
//!
//! These run commands through the `CommandHandler` against the in-memory
//! store, checking persistence, replay and optimistic concurrency.

use common::AggregateId;
use domain::{
    Address, Aggregate, Cart, CartEvent, CommandHandler, DeliveryRoute, DeliveryStatus,
    DomainError, DomainEvent, DriverClaim, Money, Order, OrderItem, OrderStatus, RouteError,
    Shipment, UserId, VariantId,
};
use chrono::Utc;
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};

fn address() -> Address {
    Address {
        line1: "Av. Apoquindo 4500".to_string(),
        line2: None,
        city: "Las Condes".to_string(),
        state: Some("RM".to_string()),
        zip: None,
        country: "CL".to_string(),
    }
}

mod cart_lifecycle {
    use super::*;

    #[tokio::test]
    async fn cart_survives_replay() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Cart> = CommandHandler::new(store.clone());
        let user = UserId::new(1);
        let cart_id = Cart::id_for(user);

        for (variant, quantity) in [(10, 2), (11, 1), (10, 3)] {
            handler
                .execute(cart_id, |cart| {
                    cart.add_item(user, VariantId::new(variant), quantity, Money::from_major(1000))
                })
                .await
                .unwrap();
        }

        let cart = handler.load(cart_id).await.unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.line_for_variant(VariantId::new(10)).unwrap().quantity, 5);
        assert_eq!(cart.total(), Money::from_major(6000));
        // opened + 2 added + 1 increased
        assert_eq!(cart.version(), Version::new(4));
    }

    #[tokio::test]
    async fn checkout_drains_the_cart_and_keeps_its_identity() {
        let handler: CommandHandler<_, Cart> = CommandHandler::new(InMemoryEventStore::new());
        let user = UserId::new(2);
        let cart_id = Cart::id_for(user);
        let order_id = AggregateId::new();

        handler
            .execute(cart_id, |cart| {
                cart.add_item(user, VariantId::new(10), 1, Money::from_major(10))
            })
            .await
            .unwrap();
        handler
            .execute(cart_id, |cart| cart.claim_checkout(order_id, Utc::now()))
            .await
            .unwrap();
        handler
            .execute(cart_id, |cart| cart.complete_checkout(order_id))
            .await
            .unwrap();

        let cart = handler.load(cart_id).await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.pending_checkout().is_none());
        assert_eq!(cart.id(), Some(cart_id));

        let again = handler
            .execute(cart_id, |cart| cart.claim_checkout(AggregateId::new(), Utc::now()))
            .await;
        assert!(matches!(again, Err(DomainError::Cart(_))));
    }

    #[tokio::test]
    async fn claims_from_the_same_version_race_to_one_winner() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Cart> = CommandHandler::new(store.clone());
        let user = UserId::new(4);
        let cart_id = Cart::id_for(user);

        handler
            .execute(cart_id, |cart| {
                cart.add_item(user, VariantId::new(10), 2, Money::from_major(10))
            })
            .await
            .unwrap();

        // Both checkouts read the cart before either writes.
        let seen = handler.load(cart_id).await.unwrap();
        let first = seen.claim_checkout(AggregateId::new(), Utc::now()).unwrap();
        let second = seen.claim_checkout(AggregateId::new(), Utc::now()).unwrap();

        let append = |events: Vec<CartEvent>| {
            let store = store.clone();
            let version = seen.version();
            async move {
                let envelopes = events
                    .iter()
                    .map(|e| {
                        EventEnvelope::builder()
                            .aggregate_id(cart_id)
                            .aggregate_type(Cart::aggregate_type())
                            .event_type(e.event_type())
                            .version(version.next())
                            .payload(e)
                            .unwrap()
                            .build()
                            .unwrap()
                    })
                    .collect();
                store
                    .append(envelopes, AppendOptions::expect_version(version))
                    .await
            }
        };

        assert!(append(first).await.is_ok());
        assert!(append(second).await.unwrap_err().is_conflict());
    }
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn place_pay_ship() {
        let handler: CommandHandler<_, Order> = CommandHandler::new(InMemoryEventStore::new());
        let order_id = AggregateId::new();
        let user = UserId::new(3);

        let placed = handler
            .execute(order_id, |order| {
                order.place(
                    order_id,
                    user,
                    address(),
                    vec![OrderItem::new(VariantId::new(10), 2, Money::from_major(1000))],
                )
            })
            .await
            .unwrap();
        assert_eq!(placed.aggregate.total_amount().to_string(), "2000.00");

        handler
            .execute(order_id, |order| order.pay(Some("webpay")))
            .await
            .unwrap();

        let second_pay = handler.execute(order_id, |order| order.pay(None)).await;
        assert!(matches!(second_pay, Err(DomainError::Order(_))));

        let order = handler.load(order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payments().len(), 2);
    }

    #[tokio::test]
    async fn list_orders_of_all_users() {
        let handler: CommandHandler<_, Order> = CommandHandler::new(InMemoryEventStore::new());
        for user in [1, 2, 1] {
            let order_id = AggregateId::new();
            handler
                .execute(order_id, |order| {
                    order.place(
                        order_id,
                        UserId::new(user),
                        address(),
                        vec![OrderItem::new(VariantId::new(1), 1, Money::from_major(5))],
                    )
                })
                .await
                .unwrap();
        }

        let orders = handler.load_all().await.unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(
            orders.iter().filter(|o| o.is_owned_by(UserId::new(1))).count(),
            2
        );
    }
}

mod route_lifecycle {
    use super::*;

    async fn create_route(handler: &CommandHandler<InMemoryEventStore, DeliveryRoute>) -> AggregateId {
        let route_id = AggregateId::new();
        handler
            .execute(route_id, |route| {
                route.create(
                    route_id,
                    "Centro",
                    None,
                    vec![AggregateId::new(), AggregateId::new()],
                    Money::from_major(3800),
                    UserId::new(1),
                )
            })
            .await
            .unwrap();
        route_id
    }

    #[tokio::test]
    async fn racing_takes_have_one_winner() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, DeliveryRoute> = CommandHandler::new(store.clone());
        let route_id = create_route(&handler).await;

        let mut handles = Vec::new();
        for driver in 10..20 {
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                handler
                    .execute(route_id, |route| route.take(UserId::new(driver)))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(
                    e.is_concurrency_conflict()
                        || matches!(e, DomainError::Route(RouteError::AlreadyTaken { .. }))
                ),
            }
        }
        assert_eq!(winners, 1);

        let route = handler.load(route_id).await.unwrap();
        assert!(route.assigned_driver().is_some());
        assert_eq!(route.version(), Version::new(2));
    }

    #[tokio::test]
    async fn driver_claim_blocks_second_route() {
        let handler: CommandHandler<_, DriverClaim> = CommandHandler::new(InMemoryEventStore::new());
        let driver = UserId::new(42);
        let claim_id = DriverClaim::id_for(driver);

        let first = AggregateId::new();
        handler
            .execute(claim_id, |claim| claim.claim(driver, first))
            .await
            .unwrap();
        let second = handler
            .execute(claim_id, |claim| claim.claim(driver, AggregateId::new()))
            .await;
        assert!(matches!(second, Err(DomainError::DriverClaim(_))));

        handler
            .execute(claim_id, |claim| claim.release(first))
            .await
            .unwrap();
        assert!(
            handler
                .execute(claim_id, |claim| claim.claim(driver, AggregateId::new()))
                .await
                .is_ok()
        );
    }
}

mod shipment_lifecycle {
    use super::*;

    #[tokio::test]
    async fn tracking_history_is_replayed_in_order() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Shipment> = CommandHandler::new(store.clone());
        let shipment_id = AggregateId::new();

        handler
            .execute(shipment_id, |s| {
                s.create(
                    shipment_id,
                    AggregateId::new(),
                    UserId::new(5),
                    address(),
                    Money::from_major(1900),
                    None,
                )
            })
            .await
            .unwrap();
        handler
            .execute_as(shipment_id, Some("1".into()), |s| s.assign(UserId::new(8), None))
            .await
            .unwrap();
        handler.execute(shipment_id, |s| s.start()).await.unwrap();
        handler
            .execute(shipment_id, |s| s.track(None, None, Some("traffic".into())))
            .await
            .unwrap();

        let shipment = handler.load(shipment_id).await.unwrap();
        assert_eq!(shipment.status(), DeliveryStatus::InTransit);
        let notes: Vec<_> = shipment
            .tracking()
            .iter()
            .map(|t| t.note.clone().unwrap_or_default())
            .collect();
        assert_eq!(notes, vec!["Picked up / started", "traffic"]);

        let events = store.get_events_for_aggregate(shipment_id).await.unwrap();
        assert_eq!(events[1].actor(), Some("1"));
    }
}
