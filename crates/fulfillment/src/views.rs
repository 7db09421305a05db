//! Read models returned by the services.
//!
//! Amounts are exposed as decimals with two places. Field names are
//! camelCase on the wire.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    Address, AddressEntry, AddressId, Cart, DeliveryRoute, DeliveryStatus, Fleet, LineId, Order,
    OrderItem, OrderStatus, PaymentAttempt, PaymentStatus, Shipment, TrackingEntry, UserId,
    VariantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub item_id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: AggregateId,
    pub items: Vec<CartLineView>,
    pub total: Decimal,
}

impl CartView {
    pub(crate) fn new(cart_id: AggregateId, cart: &Cart) -> Self {
        Self {
            cart_id,
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    item_id: line.id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price.to_decimal(),
                    line_total: line.line_total().to_decimal(),
                })
                .collect(),
            total: cart.total().to_decimal(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressView {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: Address,
    pub is_default: bool,
}

impl From<&AddressEntry> for AddressView {
    fn from(entry: &AddressEntry) -> Self {
        Self {
            id: entry.id,
            address: entry.address.clone(),
            is_default: entry.is_default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: item.unit_price.to_decimal(),
            line_total: item.line_total.to_decimal(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub provider: Option<String>,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&PaymentAttempt> for PaymentView {
    fn from(attempt: &PaymentAttempt) -> Self {
        Self {
            provider: attempt.provider.clone(),
            status: attempt.status,
            amount: attempt.amount.to_decimal(),
            created_at: attempt.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: AggregateId,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: Option<Address>,
    pub items: Vec<OrderItemView>,
    pub payments: Vec<PaymentView>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderView {
    pub(crate) fn new(id: AggregateId, order: &Order) -> Self {
        Self {
            id,
            user_id: order.user_id(),
            status: order.status(),
            total_amount: order.total_amount().to_decimal(),
            shipping_address: order.shipping_address().cloned(),
            items: order.items().iter().map(OrderItemView::from).collect(),
            payments: order.payments().iter().map(PaymentView::from).collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// What the delivery side needs to know about an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: Address,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentView {
    pub id: AggregateId,
    pub order_id: Option<AggregateId>,
    pub user_id: Option<UserId>,
    pub address: Option<Address>,
    pub status: DeliveryStatus,
    pub assigned_user_id: Option<UserId>,
    pub route_id: Option<AggregateId>,
    pub total_price: Decimal,
    pub evidence_url: Option<String>,
    pub receiver_name: Option<String>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShipmentView {
    pub(crate) fn new(id: AggregateId, shipment: &Shipment) -> Self {
        let evidence = shipment.evidence();
        Self {
            id,
            order_id: shipment.order_id(),
            user_id: shipment.owner_id(),
            address: shipment.address().cloned(),
            status: shipment.status(),
            assigned_user_id: shipment.assigned_driver(),
            route_id: shipment.route_id(),
            total_price: shipment.price().to_decimal(),
            evidence_url: evidence.map(|e| e.url.clone()),
            receiver_name: evidence.and_then(|e| e.receiver_name.clone()),
            note: evidence.and_then(|e| e.note.clone()),
            created_at: shipment.created_at(),
            updated_at: shipment.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub status: DeliveryStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&TrackingEntry> for TrackingView {
    fn from(entry: &TrackingEntry) -> Self {
        Self {
            status: entry.status,
            latitude: entry.location.map(|p| p.lat),
            longitude: entry.location.map(|p| p.lon),
            note: entry.note.clone(),
            created_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub total_orders: u32,
    pub total_price: Decimal,
    pub active: bool,
    pub assigned_user_id: Option<UserId>,
    pub order_ids: Vec<AggregateId>,
    pub shipment_ids: Vec<AggregateId>,
    pub created_by: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl RouteView {
    pub(crate) fn new(id: AggregateId, route: &DeliveryRoute) -> Self {
        Self {
            id,
            name: route.name().to_string(),
            description: route.description().map(str::to_string),
            total_orders: route.total_orders(),
            total_price: route.total_price().to_decimal(),
            active: route.is_active(),
            assigned_user_id: route.assigned_driver(),
            order_ids: route.order_ids().to_vec(),
            shipment_ids: route.shipment_ids().to_vec(),
            created_by: route.created_by(),
            created_at: route.created_at(),
            taken_at: route.taken_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverView {
    pub driver_id: UserId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleView {
    pub vehicle_id: String,
    pub description: Option<String>,
    pub active: bool,
}

/// Registered drivers and vehicles, retired ones included.
#[derive(Debug, Clone, Serialize)]
pub struct FleetView {
    pub drivers: Vec<DriverView>,
    pub vehicles: Vec<VehicleView>,
}

impl From<&Fleet> for FleetView {
    fn from(fleet: &Fleet) -> Self {
        Self {
            drivers: fleet
                .drivers()
                .map(|d| DriverView {
                    driver_id: d.driver_id,
                    name: d.name.clone(),
                    active: d.active,
                })
                .collect(),
            vehicles: fleet
                .vehicles()
                .map(|v| VehicleView {
                    vehicle_id: v.vehicle_id.clone(),
                    description: v.description.clone(),
                    active: v.active,
                })
                .collect(),
        }
    }
}
