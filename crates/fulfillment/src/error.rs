//! Fulfillment error types.

use domain::{
    AddressError, CartError, DomainError, DriverClaimError, FleetError, OrderError, RouteError,
    ShipmentError, VariantId,
};
use thiserror::Error;

/// Coarse classification of a failure, used by the transport layer to pick
/// a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    UpstreamUnavailable,
    UpstreamTimeout,
    Internal,
}

/// Errors returned by fulfillment services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient stock for variant {variant_id}")]
    OutOfStock { variant_id: VariantId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing, or not visible to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
        timed_out: bool,
    },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        FulfillmentError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        FulfillmentError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        FulfillmentError::Conflict(message.into())
    }

    /// Wraps a transport failure from an outbound call.
    pub fn upstream(service: &'static str, err: &reqwest::Error) -> Self {
        FulfillmentError::UpstreamUnavailable {
            service,
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::EmptyCart
            | FulfillmentError::InvalidAddress(_)
            | FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::OutOfStock { .. } | FulfillmentError::Conflict(_) => {
                ErrorKind::Conflict
            }
            FulfillmentError::NotFound(_) => ErrorKind::NotFound,
            FulfillmentError::Forbidden(_) => ErrorKind::Forbidden,
            FulfillmentError::UpstreamUnavailable { timed_out, .. } => {
                if *timed_out {
                    ErrorKind::UpstreamTimeout
                } else {
                    ErrorKind::UpstreamUnavailable
                }
            }
            FulfillmentError::Domain(e) => domain_kind(e),
            FulfillmentError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when a stale write lost the version check.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, FulfillmentError::Domain(e) if e.is_concurrency_conflict())
    }
}

fn domain_kind(err: &DomainError) -> ErrorKind {
    match err {
        DomainError::EventStore(e) if e.is_conflict() => ErrorKind::Conflict,
        DomainError::EventStore(_) | DomainError::Serialization(_) => ErrorKind::Internal,
        DomainError::AggregateNotFound { .. } => ErrorKind::NotFound,
        DomainError::Cart(e) => match e {
            CartError::InvalidQuantity { .. } | CartError::Empty => ErrorKind::Validation,
            CartError::LineNotFound { .. } => ErrorKind::NotFound,
            CartError::CheckoutInProgress { .. } | CartError::CheckoutNotClaimed { .. } => {
                ErrorKind::Conflict
            }
        },
        DomainError::Address(e) => match e {
            AddressError::Incomplete => ErrorKind::Validation,
            AddressError::NotFound { .. } => ErrorKind::NotFound,
        },
        DomainError::Order(e) => match e {
            OrderError::InvalidStateTransition { .. }
            | OrderError::AlreadyPlaced
            | OrderError::CancellationInProgress => ErrorKind::Conflict,
            OrderError::NoItems => ErrorKind::Validation,
            OrderError::NotPlaced | OrderError::UnknownItem { .. } => ErrorKind::NotFound,
        },
        DomainError::Shipment(e) => match e {
            ShipmentError::InvalidStateTransition { .. } | ShipmentError::AlreadyCreated => {
                ErrorKind::Conflict
            }
            ShipmentError::NotCreated => ErrorKind::NotFound,
            ShipmentError::IncompleteAddress
            | ShipmentError::MissingReceiver
            | ShipmentError::InvalidLocation(_)
            | ShipmentError::UnknownStatus(_) => ErrorKind::Validation,
        },
        DomainError::Route(e) => match e {
            RouteError::BlankName | RouteError::NoOrders | RouteError::DuplicateOrder { .. } => {
                ErrorKind::Validation
            }
            RouteError::NotCreated => ErrorKind::NotFound,
            RouteError::AlreadyCreated | RouteError::Inactive | RouteError::AlreadyTaken { .. } => {
                ErrorKind::Conflict
            }
        },
        DomainError::DriverClaim(DriverClaimError::HoldsAnotherRoute { .. }) => ErrorKind::Conflict,
        DomainError::Fleet(e) => match e {
            FleetError::UnknownDriver { .. } | FleetError::UnknownVehicle { .. } => {
                ErrorKind::NotFound
            }
            FleetError::MissingName | FleetError::MissingVehicleId => ErrorKind::Validation,
        },
    }
}

impl From<event_store::EventStoreError> for FulfillmentError {
    fn from(err: event_store::EventStoreError) -> Self {
        FulfillmentError::Domain(DomainError::EventStore(err))
    }
}

macro_rules! from_aggregate_error {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FulfillmentError {
            fn from(err: $ty) -> Self {
                FulfillmentError::Domain(DomainError::from(err))
            }
        })*
    };
}

from_aggregate_error!(
    CartError,
    AddressError,
    OrderError,
    ShipmentError,
    RouteError,
    DriverClaimError,
    FleetError
);

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::{DeliveryStatus, OrderStatus, UserId};
    use event_store::{EventStoreError, Version};

    #[test]
    fn taxonomy_of_service_errors() {
        assert_eq!(FulfillmentError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(
            FulfillmentError::OutOfStock {
                variant_id: VariantId::new(1)
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(FulfillmentError::NotFound("Order").kind(), ErrorKind::NotFound);
        assert_eq!(FulfillmentError::forbidden("x").kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn unregistered_fleet_ids_are_not_found() {
        let err: FulfillmentError = FleetError::UnknownDriver {
            driver_id: UserId::new(7),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: FulfillmentError = FleetError::MissingVehicleId.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn upstream_timeouts_are_distinguished() {
        let slow = FulfillmentError::UpstreamUnavailable {
            service: "catalog",
            message: "deadline".into(),
            timed_out: true,
        };
        let down = FulfillmentError::UpstreamUnavailable {
            service: "catalog",
            message: "refused".into(),
            timed_out: false,
        };
        assert_eq!(slow.kind(), ErrorKind::UpstreamTimeout);
        assert_eq!(down.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn state_machine_violations_are_conflicts() {
        let err: FulfillmentError = OrderError::InvalidStateTransition {
            current_status: OrderStatus::Paid,
            action: "pay",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: FulfillmentError = ShipmentError::InvalidStateTransition {
            current_status: DeliveryStatus::Delivered,
            action: "cancel",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: FulfillmentError = RouteError::AlreadyTaken {
            driver_id: UserId::new(1),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn store_conflicts_map_to_conflict() {
        let err: FulfillmentError = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert!(err.is_concurrency_conflict());
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn validation_errors_from_aggregates() {
        let err: FulfillmentError = CartError::InvalidQuantity { quantity: 0 }.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err: FulfillmentError = ShipmentError::MissingReceiver.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
