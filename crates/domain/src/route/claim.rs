//! Per-driver claim on an active route.

use chrono::{DateTime, TimeDelta, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::value_objects::UserId;

use super::DriverClaimError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DriverClaimEvent {
    RouteClaimed(RouteClaimedData),
    RouteReleased(RouteReleasedData),
}

impl DomainEvent for DriverClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DriverClaimEvent::RouteClaimed(_) => "RouteClaimed",
            DriverClaimEvent::RouteReleased(_) => "RouteReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteClaimedData {
    pub claim_id: AggregateId,
    pub driver_id: UserId,
    pub route_id: AggregateId,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReleasedData {
    pub route_id: AggregateId,
    pub released_at: DateTime<Utc>,
}

/// How long a claim may sit without its route being taken before it counts
/// as abandoned. Bounds the window between the claim append and the route
/// append of one take.
pub const CLAIM_SETTLE_TIME: TimeDelta = TimeDelta::minutes(1);

/// The single active route a driver holds.
///
/// One stream per driver; claiming appends against the loaded version, so
/// two routes taken concurrently by the same driver cannot both be claimed.
#[derive(Debug, Clone, Default)]
pub struct DriverClaim {
    id: Option<AggregateId>,
    version: Version,
    driver_id: Option<UserId>,
    active_route: Option<AggregateId>,
    claimed_at: Option<DateTime<Utc>>,
}

impl Aggregate for DriverClaim {
    type Event = DriverClaimEvent;
    type Error = DriverClaimError;

    fn aggregate_type() -> &'static str {
        "DriverClaim"
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
            DriverClaimEvent::RouteClaimed(data) => {
                self.id = Some(data.claim_id);
                self.driver_id = Some(data.driver_id);
                self.active_route = Some(data.route_id);
                self.claimed_at = Some(data.claimed_at);
            }
            DriverClaimEvent::RouteReleased(data) => {
                if self.active_route == Some(data.route_id) {
                    self.active_route = None;
                }
            }
        }
    }
}

impl DriverClaim {
    pub fn id_for(driver_id: UserId) -> AggregateId {
        AggregateId::derived("driver-claim", driver_id)
    }

    pub fn active_route(&self) -> Option<AggregateId> {
        self.active_route
    }

    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    /// The held route, once its take has had time to finish. A take still
    /// in flight is never reported.
    pub fn settled_route(&self, now: DateTime<Utc>) -> Option<AggregateId> {
        let claimed_at = self.claimed_at?;
        self.active_route
            .filter(|_| now >= claimed_at + CLAIM_SETTLE_TIME)
    }

    /// Claims `route_id`. Re-claiming the held route is a no-op.
    pub fn claim(
        &self,
        driver_id: UserId,
        route_id: AggregateId,
    ) -> Result<Vec<DriverClaimEvent>, DriverClaimError> {
        match self.active_route {
            Some(held) if held == route_id => Ok(vec![]),
            Some(held) => Err(DriverClaimError::HoldsAnotherRoute { route_id: held }),
            None => Ok(vec![DriverClaimEvent::RouteClaimed(RouteClaimedData {
                claim_id: Self::id_for(driver_id),
                driver_id,
                route_id,
                claimed_at: Utc::now(),
            })]),
        }
    }

    /// Releases `route_id` if it is the held route.
    pub fn release(&self, route_id: AggregateId) -> Result<Vec<DriverClaimEvent>, DriverClaimError> {
        if self.active_route != Some(route_id) {
            return Ok(vec![]);
        }
        Ok(vec![DriverClaimEvent::RouteReleased(RouteReleasedData {
            route_id,
            released_at: Utc::now(),
        })])
    }
}
