use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for identifiers derived from a stable business key.
const DERIVED_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4d3b_4e0a_9c51_7b2d_8e4f_0a13);

/// Unique identifier for an aggregate instance.
///
/// Most aggregates get a random id when they are created. Aggregates that
/// exist at most once per business key (a user's cart, a driver's route
/// claim) use [`AggregateId::derived`] so that every request resolves the
/// same stream without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a stable aggregate ID from a kind and a key.
    ///
    /// The same `(kind, key)` pair always yields the same id.
    pub fn derived(kind: &str, key: impl std::fmt::Display) -> Self {
        let name = format!("{kind}:{key}");
        Self(Uuid::new_v5(&DERIVED_NAMESPACE, name.as_bytes()))
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(AggregateId::new(), AggregateId::new());
    }

    #[test]
    fn derived_ids_are_stable_per_key() {
        let a = AggregateId::derived("cart", 42);
        let b = AggregateId::derived("cart", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn derived_ids_differ_by_kind_and_key() {
        assert_ne!(
            AggregateId::derived("cart", 42),
            AggregateId::derived("driver-claim", 42)
        );
        assert_ne!(AggregateId::derived("cart", 42), AggregateId::derived("cart", 43));
    }

    #[test]
    fn parses_from_string() {
        let id = AggregateId::new();
        let parsed: AggregateId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<AggregateId>().is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = AggregateId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
