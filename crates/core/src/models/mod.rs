//! Wire models returned by the storefront backend.
//!
//! Field names follow the backend's JSON (Spanish camelCase) through serde
//! renames; the Rust side uses English names.

pub mod cart;
pub mod catalog;
pub mod identity;
pub mod order;

pub use cart::{Cart, CartItem, CartOwner};
pub use catalog::{Category, FavoriteEntry, Product};
pub use identity::IdentityClaims;
pub use order::Order;

/// Lenient timestamp (de)serialization.
///
/// The backend emits Java `LocalDateTime`/`LocalDate` values without an
/// offset (`2025-10-20T10:15:00`, `2025-10-20`) but RFC 3339 also shows up.
/// All of them are read as UTC. Values are written back as RFC 3339.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = raw.parse::<NaiveDateTime>() {
            return Some(naive.and_utc());
        }
        raw.parse::<NaiveDate>()
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

}
