//! Order history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderStatus, Price};

/// A past order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "idPedido")]
    pub id: OrderId,
    #[serde(rename = "fecha", with = "super::timestamp")]
    pub placed_at: DateTime<Utc>,
    pub total: Price,
    #[serde(rename = "estado", default)]
    pub status: OrderStatus,
    /// Line details are not modelled by the backend contract yet.
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}
