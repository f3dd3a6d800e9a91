//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Order status as reported by the backend.
///
/// The backend uses upper-case Spanish labels (`PAGADO`, `ENVIADO`, ...).
/// Labels this client does not know deserialize to [`OrderStatus::Unknown`]
/// instead of failing the whole order history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "PENDIENTE")]
    Pending,
    #[serde(rename = "PAGADO")]
    Paid,
    #[serde(rename = "ENVIADO")]
    Shipped,
    #[serde(rename = "ENTREGADO")]
    Delivered,
    #[serde(rename = "CANCELADO")]
    Cancelled,
    #[serde(other, rename = "DESCONOCIDO")]
    Unknown,
}

impl OrderStatus {
    /// Whether the order has been paid for (paid, shipped or delivered).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid | Self::Shipped | Self::Delivered)
    }

    /// Backend label for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDIENTE",
            Self::Paid => "PAGADO",
            Self::Shipped => "ENVIADO",
            Self::Delivered => "ENTREGADO",
            Self::Cancelled => "CANCELADO",
            Self::Unknown => "DESCONOCIDO",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
