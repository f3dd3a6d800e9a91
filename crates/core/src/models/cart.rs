//! Cart models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use crate::types::{CartId, CartItemId, Price, ProductId, UserId};

/// The active cart of the logged-in user, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(rename = "idCarrito")]
    pub id: CartId,
    #[serde(rename = "fechaCreacion", with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "usuario", default)]
    pub owner: Option<CartOwner>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of the server-computed line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(|item| item.subtotal).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .map(|item| item.quantity)
            .fold(0, u32::saturating_add)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by its id.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Find the line holding a given product.
    #[must_use]
    pub fn item_for_product(&self, product: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product.id == product)
    }
}

/// Reference to the user owning a cart.
///
/// The backend embeds a trimmed user record; only the identifying fields are
/// kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartOwner {
    #[serde(rename = "idUsuario", default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    #[serde(rename = "producto")]
    pub product: Product,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    pub subtotal: Price,
}

impl CartItem {
    /// Unit price times quantity, computed locally.
    ///
    /// The server-sent `subtotal` is what gets displayed; this exists to
    /// spot a stale line when the product price changed.
    #[must_use]
    pub fn computed_subtotal(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}
