//! Catalog models: products and categories.

use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Price, ProductId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "idCategoria")]
    pub id: CategoryId,
    #[serde(rename = "nombre")]
    pub name: String,
}

/// A catalog product.
///
/// Read-only to the client: products are only ever replaced wholesale by a
/// fresh backend response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "idProducto")]
    pub id: ProductId,
    pub sku: String,
    #[serde(default)]
    pub ean: Option<String>,
    #[serde(rename = "urlImagen", default)]
    pub image_url: Option<String>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio")]
    pub price: Price,
    pub stock: i64,
    #[serde(rename = "categoria", default)]
    pub category: Option<Category>,
}

impl Product {
    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// One row of the favorites listing.
///
/// The backend wraps each favorite product in an entry object; only the
/// product is used client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    #[serde(rename = "producto")]
    pub product: Product,
}
