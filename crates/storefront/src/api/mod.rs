//! Backend REST API boundary.
//!
//! [`Backend`] is the seam between the state components and the network.
//! Production code uses [`HttpBackend`]; tests substitute a recording fake.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/auth/register`, `/auth/login` | `{token}` |
//! | PUT | `/api/perfil/nombre` | refreshed `{token}` |
//! | PUT | `/api/perfil/contrasena` | plain-text confirmation |
//! | POST/DELETE | `/api/perfil/foto` | refreshed `{token}` |
//! | GET | `/api/productos`, `/api/productos/{id}`, `/api/productos/categoria/{id}` | products |
//! | GET | `/api/categorias` | categories |
//! | GET/POST | `/carrito` | fetch / add item |
//! | PUT/DELETE | `/carrito/items/{id}` | update quantity (204 = removed) / delete |
//! | GET/POST/DELETE | `/favoritos`, `/favoritos/{id}` | favorites |
//! | POST | `/checkout/pagar` | plain-text payment result |
//! | GET | `/api/pedidos` | order history |

mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;

use tienda_core::{Cart, CartItemId, Category, CategoryId, FavoriteEntry, Order, Product, ProductId};

use crate::error::ApiError;

/// The storefront REST backend.
#[async_trait]
pub trait Backend: Send + Sync {
    // Authentication
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    // Profile
    async fn update_name(&self, request: &UpdateNameRequest) -> Result<AuthResponse, ApiError>;
    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<String, ApiError>;
    async fn upload_photo(&self, photo: PhotoUpload) -> Result<AuthResponse, ApiError>;
    async fn delete_photo(&self) -> Result<AuthResponse, ApiError>;

    // Catalog
    async fn products(&self) -> Result<Vec<Product>, ApiError>;
    async fn product(&self, id: ProductId) -> Result<Product, ApiError>;
    async fn products_by_category(&self, id: CategoryId) -> Result<Vec<Product>, ApiError>;
    async fn categories(&self) -> Result<Vec<Category>, ApiError>;

    // Cart
    async fn cart(&self) -> Result<Cart, ApiError>;
    async fn add_cart_item(&self, request: &AddItemRequest) -> Result<Cart, ApiError>;
    async fn update_cart_item(&self, id: CartItemId, quantity: i32) -> Result<CartUpdate, ApiError>;
    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), ApiError>;

    // Favorites
    async fn favorites(&self) -> Result<Vec<FavoriteEntry>, ApiError>;
    /// Returns the favorited product when the backend echoes it.
    async fn add_favorite(&self, id: ProductId) -> Result<Option<Product>, ApiError>;
    async fn remove_favorite(&self, id: ProductId) -> Result<(), ApiError>;

    // Checkout
    async fn pay(&self, request: &PaymentRequest) -> Result<String, ApiError>;
    async fn orders(&self) -> Result<Vec<Order>, ApiError>;
}
