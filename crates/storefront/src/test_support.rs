//! In-process fakes for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use tokio::sync::Notify;

use tienda_core::{
    Cart, CartId, CartItem, CartItemId, Category, CategoryId, FavoriteEntry, Order, OrderId,
    OrderStatus, Price, Product, ProductId,
};

use crate::api::{
    AddItemRequest, AuthResponse, Backend, CartUpdate, ChangePasswordRequest, LoginRequest,
    PaymentRequest, PhotoUpload, RegisterRequest, UpdateNameRequest,
};
use crate::error::ApiError;

/// Build an unsigned credential carrying `sub` and `nombre`.
pub fn fake_token(sub: &str, name: &str) -> String {
    let payload = serde_json::json!({
        "sub": sub,
        "nombre": name,
        "iat": 1_700_000_000,
        "exp": 1_700_086_400,
    });
    format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

pub fn product(id: i64, name: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        sku: format!("SKU-{id}"),
        ean: None,
        image_url: None,
        name: name.to_string(),
        price: Price::from_cents(cents),
        stock: 10,
        category: None,
    }
}

pub fn empty_cart() -> Cart {
    Cart {
        id: CartId::new(1),
        created_at: Utc.with_ymd_and_hms(2025, 10, 20, 10, 0, 0).unwrap(),
        owner: None,
        items: Vec::new(),
    }
}

struct FakeState {
    calls: Vec<String>,
    failures: HashMap<String, u16>,
    gates: HashMap<String, Arc<Notify>>,
    login_token: String,
    refresh_token: Option<String>,
    products: Vec<Product>,
    categories: Vec<Category>,
    cart: Cart,
    next_item_id: i64,
    favorites: Vec<Product>,
    orders: Vec<Order>,
}

/// Recording, scriptable [`Backend`].
///
/// Holds a simulated server-side cart and favorites list. Every call is
/// logged as `"METHOD /path"`; that same string keys scripted failures and
/// gates. A gated call computes its response first and then waits for the
/// gate to be released, which lets tests deliver responses out of order.
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                failures: HashMap::new(),
                gates: HashMap::new(),
                login_token: fake_token("ana@tienda.es", "Ana"),
                refresh_token: None,
                products: vec![product(1, "Camiseta", 1999), product(2, "Taza", 899)],
                categories: vec![Category {
                    id: CategoryId::new(1),
                    name: "Ropa".to_string(),
                }],
                cart: empty_cart(),
                next_item_id: 1,
                favorites: Vec::new(),
                orders: vec![Order {
                    id: OrderId::new(1),
                    placed_at: Utc.with_ymd_and_hms(2025, 10, 20, 0, 0, 0).unwrap(),
                    total: Price::from_cents(17797),
                    status: OrderStatus::Paid,
                    items: Vec::new(),
                }],
            }),
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Make `call` fail with `status` until cleared.
    pub fn fail(&self, call: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(call.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Hold the next `call` until the returned gate is notified.
    pub fn hold(&self, call: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(call.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn set_login_token(&self, token: &str) {
        self.state.lock().unwrap().login_token = token.to_string();
    }

    /// Token returned by every profile update instead of a fresh one.
    pub fn set_refresh_token(&self, token: &str) {
        self.state.lock().unwrap().refresh_token = Some(token.to_string());
    }

    /// Current simulated server cart.
    pub fn server_cart(&self) -> Cart {
        self.state.lock().unwrap().cart.clone()
    }

    /// Put a product in the simulated server cart directly.
    pub fn seed_cart(&self, product_id: i64, quantity: u32) {
        let mut state = self.state.lock().unwrap();
        add_line(&mut state, ProductId::new(product_id), quantity);
    }

    pub fn seed_favorite(&self, product_id: i64) {
        let mut state = self.state.lock().unwrap();
        let found = find_product(&state, ProductId::new(product_id));
        if let Some(product) = found {
            state.favorites.push(product);
        }
    }

    /// Log `call`, then run `respond` unless a failure is scripted. Waits on
    /// any gate registered for `call` before returning.
    async fn handle<T>(
        &self,
        call: String,
        respond: impl FnOnce(&mut FakeState) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let (result, gate) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            let gate = state.gates.remove(&call);
            let result = match state.failures.get(&call) {
                Some(&status) => Err(ApiError::Status {
                    status: StatusCode::from_u16(status).unwrap(),
                    body: String::new(),
                }),
                None => respond(&mut state),
            };
            (result, gate)
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

fn find_product(state: &FakeState, id: ProductId) -> Option<Product> {
    state.products.iter().find(|p| p.id == id).cloned()
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        body: String::new(),
    }
}

fn add_line(state: &mut FakeState, product_id: ProductId, quantity: u32) -> Option<()> {
    let product = find_product(state, product_id)?;
    if let Some(line) = state
        .cart
        .items
        .iter_mut()
        .find(|line| line.product.id == product_id)
    {
        line.quantity += quantity;
        line.subtotal = line.product.price.times(line.quantity);
    } else {
        let id = CartItemId::new(state.next_item_id);
        state.next_item_id += 1;
        state.cart.items.push(CartItem {
            id,
            subtotal: product.price.times(quantity),
            product,
            quantity,
        });
    }
    Some(())
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.handle("POST /auth/login".to_string(), |state| {
            Ok(AuthResponse {
                token: state.login_token.clone(),
            })
        })
        .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let token = fake_token(request.email.as_str(), &request.name);
        self.handle("POST /auth/register".to_string(), |_| Ok(AuthResponse { token }))
            .await
    }

    async fn update_name(&self, request: &UpdateNameRequest) -> Result<AuthResponse, ApiError> {
        let token = fake_token("ana@tienda.es", &request.name);
        self.handle("PUT /api/perfil/nombre".to_string(), |state| {
            Ok(AuthResponse {
                token: state.refresh_token.clone().unwrap_or(token),
            })
        })
        .await
    }

    async fn change_password(&self, _request: &ChangePasswordRequest) -> Result<String, ApiError> {
        self.handle("PUT /api/perfil/contrasena".to_string(), |_| {
            Ok("Contraseña actualizada".to_string())
        })
        .await
    }

    async fn upload_photo(&self, _photo: PhotoUpload) -> Result<AuthResponse, ApiError> {
        let token = fake_token("ana@tienda.es", "Ana");
        self.handle("POST /api/perfil/foto".to_string(), |state| {
            Ok(AuthResponse {
                token: state.refresh_token.clone().unwrap_or(token),
            })
        })
        .await
    }

    async fn delete_photo(&self) -> Result<AuthResponse, ApiError> {
        let token = fake_token("ana@tienda.es", "Ana");
        self.handle("DELETE /api/perfil/foto".to_string(), |state| {
            Ok(AuthResponse {
                token: state.refresh_token.clone().unwrap_or(token),
            })
        })
        .await
    }

    async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.handle("GET /api/productos".to_string(), |state| Ok(state.products.clone()))
            .await
    }

    async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.handle(format!("GET /api/productos/{id}"), |state| {
            find_product(state, id).ok_or_else(not_found)
        })
        .await
    }

    async fn products_by_category(&self, id: CategoryId) -> Result<Vec<Product>, ApiError> {
        self.handle(format!("GET /api/productos/categoria/{id}"), |state| {
            Ok(state
                .products
                .iter()
                .filter(|p| p.category.as_ref().is_some_and(|c| c.id == id))
                .cloned()
                .collect())
        })
        .await
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.handle("GET /api/categorias".to_string(), |state| Ok(state.categories.clone()))
            .await
    }

    async fn cart(&self) -> Result<Cart, ApiError> {
        self.handle("GET /carrito".to_string(), |state| Ok(state.cart.clone()))
            .await
    }

    async fn add_cart_item(&self, request: &AddItemRequest) -> Result<Cart, ApiError> {
        self.handle("POST /carrito".to_string(), |state| {
            add_line(state, request.product_id, request.quantity).ok_or_else(not_found)?;
            Ok(state.cart.clone())
        })
        .await
    }

    async fn update_cart_item(&self, id: CartItemId, quantity: i32) -> Result<CartUpdate, ApiError> {
        self.handle(format!("PUT /carrito/items/{id}"), |state| {
            if !state.cart.items.iter().any(|line| line.id == id) {
                return Err(not_found());
            }
            match u32::try_from(quantity) {
                Ok(quantity) if quantity > 0 => {
                    for line in state.cart.items.iter_mut().filter(|line| line.id == id) {
                        line.quantity = quantity;
                        line.subtotal = line.product.price.times(quantity);
                    }
                    Ok(CartUpdate::Updated(state.cart.clone()))
                }
                _ => {
                    state.cart.items.retain(|line| line.id != id);
                    Ok(CartUpdate::Removed)
                }
            }
        })
        .await
    }

    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), ApiError> {
        self.handle(format!("DELETE /carrito/items/{id}"), |state| {
            state.cart.items.retain(|line| line.id != id);
            Ok(())
        })
        .await
    }

    async fn favorites(&self) -> Result<Vec<FavoriteEntry>, ApiError> {
        self.handle("GET /favoritos".to_string(), |state| {
            Ok(state
                .favorites
                .iter()
                .cloned()
                .map(|product| FavoriteEntry { product })
                .collect())
        })
        .await
    }

    async fn add_favorite(&self, id: ProductId) -> Result<Option<Product>, ApiError> {
        self.handle(format!("POST /favoritos/{id}"), |state| {
            let product = find_product(state, id).ok_or_else(not_found)?;
            if !state.favorites.iter().any(|p| p.id == id) {
                state.favorites.push(product.clone());
            }
            Ok(Some(product))
        })
        .await
    }

    async fn remove_favorite(&self, id: ProductId) -> Result<(), ApiError> {
        self.handle(format!("DELETE /favoritos/{id}"), |state| {
            state.favorites.retain(|p| p.id != id);
            Ok(())
        })
        .await
    }

    async fn pay(&self, request: &PaymentRequest) -> Result<String, ApiError> {
        let order_id = request.order_id;
        self.handle("POST /checkout/pagar".to_string(), |state| {
            let order = state
                .orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(not_found)?;
            order.status = OrderStatus::Paid;
            Ok(format!("Pago del pedido {order_id} completado"))
        })
        .await
    }

    async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.handle("GET /api/pedidos".to_string(), |state| Ok(state.orders.clone()))
            .await
    }
}
