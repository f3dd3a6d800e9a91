//! Integration test support for the Tienda storefront client.
//!
//! [`FakeBackendServer`] is an in-process `axum` server speaking the
//! backend's REST contract on an ephemeral port. Tests point the real
//! `HttpBackend` at it and assert on the request log.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use tienda_storefront::ClientConfig;

/// Password the fake backend rejects with 401.
pub const WRONG_PASSWORD: &str = "wrong";

/// Build an unsigned `h.{payload}.s` credential.
#[must_use]
pub fn token_for(sub: &str, name: &str, photo: Option<&str>) -> String {
    let mut payload = json!({ "sub": sub, "nombre": name });
    if let Some(photo) = photo {
        payload["fotoUrl"] = json!(photo);
    }
    format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

/// A request as received by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// `"METHOD /path"`.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Body parsed as JSON, `Null` if it is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct FixtureProduct {
    id: i64,
    name: &'static str,
    cents: i64,
    stock: i64,
    category: i64,
}

const PRODUCTS: &[FixtureProduct] = &[
    FixtureProduct { id: 1, name: "Camiseta", cents: 1999, stock: 10, category: 1 },
    FixtureProduct { id: 2, name: "Taza", cents: 899, stock: 25, category: 2 },
    FixtureProduct { id: 3, name: "Póster", cents: 1250, stock: 1, category: 2 },
];

const CATEGORIES: &[(i64, &str)] = &[(1, "Ropa"), (2, "Hogar")];

#[allow(clippy::cast_precision_loss)]
fn price(cents: i64) -> Value {
    json!(cents as f64 / 100.0)
}

fn fixture(id: i64) -> Option<&'static FixtureProduct> {
    PRODUCTS.iter().find(|p| p.id == id)
}

fn product_json(product: &FixtureProduct) -> Value {
    let category = CATEGORIES
        .iter()
        .find(|(id, _)| *id == product.category)
        .map(|(id, name)| json!({ "idCategoria": id, "nombre": name }));
    json!({
        "idProducto": product.id,
        "sku": format!("SKU-{:03}", product.id),
        "ean": null,
        "urlImagen": format!("/img/{}.jpg", product.id),
        "nombre": product.name,
        "precio": price(product.cents),
        "stock": product.stock,
        "categoria": category,
    })
}

struct Line {
    id: i64,
    product_id: i64,
    quantity: i64,
}

struct ServerData {
    user_email: String,
    user_name: String,
    photo: Option<String>,
    lines: Vec<Line>,
    next_line_id: i64,
    favorites: Vec<i64>,
    order_paid: bool,
}

impl Default for ServerData {
    fn default() -> Self {
        Self {
            user_email: "a@b.com".to_string(),
            user_name: "Ana".to_string(),
            photo: None,
            lines: Vec::new(),
            next_line_id: 1,
            favorites: Vec::new(),
            order_paid: false,
        }
    }
}

impl ServerData {
    fn token(&self) -> String {
        token_for(&self.user_email, &self.user_name, self.photo.as_deref())
    }

    fn cart_json(&self) -> Value {
        let items: Vec<Value> = self
            .lines
            .iter()
            .filter_map(|line| {
                let product = fixture(line.product_id)?;
                Some(json!({
                    "id": line.id,
                    "producto": product_json(product),
                    "cantidad": line.quantity,
                    "subtotal": price(product.cents * line.quantity),
                }))
            })
            .collect();
        json!({
            "idCarrito": 1,
            "fechaCreacion": "2025-10-20T10:15:00",
            "usuario": { "idUsuario": 1, "email": self.user_email },
            "items": items,
        })
    }
}

#[derive(Default)]
struct ServerState {
    log: Mutex<Vec<RecordedRequest>>,
    failures: Mutex<HashMap<String, (StatusCode, String)>>,
    data: Mutex<ServerData>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Server
// =============================================================================

/// In-process fake of the storefront REST backend.
pub struct FakeBackendServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl FakeBackendServer {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Listener has no address");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake backend error");
        });

        Self { addr, state, task }
    }

    /// Base URL of the server, with a trailing slash.
    ///
    /// # Panics
    ///
    /// Never in practice; the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("Invalid base URL")
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url())
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.log).clone()
    }

    /// `"METHOD /path"` of every request received so far.
    #[must_use]
    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(RecordedRequest::line).collect()
    }

    pub fn clear_requests(&self) {
        lock(&self.state.log).clear();
    }

    /// Answer the next `method path` request with `status` and `body`.
    pub fn fail_next(&self, method: &str, path: &str, status: StatusCode, body: &str) {
        lock(&self.state.failures).insert(format!("{method} {path}"), (status, body.to_string()));
    }
}

impl Drop for FakeBackendServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/api/perfil/nombre", put(update_name))
        .route("/api/perfil/contrasena", put(change_password))
        .route("/api/perfil/foto", post(upload_photo).delete(delete_photo))
        .route("/api/productos", get(products))
        .route("/api/productos/{id}", get(product))
        .route("/api/productos/categoria/{id}", get(products_by_category))
        .route("/api/categorias", get(categories))
        .route("/carrito", get(cart).post(add_to_cart))
        .route("/carrito/items/{id}", put(update_line).delete(remove_line))
        .route("/favoritos", get(favorites))
        .route("/favoritos/{id}", post(add_favorite).delete(remove_favorite))
        .route("/checkout/pagar", post(pay))
        .route("/api/pedidos", get(orders))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
        .with_state(state)
}

/// Log every request and apply scripted failures.
async fn record(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let header_value = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    };
    let line = recorded.line();
    lock(&state.log).push(recorded);

    if let Some((status, body)) = lock(&state.failures).remove(&line) {
        return (status, body).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

// =============================================================================
// Handlers
// =============================================================================

type Rejection = (StatusCode, &'static str);

fn require_bearer(headers: &HeaderMap) -> Result<(), Rejection> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len())
        .map(|_| ())
        .ok_or((StatusCode::UNAUTHORIZED, "Token requerido"))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<ServerState>>, Json(body): Json<LoginBody>) -> Response {
    if body.password == WRONG_PASSWORD {
        return (StatusCode::UNAUTHORIZED, "Credenciales inválidas").into_response();
    }
    let mut data = lock(&state.data);
    data.user_email = body.email;
    Json(json!({ "token": data.token() })).into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    nombre: String,
    email: String,
    password: String,
    direccion: String,
}

async fn register(State(state): State<Arc<ServerState>>, Json(body): Json<RegisterBody>) -> Response {
    if body.password.is_empty() || body.direccion.is_empty() {
        return (StatusCode::BAD_REQUEST, "Faltan datos obligatorios").into_response();
    }
    let mut data = lock(&state.data);
    if body.email == data.user_email {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "El email ya está registrado" })),
        )
            .into_response();
    }
    data.user_email = body.email;
    data.user_name = body.nombre;
    Json(json!({ "token": data.token() })).into_response()
}

#[derive(Deserialize)]
struct NameBody {
    nombre: String,
}

async fn update_name(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<NameBody>,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let mut data = lock(&state.data);
    data.user_name = body.nombre;
    Ok(Json(json!({ "token": data.token() })))
}

#[derive(Deserialize)]
struct PasswordBody {
    actual: String,
    nueva: String,
}

async fn change_password(
    headers: HeaderMap,
    Json(body): Json<PasswordBody>,
) -> Result<&'static str, Rejection> {
    require_bearer(&headers)?;
    if body.actual == WRONG_PASSWORD {
        return Err((StatusCode::BAD_REQUEST, "La contraseña actual no es correcta"));
    }
    if body.nueva.len() < 6 {
        return Err((StatusCode::BAD_REQUEST, "La contraseña es demasiado corta"));
    }
    Ok("Contraseña actualizada correctamente")
}

async fn upload_photo(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    if !multipart || body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Archivo requerido"));
    }
    let mut data = lock(&state.data);
    data.photo = Some("/uploads/perfil/1.png".to_string());
    Ok(Json(json!({ "token": data.token() })))
}

async fn delete_photo(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let mut data = lock(&state.data);
    data.photo = None;
    Ok(Json(json!({ "token": data.token() })))
}

async fn products() -> Json<Value> {
    Json(PRODUCTS.iter().map(product_json).collect())
}

async fn product(Path(id): Path<i64>) -> Result<Json<Value>, Rejection> {
    fixture(id)
        .map(|p| Json(product_json(p)))
        .ok_or((StatusCode::NOT_FOUND, "Producto no encontrado"))
}

async fn products_by_category(Path(id): Path<i64>) -> Json<Value> {
    Json(
        PRODUCTS
            .iter()
            .filter(|p| p.category == id)
            .map(product_json)
            .collect(),
    )
}

async fn categories() -> Json<Value> {
    Json(
        CATEGORIES
            .iter()
            .map(|(id, name)| json!({ "idCategoria": id, "nombre": name }))
            .collect(),
    )
}

async fn cart(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    Ok(Json(lock(&state.data).cart_json()))
}

#[derive(Deserialize)]
struct AddBody {
    #[serde(rename = "idProducto")]
    product_id: i64,
    cantidad: i64,
}

async fn add_to_cart(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<AddBody>,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let product = fixture(body.product_id).ok_or((StatusCode::NOT_FOUND, "Producto no encontrado"))?;

    let mut data = lock(&state.data);
    let in_cart = data
        .lines
        .iter()
        .find(|l| l.product_id == body.product_id)
        .map_or(0, |l| l.quantity);
    if in_cart + body.cantidad > product.stock {
        return Err((StatusCode::BAD_REQUEST, "Stock insuficiente"));
    }

    if let Some(line) = data.lines.iter_mut().find(|l| l.product_id == body.product_id) {
        line.quantity += body.cantidad;
    } else {
        let id = data.next_line_id;
        data.next_line_id += 1;
        data.lines.push(Line {
            id,
            product_id: body.product_id,
            quantity: body.cantidad,
        });
    }
    Ok(Json(data.cart_json()))
}

#[derive(Deserialize)]
struct QuantityBody {
    cantidad: i64,
}

async fn update_line(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Result<Response, Rejection> {
    require_bearer(&headers)?;
    let mut data = lock(&state.data);
    if body.cantidad <= 0 {
        data.lines.retain(|l| l.id != id);
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let line = data
        .lines
        .iter_mut()
        .find(|l| l.id == id)
        .ok_or((StatusCode::NOT_FOUND, "Item no encontrado"))?;
    line.quantity = body.cantidad;
    Ok(Json(data.cart_json()).into_response())
}

async fn remove_line(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, Rejection> {
    require_bearer(&headers)?;
    lock(&state.data).lines.retain(|l| l.id != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn favorites(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let data = lock(&state.data);
    Ok(Json(
        data.favorites
            .iter()
            .filter_map(|id| fixture(*id))
            .map(|p| json!({ "producto": product_json(p) }))
            .collect(),
    ))
}

async fn add_favorite(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let product = fixture(id).ok_or((StatusCode::NOT_FOUND, "Producto no encontrado"))?;
    let mut data = lock(&state.data);
    if !data.favorites.contains(&id) {
        data.favorites.push(id);
    }
    Ok(Json(json!({ "idFavorito": id, "producto": product_json(product) })))
}

async fn remove_favorite(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, Rejection> {
    require_bearer(&headers)?;
    lock(&state.data).favorites.retain(|f| *f != id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PaymentBody {
    #[serde(rename = "pedidoId")]
    order_id: i64,
    token: String,
}

async fn pay(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<PaymentBody>,
) -> Result<String, Rejection> {
    require_bearer(&headers)?;
    if body.order_id != 1 {
        return Err((StatusCode::NOT_FOUND, "Pedido no encontrado"));
    }
    if body.token.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Token de pago requerido"));
    }
    lock(&state.data).order_paid = true;
    Ok(format!("Pago procesado para el pedido {}", body.order_id))
}

async fn orders(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_bearer(&headers)?;
    let status = if lock(&state.data).order_paid {
        "PAGADO"
    } else {
        "PENDIENTE"
    };
    Ok(Json(json!([{
        "idPedido": 1,
        "fecha": "2025-10-20",
        "total": 177.97,
        "estado": status,
        "items": [],
    }])))
}
