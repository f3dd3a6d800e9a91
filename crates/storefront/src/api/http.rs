//! `reqwest` implementation of [`Backend`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use tienda_core::{
    Cart, CartItemId, Category, CategoryId, FavoriteEntry, Order, Product, ProductId,
};

use super::{
    AddItemRequest, AuthResponse, Backend, CartUpdate, ChangePasswordRequest, LoginRequest,
    PaymentRequest, PhotoUpload, RegisterRequest, UpdateNameRequest, UpdateQuantityRequest,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::TokenStore;

/// Client for the storefront REST backend.
///
/// Every request carries `Authorization: Bearer <token>` when a credential
/// is stored; the header is read fresh per request so a login in another
/// tab is picked up immediately.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    tokens: TokenStore,
}

impl HttpBackend {
    /// Create a backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_base_url.clone(),
                tokens,
            }),
        })
    }

    /// Resolve a backend path against the base URL.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request, attaching the bearer credential if one is stored.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let builder = self.inner.client.request(method, self.url(path)?);
        Ok(match self.inner.tokens.get() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    /// Send a request and fail on non-success statuses.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status { status, body });
        }

        Ok(response)
    }

    /// Send a request and decode the JSON body.
    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send(builder).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request and return the plain-text body.
    async fn text(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        Ok(self.send(builder).await?.text().await?)
    }

    /// Send a request and discard the body.
    async fn empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.json(self.request(Method::POST, "auth/login")?.json(request))
            .await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.json(self.request(Method::POST, "auth/register")?.json(request))
            .await
    }

    #[instrument(skip(self, request))]
    async fn update_name(&self, request: &UpdateNameRequest) -> Result<AuthResponse, ApiError> {
        self.json(self.request(Method::PUT, "api/perfil/nombre")?.json(request))
            .await
    }

    #[instrument(skip(self, request))]
    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<String, ApiError> {
        self.text(self.request(Method::PUT, "api/perfil/contrasena")?.json(request))
            .await
    }

    #[instrument(skip(self, photo), fields(file_name = %photo.file_name, len = photo.bytes.len()))]
    async fn upload_photo(&self, photo: PhotoUpload) -> Result<AuthResponse, ApiError> {
        let part = Part::bytes(photo.bytes)
            .file_name(photo.file_name)
            .mime_str(&photo.mime_type)?;
        let form = Form::new().part("file", part);

        self.json(self.request(Method::POST, "api/perfil/foto")?.multipart(form))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_photo(&self) -> Result<AuthResponse, ApiError> {
        self.json(self.request(Method::DELETE, "api/perfil/foto")?)
            .await
    }

    #[instrument(skip(self))]
    async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.json(self.request(Method::GET, "api/productos")?).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.json(self.request(Method::GET, &format!("api/productos/{id}"))?)
            .await
    }

    #[instrument(skip(self), fields(category_id = %id))]
    async fn products_by_category(&self, id: CategoryId) -> Result<Vec<Product>, ApiError> {
        self.json(self.request(Method::GET, &format!("api/productos/categoria/{id}"))?)
            .await
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.json(self.request(Method::GET, "api/categorias")?).await
    }

    #[instrument(skip(self))]
    async fn cart(&self) -> Result<Cart, ApiError> {
        self.json(self.request(Method::GET, "carrito")?).await
    }

    #[instrument(skip(self), fields(product_id = %request.product_id, quantity = request.quantity))]
    async fn add_cart_item(&self, request: &AddItemRequest) -> Result<Cart, ApiError> {
        self.json(self.request(Method::POST, "carrito")?.json(request))
            .await
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn update_cart_item(&self, id: CartItemId, quantity: i32) -> Result<CartUpdate, ApiError> {
        let builder = self
            .request(Method::PUT, &format!("carrito/items/{id}"))?
            .json(&UpdateQuantityRequest { quantity });
        let response = self.send(builder).await?;

        if response.status() == StatusCode::NO_CONTENT {
            debug!("Cart line removed by quantity update");
            return Ok(CartUpdate::Removed);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(CartUpdate::Removed);
        }
        Ok(CartUpdate::Updated(serde_json::from_str(&text)?))
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), ApiError> {
        self.empty(self.request(Method::DELETE, &format!("carrito/items/{id}"))?)
            .await
    }

    #[instrument(skip(self))]
    async fn favorites(&self) -> Result<Vec<FavoriteEntry>, ApiError> {
        self.json(self.request(Method::GET, "favoritos")?).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn add_favorite(&self, id: ProductId) -> Result<Option<Product>, ApiError> {
        let text = self
            .text(self.request(Method::POST, &format!("favoritos/{id}"))?)
            .await?;

        // The echo is informational; the add already succeeded
        match serde_json::from_str::<FavoriteEntry>(&text) {
            Ok(entry) => Ok(Some(entry.product)),
            Err(e) => {
                debug!(error = %e, "Favorite response carried no product");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn remove_favorite(&self, id: ProductId) -> Result<(), ApiError> {
        self.empty(self.request(Method::DELETE, &format!("favoritos/{id}"))?)
            .await
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn pay(&self, request: &PaymentRequest) -> Result<String, ApiError> {
        self.text(self.request(Method::POST, "checkout/pagar")?.json(request))
            .await
    }

    #[instrument(skip(self))]
    async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.json(self.request(Method::GET, "api/pedidos")?).await
    }
}
