//! The storefront facade: one object owning every state component.
//!
//! [`Storefront`] wires the session to the cart and favorites. Both are
//! registered as session observers, so any end of the session clears them
//! synchronously, wherever the credential was dropped. Loading is async:
//! whenever the session may have started (login, registration, a credential
//! written by another tab) the facade feeds the login flag to both, and each
//! edge-detects and loads once per flip.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use tienda_core::{Email, IdentityClaims};

use crate::api::{Backend, HttpBackend, LoginRequest, RegisterRequest};
use crate::cart::CartState;
use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::config::ClientConfig;
use crate::error::{self, ApiError, Result, StoreError};
use crate::favorites::FavoritesState;
use crate::profile::Profile;
use crate::session::{Session, SessionObserver, TokenStore};
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Storefront client. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
    cart: Arc<CartState>,
    favorites: Arc<FavoritesState>,
    catalog: Catalog,
    profile: Profile,
    checkout: Checkout,
}

impl Storefront {
    /// Assemble a storefront over an existing backend and storage.
    ///
    /// The session is restored from `storage` immediately; call
    /// [`Storefront::start`] to load the cart and favorites for it.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn KeyValueStorage>,
        config: &ClientConfig,
    ) -> Self {
        let session = Arc::new(Session::new(TokenStore::new(storage)));
        let cart = Arc::new(CartState::new(Arc::clone(&backend), Arc::clone(&session)));
        let favorites = Arc::new(FavoritesState::new(
            Arc::clone(&backend),
            Arc::clone(&session),
        ));
        let cart_observer: Weak<dyn SessionObserver> = Arc::downgrade(&cart) as Weak<CartState>;
        let favorites_observer: Weak<dyn SessionObserver> = Arc::downgrade(&favorites) as Weak<FavoritesState>;
        session.observe(cart_observer);
        session.observe(favorites_observer);

        Self {
            inner: Arc::new(StorefrontInner {
                cart,
                favorites,
                catalog: Catalog::new(Arc::clone(&backend), config.catalog_cache_ttl),
                profile: Profile::new(Arc::clone(&backend), Arc::clone(&session)),
                checkout: Checkout::new(Arc::clone(&backend), Arc::clone(&session)),
                backend,
                session,
            }),
        }
    }

    /// Build a storefront talking HTTP to the configured backend.
    ///
    /// The credential is kept in `config.storage_path` when set, in memory
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn connect(config: &ClientConfig) -> std::result::Result<Self, ApiError> {
        let storage: Arc<dyn KeyValueStorage> = match &config.storage_path {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::new()),
        };
        let backend = HttpBackend::new(config, TokenStore::new(Arc::clone(&storage)))?;

        info!(base_url = %config.api_base_url, "Storefront client configured");
        Ok(Self::new(Arc::new(backend), storage, config))
    }

    /// Load the cart and favorites for a session restored from storage.
    pub async fn start(&self) {
        self.propagate_session().await;
    }

    /// Log in and return the decoded identity.
    ///
    /// # Errors
    ///
    /// Rejected locally if the email is malformed. Backend failures are
    /// classified; a credential that does not decode is reported as an
    /// unknown error and leaves the session logged out.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<IdentityClaims> {
        let email = Email::parse(email).map_err(|e| StoreError::invalid(e.to_string()))?;
        if password.is_empty() {
            return Err(StoreError::invalid("Password is required."));
        }

        error::add_breadcrumb("auth", "Login", None);
        let response = self
            .inner
            .backend
            .login(&LoginRequest {
                email,
                password: password.to_string(),
            })
            .await?;
        self.establish(&response.token).await
    }

    /// Create an account and log into it.
    ///
    /// # Errors
    ///
    /// Rejected locally if the name is blank, the email malformed or the
    /// password empty. Backend failures are classified.
    #[instrument(skip(self, password, address))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        address: &str,
    ) -> Result<IdentityClaims> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("Name is required."));
        }
        let email = Email::parse(email).map_err(|e| StoreError::invalid(e.to_string()))?;
        if password.is_empty() {
            return Err(StoreError::invalid("Password is required."));
        }

        error::add_breadcrumb("auth", "Register", None);
        let response = self
            .inner
            .backend
            .register(&RegisterRequest {
                name: name.to_string(),
                email,
                password: password.to_string(),
                address: address.trim().to_string(),
            })
            .await?;
        self.establish(&response.token).await
    }

    /// Log out. The cart and favorites are empty when this returns.
    pub async fn logout(&self) {
        error::add_breadcrumb("auth", "Logout", None);
        self.inner.session.clear_credential();
        self.propagate_session().await;
    }

    /// Feed the current login flag to the cart and favorites.
    pub async fn propagate_session(&self) {
        let logged_in = self.inner.session.is_logged_in();
        tokio::join!(
            self.inner.cart.on_session_change(logged_in),
            self.inner.favorites.on_session_change(logged_in),
        );
    }

    /// Follow credential changes made by other handles on the same storage.
    ///
    /// The task ends once the storefront is dropped.
    #[must_use]
    pub fn spawn_storage_listener(&self) -> JoinHandle<()> {
        let mut events = self.inner.session.token_store().subscribe();
        let weak: Weak<StorefrontInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let this = Storefront { inner };

                let changed = match event {
                    Ok(event) => this.inner.session.handle_storage_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Storage events dropped, resynchronizing session");
                        this.inner.session.resync()
                    }
                    Err(RecvError::Closed) => break,
                };
                if changed {
                    this.propagate_session().await;
                }
            }
            debug!("Storage listener stopped");
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Identity of the current session, if any.
    #[must_use]
    pub fn identity(&self) -> Option<IdentityClaims> {
        self.inner.session.claims()
    }

    #[must_use]
    pub fn cart(&self) -> &CartState {
        self.inner.cart.as_ref()
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoritesState {
        self.inner.favorites.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.inner.profile
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    /// Store a credential issued by the backend and propagate the result.
    ///
    /// A credential for a different account ends the previous session
    /// first, so its cart and favorites are cleared before the new ones load.
    async fn establish(&self, token: &str) -> Result<IdentityClaims> {
        let claims = self.inner.session.set_credential(token);
        self.propagate_session().await;
        claims?.ok_or_else(|| ApiError::MalformedCredential.into())
    }
}
