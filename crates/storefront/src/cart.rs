//! Cart state: the single in-memory snapshot of the active cart.
//!
//! [`CartState`] owns the snapshot and is the only writer. It follows the
//! session: a login edge triggers one [`CartState::load`], a logout edge
//! clears the snapshot without touching the network. Mutations replace the
//! snapshot with the cart the backend returns; they never patch it locally.
//!
//! Responses can arrive out of order when several requests are in flight.
//! Each request draws a ticket from a [`VersionGate`] before it is sent, and
//! a response is applied only if no newer one has been applied already.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use tienda_core::{Cart, CartItemId, ProductId};

use crate::api::{AddItemRequest, Backend, CartUpdate};
use crate::error::{self, Result, StoreError};
use crate::reactive::{EdgeDetector, Ticket, Transition, VersionGate};
use crate::session::{Session, SessionObserver};

/// Lifecycle of the cart snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartPhase {
    /// No cart: logged out, or the last load failed.
    #[default]
    Empty,
    /// A fetch is in flight; any previous cart is still shown.
    Loading,
    /// The snapshot holds the last cart returned by the backend.
    Loaded,
}

/// Read-only projection handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSnapshot {
    pub phase: CartPhase,
    pub cart: Option<Cart>,
}

impl CartSnapshot {
    fn settled(cart: Option<Cart>) -> Self {
        let phase = if cart.is_some() {
            CartPhase::Loaded
        } else {
            CartPhase::Empty
        };
        Self { phase, cart }
    }

    /// Units in the cart, zero when there is none.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, Cart::item_count)
    }
}

/// Owner of the cart snapshot.
pub struct CartState {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
    edges: EdgeDetector,
    gate: VersionGate,
    snapshot: watch::Sender<CartSnapshot>,
}

impl CartState {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, session: Arc<Session>) -> Self {
        let (snapshot, _) = watch::channel(CartSnapshot::default());
        Self {
            backend,
            session,
            edges: EdgeDetector::new(),
            gate: VersionGate::new(),
            snapshot,
        }
    }

    /// Fetch the cart and replace the snapshot.
    ///
    /// Does nothing when logged out. A failed fetch empties the snapshot and
    /// is logged, never returned. Returns the snapshot's cart afterwards.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<Cart> {
        if !self.session.is_logged_in() {
            return None;
        }

        let ticket = self.gate.ticket();
        self.snapshot.send_if_modified(|current| {
            let loading = current.phase == CartPhase::Loading;
            current.phase = CartPhase::Loading;
            !loading
        });

        match self.backend.cart().await {
            Ok(cart) => {
                self.apply(ticket, Some(cart));
            }
            Err(e) => {
                warn!(error = %e, "Failed to load cart");
                self.apply(ticket, None);
            }
        }
        self.cart()
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Rejected locally, without a request, when logged out or when
    /// `quantity` is zero. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<Cart> {
        if !self.session.is_logged_in() {
            return Err(StoreError::not_logged_in());
        }
        if quantity == 0 {
            return Err(StoreError::invalid("Quantity must be at least 1."));
        }

        let product = product_id.to_string();
        let units = quantity.to_string();
        error::add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("product_id", product.as_str()), ("quantity", units.as_str())]),
        );

        let ticket = self.gate.ticket();
        let request = AddItemRequest {
            product_id,
            quantity,
        };
        let cart = self.backend.add_cart_item(&request).await?;
        self.apply(ticket, Some(cart.clone()));
        Ok(cart)
    }

    /// Set the quantity of a line.
    ///
    /// When the backend drops the line (204) or `quantity` is not positive,
    /// the cart is reloaded in full instead of patched from the response.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: CartItemId, quantity: i32) -> Result<Option<Cart>> {
        if !self.session.is_logged_in() {
            return Err(StoreError::not_logged_in());
        }

        let line = item_id.to_string();
        let units = quantity.to_string();
        error::add_breadcrumb(
            "cart",
            "Updated quantity",
            Some(&[("item_id", line.as_str()), ("quantity", units.as_str())]),
        );

        let ticket = self.gate.ticket();
        match self.backend.update_cart_item(item_id, quantity).await? {
            CartUpdate::Updated(cart) if quantity > 0 => {
                self.apply(ticket, Some(cart.clone()));
                Ok(Some(cart))
            }
            CartUpdate::Updated(_) | CartUpdate::Removed => {
                debug!("Cart line removed, reloading");
                Ok(self.load().await)
            }
        }
    }

    /// Delete a line, then reload the cart.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: CartItemId) -> Result<Option<Cart>> {
        if !self.session.is_logged_in() {
            return Err(StoreError::not_logged_in());
        }

        let line = item_id.to_string();
        error::add_breadcrumb("cart", "Removed item", Some(&[("item_id", line.as_str())]));

        self.backend.remove_cart_item(item_id).await?;
        Ok(self.load().await)
    }

    /// Drop the snapshot without a request.
    ///
    /// Responses to requests issued before this call are discarded.
    pub fn clear_local(&self) {
        self.gate.invalidate();
        let cleared = self.snapshot.send_if_modified(|current| {
            let next = CartSnapshot::default();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if cleared {
            debug!("Cart cleared");
        }
    }

    /// Feed the current login flag.
    ///
    /// Acts only on a flip: logging in loads the cart, logging out clears it
    /// before the first suspension point.
    pub async fn on_session_change(&self, logged_in: bool) {
        match self.edges.observe(logged_in) {
            Some(Transition::LoggedIn) => {
                self.load().await;
            }
            Some(Transition::LoggedOut) => self.clear_local(),
            None => {}
        }
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.snapshot.borrow().cart.clone()
    }

    /// Replace the snapshot if `ticket` is still current.
    fn apply(&self, ticket: Ticket, cart: Option<Cart>) -> bool {
        let mut fresh = true;
        self.snapshot.send_if_modified(|current| {
            if !self.gate.try_apply(ticket) {
                fresh = false;
                return false;
            }
            let next = CartSnapshot::settled(cart);
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if !fresh {
            debug!(?ticket, "Discarding stale cart response");
        }
        fresh
    }
}

impl SessionObserver for CartState {
    fn session_ended(&self) {
        self.edges.observe(false);
        self.clear_local();
    }
}
