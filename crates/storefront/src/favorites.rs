//! Favorites state: the set of product ids the user has marked.
//!
//! Follows the session like the cart does: one fetch per login edge, an
//! immediate clear on logout. Adds and removes are merged into the set once
//! the backend confirms them; a failed call leaves the set untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use tienda_core::{Product, ProductId};

use crate::api::Backend;
use crate::error::{self, Result, StoreError};
use crate::reactive::{EdgeDetector, Ticket, Transition, VersionGate};
use crate::session::{Session, SessionObserver};

/// Read-only projection handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FavoritesSnapshot {
    /// Favorite product ids; authoritative for membership.
    pub ids: BTreeSet<ProductId>,
    /// Best-effort product details for display.
    pub products: Vec<Product>,
}

impl FavoritesSnapshot {
    fn from_products(products: Vec<Product>) -> Self {
        Self {
            ids: products.iter().map(|p| p.id).collect(),
            products,
        }
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.ids.contains(&id)
    }
}

/// Owner of the favorite set.
pub struct FavoritesState {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
    edges: EdgeDetector,
    gate: VersionGate,
    snapshot: watch::Sender<FavoritesSnapshot>,
}

impl FavoritesState {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, session: Arc<Session>) -> Self {
        let (snapshot, _) = watch::channel(FavoritesSnapshot::default());
        Self {
            backend,
            session,
            edges: EdgeDetector::new(),
            gate: VersionGate::new(),
            snapshot,
        }
    }

    /// Fetch the favorites and replace the set.
    ///
    /// Does nothing when logged out; a failed fetch empties the set.
    #[instrument(skip(self))]
    pub async fn load(&self) -> FavoritesSnapshot {
        if !self.session.is_logged_in() {
            return self.snapshot();
        }

        let ticket = self.gate.ticket();
        let next = match self.backend.favorites().await {
            Ok(entries) => {
                FavoritesSnapshot::from_products(entries.into_iter().map(|e| e.product).collect())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load favorites");
                FavoritesSnapshot::default()
            }
        };

        let mut fresh = true;
        self.snapshot.send_if_modified(|current| {
            if !self.gate.try_apply(ticket) {
                fresh = false;
                return false;
            }
            replace(current, next)
        });
        if !fresh {
            debug!(?ticket, "Discarding stale favorites response");
        }
        self.snapshot()
    }

    /// Mark a product as favorite.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId) -> Result<()> {
        self.require_session()?;

        let ticket = self.gate.ticket();
        let product = self.backend.add_favorite(product_id).await?;
        self.merge(ticket, |current| {
            let mut changed = current.ids.insert(product_id);
            if let Some(product) = product
                && !current.products.iter().any(|p| p.id == product_id)
            {
                current.products.push(product);
                changed = true;
            }
            changed
        });
        Ok(())
    }

    /// Unmark a product.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> Result<()> {
        self.require_session()?;

        let ticket = self.gate.ticket();
        self.backend.remove_favorite(product_id).await?;
        self.merge(ticket, |current| {
            let before = current.products.len();
            current.products.retain(|p| p.id != product_id);
            current.ids.remove(&product_id) || current.products.len() != before
        });
        Ok(())
    }

    /// Add or remove depending on current membership.
    ///
    /// Returns whether the product is a favorite afterwards.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified and
    /// leave the set unchanged.
    pub async fn toggle(&self, product_id: ProductId) -> Result<bool> {
        let product = product_id.to_string();
        if self.is_favorite(product_id) {
            error::add_breadcrumb("favorites", "Removed favorite", Some(&[("product_id", product.as_str())]));
            self.remove(product_id).await?;
            Ok(false)
        } else {
            error::add_breadcrumb("favorites", "Added favorite", Some(&[("product_id", product.as_str())]));
            self.add(product_id).await?;
            Ok(true)
        }
    }

    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.snapshot.borrow().contains(product_id)
    }

    /// Empty the set without a request.
    pub fn clear_local(&self) {
        self.gate.invalidate();
        if self
            .snapshot
            .send_if_modified(|current| replace(current, FavoritesSnapshot::default()))
        {
            debug!("Favorites cleared");
        }
    }

    /// Feed the current login flag; acts only on a flip.
    pub async fn on_session_change(&self, logged_in: bool) {
        match self.edges.observe(logged_in) {
            Some(Transition::LoggedIn) => {
                self.load().await;
            }
            Some(Transition::LoggedOut) => self.clear_local(),
            None => {}
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FavoritesSnapshot> {
        self.snapshot.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> FavoritesSnapshot {
        self.snapshot.borrow().clone()
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(StoreError::not_logged_in())
        }
    }

    fn merge(&self, ticket: Ticket, change: impl FnOnce(&mut FavoritesSnapshot) -> bool) {
        let mut fresh = true;
        self.snapshot.send_if_modified(|current| {
            if !self.gate.try_merge(ticket) {
                fresh = false;
                return false;
            }
            change(current)
        });
        if !fresh {
            debug!(?ticket, "Discarding favorites change made before logout");
        }
    }
}

fn replace(current: &mut FavoritesSnapshot, next: FavoritesSnapshot) -> bool {
    if *current == next {
        false
    } else {
        *current = next;
        true
    }
}

impl SessionObserver for FavoritesState {
    fn session_ended(&self) {
        self.edges.observe(false);
        self.clear_local();
    }
}
