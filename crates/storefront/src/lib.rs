//! Tienda storefront client library.
//!
//! Talks to the Tienda REST backend and keeps the client-side state in sync
//! with it: the session derived from the stored credential, the active cart,
//! the favorite set, plus catalog, profile and checkout services.
//!
//! # Architecture
//!
//! - [`storage`]: key/value storage holding the credential, with cross-tab events
//! - [`session`]: login status and identity claims derived from the credential
//! - [`cart`] / [`favorites`]: snapshots that follow session transitions
//! - [`api`]: the [`api::Backend`] seam and its `reqwest` implementation
//! - [`storefront`]: the facade wiring everything together
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let _telemetry = telemetry::init(&config);
//! let store = Storefront::connect(&config)?;
//! store.start().await;
//! store.login("ana@tienda.es", "secreto").await?;
//! store.cart().add_item(ProductId::new(5), 2).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod favorites;
pub mod profile;
pub mod reactive;
pub mod session;
pub mod storage;
pub mod storefront;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use error::{ErrorKind, StoreError};
pub use storefront::Storefront;
