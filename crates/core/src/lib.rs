//! Tienda Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront client library and
//! its integration tests.
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. This keeps it lightweight and usable from any front end.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails and order status
//! - [`models`] - Backend wire models (catalog, cart, orders, identity claims)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
