//! Threadline client - authenticated API transport and cart reconciliation.
//!
//! This crate is the networking core of the Threadline mobile app. Every
//! feature module (browsing, cart, orders, store management) funnels its
//! HTTP calls through one shared [`ApiClient`], which attaches bearer
//! credentials and transparently recovers from access-token expiry: a burst
//! of concurrent calls that all hit a 401 triggers exactly one token
//! refresh, with the other callers queued and replayed once the new token
//! lands.
//!
//! On top of the transport, [`CartReconciler`] presents one logical cart
//! whether or not the shopper is signed in: a device-persisted guest cart
//! before login, the server cart afterwards, with a one-time merge-and-flush
//! at the transition.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use threadline_client::api::auth::{AuthService, Credentials};
//! use threadline_client::{ApiClient, CartReconciler, ClientConfig, MemoryCredentialStore};
//! use threadline_client::cart::store::MemoryGuestCartStore;
//! use threadline_client::api::catalog::CatalogService;
//!
//! # async fn run() -> Result<(), threadline_client::ClientError> {
//! let config = ClientConfig::new("https://api.threadline.app");
//! let client = ApiClient::new(&config, Arc::new(MemoryCredentialStore::new()))?;
//! client.on_auth_failure(|| {
//!     // Host app decides what "redirect to login" means.
//! });
//!
//! let catalog = CatalogService::new(client.clone());
//! let cart = CartReconciler::new(
//!     client.clone(),
//!     catalog,
//!     Arc::new(MemoryGuestCartStore::new()),
//! )?;
//!
//! let auth = AuthService::new(client.clone());
//! let session = auth
//!     .login(&Credentials {
//!         email: "shopper@example.com".into(),
//!         password: "hunter2".into(),
//!     })
//!     .await?;
//! cart.transition_to_authenticated(session.user_id).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod credentials;
pub mod error;
pub mod transport;

pub use cart::{CartItemView, CartReconciler, CartRef};
pub use config::{ClientConfig, ConfigError};
pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredentials,
};
pub use error::{ClientError, StorageError};
pub use transport::ApiClient;
