//! Threadline Core - Shared domain types.
//!
//! This crate provides the types shared across the Threadline mobile client:
//! - `client` - HTTP transport, auth, and cart reconciliation
//! - `integration-tests` - end-to-end tests against a mock backend
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart logic - no I/O, no HTTP,
//! no async. Everything in here is directly unit-testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs
//! - [`cart`] - The device-local guest cart and its list operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{CartError, GuestCart, GuestLine};
pub use types::*;
