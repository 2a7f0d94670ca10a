//! Persistence for the device-local guest cart.
//!
//! The guest cart is stored as a JSON list of lines (`product_id`,
//! `quantity`, `price_at_addition`, `product_name`), the same shape the
//! mobile app keeps under its local-storage cart key.

use std::path::PathBuf;
use std::sync::RwLock;

use threadline_core::GuestCart;

use crate::error::StorageError;

/// Abstraction over the device's local cart storage.
pub trait GuestCartStore: Send + Sync {
    /// Load the persisted cart. A missing entry yields an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or decoded.
    fn load(&self) -> Result<GuestCart, StorageError>;

    /// Replace the persisted cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&self, cart: &GuestCart) -> Result<(), StorageError>;

    /// Drop the persisted cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory guest cart store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryGuestCartStore {
    cart: RwLock<GuestCart>,
}

impl MemoryGuestCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a cart. Convenient in tests.
    #[must_use]
    pub fn with_cart(cart: GuestCart) -> Self {
        Self {
            cart: RwLock::new(cart),
        }
    }
}

impl GuestCartStore for MemoryGuestCartStore {
    fn load(&self) -> Result<GuestCart, StorageError> {
        let guard = self
            .cart
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save(&self, cart: &GuestCart) -> Result<(), StorageError> {
        let mut guard = self
            .cart
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = cart.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.save(&GuestCart::new())
    }
}

/// JSON-file guest cart store.
pub struct FileGuestCartStore {
    path: PathBuf,
}

impl FileGuestCartStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GuestCartStore for FileGuestCartStore {
    fn load(&self) -> Result<GuestCart, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GuestCart::new());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, cart: &GuestCart) -> Result<(), StorageError> {
        let payload = serde_json::to_string(cart)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
