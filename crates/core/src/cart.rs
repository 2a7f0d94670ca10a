//! Device-local guest cart.
//!
//! Before a shopper authenticates, the cart lives entirely on the device as
//! an ordered list of lines keyed by product ID. This module holds that list
//! and its pure edit operations; persistence and server sync live in the
//! client crate.
//!
//! # Invariants
//!
//! - At most one line per product ID (adds merge by product).
//! - Every stored quantity is a positive integer. An edit that would produce
//!   quantity zero removes the line instead.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Errors produced by cart edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// A cart line can never hold a zero or negative quantity.
    #[error("quantity must be a positive integer")]
    ZeroQuantity,
}

/// One line of the guest cart.
///
/// Field names match the shape persisted on-device by the mobile app, so the
/// serialized form is the storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestLine {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price observed when the line was added. Display-only; checkout
    /// always re-fetches prices.
    pub price_at_addition: Decimal,
    pub product_name: String,
}

impl GuestLine {
    /// Create a new guest cart line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] if `quantity` is zero.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        price_at_addition: Decimal,
        product_name: impl Into<String>,
    ) -> Result<Self, CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        Ok(Self {
            product_id,
            quantity,
            price_at_addition,
            product_name: product_name.into(),
        })
    }

    /// Line subtotal: `price_at_addition * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price_at_addition * Decimal::from(self.quantity)
    }
}

/// Ordered list of guest cart lines, one per product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestCart {
    lines: Vec<GuestLine>,
}

impl GuestCart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Append-or-merge a line into the cart.
    ///
    /// If a line for the same product already exists, its quantity is
    /// incremented by the incoming quantity and the newer price/name are
    /// kept. Otherwise the line is appended, preserving insertion order.
    pub fn add(&mut self, line: GuestLine) {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity += line.quantity;
            existing.price_at_addition = line.price_at_addition;
            existing.product_name = line.product_name;
        } else {
            self.lines.push(line);
        }
    }

    /// Remove the line for a product. Removing a missing product is a no-op.
    pub fn remove(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product_id != product_id);
    }

    /// Replace the stored quantity for a product.
    ///
    /// A quantity of zero removes the line instead (quantity floor). Setting
    /// the quantity of a missing product is a no-op.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            line.quantity = quantity;
        }
    }

    /// Sum of `price_at_addition * quantity` across all lines. Zero when empty.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(GuestLine::subtotal).sum()
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines (not units).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[GuestLine] {
        &self.lines
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn line(product: &str, quantity: u32, price: Decimal) -> GuestLine {
        GuestLine::new(ProductId::new(product), quantity, price, product).unwrap()
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let err = GuestLine::new(ProductId::new("p1"), 0, Decimal::from(10), "p1").unwrap_err();
        assert_eq!(err, CartError::ZeroQuantity);
    }

    #[test]
    fn test_add_merges_by_product_id() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 2, Decimal::from(10)));
        cart.add(line("p1", 2, Decimal::from(10)));

        // One entry with quantity doubled, not two entries.
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 4);
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 1, Decimal::from(10)));
        cart.add(line("p2", 1, Decimal::from(5)));
        cart.add(line("p1", 1, Decimal::from(10)));

        let products: Vec<_> = cart.lines().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(products, vec!["p1", "p2"]);
    }

    #[test]
    fn test_remove_missing_product_is_noop() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 1, Decimal::from(10)));
        cart.remove(&ProductId::new("p2"));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 3, Decimal::from(10)));
        cart.set_quantity(&ProductId::new("p1"), 0);

        // The line disappears, it does not become a zero-quantity row.
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_replaces_value() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 3, Decimal::from(10)));
        cart.set_quantity(&ProductId::new("p1"), 7);
        assert_eq!(cart.lines()[0].quantity, 7);
    }

    #[test]
    fn test_total() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 2, Decimal::from(10)));
        cart.add(line("p2", 3, Decimal::from(5)));
        assert_eq!(cart.total(), Decimal::from(35));
    }

    #[test]
    fn test_total_empty_cart_is_zero() {
        assert_eq!(GuestCart::new().total(), Decimal::ZERO);
    }

    #[test]
    fn test_persisted_shape_uses_snake_case_keys() {
        let mut cart = GuestCart::new();
        cart.add(line("p1", 2, Decimal::new(19_99, 2)));

        let json = serde_json::to_value(&cart).unwrap();
        let entry = &json[0];
        assert_eq!(entry["product_id"], "p1");
        assert_eq!(entry["quantity"], 2);
        assert_eq!(entry["price_at_addition"], "19.99");
        assert_eq!(entry["product_name"], "p1");

        let back: GuestCart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
