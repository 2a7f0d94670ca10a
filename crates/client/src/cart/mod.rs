//! Cart reconciliation across the anonymous/authenticated boundary.
//!
//! [`CartReconciler`] presents one logical cart to feature code. While the
//! shopper is anonymous, edits are pure list operations on the
//! device-persisted guest cart. After authentication, the server cart is the
//! sole source of truth and edits go through the transport. The transition
//! between the two is a one-time merge: every guest line is replayed to the
//! server, and the guest cart is cleared only once **all** additions are
//! acknowledged.
//!
//! The interior state sits behind one async mutex, so anonymous and
//! authenticated flows never interleave mid-operation.

pub mod store;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use threadline_core::{CartError, CartItemId, GuestCart, GuestLine, ProductId, UserId};

use crate::api::catalog::CatalogService;
use crate::api::{SimpleResponse, ensure_success};
use crate::error::ClientError;
use crate::transport::ApiClient;
use store::GuestCartStore;

/// A reference to a cart entry.
///
/// Guest lines are keyed by product; server lines carry a backend-assigned
/// cart item ID. Either form resolves in either state - a reference that
/// does not match anything is a no-op, not an error.
#[derive(Debug, Clone)]
pub enum CartRef {
    Product(ProductId),
    Line(CartItemId),
}

impl From<ProductId> for CartRef {
    fn from(id: ProductId) -> Self {
        Self::Product(id)
    }
}

impl From<CartItemId> for CartRef {
    fn from(id: CartItemId) -> Self {
        Self::Line(id)
    }
}

/// One line of the server cart, as returned by `GET /cart/getusercartitems`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerCartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_at_addition: Decimal,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl ServerCartItem {
    fn subtotal(&self) -> Decimal {
        self.price_at_addition * Decimal::from(self.quantity)
    }
}

/// Display snapshot of one cart entry, regardless of state.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub product_id: ProductId,
    /// Present only for server-held lines.
    pub cart_item_id: Option<CartItemId>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub product_name: Option<String>,
}

#[derive(Serialize)]
struct AddToCartRequest<'a> {
    #[serde(rename = "productId")]
    product_id: &'a ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateCartItemRequest<'a> {
    #[serde(rename = "cartItemId")]
    cart_item_id: &'a CartItemId,
    #[serde(rename = "newQuantity")]
    new_quantity: u32,
}

#[derive(Deserialize)]
struct CartItemsResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    cart: Option<Vec<ServerCartItem>>,
}

enum CartState {
    Anonymous { guest: GuestCart },
    Authenticated { user_id: UserId, server: Vec<ServerCartItem> },
}

/// One logical cart across the anonymous/authenticated boundary.
#[derive(Clone)]
pub struct CartReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    client: ApiClient,
    catalog: CatalogService,
    store: Arc<dyn GuestCartStore>,
    state: tokio::sync::Mutex<CartState>,
}

impl CartReconciler {
    /// Create a reconciler in the anonymous state, loading any persisted
    /// guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest cart store cannot be read.
    pub fn new(
        client: ApiClient,
        catalog: CatalogService,
        store: Arc<dyn GuestCartStore>,
    ) -> Result<Self, ClientError> {
        let guest = store.load()?;
        Ok(Self {
            inner: Arc::new(ReconcilerInner {
                client,
                catalog,
                store,
                state: tokio::sync::Mutex::new(CartState::Anonymous { guest }),
            }),
        })
    }

    /// Add `quantity` units of a product to the authoritative cart.
    ///
    /// Anonymous: the product is fetched for its current price and name,
    /// then merged into the guest cart by product ID. Authenticated: the
    /// server add endpoint is called and the cached view refreshed.
    ///
    /// # Errors
    ///
    /// Rejects `quantity == 0` with [`CartError::ZeroQuantity`]; otherwise
    /// propagates transport and storage failures.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ClientError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity.into());
        }

        let mut state = self.inner.state.lock().await;
        match &mut *state {
            CartState::Anonymous { guest } => {
                let product = self.inner.catalog.get_product(product_id).await?;
                guest.add(GuestLine::new(
                    product_id.clone(),
                    quantity,
                    product.price,
                    product.name,
                )?);
                self.inner.store.save(guest)?;
            }
            CartState::Authenticated { server, .. } => {
                let ack: SimpleResponse = self
                    .inner
                    .client
                    .post_json("/cart/addtocart", &AddToCartRequest { product_id, quantity })
                    .await?;
                ensure_success(&ack.message_type, ack.message.as_deref())?;
                // The server assigns the line ID and locks the price, so
                // re-fetch rather than guessing.
                *server = self.fetch_server_cart().await?;
            }
        }
        Ok(())
    }

    /// Remove a cart entry. Removing something that is not in the cart is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Propagates transport and storage failures.
    #[instrument(skip(self, item))]
    pub async fn remove_item(&self, item: impl Into<CartRef>) -> Result<(), ClientError> {
        let item = item.into();
        let mut state = self.inner.state.lock().await;
        match &mut *state {
            CartState::Anonymous { guest } => {
                if let CartRef::Product(product_id) = &item {
                    guest.remove(product_id);
                    self.inner.store.save(guest)?;
                }
                // Guest lines have no cart item ID; a Line ref cannot match.
            }
            CartState::Authenticated { server, .. } => {
                let Some(cart_item_id) = resolve_line(server, &item) else {
                    return Ok(());
                };
                let ack: SimpleResponse = self
                    .inner
                    .client
                    .delete_json(&format!("/cart/removefromcart/{cart_item_id}"))
                    .await?;
                ensure_success(&ack.message_type, ack.message.as_deref())?;
                server.retain(|line| line.id != cart_item_id);
            }
        }
        Ok(())
    }

    /// Replace the quantity of a cart entry. A new quantity of zero is
    /// equivalent to [`CartReconciler::remove_item`].
    ///
    /// # Errors
    ///
    /// Propagates transport and storage failures.
    #[instrument(skip(self, item))]
    pub async fn update_quantity(
        &self,
        item: impl Into<CartRef>,
        new_quantity: u32,
    ) -> Result<(), ClientError> {
        let item = item.into();
        if new_quantity == 0 {
            return self.remove_item(item).await;
        }

        let mut state = self.inner.state.lock().await;
        match &mut *state {
            CartState::Anonymous { guest } => {
                if let CartRef::Product(product_id) = &item {
                    guest.set_quantity(product_id, new_quantity);
                    self.inner.store.save(guest)?;
                }
            }
            CartState::Authenticated { server, .. } => {
                let Some(cart_item_id) = resolve_line(server, &item) else {
                    return Ok(());
                };
                let ack: SimpleResponse = self
                    .inner
                    .client
                    .put_json(
                        "/cart/updatecartitem",
                        &UpdateCartItemRequest {
                            cart_item_id: &cart_item_id,
                            new_quantity,
                        },
                    )
                    .await?;
                ensure_success(&ack.message_type, ack.message.as_deref())?;
                if let Some(line) = server.iter_mut().find(|line| line.id == cart_item_id) {
                    line.quantity = new_quantity;
                }
            }
        }
        Ok(())
    }

    /// One-time merge when the shopper authenticates.
    ///
    /// Replays every guest line through the server add endpoint. The guest
    /// cart is cleared only after **all** additions are acknowledged; on a
    /// partial failure it is preserved untouched so the whole sync can be
    /// retried (the backend deduplicates adds by product, so replaying an
    /// already-sent line does not double-count).
    ///
    /// # Errors
    ///
    /// Propagates the first failed addition; the reconciler stays anonymous
    /// so the caller can retry.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn transition_to_authenticated(&self, user_id: UserId) -> Result<(), ClientError> {
        let mut state = self.inner.state.lock().await;

        if let CartState::Anonymous { guest } = &*state {
            for line in guest.lines() {
                let ack: SimpleResponse = self
                    .inner
                    .client
                    .post_json(
                        "/cart/addtocart",
                        &AddToCartRequest {
                            product_id: &line.product_id,
                            quantity: line.quantity,
                        },
                    )
                    .await?;
                ensure_success(&ack.message_type, ack.message.as_deref())?;
            }
            if !guest.is_empty() {
                info!(lines = guest.len(), "guest cart flushed to server");
            }
            // All lines acknowledged; the device copy is no longer
            // authoritative.
            self.inner.store.clear()?;
        }

        let server = self.fetch_server_cart().await?;
        *state = CartState::Authenticated { user_id, server };
        Ok(())
    }

    /// Drop the server view and reload the guest cart. Logout path.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest cart store cannot be read.
    pub async fn reset_to_anonymous(&self) -> Result<(), ClientError> {
        let guest = self.inner.store.load()?;
        let mut state = self.inner.state.lock().await;
        *state = CartState::Anonymous { guest };
        Ok(())
    }

    /// Re-fetch the server cart, replacing the cached view. No-op while
    /// anonymous.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn refresh_server_cart(&self) -> Result<(), ClientError> {
        let mut state = self.inner.state.lock().await;
        if let CartState::Authenticated { server, .. } = &mut *state {
            *server = self.fetch_server_cart().await?;
        }
        Ok(())
    }

    /// Snapshot of the authoritative cart for display.
    pub async fn items(&self) -> Vec<CartItemView> {
        let state = self.inner.state.lock().await;
        match &*state {
            CartState::Anonymous { guest } => guest
                .lines()
                .iter()
                .map(|line| CartItemView {
                    product_id: line.product_id.clone(),
                    cart_item_id: None,
                    quantity: line.quantity,
                    unit_price: line.price_at_addition,
                    product_name: Some(line.product_name.clone()),
                })
                .collect(),
            CartState::Authenticated { server, .. } => server
                .iter()
                .map(|line| CartItemView {
                    product_id: line.product_id.clone(),
                    cart_item_id: Some(line.id.clone()),
                    quantity: line.quantity,
                    unit_price: line.price_at_addition,
                    product_name: line.product_name.clone(),
                })
                .collect(),
        }
    }

    /// Sum of `price * quantity` over the authoritative cart. Zero when
    /// empty. Display value only; checkout re-fetches prices.
    pub async fn total(&self) -> Decimal {
        let state = self.inner.state.lock().await;
        match &*state {
            CartState::Anonymous { guest } => guest.total(),
            CartState::Authenticated { server, .. } => {
                server.iter().map(ServerCartItem::subtotal).sum()
            }
        }
    }

    /// Whether the shopper currently has a server-backed cart.
    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.inner.state.lock().await, CartState::Authenticated { .. })
    }

    async fn fetch_server_cart(&self) -> Result<Vec<ServerCartItem>, ClientError> {
        let response: CartItemsResponse =
            self.inner.client.get_json("/cart/getusercartitems").await?;
        ensure_success(&response.message_type, response.message.as_deref())?;
        Ok(response.cart.unwrap_or_default())
    }
}

/// Resolve a [`CartRef`] against the server view. `None` means the entry is
/// simply not in the cart.
fn resolve_line(server: &[ServerCartItem], item: &CartRef) -> Option<CartItemId> {
    match item {
        CartRef::Line(cart_item_id) => server
            .iter()
            .find(|line| &line.id == cart_item_id)
            .map(|line| line.id.clone()),
        CartRef::Product(product_id) => server
            .iter()
            .find(|line| &line.product_id == product_id)
            .map(|line| line.id.clone()),
    }
}
