//! Cart reconciliation: guest edits, the login-time merge, and server-backed
//! edits afterwards.

use std::sync::Arc;

use httpmock::Method::{DELETE, GET, POST, PUT};
use httpmock::MockServer;
use rust_decimal::Decimal;
use serde_json::json;
use threadline_client::api::catalog::CatalogService;
use threadline_client::cart::store::{GuestCartStore, MemoryGuestCartStore};
use threadline_client::{ApiClient, CartReconciler};
use threadline_core::{CartError, CartItemId, GuestCart, GuestLine, ProductId, UserId};
use threadline_integration_tests::{client_with_tokens, init_tracing};

fn guest_cart(lines: &[(&str, u32, i64, &str)]) -> GuestCart {
    let mut cart = GuestCart::default();
    for (product, quantity, price, name) in lines {
        cart.add(
            GuestLine::new(
                ProductId::new(*product),
                *quantity,
                Decimal::from(*price),
                *name,
            )
            .expect("test line quantity must be positive"),
        );
    }
    cart
}

fn reconciler_with(
    client: &ApiClient,
    guest: GuestCart,
) -> (CartReconciler, Arc<MemoryGuestCartStore>) {
    let store = Arc::new(MemoryGuestCartStore::with_cart(guest));
    let cart = CartReconciler::new(
        client.clone(),
        CatalogService::new(client.clone()),
        store.clone(),
    )
    .expect("guest cart store should load");
    (cart, store)
}

#[tokio::test]
async fn anonymous_edits_stay_on_device() {
    init_tracing();
    let server = MockServer::start_async().await;

    // The only network traffic while anonymous is the product lookup.
    let product = server
        .mock_async(|when, then| {
            when.method(GET).path("/product/getproduct/p-1");
            then.status(200).json_body(json!({
                "messageType": "success",
                "data": {
                    "id": "p-1",
                    "name": "Linen shirt",
                    "price": "40.00",
                    "images": [],
                    "categories": ["shirts"],
                },
            }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, store) = reconciler_with(&client, GuestCart::default());

    cart.add_item(&ProductId::new("p-1"), 2)
        .await
        .expect("guest add should succeed");

    let items = cart.items().await;
    assert_eq!(items.len(), 1);
    assert!(items[0].cart_item_id.is_none());
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price, Decimal::from(40));
    assert_eq!(cart.total().await, Decimal::from(80));

    // Edits are persisted to the device store as they happen.
    assert_eq!(store.load().expect("store readable").len(), 1);

    cart.update_quantity(ProductId::new("p-1"), 5)
        .await
        .expect("guest update should succeed");
    assert_eq!(cart.total().await, Decimal::from(200));

    // Quantity zero removes the line.
    cart.update_quantity(ProductId::new("p-1"), 0)
        .await
        .expect("guest removal should succeed");
    assert!(cart.items().await.is_empty());
    assert!(store.load().expect("store readable").is_empty());

    assert_eq!(product.hits_async().await, 1);
    assert!(!cart.is_authenticated().await);
}

#[tokio::test]
async fn zero_quantity_add_is_rejected_locally() {
    init_tracing();
    let server = MockServer::start_async().await;
    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, _store) = reconciler_with(&client, GuestCart::default());

    let err = cart
        .add_item(&ProductId::new("p-1"), 0)
        .await
        .expect_err("zero quantity must be rejected");
    assert!(
        matches!(err, threadline_client::ClientError::Cart(CartError::ZeroQuantity)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn login_flushes_the_guest_cart_then_clears_it() {
    init_tracing();
    let server = MockServer::start_async().await;

    let add_shirt = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cart/addtocart")
                .json_body(json!({ "productId": "p-1", "quantity": 2 }));
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let add_tote = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cart/addtocart")
                .json_body(json!({ "productId": "p-2", "quantity": 1 }));
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [
                    {
                        "id": "ci-1",
                        "product_id": "p-1",
                        "quantity": 2,
                        "price_at_addition": "40.00",
                        "product_name": "Linen shirt",
                    },
                    {
                        "id": "ci-2",
                        "product_id": "p-2",
                        "quantity": 1,
                        "price_at_addition": "25.00",
                        "product_name": "Canvas tote",
                    },
                ],
            }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, store) = reconciler_with(
        &client,
        guest_cart(&[("p-1", 2, 40, "Linen shirt"), ("p-2", 1, 25, "Canvas tote")]),
    );

    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect("sync should succeed");

    assert_eq!(add_shirt.hits_async().await, 1);
    assert_eq!(add_tote.hits_async().await, 1);
    assert_eq!(fetch.hits_async().await, 1);

    // Device copy cleared only after every add was acknowledged.
    assert!(store.load().expect("store readable").is_empty());
    assert!(cart.is_authenticated().await);

    let items = cart.items().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].cart_item_id, Some(CartItemId::new("ci-1")));
    assert_eq!(cart.total().await, Decimal::from(105));
}

#[tokio::test]
async fn partial_sync_failure_preserves_the_guest_cart() {
    init_tracing();
    let server = MockServer::start_async().await;

    let add_shirt = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cart/addtocart")
                .json_body(json!({ "productId": "p-1", "quantity": 2 }));
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let add_tote = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cart/addtocart")
                .json_body(json!({ "productId": "p-2", "quantity": 1 }));
            then.status(500).body("database unavailable");
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [],
            }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, store) = reconciler_with(
        &client,
        guest_cart(&[("p-1", 2, 40, "Linen shirt"), ("p-2", 1, 25, "Canvas tote")]),
    );

    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect_err("second add failed, sync must fail");

    // Nothing was cleared; the shopper keeps the whole cart for a retry.
    assert_eq!(store.load().expect("store readable").len(), 2);
    assert!(!cart.is_authenticated().await);
    assert_eq!(cart.items().await.len(), 2);
    assert_eq!(fetch.hits_async().await, 0);

    // Retry once the backend recovers. The first line is replayed too; the
    // backend deduplicates adds by product, so this is safe.
    add_tote.delete_async().await;
    let add_tote_retry = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cart/addtocart")
                .json_body(json!({ "productId": "p-2", "quantity": 1 }));
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;

    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect("retry should succeed");

    assert_eq!(add_shirt.hits_async().await, 2);
    assert_eq!(add_tote_retry.hits_async().await, 1);
    assert!(store.load().expect("store readable").is_empty());
    assert!(cart.is_authenticated().await);
}

#[tokio::test]
async fn an_empty_guest_cart_transitions_without_any_adds() {
    init_tracing();
    let server = MockServer::start_async().await;

    let add = server
        .mock_async(|when, then| {
            when.method(POST).path("/cart/addtocart");
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [],
            }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, _store) = reconciler_with(&client, GuestCart::default());

    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect("empty sync should succeed");

    assert_eq!(add.hits_async().await, 0);
    assert_eq!(fetch.hits_async().await, 1);
    assert!(cart.is_authenticated().await);
    assert_eq!(cart.total().await, Decimal::ZERO);
}

#[tokio::test]
async fn authenticated_edits_go_through_the_server() {
    init_tracing();
    let server = MockServer::start_async().await;

    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [
                    {
                        "id": "ci-1",
                        "product_id": "p-1",
                        "quantity": 2,
                        "price_at_addition": "40.00",
                        "product_name": "Linen shirt",
                    },
                ],
            }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/cart/updatecartitem")
                .json_body(json!({ "cartItemId": "ci-1", "newQuantity": 3 }));
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let remove = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/cart/removefromcart/ci-1");
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, _store) = reconciler_with(&client, GuestCart::default());
    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect("transition should succeed");

    // Quantity edits are pushed and mirrored locally without a re-fetch.
    cart.update_quantity(CartItemId::new("ci-1"), 3)
        .await
        .expect("server update should succeed");
    assert_eq!(update.hits_async().await, 1);
    assert_eq!(cart.total().await, Decimal::from(120));

    // A product reference resolves to the server line before the delete.
    cart.remove_item(ProductId::new("p-1"))
        .await
        .expect("server removal should succeed");
    assert_eq!(remove.hits_async().await, 1);
    assert!(cart.items().await.is_empty());

    // Removing it again is a no-op, not another DELETE.
    cart.remove_item(CartItemId::new("ci-1"))
        .await
        .expect("repeat removal is a no-op");
    assert_eq!(remove.hits_async().await, 1);

    assert_eq!(fetch.hits_async().await, 1);
}

#[tokio::test]
async fn setting_quantity_to_zero_deletes_the_server_line() {
    init_tracing();
    let server = MockServer::start_async().await;

    let _fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [
                    {
                        "id": "ci-9",
                        "product_id": "p-9",
                        "quantity": 1,
                        "price_at_addition": "15.00",
                    },
                ],
            }));
        })
        .await;
    let remove = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/cart/removefromcart/ci-9");
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT).path("/cart/updatecartitem");
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, _store) = reconciler_with(&client, GuestCart::default());
    cart.transition_to_authenticated(UserId::new("u-9"))
        .await
        .expect("transition should succeed");

    cart.update_quantity(CartItemId::new("ci-9"), 0)
        .await
        .expect("zero quantity should remove");

    assert_eq!(remove.hits_async().await, 1);
    assert_eq!(update.hits_async().await, 0);
    assert!(cart.items().await.is_empty());
}

#[tokio::test]
async fn logout_returns_to_the_device_cart() {
    init_tracing();
    let server = MockServer::start_async().await;

    let _fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/getusercartitems");
            then.status(200).json_body(json!({
                "messageType": "success",
                "cart": [
                    {
                        "id": "ci-1",
                        "product_id": "p-1",
                        "quantity": 4,
                        "price_at_addition": "10.00",
                    },
                ],
            }));
        })
        .await;
    let _add = server
        .mock_async(|when, then| {
            when.method(POST).path("/cart/addtocart");
            then.status(200).json_body(json!({ "messageType": "success" }));
        })
        .await;

    let (client, _creds) = client_with_tokens(&server.base_url(), "access-1", "refresh-1");
    let (cart, _store) = reconciler_with(&client, guest_cart(&[("p-1", 1, 10, "Socks")]));

    cart.transition_to_authenticated(UserId::new("u-1"))
        .await
        .expect("transition should succeed");
    assert_eq!(cart.total().await, Decimal::from(40));

    // The merge cleared the device copy, so logout lands on an empty cart.
    cart.reset_to_anonymous().await.expect("reset should succeed");
    assert!(!cart.is_authenticated().await);
    assert!(cart.items().await.is_empty());
}
