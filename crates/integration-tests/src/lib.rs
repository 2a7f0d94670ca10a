//! Integration tests for the Threadline client.
//!
//! Every test here drives the real [`ApiClient`] against an `httpmock`
//! server, so the full transport path runs: request construction, bearer
//! attachment, 401 recovery, and cart reconciliation. No live backend is
//! required.
//!
//! Run with: `cargo test -p threadline-integration-tests`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use threadline_client::{
    ApiClient, ClientConfig, MemoryCredentialStore, StoredCredentials,
};

/// Install a test-friendly tracing subscriber. Safe to call from every test;
/// only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build an unsigned JWT carrying the claims the client decodes from the
/// payload segment. The signature is junk; the client never verifies it.
#[must_use]
pub fn fake_jwt(user_id: &str, user_type: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "_id": user_id, "userType": user_type }).to_string(),
    );
    format!("{header}.{payload}.signature")
}

/// A client pointed at `base_url` with a seeded token pair.
///
/// # Panics
///
/// Panics if the HTTP client cannot be constructed.
#[must_use]
pub fn client_with_tokens(
    base_url: &str,
    access: &str,
    refresh: &str,
) -> (ApiClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_credentials(
        StoredCredentials::new(access, refresh),
    ));
    let client = ApiClient::new(&ClientConfig::new(base_url), store.clone())
        .expect("failed to build API client");
    (client, store)
}

/// A client pointed at `base_url` with no stored credentials.
///
/// # Panics
///
/// Panics if the HTTP client cannot be constructed.
#[must_use]
pub fn anonymous_client(base_url: &str) -> (ApiClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let client = ApiClient::new(&ClientConfig::new(base_url), store.clone())
        .expect("failed to build API client");
    (client, store)
}
