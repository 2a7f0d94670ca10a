//! Authenticated HTTP transport.
//!
//! [`ApiClient`] wraps one shared `reqwest::Client` and is the single entry
//! point for every backend call: it attaches the bearer access token read
//! from the [`CredentialStore`], tags each request with an `x-request-id`,
//! and transparently recovers from access-token expiry. Feature modules must
//! never call the API around it, or the single-flight refresh guarantee is
//! void.
//!
//! # 401 recovery
//!
//! A request that receives a 401 is retried at most once, with a token
//! obtained through the [`refresh`] coordinator. Concurrent 401s share one
//! refresh: the first caller performs it, the rest suspend on the queue and
//! replay in the order their 401 was observed. A second 401 on the retried
//! request fails with [`ClientError::Unauthorized`] - no loops.

pub(crate) mod refresh;

use std::sync::{Arc, OnceLock};

use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ClientError;
use refresh::RefreshCoordinator;

/// The HTTP header carrying the per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Callback invoked after a fatal authentication failure (tokens purged).
///
/// Navigation is the host application's concern; the transport only reports
/// that re-authentication is required.
type AuthFailureHook = Box<dyn Fn() + Send + Sync>;

/// Shared, cloneable API client.
///
/// Cloning is cheap; all clones share the HTTP connection pool, credential
/// store, and refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
    on_auth_failure: OnceLock<AuthFailureHook>,
}

impl ApiClient {
    /// Build a client from configuration and a credential store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.clone(),
                credentials,
                refresh: RefreshCoordinator::new(),
                on_auth_failure: OnceLock::new(),
            }),
        })
    }

    /// Register the host-supplied fatal-auth-failure callback.
    ///
    /// Only the first registration takes effect.
    pub fn on_auth_failure(&self, hook: impl Fn() + Send + Sync + 'static) {
        let _ = self.inner.on_auth_failure.set(Box::new(hook));
    }

    /// The credential store this client reads tokens from.
    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.inner.credentials.as_ref()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Issue a request with credentials attached, recovering from a single
    /// 401 via the shared refresh coordinator.
    ///
    /// If no access token is stored, the request proceeds unauthenticated;
    /// some endpoints are public.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Http`] for transport failures and timeouts (no retry)
    /// - [`ClientError::Status`] for non-401 error statuses (no retry)
    /// - [`ClientError::Unauthorized`] if the retried request 401s again
    /// - [`ClientError::RefreshFailed`] if the token refresh fails
    #[instrument(skip(self, body), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let token = self.inner.credentials.load()?.map(|c| c.access_token);

        let response = self.send(&method, &url, body.as_ref(), token.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_response(response, path).await;
        }

        // First 401 for this logical request: refresh once and replay.
        debug!("401 received, entering refresh path");
        let fresh = self.inner.refresh.fresh_access_token(self).await?;
        let retried = self.send(&method, &url, body.as_ref(), Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(format!(
                "still unauthorized after token refresh: {path}"
            )));
        }
        check_response(retried, path).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&SecretString>,
    ) -> Result<Response, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let mut builder = self
            .inner
            .http
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(%request_id, status = %response.status(), "response received");
        Ok(response)
    }

    /// GET a path.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.request(Method::GET, path, None).await
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE a path.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str) -> Result<Response, ClientError> {
        self.request(Method::DELETE, path, None).await
    }

    /// GET a path and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; additionally fails if the body does not
    /// deserialize into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Ok(self.get(path).await?.json().await?)
    }

    /// POST a JSON body and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::post`].
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Ok(self.post(path, body).await?.json().await?)
    }

    /// PUT a JSON body and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::put`].
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Ok(self.put(path, body).await?.json().await?)
    }

    /// DELETE a path and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::delete`].
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Ok(self.delete(path).await?.json().await?)
    }

    /// Purge stored credentials and notify the host. Called after any
    /// refresh-path failure; safe to call repeatedly.
    pub(crate) fn handle_auth_failure(&self) {
        if let Err(err) = self.inner.credentials.clear() {
            warn!(error = %err, "failed to clear stored credentials");
        }
        if let Some(hook) = self.inner.on_auth_failure.get() {
            hook();
        }
    }
}

/// Map non-success statuses to a clear error, truncating noisy bodies.
async fn check_response(response: Response, path: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        path: path.to_string(),
        body: body.chars().take(200).collect(),
    })
}
