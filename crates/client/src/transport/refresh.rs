//! Single-flight token refresh coordinator.
//!
//! At most one `POST /token/refresh` is in flight at any time. The first
//! caller to observe a 401 becomes the leader and performs the refresh;
//! callers that 401 while it runs park a oneshot waiter and suspend. When
//! the refresh settles, waiters are resolved in the order their 401 was
//! observed - each exactly once - with either the new access token or the
//! failure.
//!
//! The coordinator is owned by the transport (constructed with it, lives as
//! long as it) rather than being ambient module state, so it can be tested
//! in isolation through the client.

use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::ApiClient;
use crate::credentials::StoredCredentials;
use crate::error::ClientError;

/// Outcome delivered to parked waiters. The error side is a plain string
/// because the underlying failure is not cloneable; the leader keeps the
/// original error.
type RefreshOutcome = Result<SecretString, String>;

/// Wire shape of `POST /token/refresh`.
#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "newRefreshToken")]
    new_refresh_token: String,
}

struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState {
                refreshing: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one is
    /// already running.
    ///
    /// # Errors
    ///
    /// [`ClientError::RefreshFailed`] if the refresh token is missing or
    /// rejected. On every failure path the stored credentials have been
    /// purged and the host's auth-failure hook has fired.
    pub(crate) async fn fresh_access_token(
        &self,
        client: &ApiClient,
    ) -> Result<SecretString, ClientError> {
        let role = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Role::Waiter(rx)
            } else {
                state.refreshing = true;
                Role::Leader
            }
        };

        match role {
            Role::Waiter(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(message)) => Err(ClientError::RefreshFailed(message)),
                // Leader dropped without settling (e.g. task cancelled).
                Err(_) => Err(ClientError::RefreshFailed(
                    "refresh was abandoned".to_string(),
                )),
            },
            Role::Leader => {
                let outcome = self.run_refresh(client).await;
                self.settle(client, &outcome);
                outcome
            }
        }
    }

    /// Perform the actual refresh call. Runs on exactly one task at a time.
    async fn run_refresh(&self, client: &ApiClient) -> Result<SecretString, ClientError> {
        let Some(credentials) = client.credentials().load()? else {
            // Fatal: no refresh token to exchange, skip the network entirely.
            return Err(ClientError::RefreshFailed(
                "no refresh token stored".to_string(),
            ));
        };

        let url = format!("{}/token/refresh", client.base_url());
        let body = serde_json::json!({
            "refreshToken": credentials.refresh_token.expose_secret(),
        });

        // Deliberately bypasses ApiClient::request: the refresh call itself
        // must not carry the stale bearer token or re-enter the coordinator.
        let response = client
            .http()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::RefreshFailed(format!("refresh request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RefreshFailed(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|err| ClientError::RefreshFailed(format!("malformed refresh response: {err}")))?;

        let pair = StoredCredentials::new(refreshed.access_token, refreshed.new_refresh_token);
        client.credentials().store(&pair)?;

        Ok(pair.access_token)
    }

    /// Release the `refreshing` flag and fan the outcome out to every parked
    /// waiter, in arrival order. Runs on success *and* failure.
    fn settle(&self, client: &ApiClient, outcome: &Result<SecretString, ClientError>) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        match outcome {
            Ok(token) => {
                info!(waiters = waiters.len(), "token refresh succeeded");
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
            }
            Err(err) => {
                warn!(error = %err, waiters = waiters.len(), "token refresh failed");
                let message = err.to_string();
                for waiter in waiters {
                    let _ = waiter.send(Err(message.clone()));
                }
                client.handle_auth_failure();
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
