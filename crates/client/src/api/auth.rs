//! Authentication endpoints: login, signup, profile fetch.
//!
//! A successful login or signup returns a token pair which is persisted
//! into the client's credential store before the session is handed back, so
//! subsequent requests through the transport are authenticated immediately.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use threadline_core::UserId;

use super::ensure_success;
use crate::credentials::StoredCredentials;
use crate::error::ClientError;
use crate::transport::ApiClient;

/// Login credentials.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Signup details. `user_type` distinguishes shoppers from designers.
#[derive(Debug, Serialize)]
pub struct SignupDetails {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "userType")]
    pub user_type: String,
}

/// A user profile as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub user_type: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// An authenticated session: the token subject plus the profile the backend
/// included in the auth response, if any.
#[derive(Debug)]
pub struct AuthSession {
    pub user_id: UserId,
    pub user_type: String,
    pub user: Option<User>,
}

/// Subject claims decoded from an access token.
#[derive(Debug, Deserialize)]
pub struct TokenSubject {
    #[serde(rename = "_id")]
    pub user_id: UserId,
    #[serde(rename = "userType")]
    pub user_type: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Deserialize)]
struct UserResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// Authentication service over the shared transport.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    /// Create the service.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `POST /auth/login`. Persists the returned token pair on success.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success envelope, or a
    /// response missing the token pair.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ClientError> {
        let response: AuthResponse = self.client.post_json("/auth/login", credentials).await?;
        self.complete_auth(response)
    }

    /// `POST /auth/signup`. Same envelope as login.
    ///
    /// # Errors
    ///
    /// See [`AuthService::login`].
    #[instrument(skip(self, details), fields(email = %details.email))]
    pub async fn signup(&self, details: &SignupDetails) -> Result<AuthSession, ClientError> {
        let response: AuthResponse = self.client.post_json("/auth/signup", details).await?;
        self.complete_auth(response)
    }

    /// `GET /user/getuser/:id`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success envelope.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn fetch_user(&self, user_id: &UserId) -> Result<User, ClientError> {
        let response: UserResponse = self
            .client
            .get_json(&format!("/user/getuser/{user_id}"))
            .await?;
        ensure_success(&response.message_type, response.message.as_deref())?;
        response
            .user
            .ok_or_else(|| ClientError::Api("user response missing profile".to_string()))
    }

    /// Forget the stored token pair. Purely local; the backend keeps no
    /// session state beyond the tokens themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be written.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.client.credentials().clear()?;
        Ok(())
    }

    fn complete_auth(&self, response: AuthResponse) -> Result<AuthSession, ClientError> {
        ensure_success(&response.message_type, response.message.as_deref())?;

        let (Some(access_token), Some(refresh_token)) =
            (response.access_token, response.refresh_token)
        else {
            return Err(ClientError::Api(
                "auth response missing token pair".to_string(),
            ));
        };

        let subject = decode_subject(&access_token)?;
        self.client
            .credentials()
            .store(&StoredCredentials::new(access_token, refresh_token))?;

        Ok(AuthSession {
            user_id: subject.user_id,
            user_type: subject.user_type,
            user: response.user,
        })
    }
}

/// Decode the subject claims from a JWT access token.
///
/// No signature verification: the backend is the verifier, the client only
/// needs the subject to key profile fetches.
///
/// # Errors
///
/// Returns [`ClientError::MalformedToken`] if the token is not a decodable
/// three-part JWT.
pub fn decode_subject(token: &str) -> Result<TokenSubject, ClientError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClientError::MalformedToken("not a three-part JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| ClientError::MalformedToken(format!("payload is not base64url: {err}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|err| ClientError::MalformedToken(format!("payload is not subject claims: {err}")))
}
