//! Typed wrappers over the Threadline REST endpoints.
//!
//! The backend wraps every JSON body in an envelope carrying `messageType`
//! (`"success"` on the happy path) and an optional human-readable `message`.
//! Request bodies use the camelCase keys the backend expects; the wrappers
//! here own those renames so feature code never sees wire naming.

pub mod auth;
pub mod catalog;

use serde::Deserialize;

use crate::error::ClientError;

/// The `messageType` value every successful envelope carries.
pub(crate) const MESSAGE_TYPE_SUCCESS: &str = "success";

/// Minimal acknowledgment envelope for mutations.
#[derive(Debug, Deserialize)]
pub struct SimpleResponse {
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reject non-success envelopes with the backend's message when present.
pub(crate) fn ensure_success(
    message_type: &str,
    message: Option<&str>,
) -> Result<(), ClientError> {
    if message_type == MESSAGE_TYPE_SUCCESS {
        return Ok(());
    }
    Err(ClientError::Api(
        message
            .map_or_else(|| format!("unexpected messageType {message_type:?}"), String::from),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success_passes_success() {
        assert!(ensure_success("success", None).is_ok());
    }

    #[test]
    fn test_ensure_success_prefers_backend_message() {
        let err = ensure_success("error", Some("email already registered")).unwrap_err();
        assert_eq!(err.to_string(), "API error: email already registered");
    }

    #[test]
    fn test_ensure_success_falls_back_to_message_type() {
        let err = ensure_success("failure", None).unwrap_err();
        assert_eq!(err.to_string(), "API error: unexpected messageType \"failure\"");
    }
}
