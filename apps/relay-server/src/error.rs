//! Error types for the relay server.
//!
//! Every failure leaves the server as an [`Envelope`] with `success: false`.
//!
//! ```text
//! SyncError::Validation          → 400, message = validation text
//! request rejection (query/json) → 400, message = rejection text
//! everything else                → 500, message = endpoint context,
//!                                        error = raw text (only if exposed)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_sync::SyncError;
use tracing::error;

use crate::envelope::Envelope;

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid client input.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The sync service failed.
    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        source: SyncError,
        expose_details: bool,
    },
}

impl ApiError {
    /// Wraps a service error. `context` is the message sent to the client.
    pub fn from_sync(context: &'static str, source: SyncError, expose_details: bool) -> Self {
        if source.is_client_error() {
            return ApiError::BadRequest(source.to_string());
        }
        ApiError::Internal {
            context,
            source,
            expose_details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = match self {
            ApiError::BadRequest(message) => Envelope::failure(message, None),
            ApiError::Internal {
                context,
                source,
                expose_details,
            } => {
                error!(error = %source, refresh = source.is_refresh_error(), "{}", context);
                Envelope::failure(context, expose_details.then(|| source.to_string()))
            }
        };
        (status, axum::Json(envelope)).into_response()
    }
}
