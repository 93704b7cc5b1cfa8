//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │     Store       │  │     Refresh             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  empty id list  │  │  DbError        │  │  UpstreamRefreshFailure │ │
//! │  │  bad limit      │  │  (any)          │  │  RefreshTimedOut        │ │
//! │  │       → 400     │  │       → 500     │  │       → 500             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use relay_core::ValidationError;
use relay_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible failures of the sync service.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Request rejected before reaching the store.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The buffer store could not serve the request.
    #[error("Buffer store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),

    /// The ERP refresh failed. Statistics were not computed.
    #[error("Refresh from ERP failed: {0}")]
    UpstreamRefreshFailure(String),

    /// The ERP refresh did not finish in time.
    #[error("Refresh from ERP timed out after {0} seconds")]
    RefreshTimedOut(u64),
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the caller sent invalid input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// Returns true if this error came from the refresh step.
    pub fn is_refresh_error(&self) -> bool {
        matches!(
            self,
            SyncError::UpstreamRefreshFailure(_) | SyncError::RefreshTimedOut(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let validation: SyncError = ValidationError::Required {
            field: "customer_ids".to_string(),
        }
        .into();
        assert!(validation.is_client_error());
        assert!(!validation.is_refresh_error());

        let store: SyncError = DbError::PoolExhausted.into();
        assert!(!store.is_client_error());

        assert!(SyncError::RefreshTimedOut(300).is_refresh_error());
        assert_eq!(
            SyncError::RefreshTimedOut(300).to_string(),
            "Refresh from ERP timed out after 300 seconds"
        );
    }
}
