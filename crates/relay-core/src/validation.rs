//! # Validation Module
//!
//! Input validation for the export cursor and the sync state tracker.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractors (relay-server)                               │
//! │  ├── Query string / JSON body deserialization                          │
//! │  └── Malformed input → 400 envelope                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Id lists: non-empty, bounded, no blank ids                        │
//! │  └── Page limits: positive, capped at MAX_PAGE_LIMIT                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK (synced IN (0, 1)), NOT NULL, foreign keys                  │
//! │                                                                         │
//! │  A request rejected at layer 1 or 2 never reaches the store.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_MARK_BATCH, MAX_PAGE_LIMIT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Id Lists
// =============================================================================

/// Validates the identifier list of a mark-synced call.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_MARK_BATCH`] entries
/// - No blank identifiers
///
/// Duplicates are allowed; the UPDATE simply matches the row once.
///
/// ## Example
/// ```rust
/// use relay_core::validation::validate_id_list;
///
/// assert!(validate_id_list("customer_ids", &["C001".to_string()]).is_ok());
/// assert!(validate_id_list("customer_ids", &[]).is_err());
/// ```
pub fn validate_id_list(field: &str, ids: &[String]) -> ValidationResult<()> {
    if ids.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if ids.len() > MAX_MARK_BATCH {
        return Err(ValidationError::TooMany {
            field: field.to_string(),
            max: MAX_MARK_BATCH,
            actual: ids.len(),
        });
    }

    if let Some(position) = ids.iter().position(|id| id.trim().is_empty()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("entry {} is blank", position),
        });
    }

    Ok(())
}

// =============================================================================
// Page Limits
// =============================================================================

/// Resolves the page size of an export read.
///
/// ## Rules
/// - `None` → `default`
/// - `< 1` → error (an unbounded or empty page is never requested)
/// - `> MAX_PAGE_LIMIT` → capped
///
/// ## Example
/// ```rust
/// use relay_core::validation::resolve_limit;
///
/// assert_eq!(resolve_limit(Some(10), 50).unwrap(), 10);
/// assert_eq!(resolve_limit(None, 100).unwrap(), 100);
/// assert!(resolve_limit(Some(0), 50).is_err());
/// ```
pub fn resolve_limit(requested: Option<i64>, default: u32) -> ValidationResult<u32> {
    let Some(limit) = requested else {
        return Ok(default.min(MAX_PAGE_LIMIT));
    };

    if limit < 1 {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_LIMIT as i64,
        });
    }

    Ok(limit.min(MAX_PAGE_LIMIT as i64) as u32)
}

// =============================================================================
// Unit Tests
// =============================================================================
