//! # relay-core: Pure Domain Logic for the ERP Buffer Relay
//!
//! This crate holds the record types, sync states and the invoice
//! aggregation rules, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ERP Buffer Relay Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Downstream Consumer                          │   │
//! │  │    GET /sync/invoices ──► import ──► POST mark-synced           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP (relay-server)                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    relay-sync (SyncService)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ relay-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ aggregate │  │ validation│  │   │
//! │  │   │ Customer  │  │   Money   │  │ group due │  │  id lists │  │   │
//! │  │   │ SyncState │  │   sums    │  │   dates   │  │  limits   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    relay-db (Buffer Store)                      │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records, sync states, transfer units, statistics
//! - [`money`] - Integer money (minor units, no floating point)
//! - [`aggregate`] - Grouping of due-dates into invoice transfer units
//! - [`error`] - Domain error types
//! - [`validation`] - Id list and page limit validation
//!
//! ## Example Usage
//!
//! ```rust
//! use relay_core::validation::resolve_limit;
//! use relay_core::DEFAULT_CUSTOMER_LIMIT;
//!
//! // No limit supplied: fall back to the default page size
//! assert_eq!(resolve_limit(None, DEFAULT_CUSTOMER_LIMIT).unwrap(), 50);
//!
//! // Oversized requests are capped, never unbounded
//! assert_eq!(resolve_limit(Some(1_000_000), DEFAULT_CUSTOMER_LIMIT).unwrap(), 500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default page size for `GET /sync/customers`.
pub const DEFAULT_CUSTOMER_LIMIT: u32 = 50;

/// Default page size for `GET /sync/invoices` (counted in invoice groups).
pub const DEFAULT_INVOICE_LIMIT: u32 = 100;

/// Upper bound for any page. Larger requests are capped to this value.
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Maximum identifiers accepted by a single mark-synced call.
///
/// The whole list is bound into one UPDATE statement, so it must stay well
/// below SQLite's host parameter limit.
pub const MAX_MARK_BATCH: usize = 1000;

/// Value of the `kind` field on every invoice transfer unit.
pub const INVOICE_UNIT_KIND: &str = "invoice";
