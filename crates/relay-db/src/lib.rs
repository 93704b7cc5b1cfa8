//! # relay-db: Buffer Store for the ERP Buffer Relay
//!
//! This crate provides access to the SQLite buffer tables the ERP refresh
//! populates and the relay drains.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Relay Data Flow                                  │
//! │                                                                         │
//! │  SyncService (relay-sync)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     relay-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CustomerRepo  │    │ 0001 rows    │  │   │
//! │  │   │ SqlitePool    │◄───│ InvoiceRow..  │    │ 0002 normal. │  │   │
//! │  │   │ BufferStore   │    │ Normalized..  │    │              │  │   │
//! │  │   │ (store.rs)    │    │ StatsRepo     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   buffer_customers  buffer_invoices                             │   │
//! │  │   buffer_invoice_headers  buffer_due_dates                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations per buffer table
//! - [`store`] - The `BufferStore` trait the sync service depends on
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_db::{BufferStore, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./relay.db")).await?;
//!
//! let invoices = db.pending_invoices(100).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::BufferStore;

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::invoice_normalized::NormalizedInvoiceRepository;
pub use repository::invoice_rows::InvoiceRowRepository;
pub use repository::stats::StatsRepository;
