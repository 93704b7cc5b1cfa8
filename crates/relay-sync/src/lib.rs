//! # relay-sync: Sync State Machine for the ERP Buffer Relay
//!
//! Export reads, acknowledgements and the refresh-from-ERP trigger, on top
//! of any [`relay_db::BufferStore`].
//!
//! ## Module Organization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          relay-sync                                     │
//! │                                                                         │
//! │  ┌────────────────────────┐     ┌──────────────────────────────────┐   │
//! │  │ service.rs             │     │ refresh.rs                       │   │
//! │  │                        │     │                                  │   │
//! │  │ SyncService            │────►│ trait BufferRefresher            │   │
//! │  │ RefreshReport          │     │ SqlScriptRefresher               │   │
//! │  └───────────┬────────────┘     │ CommandRefresher                 │   │
//! │              │                  │ UnconfiguredRefresher            │   │
//! │              ▼                  └──────────────────────────────────┘   │
//! │  Arc<dyn BufferStore> (relay-db)                                        │
//! │                                                                         │
//! │  error.rs: SyncError (Validation / StoreUnavailable / Upstream...)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_sync::{SyncService, UnconfiguredRefresher};
//!
//! let service = SyncService::new(Arc::new(db), Arc::new(UnconfiguredRefresher));
//! let invoices = service.pending_invoices(Some(100)).await?;
//! ```

pub mod error;
pub mod refresh;
pub mod service;

pub use error::{SyncError, SyncResult};
pub use refresh::{BufferRefresher, CommandRefresher, SqlScriptRefresher, UnconfiguredRefresher};
pub use service::{RefreshReport, SyncService, DEFAULT_REFRESH_TIMEOUT};
