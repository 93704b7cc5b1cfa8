//! # Relay Server
//!
//! HTTP surface of the ERP buffer relay.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Relay Server                                    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  routes.rs     │  │  envelope.rs   │  │  error.rs                  ││
//! │  │                │  │                │  │                            ││
//! │  │ • /sync/*      │  │ • Envelope<T>  │  │ • ApiError → 400 / 500     ││
//! │  │ • ApiQuery     │  │   success/data │  │ • details only if exposed  ││
//! │  │ • ApiJson      │  │   count/...    │  │                            ││
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────────┘│
//! │          │                                                              │
//! │          ▼                                                              │
//! │  AppState { SyncService, expose_error_details }                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config::RelayConfig`]):
//! - `RELAY_BIND_ADDR` - Listen address (default: 0.0.0.0)
//! - `RELAY_HTTP_PORT` - Listen port (default: 8080)
//! - `RELAY_DATABASE_PATH` - SQLite buffer database (default: ./relay.db)
//! - `RELAY_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `RELAY_INVOICE_LAYOUT` - `rows` or `normalized` (default: rows)
//! - `RELAY_REFRESH_SCRIPT` - Path of the SQL refresh script
//! - `RELAY_REFRESH_COMMAND` - Exporter command line
//! - `RELAY_REFRESH_TIMEOUT_SECS` - Refresh bound (default: 300)
//! - `RELAY_EXPOSE_ERROR_DETAILS` - Raw error text in envelopes (default: false)

pub mod config;
pub mod envelope;
pub mod error;
pub mod routes;

use relay_sync::{SyncError, SyncService};

// Re-exports
pub use config::{ConfigError, RefreshSource, RelayConfig};
pub use envelope::Envelope;
pub use error::ApiError;
pub use routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: SyncService,
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(service: SyncService, expose_error_details: bool) -> Self {
        AppState {
            service,
            expose_error_details,
        }
    }

    /// Maps a service error to an [`ApiError`] with `context` as the client message.
    pub fn fail(&self, context: &'static str) -> impl Fn(SyncError) -> ApiError {
        let expose = self.expose_error_details;
        move |e| ApiError::from_sync(context, e, expose)
    }
}
