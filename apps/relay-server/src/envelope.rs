//! JSON envelope wrapping every `/sync` response.
//!
//! ```json
//! { "success": true, "data": [...], "count": 2 }
//! { "success": true, "message": "Customers marked as synced", "affected": 3 }
//! { "success": false, "message": "Failed to fetch invoices", "error": "..." }
//! ```
//!
//! Absent fields are omitted, never sent as `null`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use relay_core::SyncStats;
use serde::Serialize;

/// Response envelope. `T` is the payload type of `data`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_dates_affected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    fn empty(success: bool) -> Self {
        Envelope {
            success,
            message: None,
            data: None,
            count: None,
            affected: None,
            due_dates_affected: None,
            stats: None,
            timestamp: None,
            error: None,
        }
    }
}

impl<T> Envelope<Vec<T>> {
    /// Successful list response; `count` is the list length.
    pub fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Envelope {
            data: Some(items),
            count: Some(count),
            ..Envelope::empty(true)
        }
    }
}

impl Envelope {
    /// Successful response carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Envelope {
            message: Some(message.into()),
            ..Envelope::empty(true)
        }
    }

    /// Successful response carrying statistics.
    pub fn stats(stats: SyncStats) -> Self {
        Envelope {
            stats: Some(stats),
            ..Envelope::empty(true)
        }
    }

    /// Failed response. `error` is only set when details may be exposed.
    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Envelope {
            message: Some(message.into()),
            error,
            ..Envelope::empty(false)
        }
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = Some(affected);
        self
    }

    pub fn with_due_dates_affected(mut self, affected: u64) -> Self {
        self.due_dates_affected = Some(affected);
        self
    }

    pub fn with_stats(mut self, stats: SyncStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_envelope() {
        let envelope = Envelope::list(vec!["C001", "C002"]);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "success": true, "data": ["C001", "C002"], "count": 2 })
        );
    }

    #[test]
    fn test_message_envelope_omits_absent_fields() {
        let envelope = Envelope::message("Customers marked as synced").with_affected(0);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "success": true, "message": "Customers marked as synced", "affected": 0 })
        );
    }

    #[test]
    fn test_failure_envelope() {
        let hidden = Envelope::failure("Failed to fetch customers", None);
        assert_eq!(
            serde_json::to_value(&hidden).unwrap(),
            json!({ "success": false, "message": "Failed to fetch customers" })
        );

        let exposed = Envelope::failure("Failed to fetch customers", Some("disk I/O".into()));
        assert_eq!(serde_json::to_value(&exposed).unwrap()["error"], "disk I/O");
    }

    #[test]
    fn test_stats_envelope_is_flat() {
        let stats = SyncStats {
            pending_amount_cents: 4200,
            ..SyncStats::default()
        };
        let json = serde_json::to_value(Envelope::stats(stats)).unwrap();
        assert_eq!(json["stats"]["total_customers"], 0);
        assert_eq!(json["stats"]["pending_amount"], "42.00");
    }
}
