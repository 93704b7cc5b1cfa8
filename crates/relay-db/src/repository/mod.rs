//! # Repository Module
//!
//! Buffer table repositories.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  SyncService (relay-sync)                                              │
//! │       │                                                                 │
//! │       │  store.pending_invoices(100)                                   │
//! │       ▼                                                                 │
//! │  Database: BufferStore ── dispatches on the configured layout           │
//! │       │                                                                 │
//! │       ├── CustomerRepository           buffer_customers                │
//! │       ├── InvoiceRowRepository         buffer_invoices                 │
//! │       ├── NormalizedInvoiceRepository  buffer_invoice_headers          │
//! │       │                                buffer_due_dates                │
//! │       └── StatsRepository              counts over all of the above    │
//! │       │                                                                 │
//! │       │  Parameterized SQL                                             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every UPDATE touching sync state carries the pending predicate, so an
//! acknowledgement never rewrites the `sync_date` of an already synced row.

use sqlx::{QueryBuilder, Sqlite};

pub mod customer;
pub mod invoice_normalized;
pub mod invoice_rows;
pub mod stats;

/// SQL predicate selecting rows that still await delivery.
pub(crate) const PENDING: &str = "(synced = 0 OR synced IS NULL)";

/// Appends `(?, ?, ...)` with one bound parameter per value.
///
/// Callers must not pass an empty slice: `IN ()` is a syntax error.
pub(crate) fn push_in_list<'args>(builder: &mut QueryBuilder<'args, Sqlite>, values: &[String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_in_list_binds_each_value() {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT 1 WHERE id IN ");
        push_in_list(&mut builder, &["a".to_string(), "b".to_string()]);
        assert_eq!(builder.sql(), "SELECT 1 WHERE id IN (?, ?)");
    }
}
