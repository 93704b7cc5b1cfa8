//! # Invoice Aggregation
//!
//! Builds [`InvoiceTransferUnit`]s from buffer records. The buffer store
//! selects which rows to load; this module decides how they are grouped,
//! ordered and totalled.
//!
//! ## Rows Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  buffer_invoices (pending rows)                                         │
//! │                                                                         │
//! │  id  │ invoice_number │ customer │ due_date   │ amount │ created_at     │
//! │  ────┼────────────────┼──────────┼────────────┼────────┼─────────────   │
//! │  P2  │ A1             │ C001     │ 2024-02-10 │ 150.00 │ 09:00          │
//! │  P1  │ A1             │ C001     │ 2024-01-10 │ 100.00 │ 09:00          │
//! │  P7  │ B4             │ C002     │ 2024-03-01 │  80.00 │ 10:30          │
//! │  P9  │ (empty)        │ C003     │ 2024-03-01 │  20.00 │ 08:00  ✗ skip  │
//! │                          │                                              │
//! │                          ▼  group by (invoice_number, customer)         │
//! │                                                                         │
//! │  A1/C001  total 250.00  due_dates [P1 Jan, P2 Feb]   first 09:00       │
//! │  B4/C002  total  80.00  due_dates [P7 Mar]           first 10:30       │
//! │                                                                         │
//! │  Groups ordered by earliest created_at, then invoice number.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Normalized Layout
//! One header plus its own due-dates. Only pending due-dates are carried,
//! and a header without any is not surfaced at all. The total is the
//! header's stored total.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{
    DueDate, DueDateEntry, DueDateRow, InvoiceHeader, InvoiceTransferUnit,
};
use crate::INVOICE_UNIT_KIND;

/// Returns the invoice number if it can be used as a grouping key.
fn assignable_number(number: Option<&str>) -> Option<&str> {
    number.filter(|n| !n.trim().is_empty())
}

// =============================================================================
// Rows Layout
// =============================================================================

struct RowGroup {
    first_created: DateTime<Utc>,
    rows: Vec<DueDateRow>,
}

/// Groups installment rows into invoice transfer units.
///
/// Synced rows and rows without an assignable invoice number are dropped
/// before grouping, so a unit always carries all and only its pending
/// installments. Each unit's total is the sum of the installments it carries.
pub fn group_due_date_rows(rows: Vec<DueDateRow>) -> Vec<InvoiceTransferUnit> {
    let mut groups: HashMap<(String, String), RowGroup> = HashMap::new();

    for row in rows {
        if row.sync_state.is_synced() {
            continue;
        }
        let Some(number) = assignable_number(row.invoice_number.as_deref()) else {
            continue;
        };

        let key = (number.to_string(), row.customer_id.clone());
        let group = groups.entry(key).or_insert_with(|| RowGroup {
            first_created: row.created_at,
            rows: Vec::new(),
        });
        group.first_created = group.first_created.min(row.created_at);
        group.rows.push(row);
    }

    let mut ordered: Vec<((String, String), RowGroup)> = groups.into_iter().collect();
    ordered.sort_by(|(a_key, a), (b_key, b)| {
        a.first_created
            .cmp(&b.first_created)
            .then_with(|| a_key.cmp(b_key))
    });

    ordered
        .into_iter()
        .map(|((invoice_number, customer_id), group)| {
            build_row_unit(invoice_number, customer_id, group.rows)
        })
        .collect()
}

fn build_row_unit(
    invoice_number: String,
    customer_id: String,
    mut rows: Vec<DueDateRow>,
) -> InvoiceTransferUnit {
    // Currency of the earliest row wins if the ERP ever disagrees with itself.
    let currency = rows
        .iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
        .map(|row| row.currency.clone())
        .unwrap_or_default();

    let invoice_date = rows
        .iter()
        .map(|row| row.invoice_date)
        .min()
        .unwrap_or_default();

    let created_by = rows.iter().filter_map(|row| row.created_by.clone()).min();

    rows.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));

    let total: Money = rows.iter().map(|row| Money::from_cents(row.amount_cents)).sum();

    let due_dates = rows
        .into_iter()
        .map(|row| DueDateEntry {
            id: row.id,
            reference: row.reference,
            due_date: row.due_date,
            amount_cents: row.amount_cents,
            kind: row.kind,
        })
        .collect();

    InvoiceTransferUnit {
        invoice_id: None,
        invoice_number,
        customer_id,
        invoice_date,
        currency,
        total_amount_cents: total.cents(),
        created_by,
        kind: INVOICE_UNIT_KIND.to_string(),
        due_dates,
    }
}

// =============================================================================
// Normalized Layout
// =============================================================================

/// Builds the transfer unit of a normalized invoice.
///
/// Returns `None` when the header has no assignable invoice number or none
/// of its own due-dates is still pending.
pub fn assemble_normalized(
    header: InvoiceHeader,
    due_dates: Vec<DueDate>,
) -> Option<InvoiceTransferUnit> {
    let invoice_number = assignable_number(header.invoice_number.as_deref())?.to_string();

    let mut pending: Vec<DueDate> = due_dates
        .into_iter()
        .filter(|due| due.invoice_id == header.id && !due.sync_state.is_synced())
        .collect();

    if pending.is_empty() {
        return None;
    }

    pending.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));

    let due_dates = pending
        .into_iter()
        .map(|due| DueDateEntry {
            id: due.id,
            reference: header.reference.clone(),
            due_date: due.due_date,
            amount_cents: due.amount_cents,
            kind: due.kind,
        })
        .collect();

    Some(InvoiceTransferUnit {
        invoice_id: Some(header.id),
        invoice_number,
        customer_id: header.customer_id,
        invoice_date: header.invoice_date,
        currency: header.currency,
        total_amount_cents: header.total_amount_cents,
        created_by: header.created_by,
        kind: INVOICE_UNIT_KIND.to_string(),
        due_dates,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncState;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn row(id: &str, number: Option<&str>, customer: &str, due: NaiveDate, cents: i64) -> DueDateRow {
        DueDateRow {
            id: id.to_string(),
            invoice_number: number.map(str::to_string),
            customer_id: customer.to_string(),
            reference: Some(id.to_string()),
            invoice_date: date(2024, 1, 2),
            due_date: due,
            currency: "EUR".to_string(),
            amount_cents: cents,
            kind: Some("FA".to_string()),
            created_by: Some("admin".to_string()),
            notes: None,
            sync_state: SyncState::Pending,
            sync_date: None,
            created_at: at(9),
        }
    }

    #[test]
    fn test_groups_installments_of_one_invoice() {
        let rows = vec![
            row("P2", Some("A1"), "C001", date(2024, 2, 10), 15000),
            row("P1", Some("A1"), "C001", date(2024, 1, 10), 10000),
        ];

        let units = group_due_date_rows(rows);

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.invoice_number, "A1");
        assert_eq!(unit.total_amount_cents, 25000);
        assert_eq!(unit.kind, "invoice");
        let order: Vec<&str> = unit.due_dates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["P1", "P2"]);
        assert_eq!(unit.total(), unit.due_dates_total());
    }

    #[test]
    fn test_excludes_synced_and_unassignable_rows() {
        let mut synced = row("P3", Some("A1"), "C001", date(2024, 3, 10), 5000);
        synced.sync_state = SyncState::Synced;

        let rows = vec![
            row("P1", Some("A1"), "C001", date(2024, 1, 10), 10000),
            synced,
            row("P8", Some(""), "C001", date(2024, 1, 10), 700),
            row("P9", None, "C001", date(2024, 1, 10), 900),
            row("P10", Some("   "), "C001", date(2024, 1, 10), 900),
        ];

        let units = group_due_date_rows(rows);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].due_dates.len(), 1);
        assert_eq!(units[0].total_amount_cents, 10000);
    }

    #[test]
    fn test_same_number_different_customers_are_separate_units() {
        let rows = vec![
            row("P1", Some("A1"), "C001", date(2024, 1, 10), 100),
            row("P2", Some("A1"), "C002", date(2024, 1, 10), 200),
        ];

        let units = group_due_date_rows(rows);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].customer_id, "C001");
        assert_eq!(units[1].customer_id, "C002");
    }

    #[test]
    fn test_orders_groups_by_first_creation_then_number() {
        let mut late = row("P1", Some("A1"), "C001", date(2024, 1, 10), 100);
        late.created_at = at(11);
        let mut early = row("P2", Some("Z9"), "C001", date(2024, 1, 10), 100);
        early.created_at = at(8);
        let mut tie_a = row("P3", Some("B2"), "C001", date(2024, 1, 10), 100);
        tie_a.created_at = at(10);
        let mut tie_b = row("P4", Some("B1"), "C001", date(2024, 1, 10), 100);
        tie_b.created_at = at(10);
        // A later installment of A1 created before the first one pulls the group forward.
        let mut a1_early = row("P5", Some("A1"), "C001", date(2024, 2, 10), 100);
        a1_early.created_at = at(9);

        let units = group_due_date_rows(vec![late, early, tie_a, tie_b, a1_early]);

        let order: Vec<&str> = units.iter().map(|u| u.invoice_number.as_str()).collect();
        assert_eq!(order, vec!["Z9", "A1", "B1", "B2"]);
    }

    #[test]
    fn test_invoice_date_is_earliest_and_due_date_ties_by_id() {
        let mut first = row("P2", Some("A1"), "C001", date(2024, 1, 10), 100);
        first.invoice_date = date(2023, 12, 30);
        let second = row("P1", Some("A1"), "C001", date(2024, 1, 10), 100);

        let units = group_due_date_rows(vec![first, second]);

        assert_eq!(units[0].invoice_date, date(2023, 12, 30));
        assert_eq!(units[0].due_dates[0].id, "P1");
        assert_eq!(units[0].due_dates[1].id, "P2");
    }

    fn header(id: &str, number: Option<&str>) -> InvoiceHeader {
        InvoiceHeader {
            id: id.to_string(),
            invoice_number: number.map(str::to_string),
            customer_id: "C001".to_string(),
            reference: Some("REF-1".to_string()),
            invoice_date: date(2024, 1, 2),
            currency: "EUR".to_string(),
            total_amount_cents: 25000,
            created_by: Some("admin".to_string()),
            notes: None,
            sync_state: SyncState::Pending,
            sync_date: None,
            created_at: at(9),
        }
    }

    fn due(id: &str, invoice_id: &str, due_date: NaiveDate, state: SyncState) -> DueDate {
        DueDate {
            id: id.to_string(),
            invoice_id: invoice_id.to_string(),
            due_date,
            amount_cents: 12500,
            kind: None,
            sync_state: state,
            sync_date: None,
            created_at: at(9),
        }
    }

    #[test]
    fn test_normalized_carries_only_pending_due_dates() {
        let dues = vec![
            due("D2", "H1", date(2024, 2, 10), SyncState::Pending),
            due("D1", "H1", date(2024, 1, 10), SyncState::Synced),
            due("D3", "H1", date(2024, 1, 20), SyncState::Pending),
            due("D9", "H2", date(2024, 1, 1), SyncState::Pending),
        ];

        let unit = assemble_normalized(header("H1", Some("A1")), dues).unwrap();

        assert_eq!(unit.invoice_id.as_deref(), Some("H1"));
        assert_eq!(unit.total_amount_cents, 25000);
        let order: Vec<&str> = unit.due_dates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["D3", "D2"]);
        assert_eq!(unit.due_dates[0].reference.as_deref(), Some("REF-1"));
    }

    #[test]
    fn test_normalized_without_pending_due_dates_is_not_surfaced() {
        let dues = vec![due("D1", "H1", date(2024, 1, 10), SyncState::Synced)];
        assert!(assemble_normalized(header("H1", Some("A1")), dues).is_none());
        assert!(assemble_normalized(header("H1", Some("A1")), vec![]).is_none());
    }

    #[test]
    fn test_normalized_without_number_is_not_surfaced() {
        let dues = vec![due("D1", "H1", date(2024, 1, 10), SyncState::Pending)];
        assert!(assemble_normalized(header("H1", None), dues.clone()).is_none());
        assert!(assemble_normalized(header("H1", Some("")), dues).is_none());
    }
}
