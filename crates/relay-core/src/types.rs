//! # Domain Types
//!
//! Records mirrored from the ERP buffer tables and the consumer-facing
//! shapes built from them.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  BUFFER RECORDS (as stored)           TRANSFER SHAPES (as exported)     │
//! │  ─────────────────────────            ──────────────────────────────    │
//! │  Customer ──────────────────────────► Customer                         │
//! │                                                                         │
//! │  DueDateRow  (layout: rows)  ─┐                                         │
//! │  one row per installment      ├─────► InvoiceTransferUnit               │
//! │                               │        └── Vec<DueDateEntry>            │
//! │  InvoiceHeader + DueDate      │                                         │
//! │  (layout: normalized) ────────┘                                         │
//! │                                                                         │
//! │  Every buffer record carries:                                          │
//! │    synced    INTEGER NULL   (NULL / 0 = pending, 1 = synced)            │
//! │    sync_date TEXT    NULL   (set when synced)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::{serialize_decimal, serialize_optional_decimal, Money};

// =============================================================================
// Sync State
// =============================================================================

/// Delivery state of a buffer record.
///
/// ## State Machine
/// ```text
///   refresh inserts row          consumer acknowledges
///  ────────────────────► PENDING ──────────────────────► SYNCED
///                        (0/NULL)     mark-synced         (1)
/// ```
/// There is no transition back: only a new row from the refresh can
/// surface the same business document again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Not yet delivered and acknowledged.
    #[default]
    Pending,
    /// Acknowledged by the consumer.
    Synced,
}

impl SyncState {
    /// Interprets the nullable `synced` column.
    ///
    /// Only `1` means synced; `NULL`, `0` and anything else are pending.
    pub fn from_flag(flag: Option<i64>) -> Self {
        match flag {
            Some(1) => SyncState::Synced,
            _ => SyncState::Pending,
        }
    }

    /// Column value for this state.
    pub const fn flag(&self) -> i64 {
        match self {
            SyncState::Pending => 0,
            SyncState::Synced => 1,
        }
    }

    /// Returns true if the record has been acknowledged.
    pub const fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced)
    }
}

// =============================================================================
// Invoice Layout
// =============================================================================

/// How invoices are stored in the buffer.
///
/// Exactly one layout is active per process. The two shapes are never
/// read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceLayout {
    /// `buffer_invoices`: one row per due-date, grouped by invoice number.
    #[default]
    Rows,
    /// `buffer_invoice_headers` + `buffer_due_dates`.
    Normalized,
}

impl fmt::Display for InvoiceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceLayout::Rows => write!(f, "rows"),
            InvoiceLayout::Normalized => write!(f, "normalized"),
        }
    }
}

impl FromStr for InvoiceLayout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rows" | "row" | "row_per_due_date" | "row-per-due-date" => Ok(InvoiceLayout::Rows),
            "normalized" | "normalised" => Ok(InvoiceLayout::Normalized),
            other => Err(CoreError::UnknownLayout(other.to_string())),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer mirrored from the ERP.
///
/// Serialized with the consumer's field names: `sage_id`, `payment_delay`
/// and a decimal `credit_limit`.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct Customer {
    /// ERP key, unique.
    #[serde(rename = "sage_id")]
    pub id: String,
    pub code: Option<String>,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Payment delay granted to the customer, in days.
    #[serde(rename = "payment_delay")]
    pub payment_delay_days: Option<i64>,
    pub currency: Option<String>,
    #[serde(rename = "credit_limit", serialize_with = "serialize_optional_decimal")]
    #[ts(type = "string | null")]
    pub credit_limit_cents: Option<i64>,
    pub max_days_overdue: Option<i64>,
    pub risk_level: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[serde(skip)]
    #[ts(skip)]
    pub sync_state: SyncState,
    #[serde(skip)]
    #[ts(skip)]
    pub sync_date: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Row-per-due-date Layout
// =============================================================================

/// One installment row of the `rows` layout.
///
/// Rows sharing `invoice_number` and `customer_id` form one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct DueDateRow {
    /// ERP piece number, unique per installment.
    pub id: String,
    /// External invoice number. `None` or empty means not yet assignable.
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub reference: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub amount_cents: i64,
    pub kind: Option<String>,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub sync_state: SyncState,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Normalized Layout
// =============================================================================

/// Invoice header of the `normalized` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceHeader {
    pub id: String,
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub reference: Option<String>,
    pub invoice_date: NaiveDate,
    pub currency: String,
    /// Total as stored by the ERP.
    pub total_amount_cents: i64,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub sync_state: SyncState,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Installment of the `normalized` layout, owned by an [`InvoiceHeader`].
#[derive(Debug, Clone, PartialEq)]
pub struct DueDate {
    pub id: String,
    pub invoice_id: String,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub kind: Option<String>,
    pub sync_state: SyncState,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Transfer Shapes
// =============================================================================

/// One installment inside an [`InvoiceTransferUnit`].
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct DueDateEntry {
    /// Installment id in the ERP.
    #[serde(rename = "sage_id")]
    pub id: String,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[serde(rename = "amount", serialize_with = "serialize_decimal")]
    #[ts(type = "string")]
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DueDateEntry {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// An invoice with all of its pending installments, as handed to the consumer.
///
/// A unit is never split across two pages.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct InvoiceTransferUnit {
    /// Header id. Only present for the normalized layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub invoice_id: Option<String>,
    pub invoice_number: String,
    #[serde(rename = "customer_sage_id")]
    pub customer_id: String,
    /// Earliest invoice date among the unit's rows.
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub currency: String,
    #[serde(rename = "total_amount", serialize_with = "serialize_decimal")]
    #[ts(type = "string")]
    pub total_amount_cents: i64,
    pub created_by: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    /// Sorted by due date ascending.
    pub due_dates: Vec<DueDateEntry>,
}

impl InvoiceTransferUnit {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Sum of the carried installments.
    pub fn due_dates_total(&self) -> Money {
        self.due_dates.iter().map(DueDateEntry::amount).sum()
    }
}

// =============================================================================
// Acknowledgement
// =============================================================================

/// Which invoices a mark-synced call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceSelector {
    /// Header ids (normalized) or installment row ids (rows).
    Ids(Vec<String>),
    /// External invoice numbers.
    Numbers(Vec<String>),
}

impl InvoiceSelector {
    /// Name of the request field the keys came from.
    pub fn field(&self) -> &'static str {
        match self {
            InvoiceSelector::Ids(_) => "invoice_ids",
            InvoiceSelector::Numbers(_) => "invoice_numbers",
        }
    }

    /// The selected keys.
    pub fn keys(&self) -> &[String] {
        match self {
            InvoiceSelector::Ids(keys) | InvoiceSelector::Numbers(keys) => keys,
        }
    }
}

/// Result of an invoice mark-synced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarkSyncedOutcome {
    /// Invoice-level rows flipped to synced (headers, or installment rows
    /// for the rows layout).
    pub affected: u64,
    /// Installment rows flipped to synced.
    pub due_dates_affected: u64,
}

// =============================================================================
// Statistics
// =============================================================================

/// Total / synced / pending counts for one record kind.
///
/// `pending + synced == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityCounts {
    pub total: i64,
    pub synced: i64,
    pub pending: i64,
}

impl EntityCounts {
    /// Builds counts from total and synced.
    pub fn from_total_synced(total: i64, synced: i64) -> Self {
        EntityCounts {
            total,
            synced,
            pending: total - synced,
        }
    }
}

/// Snapshot of the buffer's delivery progress.
///
/// Serialized as the flat [`SyncStatsSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "SyncStatsSummary")]
pub struct SyncStats {
    pub customers: EntityCounts,
    /// Counted by distinct invoice number.
    pub invoices: EntityCounts,
    pub due_dates: EntityCounts,
    /// Sum of all pending installment amounts.
    pub pending_amount_cents: i64,
}

impl SyncStats {
    /// Returns the pending amount as Money.
    pub fn pending_amount(&self) -> Money {
        Money::from_cents(self.pending_amount_cents)
    }
}

/// Flat statistics object as the consumer reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct SyncStatsSummary {
    pub total_customers: i64,
    pub customers_synced: i64,
    pub customers_pending: i64,
    pub total_invoices: i64,
    pub invoices_synced: i64,
    pub invoices_pending: i64,
    pub total_echeances: i64,
    pub echeances_synced: i64,
    pub echeances_pending: i64,
    #[serde(serialize_with = "serialize_decimal")]
    #[ts(type = "string")]
    pub pending_amount: i64,
}

impl From<SyncStats> for SyncStatsSummary {
    fn from(stats: SyncStats) -> Self {
        SyncStatsSummary {
            total_customers: stats.customers.total,
            customers_synced: stats.customers.synced,
            customers_pending: stats.customers.pending,
            total_invoices: stats.invoices.total,
            invoices_synced: stats.invoices.synced,
            invoices_pending: stats.invoices.pending,
            total_echeances: stats.due_dates.total,
            echeances_synced: stats.due_dates.synced,
            echeances_pending: stats.due_dates.pending,
            pending_amount: stats.pending_amount_cents,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_from_flag() {
        assert_eq!(SyncState::from_flag(None), SyncState::Pending);
        assert_eq!(SyncState::from_flag(Some(0)), SyncState::Pending);
        assert_eq!(SyncState::from_flag(Some(1)), SyncState::Synced);
        assert_eq!(SyncState::from_flag(Some(7)), SyncState::Pending);
        assert_eq!(SyncState::Synced.flag(), 1);
        assert!(!SyncState::default().is_synced());
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("rows".parse::<InvoiceLayout>().unwrap(), InvoiceLayout::Rows);
        assert_eq!(
            " Normalized ".parse::<InvoiceLayout>().unwrap(),
            InvoiceLayout::Normalized
        );
        assert!(matches!(
            "both".parse::<InvoiceLayout>(),
            Err(CoreError::UnknownLayout(_))
        ));
        assert_eq!(InvoiceLayout::default(), InvoiceLayout::Rows);
    }

    #[test]
    fn test_selector_field_names() {
        let by_number = InvoiceSelector::Numbers(vec!["A1".into()]);
        assert_eq!(by_number.field(), "invoice_numbers");
        assert_eq!(by_number.keys(), ["A1".to_string()]);
        assert_eq!(InvoiceSelector::Ids(vec![]).field(), "invoice_ids");
    }

    #[test]
    fn test_entity_counts_invariant() {
        let counts = EntityCounts::from_total_synced(10, 4);
        assert_eq!(counts.pending, 6);
        assert_eq!(counts.pending + counts.synced, counts.total);
    }

    #[test]
    fn test_transfer_unit_json_shape() {
        let unit = InvoiceTransferUnit {
            invoice_id: None,
            invoice_number: "A1".into(),
            customer_id: "C001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            currency: "EUR".into(),
            total_amount_cents: 25000,
            created_by: Some("admin".into()),
            kind: crate::INVOICE_UNIT_KIND.into(),
            due_dates: vec![DueDateEntry {
                id: "P1".into(),
                reference: Some("P1".into()),
                due_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                amount_cents: 25000,
                kind: Some("FA".into()),
            }],
        };

        let json = serde_json::to_value(&unit).unwrap();
        assert!(json.get("invoice_id").is_none());
        assert_eq!(json["customer_sage_id"], "C001");
        assert_eq!(json["total_amount"], "250.00");
        assert_eq!(json["due_dates"][0]["sage_id"], "P1");
        assert_eq!(json["due_dates"][0]["amount"], "250.00");
        assert!(json.get("customer_id").is_none());
        assert!(json.get("total_amount_cents").is_none());
        assert_eq!(json["type"], "invoice");
        assert_eq!(json["invoice_date"], "2024-01-02");
        assert_eq!(json["due_dates"][0]["due_date"], "2024-01-10");
        assert_eq!(json["due_dates"][0]["type"], "FA");
        assert_eq!(unit.total(), unit.due_dates_total());
    }

    #[test]
    fn test_customer_json_shape() {
        let customer = Customer {
            id: "C001".into(),
            code: Some("ACME".into()),
            company_name: "Acme".into(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            payment_delay_days: Some(30),
            currency: Some("EUR".into()),
            credit_limit_cents: Some(1_000_000),
            max_days_overdue: None,
            risk_level: None,
            notes: None,
            is_active: true,
            sync_state: SyncState::Synced,
            sync_date: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&customer).unwrap();
        assert_eq!(json["sage_id"], "C001");
        assert_eq!(json["payment_delay"], 30);
        assert_eq!(json["credit_limit"], "10000.00");
        assert!(json.get("id").is_none());
        assert!(json.get("sync_state").is_none());
    }

    #[test]
    fn test_stats_serialize_flat() {
        let stats = SyncStats {
            customers: EntityCounts::from_total_synced(3, 1),
            invoices: EntityCounts::from_total_synced(2, 0),
            due_dates: EntityCounts::from_total_synced(4, 1),
            pending_amount_cents: 29200,
        };

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["total_customers"], 3);
        assert_eq!(json["customers_synced"], 1);
        assert_eq!(json["customers_pending"], 2);
        assert_eq!(json["invoices_pending"], 2);
        assert_eq!(json["total_echeances"], 4);
        assert_eq!(json["echeances_pending"], 3);
        assert_eq!(json["pending_amount"], "292.00");
        assert!(json.get("customers").is_none());
    }
}
