//! # Normalized Invoice Repository
//!
//! Reads and acknowledges `buffer_invoice_headers` + `buffer_due_dates`.
//!
//! ## Acknowledgement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. UPDATE buffer_invoice_headers SET synced = 1 ...  (pending only)   │
//! │  2. UPDATE buffer_due_dates      SET synced = 1 ...  (pending only)    │
//! │                                                                         │
//! │  COMMIT ← both or neither                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An invoice is exported while it still owns a pending due-date, even if
//! its header was already acknowledged. A refresh that appends installments
//! to a delivered invoice therefore surfaces it again with only the new ones.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use relay_core::aggregate::assemble_normalized;
use relay_core::{
    DueDate, InvoiceHeader, InvoiceSelector, InvoiceTransferUnit, MarkSyncedOutcome, SyncState,
};

use crate::error::DbResult;
use crate::repository::{push_in_list, PENDING};

const HEADER_COLUMNS: &str = "id, invoice_number, customer_id, reference, invoice_date, \
     currency, total_amount_cents, created_by, notes, synced, sync_date, created_at";

const DUE_DATE_COLUMNS: &str =
    "id, invoice_id, due_date, amount_cents, kind, synced, sync_date, created_at";

/// Row of `buffer_invoice_headers` as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceHeaderRecord {
    pub id: String,
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub reference: Option<String>,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub total_amount_cents: i64,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub synced: Option<i64>,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceHeaderRecord> for InvoiceHeader {
    fn from(record: InvoiceHeaderRecord) -> Self {
        InvoiceHeader {
            id: record.id,
            invoice_number: record.invoice_number,
            customer_id: record.customer_id,
            reference: record.reference,
            invoice_date: record.invoice_date,
            currency: record.currency,
            total_amount_cents: record.total_amount_cents,
            created_by: record.created_by,
            notes: record.notes,
            sync_state: SyncState::from_flag(record.synced),
            sync_date: record.sync_date,
            created_at: record.created_at,
        }
    }
}

/// Row of `buffer_due_dates` as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueDateRecord {
    pub id: String,
    pub invoice_id: String,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub kind: Option<String>,
    pub synced: Option<i64>,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DueDateRecord> for DueDate {
    fn from(record: DueDateRecord) -> Self {
        DueDate {
            id: record.id,
            invoice_id: record.invoice_id,
            due_date: record.due_date,
            amount_cents: record.amount_cents,
            kind: record.kind,
            sync_state: SyncState::from_flag(record.synced),
            sync_date: record.sync_date,
            created_at: record.created_at,
        }
    }
}

/// Repository for normalized invoices.
#[derive(Debug, Clone)]
pub struct NormalizedInvoiceRepository {
    pool: SqlitePool,
}

impl NormalizedInvoiceRepository {
    /// Creates a new NormalizedInvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NormalizedInvoiceRepository { pool }
    }

    /// Gets up to `limit` invoices that still own a pending due-date.
    ///
    /// Headers and due-dates are read in one transaction, so an invoice is
    /// never seen half acknowledged.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<InvoiceTransferUnit>> {
        let mut tx = self.pool.begin().await?;

        let header_sql = format!(
            r#"
            SELECT {HEADER_COLUMNS}
            FROM buffer_invoice_headers h
            WHERE h.invoice_number IS NOT NULL
              AND TRIM(h.invoice_number) <> ''
              AND EXISTS (
                  SELECT 1 FROM buffer_due_dates
                  WHERE invoice_id = h.id AND {PENDING}
              )
            ORDER BY julianday(h.created_at) ASC, h.invoice_number ASC, h.id ASC
            LIMIT ?1
            "#
        );

        let headers: Vec<InvoiceHeader> = sqlx::query_as::<_, InvoiceHeaderRecord>(&header_sql)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(InvoiceHeader::from)
            .collect();

        if headers.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let header_ids: Vec<String> = headers.iter().map(|h| h.id.clone()).collect();

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {DUE_DATE_COLUMNS} FROM buffer_due_dates WHERE {PENDING} AND invoice_id IN "
        ));
        push_in_list(&mut builder, &header_ids);

        let due_dates = builder
            .build_query_as::<DueDateRecord>()
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut by_invoice: HashMap<String, Vec<DueDate>> = HashMap::new();
        for record in due_dates {
            by_invoice
                .entry(record.invoice_id.clone())
                .or_default()
                .push(DueDate::from(record));
        }

        let units: Vec<InvoiceTransferUnit> = headers
            .into_iter()
            .filter_map(|header| {
                let dues = by_invoice.remove(&header.id).unwrap_or_default();
                assemble_normalized(header, dues)
            })
            .collect();

        debug!(limit = limit, invoices = units.len(), "Read pending normalized invoices");

        Ok(units)
    }

    /// Gets a header by id.
    pub async fn get_header(&self, id: &str) -> DbResult<Option<InvoiceHeader>> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM buffer_invoice_headers WHERE id = ?1");

        let record = sqlx::query_as::<_, InvoiceHeaderRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(InvoiceHeader::from))
    }

    /// Gets all due-dates of a header, whatever their state.
    pub async fn get_due_dates(&self, invoice_id: &str) -> DbResult<Vec<DueDate>> {
        let sql = format!(
            "SELECT {DUE_DATE_COLUMNS} FROM buffer_due_dates WHERE invoice_id = ?1 \
             ORDER BY due_date ASC, id ASC"
        );

        let records = sqlx::query_as::<_, DueDateRecord>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(DueDate::from).collect())
    }

    /// Marks selected invoices and their pending due-dates as synced.
    ///
    /// ## Selectors
    /// - `Ids`: header ids
    /// - `Numbers`: for each invoice number, the oldest header `pending`
    ///   would hand out; other headers sharing the number stay pending
    ///
    /// Numbers are resolved to header ids inside the same transaction as
    /// the updates.
    pub async fn mark_synced(
        &self,
        selector: &InvoiceSelector,
        now: DateTime<Utc>,
    ) -> DbResult<MarkSyncedOutcome> {
        let keys = selector.keys();
        if keys.is_empty() {
            return Ok(MarkSyncedOutcome::default());
        }

        debug!(
            selector = selector.field(),
            requested = keys.len(),
            "Marking normalized invoices synced"
        );

        let mut tx = self.pool.begin().await?;

        let header_ids = match selector {
            InvoiceSelector::Ids(ids) => ids.clone(),
            InvoiceSelector::Numbers(numbers) => {
                let mut resolve = QueryBuilder::<Sqlite>::new(format!(
                    r#"
                    SELECT id FROM (
                        SELECT h.id,
                               ROW_NUMBER() OVER (
                                   PARTITION BY h.invoice_number
                                   ORDER BY julianday(h.created_at) ASC, h.id ASC
                               ) AS position
                        FROM buffer_invoice_headers h
                        WHERE EXISTS (
                            SELECT 1 FROM buffer_due_dates
                            WHERE invoice_id = h.id AND {PENDING}
                        )
                          AND h.invoice_number IN "#
                ));
                push_in_list(&mut resolve, numbers);
                resolve.push(") WHERE position = 1");

                resolve
                    .build_query_scalar::<String>()
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        if header_ids.is_empty() {
            tx.commit().await?;
            return Ok(MarkSyncedOutcome::default());
        }

        let mut headers = QueryBuilder::<Sqlite>::new(
            "UPDATE buffer_invoice_headers SET synced = 1, sync_date = ",
        );
        headers.push_bind(now);
        headers.push(format!(" WHERE {PENDING} AND id IN "));
        push_in_list(&mut headers, &header_ids);
        let affected = headers.build().execute(&mut *tx).await?.rows_affected();

        let mut dues =
            QueryBuilder::<Sqlite>::new("UPDATE buffer_due_dates SET synced = 1, sync_date = ");
        dues.push_bind(now);
        dues.push(format!(" WHERE {PENDING} AND invoice_id IN "));
        push_in_list(&mut dues, &header_ids);
        let due_dates_affected = dues.build().execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        Ok(MarkSyncedOutcome {
            affected,
            due_dates_affected,
        })
    }

    /// Lands an invoice header from the ERP. Existing headers keep their sync state.
    pub async fn upsert_header(&self, header: &InvoiceHeader) -> DbResult<()> {
        debug!(id = %header.id, "Upserting invoice header");

        sqlx::query(
            r#"
            INSERT INTO buffer_invoice_headers (
                id, invoice_number, customer_id, reference, invoice_date,
                currency, total_amount_cents, created_by, notes,
                synced, sync_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                invoice_number = excluded.invoice_number,
                customer_id = excluded.customer_id,
                reference = excluded.reference,
                invoice_date = excluded.invoice_date,
                currency = excluded.currency,
                total_amount_cents = excluded.total_amount_cents,
                created_by = excluded.created_by,
                notes = excluded.notes
            "#,
        )
        .bind(&header.id)
        .bind(&header.invoice_number)
        .bind(&header.customer_id)
        .bind(&header.reference)
        .bind(header.invoice_date)
        .bind(&header.currency)
        .bind(header.total_amount_cents)
        .bind(&header.created_by)
        .bind(&header.notes)
        .bind(header.sync_state.flag())
        .bind(header.sync_date)
        .bind(header.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lands a due-date from the ERP. Existing due-dates keep their sync state.
    pub async fn upsert_due_date(&self, due: &DueDate) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO buffer_due_dates (
                id, invoice_id, due_date, amount_cents, kind,
                synced, sync_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (id) DO UPDATE SET
                invoice_id = excluded.invoice_id,
                due_date = excluded.due_date,
                amount_cents = excluded.amount_cents,
                kind = excluded.kind
            "#,
        )
        .bind(&due.id)
        .bind(&due.invoice_id)
        .bind(due.due_date)
        .bind(due.amount_cents)
        .bind(&due.kind)
        .bind(due.sync_state.flag())
        .bind(due.sync_date)
        .bind(due.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
