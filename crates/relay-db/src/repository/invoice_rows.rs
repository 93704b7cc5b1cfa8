//! # Invoice Row Repository
//!
//! Reads and acknowledges the row-per-due-date invoice table.
//!
//! ## Read Plan
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE STATEMENT (one implicit read transaction)                          │
//! │                                                                         │
//! │  WITH keys AS (                                                         │
//! │      pending rows with an assignable invoice number                     │
//! │      GROUP BY (invoice_number, customer_id)                             │
//! │      ORDER BY MIN(julianday(created_at)), invoice_number, customer_id   │
//! │      LIMIT ?            ← limit counts groups, never rows               │
//! │  )                                                                      │
//! │  SELECT every pending row of those groups                               │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  relay_core::aggregate::group_due_date_rows                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use relay_core::aggregate::group_due_date_rows;
use relay_core::{DueDateRow, InvoiceSelector, InvoiceTransferUnit, MarkSyncedOutcome, SyncState};

use crate::error::DbResult;
use crate::repository::{push_in_list, PENDING};

const ROW_COLUMNS: &str = "id, invoice_number, customer_id, reference, invoice_date, due_date, \
     currency, amount_cents, kind, created_by, notes, synced, sync_date, created_at";

/// Row of `buffer_invoices` as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueDateRowRecord {
    pub id: String,
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
    pub synced: Option<i64>,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DueDateRowRecord> for DueDateRow {
    fn from(record: DueDateRowRecord) -> Self {
        DueDateRow {
            id: record.id,
            invoice_number: record.invoice_number,
            customer_id: record.customer_id,
            reference: record.reference,
            invoice_date: record.invoice_date,
            due_date: record.due_date,
            currency: record.currency,
            amount_cents: record.amount_cents,
            kind: record.kind,
            created_by: record.created_by,
            notes: record.notes,
            sync_state: SyncState::from_flag(record.synced),
            sync_date: record.sync_date,
            created_at: record.created_at,
        }
    }
}

/// Repository for `buffer_invoices`.
#[derive(Debug, Clone)]
pub struct InvoiceRowRepository {
    pool: SqlitePool,
}

impl InvoiceRowRepository {
    /// Creates a new InvoiceRowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRowRepository { pool }
    }

    /// Gets the pending rows of the first `limit` pending invoice groups.
    pub async fn pending_rows(&self, limit: u32) -> DbResult<Vec<DueDateRow>> {
        let sql = format!(
            r#"
            WITH keys AS (
                SELECT invoice_number, customer_id
                FROM buffer_invoices
                WHERE {PENDING}
                  AND invoice_number IS NOT NULL
                  AND TRIM(invoice_number) <> ''
                GROUP BY invoice_number, customer_id
                ORDER BY MIN(julianday(created_at)) ASC, invoice_number ASC, customer_id ASC
                LIMIT ?1
            )
            SELECT {ROW_COLUMNS}
            FROM buffer_invoices
            WHERE {PENDING}
              AND (invoice_number, customer_id) IN (SELECT invoice_number, customer_id FROM keys)
            "#
        );

        let records = sqlx::query_as::<_, DueDateRowRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(DueDateRow::from).collect())
    }

    /// Gets up to `limit` pending invoices as transfer units.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<InvoiceTransferUnit>> {
        let rows = self.pending_rows(limit).await?;
        let row_count = rows.len();

        let units = group_due_date_rows(rows);

        debug!(
            limit = limit,
            rows = row_count,
            invoices = units.len(),
            "Aggregated pending invoice rows"
        );

        Ok(units)
    }

    /// Gets a single installment row by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DueDateRow>> {
        let sql = format!("SELECT {ROW_COLUMNS} FROM buffer_invoices WHERE id = ?1");

        let record = sqlx::query_as::<_, DueDateRowRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(DueDateRow::from))
    }

    /// Marks pending installment rows as synced.
    ///
    /// ## Selectors
    /// - `Numbers`: every pending row of the oldest pending group of each
    ///   invoice number, which is the group `pending` hands out first
    /// - `Ids`: individual installment rows
    ///
    /// A number shared by several customers is acknowledged one group per
    /// call, so a group that was never delivered stays pending.
    ///
    /// In this layout an invoice has no row of its own, so both counts of
    /// the outcome equal the number of rows flipped.
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
            "Marking invoice rows synced"
        );

        let mut builder =
            QueryBuilder::<Sqlite>::new("UPDATE buffer_invoices SET synced = 1, sync_date = ");
        builder.push_bind(now);
        match selector {
            InvoiceSelector::Ids(ids) => {
                builder.push(format!(" WHERE {PENDING} AND id IN "));
                push_in_list(&mut builder, ids);
            }
            InvoiceSelector::Numbers(numbers) => {
                builder.push(format!(
                    r#" WHERE {PENDING} AND (invoice_number, customer_id) IN (
                        SELECT invoice_number, customer_id FROM (
                            SELECT invoice_number, customer_id,
                                   ROW_NUMBER() OVER (
                                       PARTITION BY invoice_number
                                       ORDER BY MIN(julianday(created_at)) ASC, customer_id ASC
                                   ) AS position
                            FROM buffer_invoices
                            WHERE {PENDING} AND invoice_number IN "#
                ));
                push_in_list(&mut builder, numbers);
                builder.push(
                    r#"
                            GROUP BY invoice_number, customer_id
                        ) WHERE position = 1
                    )"#,
                );
            }
        }

        let affected = builder.build().execute(&self.pool).await?.rows_affected();

        Ok(MarkSyncedOutcome {
            affected,
            due_dates_affected: affected,
        })
    }

    /// Lands one installment row from the ERP.
    ///
    /// Existing rows keep their sync state.
    pub async fn upsert(&self, row: &DueDateRow) -> DbResult<()> {
        debug!(id = %row.id, invoice = ?row.invoice_number, "Upserting invoice row");

        sqlx::query(
            r#"
            INSERT INTO buffer_invoices (
                id, invoice_number, customer_id, reference, invoice_date, due_date,
                currency, amount_cents, kind, created_by, notes,
                synced, sync_date, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14
            )
            ON CONFLICT (id) DO UPDATE SET
                invoice_number = excluded.invoice_number,
                customer_id = excluded.customer_id,
                reference = excluded.reference,
                invoice_date = excluded.invoice_date,
                due_date = excluded.due_date,
                currency = excluded.currency,
                amount_cents = excluded.amount_cents,
                kind = excluded.kind,
                created_by = excluded.created_by,
                notes = excluded.notes
            "#,
        )
        .bind(&row.id)
        .bind(&row.invoice_number)
        .bind(&row.customer_id)
        .bind(&row.reference)
        .bind(row.invoice_date)
        .bind(row.due_date)
        .bind(&row.currency)
        .bind(row.amount_cents)
        .bind(&row.kind)
        .bind(&row.created_by)
        .bind(&row.notes)
        .bind(row.sync_state.flag())
        .bind(row.sync_date)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(id: &str, number: Option<&str>, customer: &str, due: NaiveDate, cents: i64, minutes: i64) -> DueDateRow {
        DueDateRow {
            id: id.to_string(),
            invoice_number: number.map(str::to_string),
            customer_id: customer.to_string(),
            reference: Some(format!("REF-{}", id)),
            invoice_date: date(2024, 1, 2),
            due_date: due,
            currency: "EUR".to_string(),
            amount_cents: cents,
            kind: Some("FA".to_string()),
            created_by: Some("erp".to_string()),
            notes: None,
            sync_state: SyncState::Pending,
            sync_date: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    async fn setup() -> InvoiceRowRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.invoice_rows()
    }

    #[tokio::test]
    async fn test_groups_installments_and_totals() {
        let repo = setup().await;
        repo.upsert(&row("P2", Some("A1"), "C001", date(2024, 2, 10), 15000, 0)).await.unwrap();
        repo.upsert(&row("P1", Some("A1"), "C001", date(2024, 1, 10), 10000, 0)).await.unwrap();

        let units = repo.pending(100).await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].invoice_number, "A1");
        assert_eq!(units[0].total_amount_cents, 25000);
        assert_eq!(units[0].due_dates[0].due_date, date(2024, 1, 10));
        assert_eq!(units[0].due_dates[1].due_date, date(2024, 2, 10));
    }

    #[tokio::test]
    async fn test_limit_counts_groups_not_rows() {
        let repo = setup().await;
        for i in 0..3 {
            let due = date(2024, 1 + i as u32, 10);
            repo.upsert(&row(&format!("A-{}", i), Some("A1"), "C001", due, 100, 0)).await.unwrap();
        }
        repo.upsert(&row("B-0", Some("B1"), "C001", date(2024, 1, 10), 100, 5)).await.unwrap();

        let units = repo.pending(1).await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].invoice_number, "A1");
        assert_eq!(units[0].due_dates.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_numbers_are_never_exported() {
        let repo = setup().await;
        repo.upsert(&row("P1", None, "C001", date(2024, 1, 10), 100, 0)).await.unwrap();
        repo.upsert(&row("P2", Some(""), "C001", date(2024, 1, 10), 100, 0)).await.unwrap();

        assert!(repo.pending(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_synced_by_number_hides_invoice() {
        let repo = setup().await;
        repo.upsert(&row("P1", Some("A1"), "C001", date(2024, 1, 10), 10000, 0)).await.unwrap();
        repo.upsert(&row("P2", Some("A1"), "C001", date(2024, 2, 10), 15000, 0)).await.unwrap();
        repo.upsert(&row("P3", Some("B1"), "C002", date(2024, 2, 10), 500, 1)).await.unwrap();

        let selector = InvoiceSelector::Numbers(vec!["A1".to_string()]);
        let outcome = repo.mark_synced(&selector, Utc::now()).await.unwrap();
        assert_eq!(outcome.affected, 2);
        assert_eq!(outcome.due_dates_affected, 2);

        let units = repo.pending(100).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].invoice_number, "B1");

        let again = repo.mark_synced(&selector, Utc::now()).await.unwrap();
        assert_eq!(again, MarkSyncedOutcome::default());
    }

    #[tokio::test]
    async fn test_mark_synced_by_id_leaves_remaining_installments() {
        let repo = setup().await;
        repo.upsert(&row("P1", Some("A1"), "C001", date(2024, 1, 10), 10000, 0)).await.unwrap();
        repo.upsert(&row("P2", Some("A1"), "C001", date(2024, 2, 10), 15000, 0)).await.unwrap();

        let selector = InvoiceSelector::Ids(vec!["P1".to_string()]);
        let outcome = repo.mark_synced(&selector, Utc::now()).await.unwrap();
        assert_eq!(outcome.affected, 1);

        let units = repo.pending(100).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].due_dates.len(), 1);
        assert_eq!(units[0].due_dates[0].id, "P2");
        assert_eq!(units[0].total_amount_cents, 15000);

        let stored = repo.get_by_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.sync_state, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_mark_synced_by_number_stays_within_delivered_customer() {
        let repo = setup().await;
        repo.upsert(&row("P1", Some("A1"), "C001", date(2024, 1, 10), 100, 0)).await.unwrap();
        repo.upsert(&row("P2", Some("A1"), "C002", date(2024, 1, 10), 200, 60)).await.unwrap();

        let delivered = repo.pending(1).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].customer_id, "C001");

        let selector = InvoiceSelector::Numbers(vec!["A1".to_string()]);
        let outcome = repo.mark_synced(&selector, Utc::now()).await.unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(repo.get_by_id("P1").await.unwrap().unwrap().sync_state.is_synced());
        assert!(!repo.get_by_id("P2").await.unwrap().unwrap().sync_state.is_synced());

        let units = repo.pending(100).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].customer_id, "C002");

        let outcome = repo.mark_synced(&selector, Utc::now()).await.unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(repo.pending(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_follows_instant_across_timestamp_formats() {
        let repo = setup().await;
        sqlx::query(
            "INSERT INTO buffer_invoices (id, invoice_number, customer_id, invoice_date, due_date, amount_cents, created_at) VALUES
                ('NEW', 'N1', 'C001', '2024-01-02', '2024-02-01', 100, '2024-01-01T08:00:00.500+00:00'),
                ('OLD', 'O1', 'C001', '2024-01-02', '2024-02-01', 100, '2024-01-01T08:00:00Z')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let units = repo.pending(10).await.unwrap();
        let numbers: Vec<&str> = units.iter().map(|u| u.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["O1", "N1"]);

        let first = repo.pending(1).await.unwrap();
        assert_eq!(first[0].invoice_number, "O1");
    }

    #[tokio::test]
    async fn test_concurrent_acknowledgements_flip_each_row_once() {
        let repo = setup().await;
        repo.upsert(&row("P1", Some("A1"), "C001", date(2024, 1, 10), 100, 0)).await.unwrap();
        repo.upsert(&row("P2", Some("A1"), "C001", date(2024, 2, 10), 100, 0)).await.unwrap();
        repo.upsert(&row("P3", Some("B1"), "C001", date(2024, 1, 10), 100, 1)).await.unwrap();

        let selector = InvoiceSelector::Ids(vec!["P1".into(), "P2".into(), "P3".into()]);
        let (first, second) = tokio::join!(
            repo.mark_synced(&selector, Utc::now()),
            repo.mark_synced(&selector, Utc::now())
        );

        assert_eq!(first.unwrap().affected + second.unwrap().affected, 3);
        assert!(repo.pending(100).await.unwrap().is_empty());
    }
}
