//! # Statistics Repository
//!
//! Delivery progress counters over the buffer tables.
//!
//! Invoices are counted by distinct invoice number. A number is pending as
//! long as any of its rows is, so `pending + synced == total` holds even
//! while an invoice is only partly acknowledged.

use sqlx::{Sqlite, SqlitePool, Transaction};

use relay_core::{EntityCounts, InvoiceLayout, SyncStats};

use crate::error::DbResult;
use crate::repository::PENDING;

#[derive(Debug, sqlx::FromRow)]
struct CountsRecord {
    total: i64,
    synced: i64,
}

impl From<CountsRecord> for EntityCounts {
    fn from(record: CountsRecord) -> Self {
        EntityCounts::from_total_synced(record.total, record.synced)
    }
}

/// Repository for buffer statistics.
#[derive(Debug, Clone)]
pub struct StatsRepository {
    pool: SqlitePool,
}

impl StatsRepository {
    /// Creates a new StatsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StatsRepository { pool }
    }

    /// Computes statistics for the given layout.
    ///
    /// All counters come from one read transaction.
    pub async fn compute(&self, layout: InvoiceLayout) -> DbResult<SyncStats> {
        let mut tx = self.pool.begin().await?;

        let customers = counts(
            &mut tx,
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN synced = 1 THEN 1 ELSE 0 END), 0) AS synced \
             FROM buffer_customers",
        )
        .await?;

        let stats = match layout {
            InvoiceLayout::Rows => {
                let invoices = counts(
                    &mut tx,
                    "WITH per_number AS ( \
                         SELECT invoice_number, \
                                MAX(CASE WHEN synced = 1 THEN 0 ELSE 1 END) AS any_pending \
                         FROM buffer_invoices \
                         WHERE invoice_number IS NOT NULL AND TRIM(invoice_number) <> '' \
                         GROUP BY invoice_number \
                     ) \
                     SELECT COUNT(*) AS total, \
                            COALESCE(SUM(CASE WHEN any_pending = 0 THEN 1 ELSE 0 END), 0) AS synced \
                     FROM per_number",
                )
                .await?;

                let due_dates = counts(
                    &mut tx,
                    "SELECT COUNT(*) AS total, \
                     COALESCE(SUM(CASE WHEN synced = 1 THEN 1 ELSE 0 END), 0) AS synced \
                     FROM buffer_invoices",
                )
                .await?;

                let pending_amount_cents = pending_amount(
                    &mut tx,
                    &format!(
                        "SELECT COALESCE(SUM(amount_cents), 0) FROM buffer_invoices WHERE {PENDING}"
                    ),
                )
                .await?;

                SyncStats {
                    customers,
                    invoices,
                    due_dates,
                    pending_amount_cents,
                }
            }
            InvoiceLayout::Normalized => {
                let invoices = counts(
                    &mut tx,
                    &format!(
                        "WITH per_number AS ( \
                             SELECT h.invoice_number, \
                                    MAX(CASE \
                                        WHEN h.synced = 1 AND NOT EXISTS ( \
                                            SELECT 1 FROM buffer_due_dates \
                                            WHERE invoice_id = h.id AND {PENDING} \
                                        ) THEN 0 ELSE 1 END) AS any_pending \
                             FROM buffer_invoice_headers h \
                             WHERE h.invoice_number IS NOT NULL AND TRIM(h.invoice_number) <> '' \
                             GROUP BY h.invoice_number \
                         ) \
                         SELECT COUNT(*) AS total, \
                                COALESCE(SUM(CASE WHEN any_pending = 0 THEN 1 ELSE 0 END), 0) AS synced \
                         FROM per_number"
                    ),
                )
                .await?;

                let due_dates = counts(
                    &mut tx,
                    "SELECT COUNT(*) AS total, \
                     COALESCE(SUM(CASE WHEN synced = 1 THEN 1 ELSE 0 END), 0) AS synced \
                     FROM buffer_due_dates",
                )
                .await?;

                let pending_amount_cents = pending_amount(
                    &mut tx,
                    &format!(
                        "SELECT COALESCE(SUM(amount_cents), 0) FROM buffer_due_dates WHERE {PENDING}"
                    ),
                )
                .await?;

                SyncStats {
                    customers,
                    invoices,
                    due_dates,
                    pending_amount_cents,
                }
            }
        };

        tx.commit().await?;

        Ok(stats)
    }
}

async fn counts(tx: &mut Transaction<'_, Sqlite>, sql: &str) -> DbResult<EntityCounts> {
    let record = sqlx::query_as::<_, CountsRecord>(sql)
        .fetch_one(&mut **tx)
        .await?;

    Ok(record.into())
}

async fn pending_amount(tx: &mut Transaction<'_, Sqlite>, sql: &str) -> DbResult<i64> {
    let amount: i64 = sqlx::query_scalar(sql).fetch_one(&mut **tx).await?;
    Ok(amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup(layout: InvoiceLayout) -> Database {
        Database::new(DbConfig::in_memory().invoice_layout(layout))
            .await
            .unwrap()
    }

    async fn exec(db: &Database, sql: &str) {
        sqlx::raw_sql(sql).execute(db.pool()).await.unwrap();
    }

    fn assert_consistent(counts: EntityCounts) {
        assert_eq!(counts.pending + counts.synced, counts.total);
    }

    #[tokio::test]
    async fn test_empty_buffer() {
        let db = setup(InvoiceLayout::Rows).await;
        let stats = db.statistics().compute(InvoiceLayout::Rows).await.unwrap();
        assert_eq!(stats, SyncStats::default());
    }

    #[tokio::test]
    async fn test_rows_layout_counts() {
        let db = setup(InvoiceLayout::Rows).await;
        exec(
            &db,
            "INSERT INTO buffer_customers (id, company_name, synced) VALUES
                ('C001', 'Acme', 1), ('C002', 'Globex', 0), ('C003', 'Initech', NULL);
             INSERT INTO buffer_invoices (id, invoice_number, customer_id, invoice_date, due_date, amount_cents, synced) VALUES
                ('P1', 'A1', 'C001', '2024-01-02', '2024-01-10', 10000, 1),
                ('P2', 'A1', 'C001', '2024-01-02', '2024-02-10', 15000, 0),
                ('P3', 'B1', 'C002', '2024-01-02', '2024-01-10', 500, 1),
                ('P4', NULL, 'C002', '2024-01-02', '2024-01-10', 700, NULL);",
        )
        .await;

        let stats = db.statistics().compute(InvoiceLayout::Rows).await.unwrap();

        assert_eq!(stats.customers, EntityCounts { total: 3, synced: 1, pending: 2 });
        // A1 is partly acknowledged, so it still counts as pending.
        assert_eq!(stats.invoices, EntityCounts { total: 2, synced: 1, pending: 1 });
        assert_eq!(stats.due_dates, EntityCounts { total: 4, synced: 2, pending: 2 });
        assert_eq!(stats.pending_amount_cents, 15700);
        assert_consistent(stats.customers);
        assert_consistent(stats.invoices);
        assert_consistent(stats.due_dates);
    }

    #[tokio::test]
    async fn test_normalized_layout_counts() {
        let db = setup(InvoiceLayout::Normalized).await;
        exec(
            &db,
            "INSERT INTO buffer_invoice_headers (id, invoice_number, customer_id, invoice_date, total_amount_cents, synced) VALUES
                ('H1', 'A1', 'C001', '2024-01-02', 25000, 1),
                ('H2', 'B1', 'C001', '2024-01-02', 500, 1),
                ('H3', 'C1', 'C001', '2024-01-02', 900, 0);
             INSERT INTO buffer_due_dates (id, invoice_id, due_date, amount_cents, synced) VALUES
                ('D1', 'H1', '2024-01-10', 10000, 1),
                ('D2', 'H1', '2024-02-10', 15000, 0),
                ('D3', 'H2', '2024-01-10', 500, 1),
                ('D4', 'H3', '2024-01-10', 900, 0);",
        )
        .await;

        let stats = db.statistics().compute(InvoiceLayout::Normalized).await.unwrap();

        assert_eq!(stats.invoices, EntityCounts { total: 3, synced: 1, pending: 2 });
        assert_eq!(stats.due_dates, EntityCounts { total: 4, synced: 2, pending: 2 });
        assert_eq!(stats.pending_amount_cents, 15900);
        assert_consistent(stats.invoices);
    }
}
