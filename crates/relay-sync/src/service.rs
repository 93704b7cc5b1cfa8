//! # Sync Service
//!
//! The operations the consumer drives, in the order it drives them.
//!
//! ## Delivery Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   refresh_from_source()          ERP ──► buffer tables (PENDING rows)  │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   pending_customers(limit)       read, no side effects                 │
//! │   pending_invoices(limit)        read, no side effects                 │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   consumer imports the page                                            │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   mark_*_synced(ids)             PENDING ──► SYNCED (pending rows only)│
//! │            │                                                            │
//! │            └──► next read no longer returns them                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Input is validated before the store is touched, so a rejected call never
//! mutates anything. Delivery is at-least-once until acknowledged: a consumer
//! that crashes between import and acknowledgement receives the page again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use relay_core::validation::{resolve_limit, validate_id_list};
use relay_core::{
    Customer, InvoiceLayout, InvoiceSelector, InvoiceTransferUnit, MarkSyncedOutcome, SyncStats,
    DEFAULT_CUSTOMER_LIMIT, DEFAULT_INVOICE_LIMIT,
};
use relay_db::BufferStore;

use crate::error::{SyncError, SyncResult};
use crate::refresh::BufferRefresher;

/// Default bound for one refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of a successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Summary from the refresher.
    pub summary: String,
    /// Statistics computed right after the refresh.
    pub stats: SyncStats,
    pub elapsed_ms: u64,
}

/// Orchestrates validation, the buffer store and the refresher.
///
/// Cheap to clone; clones share the store and the refresher.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn BufferStore>,
    refresher: Arc<dyn BufferRefresher>,
    refresh_timeout: Duration,
}

impl SyncService {
    /// Creates a service over `store`, refreshing with `refresher`.
    pub fn new(store: Arc<dyn BufferStore>, refresher: Arc<dyn BufferRefresher>) -> Self {
        SyncService {
            store,
            refresher,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Sets the refresh timeout.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Invoice layout of the underlying store.
    pub fn layout(&self) -> InvoiceLayout {
        self.store.layout()
    }

    /// Checks store connectivity.
    pub async fn ping(&self) -> SyncResult<DateTime<Utc>> {
        Ok(self.store.ping().await?)
    }

    /// Current delivery statistics.
    pub async fn stats(&self) -> SyncResult<SyncStats> {
        Ok(self.store.stats().await?)
    }

    // =========================================================================
    // Export Cursor
    // =========================================================================

    /// Pending customers, oldest first. `None` means the default page size.
    pub async fn pending_customers(&self, limit: Option<i64>) -> SyncResult<Vec<Customer>> {
        let limit = resolve_limit(limit, DEFAULT_CUSTOMER_LIMIT)?;

        let customers = self.store.pending_customers(limit).await?;

        debug!(limit = limit, count = customers.len(), "Served pending customers");
        Ok(customers)
    }

    /// Pending invoice transfer units, oldest first.
    ///
    /// `limit` counts invoices, not installments.
    pub async fn pending_invoices(
        &self,
        limit: Option<i64>,
    ) -> SyncResult<Vec<InvoiceTransferUnit>> {
        let limit = resolve_limit(limit, DEFAULT_INVOICE_LIMIT)?;

        let invoices = self.store.pending_invoices(limit).await?;

        debug!(
            limit = limit,
            count = invoices.len(),
            layout = %self.store.layout(),
            "Served pending invoices"
        );
        Ok(invoices)
    }

    // =========================================================================
    // Sync State Tracker
    // =========================================================================

    /// Acknowledges customers.
    ///
    /// ## Returns
    /// Customers that moved from pending to synced. Unknown and already
    /// synced ids are not an error; they simply don't count.
    pub async fn mark_customers_synced(&self, ids: &[String]) -> SyncResult<u64> {
        validate_id_list("customer_ids", ids)?;

        let affected = self.store.mark_customers_synced(ids).await?;

        info!(
            requested = ids.len(),
            affected = affected,
            "Customers marked as synced"
        );
        Ok(affected)
    }

    /// Acknowledges invoices (and their due-dates).
    pub async fn mark_invoices_synced(
        &self,
        selector: &InvoiceSelector,
    ) -> SyncResult<MarkSyncedOutcome> {
        validate_id_list(selector.field(), selector.keys())?;

        let outcome = self.store.mark_invoices_synced(selector).await?;

        info!(
            selector = selector.field(),
            requested = selector.keys().len(),
            affected = outcome.affected,
            due_dates_affected = outcome.due_dates_affected,
            "Invoices marked as synced"
        );
        Ok(outcome)
    }

    // =========================================================================
    // Refresh Trigger
    // =========================================================================

    /// Repopulates the buffer from the ERP, then computes statistics.
    ///
    /// On failure or timeout statistics are skipped. The refresh future is
    /// dropped on timeout, which rolls back a script transaction or kills
    /// the exporter process.
    pub async fn refresh_from_source(&self) -> SyncResult<RefreshReport> {
        let source = self.refresher.describe();
        info!(source = %source, "Refreshing buffer from ERP");

        let started = Instant::now();

        let summary = match tokio::time::timeout(self.refresh_timeout, self.refresher.refresh()).await
        {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                warn!(source = %source, error = %e, "Buffer refresh failed");
                return Err(e);
            }
            Err(_) => {
                warn!(
                    source = %source,
                    timeout_secs = self.refresh_timeout.as_secs(),
                    "Buffer refresh timed out"
                );
                return Err(SyncError::RefreshTimedOut(self.refresh_timeout.as_secs()));
            }
        };

        let stats = self.store.stats().await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            source = %source,
            elapsed_ms = elapsed_ms,
            pending_customers = stats.customers.pending,
            pending_invoices = stats.invoices.pending,
            pending_amount = %stats.pending_amount(),
            "Buffer refreshed"
        );

        Ok(RefreshReport {
            summary,
            stats,
            elapsed_ms,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::{SqlScriptRefresher, UnconfiguredRefresher};
    use async_trait::async_trait;
    use relay_core::ValidationError;
    use relay_db::{Database, DbConfig};

    const A1_ROWS: &str = "
        INSERT INTO buffer_customers (id, company_name, created_at) VALUES
            ('C001', 'Acme', '2024-01-01T08:00:00Z'),
            ('C002', 'Globex', '2024-01-01T08:01:00Z');
        INSERT INTO buffer_invoices (id, invoice_number, customer_id, invoice_date, due_date, amount_cents, created_at) VALUES
            ('P2', 'A1', 'C001', '2024-01-02', '2024-02-10', 15000, '2024-01-01T09:00:00Z'),
            ('P1', 'A1', 'C001', '2024-01-02', '2024-01-10', 10000, '2024-01-01T09:00:00Z');";

    struct SlowRefresher;

    #[async_trait]
    impl BufferRefresher for SlowRefresher {
        async fn refresh(&self) -> SyncResult<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    async fn setup() -> (Database, SyncService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.apply_refresh_script(A1_ROWS).await.unwrap();
        let service = SyncService::new(Arc::new(db.clone()), Arc::new(UnconfiguredRefresher));
        (db, service)
    }

    #[tokio::test]
    async fn test_invoice_cycle() {
        let (_db, service) = setup().await;

        let invoices = service.pending_invoices(None).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_number, "A1");
        assert_eq!(invoices[0].total_amount_cents, 25000);
        let dues: Vec<&str> = invoices[0].due_dates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(dues, vec!["P1", "P2"]);

        let selector = InvoiceSelector::Numbers(vec!["A1".to_string()]);
        let outcome = service.mark_invoices_synced(&selector).await.unwrap();
        assert_eq!(outcome.affected, 2);

        assert!(service.pending_invoices(None).await.unwrap().is_empty());

        // Repeated acknowledgement succeeds and changes nothing.
        let before = service.stats().await.unwrap();
        let again = service.mark_invoices_synced(&selector).await.unwrap();
        assert_eq!(again.affected, 0);
        assert_eq!(service.stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_customer_cycle_respects_limit() {
        let (_db, service) = setup().await;

        let page = service.pending_customers(Some(1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "C001");

        let affected = service
            .mark_customers_synced(&["C001".to_string()])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let page = service.pending_customers(None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "C002");
    }

    #[tokio::test]
    async fn test_empty_id_list_is_rejected_without_mutation() {
        let (_db, service) = setup().await;
        let before = service.stats().await.unwrap();

        let err = service.mark_customers_synced(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::Required { .. })
        ));

        let err = service
            .mark_invoices_synced(&InvoiceSelector::Ids(vec![]))
            .await
            .unwrap_err();
        assert!(err.is_client_error());

        assert_eq!(service.stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_invalid_limit_is_rejected() {
        let (_db, service) = setup().await;
        assert!(service.pending_customers(Some(0)).await.unwrap_err().is_client_error());
        assert!(service.pending_invoices(Some(-1)).await.unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn test_stats_invariant() {
        let (_db, service) = setup().await;
        service
            .mark_invoices_synced(&InvoiceSelector::Ids(vec!["P1".to_string()]))
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        for counts in [stats.customers, stats.invoices, stats.due_dates] {
            assert_eq!(counts.pending + counts.synced, counts.total);
        }
        assert_eq!(stats.invoices.pending, 1);
        assert_eq!(stats.pending_amount_cents, 15000);
    }

    #[tokio::test]
    async fn test_refresh_runs_script_then_reports_stats() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let refresher = SqlScriptRefresher::new(db.clone(), A1_ROWS);
        let service = SyncService::new(Arc::new(db), Arc::new(refresher));

        let report = service.refresh_from_source().await.unwrap();

        assert_eq!(report.stats.customers.pending, 2);
        assert_eq!(report.stats.invoices.total, 1);
        assert_eq!(report.stats.pending_amount_cents, 25000);
    }

    #[tokio::test]
    async fn test_refresh_failure_skips_stats() {
        let (_db, service) = setup().await;

        let err = service.refresh_from_source().await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamRefreshFailure(_)));

        // Buffer untouched.
        assert_eq!(service.stats().await.unwrap().customers.total, 2);
    }

    #[tokio::test]
    async fn test_refresh_timeout() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = SyncService::new(Arc::new(db), Arc::new(SlowRefresher))
            .with_refresh_timeout(Duration::from_millis(50));

        let err = service.refresh_from_source().await.unwrap_err();
        assert!(matches!(err, SyncError::RefreshTimedOut(_)));
    }
}
