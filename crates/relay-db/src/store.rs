//! # Buffer Store
//!
//! The seam between the sync service and SQLite.
//!
//! ```text
//! SyncService ──► Arc<dyn BufferStore>
//!                        │
//!                        ▼
//!                   Database ── layout? ──┬── Rows       → InvoiceRowRepository
//!                                         └── Normalized → NormalizedInvoiceRepository
//! ```
//!
//! Nothing is cached: every call re-reads the tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relay_core::{
    Customer, InvoiceLayout, InvoiceSelector, InvoiceTransferUnit, MarkSyncedOutcome, SyncStats,
};

use crate::error::DbResult;
use crate::pool::Database;

/// Persistence operations the sync service relies on.
///
/// Callers validate their input first; implementations treat an empty id
/// list as a no-op.
#[async_trait]
pub trait BufferStore: Send + Sync {
    /// Invoice layout this store reads.
    fn layout(&self) -> InvoiceLayout;

    /// Round-trips the store and returns the time of the check.
    async fn ping(&self) -> DbResult<DateTime<Utc>>;

    /// Up to `limit` pending customers, oldest first.
    async fn pending_customers(&self, limit: u32) -> DbResult<Vec<Customer>>;

    /// Flips pending customers to synced, returning how many changed.
    async fn mark_customers_synced(&self, ids: &[String]) -> DbResult<u64>;

    /// Up to `limit` pending invoice groups, oldest first.
    async fn pending_invoices(&self, limit: u32) -> DbResult<Vec<InvoiceTransferUnit>>;

    /// Flips selected invoices (and their due-dates) to synced.
    async fn mark_invoices_synced(&self, selector: &InvoiceSelector)
        -> DbResult<MarkSyncedOutcome>;

    /// Delivery progress counters.
    async fn stats(&self) -> DbResult<SyncStats>;
}

#[async_trait]
impl BufferStore for Database {
    fn layout(&self) -> InvoiceLayout {
        Database::layout(self)
    }

    async fn ping(&self) -> DbResult<DateTime<Utc>> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(self.pool())
            .await?;
        Ok(Utc::now())
    }

    async fn pending_customers(&self, limit: u32) -> DbResult<Vec<Customer>> {
        self.customers().pending(limit).await
    }

    async fn mark_customers_synced(&self, ids: &[String]) -> DbResult<u64> {
        self.customers().mark_synced(ids, Utc::now()).await
    }

    async fn pending_invoices(&self, limit: u32) -> DbResult<Vec<InvoiceTransferUnit>> {
        match Database::layout(self) {
            InvoiceLayout::Rows => self.invoice_rows().pending(limit).await,
            InvoiceLayout::Normalized => self.normalized_invoices().pending(limit).await,
        }
    }

    async fn mark_invoices_synced(
        &self,
        selector: &InvoiceSelector,
    ) -> DbResult<MarkSyncedOutcome> {
        let now = Utc::now();
        match Database::layout(self) {
            InvoiceLayout::Rows => self.invoice_rows().mark_synced(selector, now).await,
            InvoiceLayout::Normalized => {
                self.normalized_invoices().mark_synced(selector, now).await
            }
        }
    }

    async fn stats(&self) -> DbResult<SyncStats> {
        self.statistics().compute(Database::layout(self)).await
    }
}
