//! # Customer Repository
//!
//! Export cursor and sync state transitions for `buffer_customers`.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use relay_core::{Customer, SyncState};

use crate::error::DbResult;
use crate::repository::{push_in_list, PENDING};

const CUSTOMER_COLUMNS: &str = "id, code, company_name, contact_name, email, phone, address, \
     payment_delay_days, currency, credit_limit_cents, max_days_overdue, risk_level, notes, \
     is_active, synced, sync_date, created_at";

/// Row of `buffer_customers` as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRecord {
    pub id: String,
    pub code: Option<String>,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_delay_days: Option<i64>,
    pub currency: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub max_days_overdue: Option<i64>,
    pub risk_level: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub synced: Option<i64>,
    pub sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CustomerRecord> for Customer {
    fn from(record: CustomerRecord) -> Self {
        Customer {
            id: record.id,
            code: record.code,
            company_name: record.company_name,
            contact_name: record.contact_name,
            email: record.email,
            phone: record.phone,
            address: record.address,
            payment_delay_days: record.payment_delay_days,
            currency: record.currency,
            credit_limit_cents: record.credit_limit_cents,
            max_days_overdue: record.max_days_overdue,
            risk_level: record.risk_level,
            notes: record.notes,
            is_active: record.is_active,
            sync_state: SyncState::from_flag(record.synced),
            sync_date: record.sync_date,
            created_at: record.created_at,
        }
    }
}

/// Repository for buffered customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets up to `limit` pending customers, oldest first.
    ///
    /// Ties on `created_at` are broken by id so pages are stable.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<Customer>> {
        debug!(limit = limit, "Reading pending customers");

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM buffer_customers \
             WHERE {PENDING} \
             ORDER BY julianday(created_at) ASC, id ASC \
             LIMIT ?1"
        );

        let records = sqlx::query_as::<_, CustomerRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Customer::from).collect())
    }

    /// Gets a customer by id, whatever its sync state.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM buffer_customers WHERE id = ?1");

        let record = sqlx::query_as::<_, CustomerRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Customer::from))
    }

    /// Marks the pending customers among `ids` as synced.
    ///
    /// One UPDATE statement. Unknown or already synced ids are skipped.
    ///
    /// ## Returns
    /// Number of customers that actually changed state.
    pub async fn mark_synced(&self, ids: &[String], now: DateTime<Utc>) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        debug!(requested = ids.len(), "Marking customers synced");

        let mut builder =
            QueryBuilder::<Sqlite>::new("UPDATE buffer_customers SET synced = 1, sync_date = ");
        builder.push_bind(now);
        builder.push(format!(" WHERE {PENDING} AND id IN "));
        push_in_list(&mut builder, ids);

        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    /// Lands a customer from the ERP.
    ///
    /// A new row takes the record's sync state. An existing row gets its
    /// business fields overwritten while its sync state is left alone.
    pub async fn upsert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Upserting customer");

        sqlx::query(
            r#"
            INSERT INTO buffer_customers (
                id, code, company_name, contact_name, email, phone, address,
                payment_delay_days, currency, credit_limit_cents, max_days_overdue,
                risk_level, notes, is_active, synced, sync_date, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17
            )
            ON CONFLICT (id) DO UPDATE SET
                code = excluded.code,
                company_name = excluded.company_name,
                contact_name = excluded.contact_name,
                email = excluded.email,
                phone = excluded.phone,
                address = excluded.address,
                payment_delay_days = excluded.payment_delay_days,
                currency = excluded.currency,
                credit_limit_cents = excluded.credit_limit_cents,
                max_days_overdue = excluded.max_days_overdue,
                risk_level = excluded.risk_level,
                notes = excluded.notes,
                is_active = excluded.is_active
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.code)
        .bind(&customer.company_name)
        .bind(&customer.contact_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.payment_delay_days)
        .bind(&customer.currency)
        .bind(customer.credit_limit_cents)
        .bind(customer.max_days_overdue)
        .bind(&customer.risk_level)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(customer.sync_state.flag())
        .bind(customer.sync_date)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts all buffered customers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buffer_customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
