//! # `/sync` Routes
//!
//! ```text
//! GET  /sync/ping                     store connectivity
//! GET  /sync/stats                    delivery statistics
//! GET  /sync/customers?limit=N        pending customers (default 50)
//! GET  /sync/invoices?limit=N         pending invoice units (default 100)
//! POST /sync/customers/mark-synced    { "customer_ids": [...] }
//! POST /sync/invoices/mark-synced     { "invoice_ids": [...] } | { "invoice_numbers": [...] }
//! POST /sync/refresh-from-sage        refresh buffer, then statistics
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{Customer, InvoiceSelector, InvoiceTransferUnit, ValidationError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let sync = Router::new()
        .route("/ping", get(ping))
        .route("/stats", get(stats))
        .route("/customers", get(pending_customers))
        .route("/invoices", get(pending_invoices))
        .route("/customers/mark-synced", post(mark_customers_synced))
        .route("/invoices/mark-synced", post(mark_invoices_synced))
        .route("/refresh-from-sage", post(refresh_from_source));

    Router::new()
        .nest("/sync", sync)
        .fallback(not_found)
        .with_state(state)
}

// =============================================================================
// Request Types
// =============================================================================

/// `?limit=N` on the export reads.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkCustomersRequest {
    #[serde(default)]
    pub customer_ids: Vec<String>,
}

/// Either `invoice_ids` or `invoice_numbers`, not both.
#[derive(Debug, Default, Deserialize)]
pub struct MarkInvoicesRequest {
    #[serde(default)]
    pub invoice_ids: Vec<String>,
    #[serde(default)]
    pub invoice_numbers: Vec<String>,
}

impl MarkInvoicesRequest {
    /// Resolves the request into a selector.
    ///
    /// An empty request selects no invoice numbers, which the service rejects.
    pub fn into_selector(self) -> Result<InvoiceSelector, ValidationError> {
        match (self.invoice_ids.is_empty(), self.invoice_numbers.is_empty()) {
            (false, false) => Err(ValidationError::InvalidFormat {
                field: "invoice_ids".to_string(),
                reason: "send either invoice_ids or invoice_numbers, not both".to_string(),
            }),
            (false, true) => Ok(InvoiceSelector::Ids(self.invoice_ids)),
            _ => Ok(InvoiceSelector::Numbers(self.invoice_numbers)),
        }
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// `Query` whose rejection is a 400 envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// `Json` whose rejection is a 400 envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn ping(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let now = state
        .service
        .ping()
        .await
        .map_err(state.fail("Database connection failed"))?;

    Ok(Envelope::message("Relay sync service operational").with_timestamp(now))
}

async fn stats(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let stats = state
        .service
        .stats()
        .await
        .map_err(state.fail("Failed to fetch statistics"))?;

    Ok(Envelope::stats(stats))
}

async fn pending_customers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Envelope<Vec<Customer>>, ApiError> {
    let customers = state
        .service
        .pending_customers(query.limit)
        .await
        .map_err(state.fail("Failed to fetch customers"))?;

    Ok(Envelope::list(customers))
}

async fn pending_invoices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Envelope<Vec<InvoiceTransferUnit>>, ApiError> {
    let invoices = state
        .service
        .pending_invoices(query.limit)
        .await
        .map_err(state.fail("Failed to fetch invoices"))?;

    Ok(Envelope::list(invoices))
}

async fn mark_customers_synced(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MarkCustomersRequest>,
) -> Result<Envelope, ApiError> {
    let affected = state
        .service
        .mark_customers_synced(&request.customer_ids)
        .await
        .map_err(state.fail("Failed to mark customers as synced"))?;

    Ok(Envelope::message("Customers marked as synced").with_affected(affected))
}

async fn mark_invoices_synced(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MarkInvoicesRequest>,
) -> Result<Envelope, ApiError> {
    let selector = request
        .into_selector()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let outcome = state
        .service
        .mark_invoices_synced(&selector)
        .await
        .map_err(state.fail("Failed to mark invoices as synced"))?;

    Ok(Envelope::message("Invoices marked as synced")
        .with_affected(outcome.affected)
        .with_due_dates_affected(outcome.due_dates_affected))
}

async fn refresh_from_source(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let report = state
        .service
        .refresh_from_source()
        .await
        .map_err(state.fail("Failed to refresh buffer from ERP"))?;

    debug!(elapsed_ms = report.elapsed_ms, summary = %report.summary, "Refresh served");

    Ok(Envelope::message("Buffer refreshed from ERP").with_stats(report.stats))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Envelope::failure("Route not found", None))
}

// =============================================================================
// Unit Tests
// =============================================================================
