use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::{
    models::CreateTransactionCommand,
    stats,
    storage::{StorageBackend, StorageError},
};

pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/accounts", get(get_accounts))
        .route("/api/accounts/:id", get(get_account))
        .route("/api/accounts/:id/balance", put(update_balance))
        .route("/api/summary", get(get_summary))
        .route(
            "/api/transactions",
            get(get_transactions).post(create_transaction),
        )
        .route("/api/transactions/grouped", get(get_transactions_grouped))
        .route("/api/statistics", get(get_statistics))
        .route("/api/statistics/chart", get(get_chart_data))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Storage(StorageError::AccountNotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error,
            }),
        )
            .into_response()
    }
}

/// `{success: true, data: ...}` envelope shared by every endpoint.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

#[derive(Serialize)]
struct Paginated<T: Serialize> {
    success: bool,
    data: T,
    pagination: Pagination,
}

#[derive(Serialize)]
struct Pagination {
    page: u32,
    per_page: u32,
    total: u64,
    pages: u64,
}

pub fn page_count(total: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    (total + per_page as u64 - 1) / per_page as u64
}

async fn get_accounts(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.storage.list_accounts()?))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.storage.get_account(id)?))
}

#[derive(Debug, Deserialize)]
struct UpdateBalanceRequest {
    balance: Option<f64>,
}

/// Direct balance overwrite. Bypasses the ledger; a body without
/// `balance` leaves the account untouched and echoes it back.
async fn update_balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = match request.balance {
        Some(balance) => state.storage.set_balance(id, balance)?,
        None => state.storage.get_account(id)?,
    };
    Ok(ok(account))
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.storage.list_accounts()?;
    Ok(ok(stats::summarize(accounts)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (transactions, total) = state.storage.list_transactions(query.page, query.per_page)?;
    Ok(Json(Paginated {
        success: true,
        data: transactions,
        pagination: Pagination {
            page: query.page,
            per_page: query.per_page,
            total,
            pages: page_count(total, query.per_page),
        },
    }))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(command): Json<CreateTransactionCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.storage.create_transaction(&command)?;
    tracing::info!(
        transaction_id = transaction.id,
        account_id = transaction.account_id,
        amount = transaction.amount,
        "Transaction created"
    );
    Ok(ok(transaction))
}

async fn get_transactions_grouped(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = state.storage.list_all_transactions()?;
    Ok(ok(stats::group_by_day(&transactions)))
}

async fn get_statistics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let today = time::OffsetDateTime::now_utc().date();
    Ok(ok(stats::statistics(state.storage.as_ref(), today)?))
}

#[derive(Debug, Deserialize)]
struct ChartQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn get_chart_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let today = time::OffsetDateTime::now_utc().date();
    Ok(ok(stats::chart_series(
        state.storage.as_ref(),
        today,
        query.days,
    )?))
}
