//! HTTP surface of the ledger
//!
//! Handlers only parse requests, call into the store or the processor, and map results to
//! status codes. Every error body has the shape `{"error": <code>, "message": <text>}`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::account_store::AccountStore;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::operation_types::OperationTypeRegistry;
use crate::transaction_processor::TransactionProcessor;
use crate::types::{Account, AccountId, Amount, OperationType, OperationTypeId, Transaction};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub document_number: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: AccountId,
    pub operation_type_id: OperationTypeId,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

/// Everything a handler can fail with
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    BadRequest { code: &'static str, message: String },
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            code: "invalid_body",
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest {
            code: "invalid_path",
            message: rejection.body_text(),
        }
    }
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::DuplicateDocument(_) => StatusCode::CONFLICT,
        LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::InvalidDocument
        | LedgerError::UnknownOperationType(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Ledger(err) => json_error(status_for(&err), err.code(), err.to_string()),
            ApiError::BadRequest { code, message } => {
                json_error(StatusCode::BAD_REQUEST, code, message)
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn AccountStore>,
    processor: Arc<TransactionProcessor>,
    registry: Arc<OperationTypeRegistry>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccountStore>,
        processor: Arc<TransactionProcessor>,
        registry: Arc<OperationTypeRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            processor,
            registry,
            clock,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/accounts", post(create_account))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/balance", get(get_balance))
        .route("/accounts/:id/transactions", get(list_transactions))
        .route("/transactions", post(create_transaction))
        .route("/operation-types", get(list_operation_types))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "service is healthy" }))
}

async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let Json(request) = payload?;
    let account = state
        .store
        .create_account(&request.document_number, state.clock.now())?;

    info!(
        "Created account (account = {}, document = {})",
        account.id, account.document_number
    );
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
) -> ApiResult<Json<Account>> {
    let Path(id) = id?;
    Ok(Json(state.store.account(id)?))
}

async fn get_balance(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
) -> ApiResult<Json<BalanceResponse>> {
    let Path(id) = id?;
    let balance = state.store.balance(id)?;
    Ok(Json(BalanceResponse {
        account_id: id,
        balance,
    }))
}

async fn list_transactions(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
) -> ApiResult<Json<ListResponse<Transaction>>> {
    let Path(id) = id?;
    let items = state.store.transactions(id)?;
    Ok(Json(ListResponse { items }))
}

async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let Json(request) = payload?;
    let transaction = state.processor.post(
        request.account_id,
        request.operation_type_id,
        request.amount,
    )?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn list_operation_types(State(state): State<AppState>) -> Json<ListResponse<OperationType>> {
    Json(ListResponse {
        items: state.registry.all(),
    })
}
