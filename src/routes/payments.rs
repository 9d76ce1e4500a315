use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::payments::{
        CalculateFeeRequest, FeeCalculation, PaymentList, PaymentMethodList, PaymentReceipt,
        ProcessPaymentRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    routes::params::PaymentHistoryQuery,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/methods", get(payment_methods))
        .route("/calculate-fee", post(calculate_fee))
        .route("/process", post(process_payment))
        .route("/status/{transaction_id}", get(payment_status))
        .route("/history", get(payment_history))
}

#[utoipa::path(
    get,
    path = "/api/payments/methods",
    responses(
        (status = 200, description = "Supported payment methods", body = ApiResponse<PaymentMethodList>)
    ),
    tag = "Payments"
)]
pub async fn payment_methods() -> Json<ApiResponse<PaymentMethodList>> {
    Json(payment_service::list_methods())
}

#[utoipa::path(
    post,
    path = "/api/payments/calculate-fee",
    request_body = CalculateFeeRequest,
    responses(
        (status = 200, description = "Fee for amount and method", body = ApiResponse<FeeCalculation>),
        (status = 400, description = "Invalid amount or method")
    ),
    tag = "Payments"
)]
pub async fn calculate_fee(
    Json(payload): Json<CalculateFeeRequest>,
) -> AppResult<Json<ApiResponse<FeeCalculation>>> {
    let resp = payment_service::calculate_fee(payload)?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/process",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Payment approved", body = ApiResponse<PaymentReceipt>),
        (status = 400, description = "Invalid method, card data or amount"),
        (status = 402, description = "Payment declined"),
        (status = 403, description = "Booking belongs to another user"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking already paid, cancelled or changed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProcessPaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentReceipt>>> {
    let resp = payment_service::process_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/status/{transaction_id}",
    params(("transaction_id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Payment record", body = ApiResponse<Payment>),
        (status = 403, description = "Payment belongs to another user"),
        (status = 404, description = "Payment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::payment_status(&state, &user, &transaction_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/history",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by transaction status")
    ),
    responses(
        (status = 200, description = "Payments across the user's bookings", body = ApiResponse<PaymentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentHistoryQuery>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::payment_history(&state, &user, query).await?;
    Ok(Json(resp))
}
