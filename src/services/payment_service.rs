use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;

use crate::{
    audit,
    dto::payments::{
        CalculateFeeRequest, FeeCalculation, PaymentList, PaymentMethodInfo, PaymentMethodList,
        PaymentReceipt, ProcessPaymentRequest,
    },
    entity::{
        bookings::{
            ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{
        MethodKind, Payment, PaymentMethod, PaymentStatus, REFUND_METHOD,
        TransactionStatus,
    },
    response::{ApiResponse, Meta},
    routes::params::PaymentHistoryQuery,
    services::{
        MAX_ID_ATTEMPTS,
        booking_service::{lock_booking, payment_from_entity},
        fees, ids, is_unique_violation, lifecycle,
        simulator::SimulationOutcome,
    },
    state::AppState,
};

pub const STATE_CHANGED_REASON: &str = "Booking state changed during processing";

/// Payment row to be written; the transaction id is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: i64,
    pub idempotency_key: Option<String>,
    pub external_transaction_id: Option<String>,
    pub amount: i64,
    pub fee: i64,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub payment_details: Option<Value>,
}

impl NewPayment {
    pub fn refund(booking_id: i64, amount: i64) -> Self {
        Self {
            booking_id,
            idempotency_key: None,
            external_transaction_id: None,
            amount,
            fee: 0,
            payment_method: REFUND_METHOD.into(),
            status: TransactionStatus::Success,
            failure_reason: None,
            payment_details: None,
        }
    }
}

pub fn list_methods() -> ApiResponse<PaymentMethodList> {
    let items = PaymentMethod::ALL
        .into_iter()
        .map(method_info)
        .collect();
    ApiResponse::ok(PaymentMethodList { items })
}

pub fn calculate_fee(payload: CalculateFeeRequest) -> AppResult<ApiResponse<FeeCalculation>> {
    if payload.amount <= 0 {
        return Err(AppError::BadRequest("Amount must be greater than 0".into()));
    }
    if payload.method.trim().is_empty() {
        return Err(AppError::BadRequest("Method is required".into()));
    }

    let (fee, total) = fees::payment_fee(payload.amount, &payload.method)
        .and_then(|fee| Some((fee, payload.amount.checked_add(fee)?)))
        .ok_or_else(amount_too_large)?;
    Ok(ApiResponse::ok(FeeCalculation {
        amount: payload.amount,
        fee,
        total,
        method: payload.method,
    }))
}

/// Charges a booking through the simulated gateway.
///
/// Validation happens without locks, the simulated charge runs outside any
/// transaction, and the result is written under a row lock after re-checking
/// the booking. A declined charge is stored as a failed payment and surfaces
/// as [`AppError::PaymentDeclined`].
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ProcessPaymentRequest,
) -> AppResult<ApiResponse<PaymentReceipt>> {
    let idempotency_key = payload
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);

    let booking = Bookings::find_by_id(payload.booking_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    lifecycle::ensure_owner(&booking, user.user_id)?;

    if let Some(key) = &idempotency_key {
        if let Some(existing) = find_by_idempotency_key(&state.orm, booking.id, key).await? {
            return replay(existing, &booking);
        }
    }

    lifecycle::ensure_payable(&booking)?;
    lifecycle::ensure_amount_matches(&booking, payload.amount)?;
    let method = state
        .simulator
        .validate(&payload.payment_method, payload.card_data.as_ref())
        .map_err(AppError::BadRequest)?;

    let (fee, total_charged) = fees::fee_rule(method)
        .charge(payload.amount)
        .ok_or_else(amount_too_large)?;

    let outcome = state
        .simulator
        .simulate(method.as_str(), total_charged, payload.card_data.as_ref())
        .await;
    if let SimulationOutcome::Invalid { reason } = outcome {
        return Err(AppError::BadRequest(reason));
    }

    let txn = state.orm.begin().await?;
    let booking = lock_booking(&txn, payload.booking_id).await?;

    if let Some(key) = &idempotency_key {
        if let Some(existing) = find_by_idempotency_key(&txn, booking.id, key).await? {
            return replay(existing, &booking);
        }
    }

    let recheck = lifecycle::ensure_payable(&booking);
    let mut new_payment = NewPayment {
        booking_id: booking.id,
        idempotency_key,
        external_transaction_id: None,
        amount: total_charged,
        fee,
        payment_method: method.as_str().into(),
        status: TransactionStatus::Failed,
        failure_reason: None,
        payment_details: None,
    };
    match (&recheck, outcome) {
        (Err(_), _) => {
            new_payment.failure_reason = Some(STATE_CHANGED_REASON.into());
        }
        (Ok(()), SimulationOutcome::Approved { external_id, details }) => {
            new_payment.status = TransactionStatus::Success;
            new_payment.external_transaction_id = Some(external_id);
            new_payment.payment_details = Some(details);
        }
        (Ok(()), SimulationOutcome::Declined { reason }) => {
            new_payment.failure_reason = Some(reason);
        }
        (Ok(()), SimulationOutcome::Invalid { reason }) => {
            return Err(AppError::BadRequest(reason));
        }
    }

    let payment = insert_payment(&txn, new_payment).await?;

    let booking = if payment.status == TransactionStatus::Success.as_str() {
        let status = lifecycle::status_after_payment(lifecycle::booking_status(&booking)?);
        let mut active: BookingActive = booking.into();
        active.payment_status = Set(PaymentStatus::Paid.as_str().into());
        active.status = Set(status.as_str().into());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?
    } else {
        booking
    };

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "payment_processed",
        "payments",
        serde_json::json!({
            "booking_id": booking.id,
            "transaction_id": payment.transaction_id,
            "status": payment.status,
        }),
    )
    .await;

    if let Err(err) = recheck {
        tracing::warn!(
            booking_id = booking.id,
            transaction_id = %payment.transaction_id,
            "booking changed while payment was processing"
        );
        return Err(err);
    }

    if payment.status == TransactionStatus::Success.as_str() {
        tracing::info!(
            booking_id = booking.id,
            transaction_id = %payment.transaction_id,
            method = %payment.payment_method,
            amount = payment.amount,
            "payment approved"
        );
    } else {
        tracing::warn!(
            booking_id = booking.id,
            transaction_id = %payment.transaction_id,
            method = %payment.payment_method,
            reason = ?payment.failure_reason,
            "payment declined"
        );
    }

    replay(payment, &booking)
}

pub async fn payment_status(
    state: &AppState,
    user: &AuthUser,
    transaction_id: &str,
) -> AppResult<ApiResponse<Payment>> {
    let payment = Payments::find()
        .filter(PaymentCol::TransactionId.eq(transaction_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let booking = Bookings::find_by_id(payment.booking_id)
        .one(&state.orm)
        .await?;
    match booking {
        Some(b) if b.user_id == user.user_id => {}
        _ => return Err(AppError::Forbidden),
    }

    Ok(ApiResponse::ok(payment_from_entity(payment)))
}

pub async fn payment_history(
    state: &AppState,
    user: &AuthUser,
    query: PaymentHistoryQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(BookingCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::Status.eq(status.clone()));
    }

    let finder = Payments::find()
        .inner_join(Bookings)
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt)
        .order_by_desc(PaymentCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let payments = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        PaymentList { items: payments },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Inserts a payment row inside a savepoint, regenerating the transaction id on collision.
pub(crate) async fn insert_payment(
    txn: &DatabaseTransaction,
    new: NewPayment,
) -> AppResult<PaymentModel> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let savepoint = txn.begin().await?;
        let inserted = PaymentActive {
            id: NotSet,
            booking_id: Set(new.booking_id),
            transaction_id: Set(ids::transaction_id()),
            idempotency_key: Set(new.idempotency_key.clone()),
            external_transaction_id: Set(new.external_transaction_id.clone()),
            amount: Set(new.amount),
            fee: Set(new.fee),
            payment_method: Set(new.payment_method.clone()),
            status: Set(new.status.as_str().into()),
            failure_reason: Set(new.failure_reason.clone()),
            payment_details: Set(new.payment_details.clone()),
            created_at: NotSet,
        }
        .insert(&savepoint)
        .await;

        match inserted {
            Ok(payment) => {
                savepoint.commit().await?;
                return Ok(payment);
            }
            Err(err)
                if attempt < MAX_ID_ATTEMPTS && is_unique_violation(&err, "transaction_id") =>
            {
                savepoint.rollback().await?;
                tracing::warn!(attempt, "transaction id collision, regenerating");
            }
            Err(err) if is_unique_violation(&err, "idempotency_key") => {
                return Err(AppError::Conflict(
                    "A payment with this idempotency key is already being processed".into(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn find_by_idempotency_key<C: ConnectionTrait>(
    conn: &C,
    booking_id: i64,
    key: &str,
) -> AppResult<Option<PaymentModel>> {
    let payment = Payments::find()
        .filter(
            Condition::all()
                .add(PaymentCol::BookingId.eq(booking_id))
                .add(PaymentCol::IdempotencyKey.eq(key)),
        )
        .one(conn)
        .await?;
    Ok(payment)
}

fn amount_too_large() -> AppError {
    AppError::BadRequest("Amount is too large".into())
}

/// Reports a recorded attempt: a receipt when it succeeded, a decline otherwise.
fn replay(payment: PaymentModel, booking: &BookingModel) -> AppResult<ApiResponse<PaymentReceipt>> {
    if payment.status != TransactionStatus::Success.as_str() {
        return Err(AppError::PaymentDeclined {
            transaction_id: payment.transaction_id,
            reason: payment
                .failure_reason
                .unwrap_or_else(|| "Payment failed".to_string()),
        });
    }

    Ok(ApiResponse::success(
        "Payment successful",
        PaymentReceipt {
            transaction_id: payment.transaction_id,
            booking_id: payment.booking_id,
            amount: payment.amount - payment.fee,
            fee: payment.fee,
            total_charged: payment.amount,
            method: payment.payment_method,
            status: payment.status,
            external_transaction_id: payment.external_transaction_id,
            details: payment.payment_details,
            booking_status: booking.status.clone(),
            payment_status: booking.payment_status.clone(),
        },
        Some(Meta::empty()),
    ))
}

fn method_info(method: PaymentMethod) -> PaymentMethodInfo {
    let (name, description, max_amount) = match method {
        PaymentMethod::Gopay => ("GoPay", "Pay with GoPay", 20_000_000),
        PaymentMethod::Ovo => ("OVO", "Pay with OVO", 10_000_000),
        PaymentMethod::Dana => ("DANA", "Pay with DANA", 20_000_000),
        PaymentMethod::Bca => ("BCA", "Transfer to a BCA virtual account", 500_000_000),
        PaymentMethod::Mandiri => (
            "Mandiri",
            "Transfer to a Mandiri virtual account",
            500_000_000,
        ),
        PaymentMethod::Bni => ("BNI", "Transfer to a BNI virtual account", 500_000_000),
        PaymentMethod::CreditCard => ("Credit/Debit Card", "Visa, Mastercard, JCB", 50_000_000),
        PaymentMethod::Cash => ("Pay at Location", "Pay in cash when the service is done", 1_000_000),
    };
    let (min_amount, processing_time) = match method.kind() {
        MethodKind::Ewallet | MethodKind::Card => (10_000, "Instant"),
        MethodKind::BankTransfer => (10_000, "1-3 hours"),
        MethodKind::Cash => (0, "At service time"),
    };

    PaymentMethodInfo {
        id: method.as_str().into(),
        name: name.into(),
        kind: method.kind(),
        description: description.into(),
        fee: fees::fee_rule(method),
        min_amount,
        max_amount,
        processing_time: processing_time.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fees::FeeRule;

    #[test]
    fn catalog_lists_every_method_with_its_fee() {
        let methods = list_methods().data.unwrap().items;
        assert_eq!(methods.len(), 8);

        let bca = methods.iter().find(|m| m.id == "bca").unwrap();
        assert_eq!(bca.fee, FeeRule::Flat { amount: 4_000 });
        assert_eq!(bca.kind, MethodKind::BankTransfer);

        let cash = methods.iter().find(|m| m.id == "cash").unwrap();
        assert_eq!(cash.fee, FeeRule::Free);
        assert_eq!(cash.min_amount, 0);
    }

    #[test]
    fn calculates_fee_and_total() {
        let calc = calculate_fee(CalculateFeeRequest {
            amount: 100_000,
            method: "gopay".into(),
        })
        .unwrap()
        .data
        .unwrap();
        assert_eq!(calc.fee, 2_000);
        assert_eq!(calc.total, 102_000);
    }

    #[test]
    fn oversized_amount_is_rejected_instead_of_overflowing() {
        let err = calculate_fee(CalculateFeeRequest {
            amount: i64::MAX / 100,
            method: "gopay".into(),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Amount is too large"));

        let err = calculate_fee(CalculateFeeRequest {
            amount: i64::MAX - 1_000,
            method: "bca".into(),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let err = calculate_fee(CalculateFeeRequest {
            amount: 0,
            method: "bca".into(),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    fn payment(status: &str, reason: Option<&str>) -> PaymentModel {
        PaymentModel {
            id: 9,
            booking_id: 1,
            transaction_id: "TXN20250601080000ABCDEF01".into(),
            idempotency_key: Some("k-1".into()),
            external_transaction_id: Some("CASH_abababababab".into()),
            amount: 17_500,
            fee: 0,
            payment_method: "cash".into(),
            status: status.into(),
            failure_reason: reason.map(Into::into),
            payment_details: None,
            created_at: Utc::now().into(),
        }
    }

    fn booking() -> BookingModel {
        BookingModel {
            id: 1,
            booking_code: "BK2025060100000001".into(),
            user_id: uuid::Uuid::nil(),
            location_id: 1,
            service_type: "motor".into(),
            service_description: "tambal ban".into(),
            booking_date: Utc::now().into(),
            total_price: 17_500,
            notes: String::new(),
            status: "confirmed".into(),
            payment_status: "paid".into(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn replaying_success_returns_original_receipt() {
        let receipt = replay(payment("success", None), &booking())
            .unwrap()
            .data
            .unwrap();
        assert_eq!(receipt.transaction_id, "TXN20250601080000ABCDEF01");
        assert_eq!(receipt.total_charged, 17_500);
        assert_eq!(receipt.booking_status, "confirmed");
    }

    #[test]
    fn replaying_failure_returns_decline_with_reason() {
        let err = replay(payment("failed", Some("Invalid CVV")), &booking()).unwrap_err();
        match err {
            AppError::PaymentDeclined {
                transaction_id,
                reason,
            } => {
                assert_eq!(transaction_id, "TXN20250601080000ABCDEF01");
                assert_eq!(reason, "Invalid CVV");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
