use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit,
    dto::bookings::{
        BookingList, BookingStats, BookingWithPayments, CreateBookingRequest, CreatedBooking,
        UpdateBookingRequest,
    },
    entity::{
        bookings::{
            ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        locations::Entity as Locations,
        payments::{Column as PaymentCol, Entity as Payments, Model as PaymentModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Booking, BookingStatus, Payment, PaymentStatus, ServiceType},
    response::{ApiResponse, Meta},
    routes::params::{BookingListQuery, SortOrder},
    services::{
        MAX_ID_ATTEMPTS, ids, is_unique_violation, lifecycle,
        payment_service::{self, NewPayment},
        pricing,
    },
    state::AppState,
};

pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<CreatedBooking>> {
    let location = Locations::find_by_id(payload.location_id)
        .one(&state.orm)
        .await?;
    match location {
        Some(l) if l.is_active => {}
        _ => return Err(AppError::NotFound),
    }

    let service_type = ServiceType::parse(payload.service_type.trim()).ok_or_else(|| {
        AppError::BadRequest("Service type must be mobil or motor".into())
    })?;
    let booking_date = lifecycle::parse_booking_date(&payload.booking_date, Utc::now())?;

    let description = payload.service_description.unwrap_or_default();
    let total_price = pricing::total_price(service_type.as_str(), Some(&description));
    let notes = payload.notes.unwrap_or_default();

    let mut attempt = 0;
    let booking = loop {
        attempt += 1;
        let inserted = BookingActive {
            id: NotSet,
            booking_code: Set(ids::booking_code()),
            user_id: Set(user.user_id),
            location_id: Set(payload.location_id),
            service_type: Set(service_type.as_str().into()),
            service_description: Set(description.clone()),
            booking_date: Set(booking_date.into()),
            total_price: Set(total_price),
            notes: Set(notes.clone()),
            status: Set(BookingStatus::Pending.as_str().into()),
            payment_status: Set(PaymentStatus::Unpaid.as_str().into()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&state.orm)
        .await;

        match inserted {
            Ok(booking) => break booking,
            Err(err) if attempt < MAX_ID_ATTEMPTS && is_unique_violation(&err, "booking_code") => {
                tracing::warn!(attempt, "booking code collision, regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    };

    tracing::info!(
        booking_id = booking.id,
        booking_code = %booking.booking_code,
        total_price,
        "booking created"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "booking_created",
        "bookings",
        serde_json::json!({ "booking_id": booking.id, "total_price": total_price }),
    )
    .await;

    let booking = booking_from_entity(booking);
    Ok(ApiResponse::success(
        "Booking created",
        CreatedBooking {
            booking_id: booking.booking_id.clone(),
            total_price: booking.total_price,
            booking,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_bookings(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(BookingCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(BookingCol::Status.eq(status.clone()));
    }

    let mut finder = Bookings::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(BookingCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(BookingCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let bookings = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(booking_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        BookingList { items: bookings },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<BookingWithPayments>> {
    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::UserId.eq(user.user_id))
                .add(BookingCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let booking = match booking {
        Some(b) => b,
        None => return Err(AppError::NotFound),
    };

    let payments = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .order_by_desc(PaymentCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::ok(BookingWithPayments {
        booking: booking_from_entity(booking),
        payments,
    }))
}

/// Owner-facing update: notes, and the single allowed transition to `cancelled`.
pub async fn update_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateBookingRequest,
) -> AppResult<ApiResponse<Booking>> {
    let target = payload
        .status
        .as_deref()
        .map(lifecycle::self_service_target)
        .transpose()?;

    let txn = state.orm.begin().await?;
    let booking = lock_booking(&txn, id).await?;
    lifecycle::ensure_owner(&booking, user.user_id)?;

    let (booking, refund) = match target {
        Some(BookingStatus::Cancelled) => cancel_locked(&txn, booking, payload.notes).await?,
        _ => {
            let mut active: BookingActive = booking.into();
            if let Some(notes) = payload.notes {
                active.notes = Set(notes);
            }
            active.updated_at = Set(Utc::now().into());
            (active.update(&txn).await?, None)
        }
    };

    txn.commit().await?;

    let action = if target.is_some() {
        "booking_cancelled"
    } else {
        "booking_updated"
    };
    audit::record(
        &state.pool,
        user.user_id,
        action,
        "bookings",
        serde_json::json!({
            "booking_id": booking.id,
            "refund_transaction_id": refund.as_ref().map(|p| p.transaction_id.clone()),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Booking updated",
        booking_from_entity(booking),
        Some(Meta::empty()),
    ))
}

pub async fn cancel_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Booking>> {
    let txn = state.orm.begin().await?;
    let booking = lock_booking(&txn, id).await?;
    lifecycle::ensure_owner(&booking, user.user_id)?;

    let (booking, refund) = cancel_locked(&txn, booking, None).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "booking_cancelled",
        "bookings",
        serde_json::json!({
            "booking_id": booking.id,
            "refund_transaction_id": refund.as_ref().map(|p| p.transaction_id.clone()),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Booking cancelled",
        booking_from_entity(booking),
        Some(Meta::empty()),
    ))
}

pub async fn booking_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<BookingStats>> {
    let count_with = move |status: Option<BookingStatus>| {
        let mut condition = Condition::all().add(BookingCol::UserId.eq(user.user_id));
        if let Some(status) = status {
            condition = condition.add(BookingCol::Status.eq(status.as_str()));
        }
        Bookings::find().filter(condition).count(&state.orm)
    };

    let total_bookings = count_with(None).await?;
    let pending_bookings = count_with(Some(BookingStatus::Pending)).await?;
    let completed_bookings = count_with(Some(BookingStatus::Completed)).await?;
    let cancelled_bookings = count_with(Some(BookingStatus::Cancelled)).await?;

    let paid_totals: Vec<i64> = Bookings::find()
        .select_only()
        .column(BookingCol::TotalPrice)
        .filter(
            Condition::all()
                .add(BookingCol::UserId.eq(user.user_id))
                .add(BookingCol::PaymentStatus.eq(PaymentStatus::Paid.as_str())),
        )
        .into_tuple()
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::ok(BookingStats {
        total_bookings,
        pending_bookings,
        completed_bookings,
        cancelled_bookings,
        total_spent: paid_totals.iter().sum(),
    }))
}

pub async fn upcoming_bookings(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<BookingList>> {
    let open = [
        BookingStatus::Pending.as_str(),
        BookingStatus::Confirmed.as_str(),
        BookingStatus::InProgress.as_str(),
    ];
    let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();

    let bookings = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::UserId.eq(user.user_id))
                .add(BookingCol::BookingDate.gt(now))
                .add(BookingCol::Status.is_in(open)),
        )
        .order_by_asc(BookingCol::BookingDate)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(booking_from_entity)
        .collect();

    Ok(ApiResponse::ok(BookingList { items: bookings }))
}

pub(crate) async fn lock_booking(txn: &DatabaseTransaction, id: i64) -> AppResult<BookingModel> {
    Bookings::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Cancels a booking already locked by `txn`, writing the refund row when it was paid.
async fn cancel_locked(
    txn: &DatabaseTransaction,
    booking: BookingModel,
    notes: Option<String>,
) -> AppResult<(BookingModel, Option<PaymentModel>)> {
    let plan = lifecycle::plan_cancellation(&booking, Utc::now())?;
    let booking_id = booking.id;

    let mut active: BookingActive = booking.into();
    active.status = Set(BookingStatus::Cancelled.as_str().into());
    if plan.refund_amount.is_some() {
        active.payment_status = Set(PaymentStatus::Refunded.as_str().into());
    }
    if let Some(notes) = notes {
        active.notes = Set(notes);
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(txn).await?;

    let refund = match plan.refund_amount {
        Some(amount) => {
            let refund = payment_service::insert_payment(txn, NewPayment::refund(booking_id, amount))
                .await?;
            tracing::info!(
                booking_id,
                transaction_id = %refund.transaction_id,
                amount,
                "refund recorded"
            );
            Some(refund)
        }
        None => None,
    };

    tracing::info!(booking_id, "booking cancelled");
    Ok((booking, refund))
}

pub(crate) fn booking_from_entity(model: BookingModel) -> Booking {
    Booking {
        id: model.id,
        booking_id: model.booking_code,
        user_id: model.user_id,
        location_id: model.location_id,
        service_type: model.service_type,
        service_description: model.service_description,
        booking_date: model.booking_date.with_timezone(&Utc),
        total_price: model.total_price,
        notes: model.notes,
        status: model.status,
        payment_status: model.payment_status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        booking_id: model.booking_id,
        transaction_id: model.transaction_id,
        external_transaction_id: model.external_transaction_id,
        amount: model.amount,
        fee: model.fee,
        payment_method: model.payment_method,
        status: model.status,
        failure_reason: model.failure_reason,
        payment_details: model.payment_details,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
