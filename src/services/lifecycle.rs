//! Booking and payment state rules.
//!
//! Pure checks over a booking row; the services run them under a row lock.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    entity::bookings::Model as BookingModel,
    error::{AppError, AppResult},
    models::{BookingStatus, PaymentStatus},
};

/// Bookings cannot be cancelled this close to their scheduled time.
pub const CANCELLATION_WINDOW_MINUTES: i64 = 60;

pub fn booking_status(booking: &BookingModel) -> AppResult<BookingStatus> {
    BookingStatus::parse(&booking.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "booking {} has unknown status {}",
            booking.id,
            booking.status
        ))
    })
}

pub fn payment_status(booking: &BookingModel) -> AppResult<PaymentStatus> {
    PaymentStatus::parse(&booking.payment_status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "booking {} has unknown payment status {}",
            booking.id,
            booking.payment_status
        ))
    })
}

pub fn ensure_owner(booking: &BookingModel, user_id: Uuid) -> AppResult<()> {
    if booking.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_payable(booking: &BookingModel) -> AppResult<()> {
    if payment_status(booking)? == PaymentStatus::Paid {
        return Err(AppError::Conflict("Booking is already paid".into()));
    }
    if booking_status(booking)? == BookingStatus::Cancelled {
        return Err(AppError::Conflict("Booking is cancelled".into()));
    }
    Ok(())
}

/// The charge must equal the booking total exactly.
pub fn ensure_amount_matches(booking: &BookingModel, amount: i64) -> AppResult<()> {
    if amount != booking.total_price {
        return Err(AppError::BadRequest(format!(
            "Payment amount {amount} does not match booking total {}",
            booking.total_price
        )));
    }
    Ok(())
}

/// Booking status once a charge succeeds. Only `pending` moves forward to
/// `confirmed`; later stages keep their status.
pub fn status_after_payment(current: BookingStatus) -> BookingStatus {
    match current {
        BookingStatus::Pending => BookingStatus::Confirmed,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPlan {
    /// Refund row amount (negative) when the booking was paid.
    pub refund_amount: Option<i64>,
}

pub fn plan_cancellation(booking: &BookingModel, now: DateTime<Utc>) -> AppResult<CancellationPlan> {
    if booking_status(booking)?.is_terminal() {
        return Err(AppError::Conflict("Booking can no longer be cancelled".into()));
    }

    let cutoff = now + Duration::minutes(CANCELLATION_WINDOW_MINUTES);
    if booking.booking_date.with_timezone(&Utc) <= cutoff {
        return Err(AppError::Conflict(
            "Booking is too close to its scheduled time to be cancelled".into(),
        ));
    }

    let refund_amount = match payment_status(booking)? {
        PaymentStatus::Paid => Some(-booking.total_price),
        PaymentStatus::Unpaid | PaymentStatus::Refunded => None,
    };
    Ok(CancellationPlan { refund_amount })
}

/// Users may only move their own booking to `cancelled`.
pub fn self_service_target(raw: &str) -> AppResult<BookingStatus> {
    match BookingStatus::parse(raw) {
        Some(BookingStatus::Cancelled) => Ok(BookingStatus::Cancelled),
        _ => Err(AppError::BadRequest(format!(
            "Status '{raw}' cannot be set by the booking owner"
        ))),
    }
}

/// Parses a booking date and requires it to be strictly after `now`.
pub fn parse_booking_date(raw: &str, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
                .ok_or(())
        })
        .map_err(|_| AppError::BadRequest("Invalid booking date format".into()))?;

    if parsed <= now {
        return Err(AppError::BadRequest("Booking date must be in the future".into()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn booking(status: &str, payment_status: &str, starts_in: Duration) -> BookingModel {
        let now = now();
        BookingModel {
            id: 1,
            booking_code: "BK2025060100000001".into(),
            user_id: Uuid::nil(),
            location_id: 1,
            service_type: "motor".into(),
            service_description: "tambal ban".into(),
            booking_date: (now + starts_in).into(),
            total_price: 17_500,
            notes: String::new(),
            status: status.into(),
            payment_status: payment_status.into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn paid_or_cancelled_bookings_are_not_payable() {
        let paid = booking("confirmed", "paid", Duration::days(1));
        assert!(matches!(ensure_payable(&paid), Err(AppError::Conflict(_))));

        let cancelled = booking("cancelled", "unpaid", Duration::days(1));
        assert!(matches!(ensure_payable(&cancelled), Err(AppError::Conflict(_))));

        let pending = booking("pending", "unpaid", Duration::days(1));
        assert!(ensure_payable(&pending).is_ok());
    }

    #[test]
    fn payment_never_moves_a_booking_backwards() {
        assert_eq!(status_after_payment(BookingStatus::Pending), BookingStatus::Confirmed);
        assert_eq!(status_after_payment(BookingStatus::Confirmed), BookingStatus::Confirmed);
        assert_eq!(status_after_payment(BookingStatus::InProgress), BookingStatus::InProgress);
        assert_eq!(status_after_payment(BookingStatus::Completed), BookingStatus::Completed);

        // Cash collected after the job is done keeps the booking completed, so it stays uncancellable.
        let completed = booking(
            status_after_payment(BookingStatus::Completed).as_str(),
            "paid",
            Duration::days(1),
        );
        assert!(ensure_payable(&completed).is_err());
        assert!(matches!(
            plan_cancellation(&completed, now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn amount_must_match_exactly() {
        let pending = booking("pending", "unpaid", Duration::days(1));
        assert!(ensure_amount_matches(&pending, 17_500).is_ok());
        assert!(matches!(
            ensure_amount_matches(&pending, 10_000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            ensure_amount_matches(&pending, 17_501),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn cancelling_inside_window_is_a_conflict_regardless_of_payment() {
        for payment in ["unpaid", "paid"] {
            let soon = booking("confirmed", payment, Duration::minutes(59));
            assert!(matches!(
                plan_cancellation(&soon, now()),
                Err(AppError::Conflict(_))
            ));

            let exactly = booking("confirmed", payment, Duration::minutes(60));
            assert!(matches!(
                plan_cancellation(&exactly, now()),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn terminal_bookings_cannot_be_cancelled() {
        for status in ["completed", "cancelled"] {
            let b = booking(status, "unpaid", Duration::days(2));
            assert!(matches!(plan_cancellation(&b, now()), Err(AppError::Conflict(_))));
        }
    }

    #[test]
    fn cancelling_paid_booking_plans_full_refund() {
        let paid = booking("confirmed", "paid", Duration::hours(3));
        assert_eq!(
            plan_cancellation(&paid, now()).unwrap(),
            CancellationPlan {
                refund_amount: Some(-17_500)
            }
        );

        let unpaid = booking("in_progress", "unpaid", Duration::hours(3));
        assert_eq!(
            plan_cancellation(&unpaid, now()).unwrap(),
            CancellationPlan { refund_amount: None }
        );
    }

    #[test]
    fn owners_may_only_request_cancellation() {
        assert_eq!(self_service_target("cancelled").unwrap(), BookingStatus::Cancelled);
        for raw in ["confirmed", "in_progress", "completed", "pending", "bogus"] {
            assert!(matches!(self_service_target(raw), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn other_users_are_forbidden() {
        let b = booking("pending", "unpaid", Duration::days(1));
        assert!(ensure_owner(&b, Uuid::nil()).is_ok());
        assert!(matches!(
            ensure_owner(&b, Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn parses_booking_dates() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        assert_eq!(parse_booking_date("2025-06-02T09:30:00Z", now()).unwrap(), expected);
        assert_eq!(
            parse_booking_date("2025-06-02T16:30:00+07:00", now()).unwrap(),
            expected
        );
        assert_eq!(parse_booking_date("2025-06-02T09:30", now()).unwrap(), expected);
        assert_eq!(parse_booking_date("2025-06-02T09:30:00", now()).unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_or_past_dates() {
        assert!(matches!(
            parse_booking_date("tomorrow", now()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_booking_date("2025-06-01T08:00:00Z", now()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_booking_date("2024-01-01T00:00:00Z", now()),
            Err(AppError::BadRequest(_))
        ));
    }
}
