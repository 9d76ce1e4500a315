use sea_orm::{DbErr, SqlErr};

pub mod auth_service;
pub mod booking_service;
pub mod fees;
pub mod ids;
pub mod lifecycle;
pub mod location_service;
pub mod payment_service;
pub mod pricing;
pub mod simulator;

/// Attempts at inserting a row with a freshly generated unique code.
pub(crate) const MAX_ID_ATTEMPTS: u32 = 5;

/// True when `err` is a unique violation on a constraint mentioning `column`.
pub(crate) fn is_unique_violation(err: &DbErr, column: &str) -> bool {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => message.contains(column),
        _ => false,
    }
}
