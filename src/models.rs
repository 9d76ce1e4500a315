use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub is_active: bool,
    pub rating: f64,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: i64,
    pub user_id: Uuid,
    pub location_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: i64,
    pub booking_id: String,
    pub user_id: Uuid,
    pub location_id: i64,
    pub service_type: String,
    pub service_description: String,
    pub booking_date: DateTime<Utc>,
    pub total_price: i64,
    pub notes: String,
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub transaction_id: String,
    pub external_transaction_id: Option<String>,
    pub amount: i64,
    pub fee: i64,
    pub payment_method: String,
    pub status: String,
    pub failure_reason: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub payment_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Mobil,
    Motor,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Mobil => "mobil",
            ServiceType::Motor => "motor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mobil" => Some(ServiceType::Mobil),
            "motor" => Some(ServiceType::Motor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Completed and cancelled bookings accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Status of a single payment row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Ewallet,
    BankTransfer,
    Card,
    Cash,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gopay,
    Ovo,
    Dana,
    Bca,
    Mandiri,
    Bni,
    CreditCard,
    Cash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 8] = [
        PaymentMethod::Gopay,
        PaymentMethod::Ovo,
        PaymentMethod::Dana,
        PaymentMethod::Bca,
        PaymentMethod::Mandiri,
        PaymentMethod::Bni,
        PaymentMethod::CreditCard,
        PaymentMethod::Cash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gopay => "gopay",
            PaymentMethod::Ovo => "ovo",
            PaymentMethod::Dana => "dana",
            PaymentMethod::Bca => "bca",
            PaymentMethod::Mandiri => "mandiri",
            PaymentMethod::Bni => "bni",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == s)
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            PaymentMethod::Gopay | PaymentMethod::Ovo | PaymentMethod::Dana => MethodKind::Ewallet,
            PaymentMethod::Bca | PaymentMethod::Mandiri | PaymentMethod::Bni => {
                MethodKind::BankTransfer
            }
            PaymentMethod::CreditCard => MethodKind::Card,
            PaymentMethod::Cash => MethodKind::Cash,
        }
    }
}

/// Method name recorded on refund rows.
pub const REFUND_METHOD: &str = "refund";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trips_through_storage_names() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("shipped"), None);
    }

    #[test]
    fn payment_method_kinds() {
        assert_eq!(PaymentMethod::parse("ovo").map(|m| m.kind()), Some(MethodKind::Ewallet));
        assert_eq!(
            PaymentMethod::parse("mandiri").map(|m| m.kind()),
            Some(MethodKind::BankTransfer)
        );
        assert_eq!(PaymentMethod::parse("credit_card").map(|m| m.kind()), Some(MethodKind::Card));
        assert_eq!(PaymentMethod::parse("refund"), None);
    }

    #[test]
    fn payment_rows_are_either_success_or_failed() {
        assert_eq!(
            serde_json::from_str::<TransactionStatus>("\"failed\"").ok(),
            Some(TransactionStatus::Failed)
        );
        assert!(serde_json::from_str::<TransactionStatus>("\"pending\"").is_err());
    }
}
