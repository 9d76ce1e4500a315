use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{MethodKind, Payment},
    services::fees::FeeRule,
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CardData {
    pub number: Option<String>,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
    pub name: Option<String>,
}

impl CardData {
    /// First required field that is absent or blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("number", &self.number),
            ("expiry", &self.expiry),
            ("cvv", &self.cvv),
            ("name", &self.name),
        ]
        .into_iter()
        .find(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(field, _)| field)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    pub booking_id: i64,
    pub payment_method: String,
    pub amount: i64,
    pub card_data: Option<CardData>,
    /// Repeating a key for the same booking replays the first outcome.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub booking_id: i64,
    pub amount: i64,
    pub fee: i64,
    pub total_charged: i64,
    pub method: String,
    pub status: String,
    pub external_transaction_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub booking_status: String,
    pub payment_status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateFeeRequest {
    pub amount: i64,
    pub method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeeCalculation {
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodInfo {
    pub id: String,
    pub name: String,
    pub kind: MethodKind,
    pub description: String,
    pub fee: FeeRule,
    pub min_amount: i64,
    pub max_amount: i64,
    pub processing_time: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodList {
    pub items: Vec<PaymentMethodInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}
