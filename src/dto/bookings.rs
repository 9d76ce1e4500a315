use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Booking, Payment};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub location_id: i64,
    pub service_type: String,
    pub service_description: Option<String>,
    /// RFC 3339, or `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
    pub booking_date: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub booking_id: String,
    pub total_price: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingWithPayments {
    pub booking: Booking,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<Booking>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingStats {
    pub total_bookings: u64,
    pub pending_bookings: u64,
    pub completed_bookings: u64,
    pub cancelled_bookings: u64,
    pub total_spent: i64,
}
