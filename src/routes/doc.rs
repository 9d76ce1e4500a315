use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, LogoutResponse, RegisterRequest},
        bookings::{
            BookingList, BookingStats, BookingWithPayments, CreateBookingRequest, CreatedBooking,
            UpdateBookingRequest,
        },
        locations::{CreateReviewRequest, ReviewCreated, ReviewList},
        payments::{
            CalculateFeeRequest, CardData, FeeCalculation, PaymentList, PaymentMethodInfo,
            PaymentMethodList, PaymentReceipt, ProcessPaymentRequest,
        },
    },
    models::{
        Booking, BookingStatus, Location, MethodKind, Payment, PaymentMethod, PaymentStatus,
        Review, ServiceType, TransactionStatus, User,
    },
    response::{ApiResponse, Meta},
    routes::{auth, bookings, health, locations, params, payments},
    services::fees::FeeRule,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("session token")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::update_booking,
        bookings::cancel_booking,
        bookings::booking_stats,
        bookings::upcoming_bookings,
        payments::payment_methods,
        payments::calculate_fee,
        payments::process_payment,
        payments::payment_status,
        payments::payment_history,
        locations::get_location,
        locations::list_reviews,
        locations::add_review
    ),
    components(
        schemas(
            User,
            Location,
            Review,
            Booking,
            Payment,
            ServiceType,
            BookingStatus,
            PaymentStatus,
            TransactionStatus,
            MethodKind,
            PaymentMethod,
            FeeRule,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            LogoutResponse,
            CreateBookingRequest,
            CreatedBooking,
            UpdateBookingRequest,
            BookingWithPayments,
            BookingList,
            BookingStats,
            CardData,
            ProcessPaymentRequest,
            PaymentReceipt,
            CalculateFeeRequest,
            FeeCalculation,
            PaymentMethodInfo,
            PaymentMethodList,
            PaymentList,
            CreateReviewRequest,
            ReviewCreated,
            ReviewList,
            params::Pagination,
            params::SortOrder,
            params::BookingListQuery,
            params::PaymentHistoryQuery,
            Meta,
            ApiResponse<Booking>,
            ApiResponse<BookingList>,
            ApiResponse<PaymentReceipt>,
            ApiResponse<PaymentList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and session endpoints"),
        (name = "Bookings", description = "Service booking endpoints"),
        (name = "Payments", description = "Payment endpoints"),
        (name = "Locations", description = "Repair shop and review endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
