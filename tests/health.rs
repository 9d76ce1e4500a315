use tambal_ban_api::routes::{doc::ApiDoc, health::health_check};
use utoipa::OpenApi;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}

#[test]
fn openapi_document_covers_booking_and_payment_routes() {
    let doc = ApiDoc::openapi();
    for path in [
        "/health/ready",
        "/api/auth/login",
        "/api/bookings",
        "/api/bookings/{id}/cancel",
        "/api/payments/process",
        "/api/payments/status/{transaction_id}",
        "/api/locations/{id}/reviews",
    ] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
}
