use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::locations::{CreateReviewRequest, ReviewCreated, ReviewList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Location,
    response::ApiResponse,
    routes::params::Pagination,
    services::location_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_location))
        .route("/{id}/reviews", get(list_reviews).post(add_review))
}

#[utoipa::path(
    get,
    path = "/api/locations/{id}",
    params(("id" = i64, Path, description = "Location id")),
    responses(
        (status = 200, description = "Location detail", body = ApiResponse<Location>),
        (status = 404, description = "Location not found")
    ),
    tag = "Locations"
)]
pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Location>>> {
    let resp = location_service::get_location(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/locations/{id}/reviews",
    params(
        ("id" = i64, Path, description = "Location id"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Reviews, newest first", body = ApiResponse<ReviewList>)
    ),
    tag = "Locations"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = location_service::list_reviews(&state, id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/locations/{id}/reviews",
    params(("id" = i64, Path, description = "Location id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = ApiResponse<ReviewCreated>),
        (status = 400, description = "Invalid rating or empty comment"),
        (status = 409, description = "Location already reviewed")
    ),
    security(("bearer_auth" = [])),
    tag = "Locations"
)]
pub async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewCreated>>)> {
    let resp = location_service::add_review(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
