use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit,
    dto::locations::{CreateReviewRequest, ReviewCreated, ReviewList},
    entity::{
        locations::{ActiveModel as LocationActive, Entity as Locations, Model as LocationModel},
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Location, Review},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn get_location(state: &AppState, id: i64) -> AppResult<ApiResponse<Location>> {
    let location = Locations::find_by_id(id).one(&state.orm).await?;
    let location = match location {
        Some(l) if l.is_active => l,
        _ => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::ok(location_from_entity(location)))
}

pub async fn list_reviews(
    state: &AppState,
    location_id: i64,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Reviews::find()
        .filter(ReviewCol::LocationId.eq(location_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let reviews = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        ReviewList { items: reviews },
        Some(Meta::new(page, limit, total)),
    ))
}

/// One review per user and location; the location's rating becomes the mean of all ratings.
pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    location_id: i64,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<ReviewCreated>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }
    let comment = payload.comment.trim().to_string();
    if comment.is_empty() {
        return Err(AppError::BadRequest("Comment is required".into()));
    }

    let txn = state.orm.begin().await?;

    let location = Locations::find_by_id(location_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let location = match location {
        Some(l) if l.is_active => l,
        _ => return Err(AppError::NotFound),
    };

    let existing = Reviews::find()
        .filter(
            Condition::all()
                .add(ReviewCol::UserId.eq(user.user_id))
                .add(ReviewCol::LocationId.eq(location_id)),
        )
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "You have already reviewed this location".into(),
        ));
    }

    let review = ReviewActive {
        id: NotSet,
        user_id: Set(user.user_id),
        location_id: Set(location_id),
        rating: Set(payload.rating),
        comment: Set(comment),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(ReviewCol::LocationId.eq(location_id))
        .into_tuple()
        .all(&txn)
        .await?;

    let mut active: LocationActive = location.into();
    active.rating = Set(mean_rating(&ratings));
    active.review_count = Set(ratings.len() as i32);
    let location = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        location_id,
        rating = location.rating,
        review_count = location.review_count,
        "review added"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "review_added",
        "reviews",
        serde_json::json!({ "location_id": location_id, "review_id": review.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added",
        ReviewCreated {
            review: review_from_entity(review),
            location: location_from_entity(location),
        },
        Some(Meta::empty()),
    ))
}

pub fn mean_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    sum as f64 / ratings.len() as f64
}

fn location_from_entity(model: LocationModel) -> Location {
    Location {
        id: model.id,
        name: model.name,
        address: model.address,
        latitude: model.latitude,
        longitude: model.longitude,
        phone: model.phone,
        is_active: model.is_active,
        rating: model.rating,
        review_count: model.review_count,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user_id: model.user_id,
        location_id: model.location_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::mean_rating;

    #[test]
    fn mean_of_all_ratings() {
        assert_eq!(mean_rating(&[]), 0.0);
        assert_eq!(mean_rating(&[5]), 5.0);
        assert_eq!(mean_rating(&[4, 5, 3]), 4.0);
        assert_eq!(mean_rating(&[5, 4]), 4.5);
    }
}
