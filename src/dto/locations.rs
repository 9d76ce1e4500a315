use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Location, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewCreated {
    pub review: Review,
    pub location: Location,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
}
