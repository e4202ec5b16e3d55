//! Review, review image, like and report models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const REVIEW_PENDING: &str = "pending";
pub const REVIEW_APPROVED: &str = "approved";
pub const REVIEW_REJECTED: &str = "rejected";
pub const REVIEW_HIDDEN: &str = "hidden";

pub const REPORT_PENDING: &str = "pending";
pub const REPORT_REVIEWED: &str = "reviewed";
pub const REPORT_DISMISSED: &str = "dismissed";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: i64,
    pub salon_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub status: String,
    pub likes_count: i64,
    pub is_verified_visit: bool,
    pub visit_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewImage {
    pub id: i64,
    pub review_id: i64,
    pub image_url: String,
    pub display_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewReport {
    pub id: i64,
    pub review_id: i64,
    pub user_id: i64,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

/// Review with its images for detail/list views
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: Review,
    pub images: Vec<ReviewImage>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub salon_id: i64,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub visit_date: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub visit_date: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateReviewRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportReviewRequest {
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HandleReportRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i64,
}

/// Star-rating histogram bucket
#[derive(Debug, Default, Serialize)]
pub struct RatingBucket {
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct ReviewStats {
    pub salon_id: i64,
    pub total_reviews: i64,
    pub average_rating: f64,
    pub verified_reviews: i64,
    pub five_star: RatingBucket,
    pub four_star: RatingBucket,
    pub three_star: RatingBucket,
    pub two_star: RatingBucket,
    pub one_star: RatingBucket,
    pub last_30_days_reviews: i64,
    pub last_30_days_average: f64,
}
