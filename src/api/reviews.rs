//! Review and moderation endpoints.
//!
//! Every mutation that can change which reviews count as approved runs in
//! a transaction that ends by recomputing the owning salon's rating and
//! total_reviews from approved reviews — those columns are derived, never
//! hand-edited.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::validation;
use crate::db::{
    CreateReviewRequest, DbPool, HandleReportRequest, LikeResponse, ModerateReviewRequest,
    RatingBucket, ReportReviewRequest, Review, ReviewImage, ReviewReport, ReviewResponse,
    ReviewStats, UpdateReviewRequest, User, REPORT_DISMISSED, REPORT_PENDING, REPORT_REVIEWED,
    REVIEW_APPROVED, REVIEW_HIDDEN, REVIEW_PENDING, REVIEW_REJECTED,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit.max(1),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewPage {
    pub reviews: Vec<ReviewResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ReportPage {
    pub reports: Vec<ReviewReport>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub salon_id: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

fn page_bounds(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

/// Recompute a salon's derived rating columns from its approved reviews.
pub(crate) async fn recompute_salon_rating(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    salon_id: i64,
) -> Result<(), sqlx::Error> {
    let (total, average): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0.0) FROM salon_reviews \
         WHERE salon_id = ? AND status = 'approved'",
    )
    .bind(salon_id)
    .fetch_one(&mut **tx)
    .await?;

    // Rating is kept to one fractional digit
    let rounded = (average * 10.0).round() / 10.0;

    sqlx::query("UPDATE salons SET rating = ?, total_reviews = ?, updated_at = ? WHERE id = ?")
        .bind(rounded)
        .bind(total)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(salon_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn images_for_reviews(
    db: &DbPool,
    review_ids: &[i64],
) -> Result<HashMap<i64, Vec<ReviewImage>>, sqlx::Error> {
    if review_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; review_ids.len()].join(",");
    let sql = format!(
        "SELECT * FROM review_images WHERE review_id IN ({placeholders}) ORDER BY display_order"
    );
    let mut query = sqlx::query_as::<_, ReviewImage>(&sql);
    for id in review_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(db).await?;

    let mut map: HashMap<i64, Vec<ReviewImage>> = HashMap::new();
    for image in rows {
        map.entry(image.review_id).or_default().push(image);
    }
    Ok(map)
}

async fn attach_images(
    db: &DbPool,
    reviews: Vec<Review>,
) -> Result<Vec<ReviewResponse>, sqlx::Error> {
    let ids: Vec<i64> = reviews.iter().map(|r| r.id).collect();
    let mut image_map = images_for_reviews(db, &ids).await?;
    Ok(reviews
        .into_iter()
        .map(|review| {
            let images = image_map.remove(&review.id).unwrap_or_default();
            ReviewResponse { review, images }
        })
        .collect())
}

async fn fetch_review(db: &DbPool, id: i64) -> Result<Review, ApiError> {
    sqlx::query_as::<_, Review>("SELECT * FROM salon_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))
}

/// Create a review: one per (salon, user), salon must exist, verified-visit
/// flag derived from a redeemed coupon at that salon.
pub(crate) async fn create_review_record(
    db: &DbPool,
    user_id: i64,
    req: &CreateReviewRequest,
) -> Result<ReviewResponse, ApiError> {
    if let Err(e) = validation::validate_rating(req.rating) {
        return Err(ApiError::validation_field("rating", e));
    }

    let mut tx = db.begin().await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM salon_reviews WHERE user_id = ? AND salon_id = ?")
            .bind(user_id)
            .bind(req.salon_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("You have already reviewed this salon"));
    }

    let salon: Option<(i64,)> = sqlx::query_as("SELECT id FROM salons WHERE id = ?")
        .bind(req.salon_id)
        .fetch_optional(&mut *tx)
        .await?;
    if salon.is_none() {
        return Err(ApiError::not_found("Salon not found"));
    }

    let verified_visit: Option<(i64,)> = sqlx::query_as(
        "SELECT cr.id FROM coupon_redemptions cr \
         JOIN coupons c ON cr.coupon_id = c.id \
         WHERE c.salon_id = ? AND cr.customer_id = ? AND cr.status = 'redeemed' \
         LIMIT 1",
    )
    .bind(req.salon_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO salon_reviews \
         (salon_id, user_id, rating, title, comment, status, is_verified_visit, visit_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 'approved', ?, ?, ?, ?)",
    )
    .bind(req.salon_id)
    .bind(user_id)
    .bind(req.rating)
    .bind(&req.title)
    .bind(&req.comment)
    .bind(verified_visit.is_some())
    .bind(&req.visit_date)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    let review_id = result.last_insert_rowid();

    for (index, url) in req.images.iter().enumerate() {
        sqlx::query(
            "INSERT INTO review_images (review_id, image_url, display_order, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(review_id)
        .bind(url)
        .bind(index as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    recompute_salon_rating(&mut tx, req.salon_id).await?;
    tx.commit().await?;

    let review = fetch_review(db, review_id).await?;
    let responses = attach_images(db, vec![review]).await?;
    Ok(responses.into_iter().next().expect("just created"))
}

pub(crate) async fn moderate_review_record(
    db: &DbPool,
    review_id: i64,
    status: &str,
) -> Result<Review, ApiError> {
    if ![REVIEW_PENDING, REVIEW_APPROVED, REVIEW_REJECTED, REVIEW_HIDDEN].contains(&status) {
        return Err(ApiError::validation_field("status", "Invalid review status"));
    }

    let mut tx = db.begin().await?;
    let review: Option<Review> = sqlx::query_as("SELECT * FROM salon_reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?;
    let review = review.ok_or_else(|| ApiError::not_found("Review not found"))?;

    sqlx::query("UPDATE salon_reviews SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    recompute_salon_rating(&mut tx, review.salon_id).await?;
    tx.commit().await?;

    fetch_review(db, review_id).await
}

/// POST /api/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let response = create_review_record(&state.db, user.id, &req).await?;
    info!(salon = req.salon_id, user = user.id, "Review created");
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/reviews/salon/:salonId
pub async fn list_by_salon(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReviewPage>, ApiError> {
    let (page, limit, offset) = page_bounds(query.page, query.limit, 10);
    let status = query.status.unwrap_or_else(|| REVIEW_APPROVED.to_string());

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM salon_reviews \
         WHERE salon_id = ? AND status = ? AND (? IS NULL OR rating = ?)",
    )
    .bind(salon_id)
    .bind(&status)
    .bind(query.rating)
    .bind(query.rating)
    .fetch_one(&state.db)
    .await?;

    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM salon_reviews \
         WHERE salon_id = ? AND status = ? AND (? IS NULL OR rating = ?) \
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(salon_id)
    .bind(&status)
    .bind(query.rating)
    .bind(query.rating)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let reviews = attach_images(&state.db, reviews).await?;
    Ok(Json(ReviewPage {
        reviews,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// GET /api/reviews/user/me
pub async fn my_reviews(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReviewPage>, ApiError> {
    let (page, limit, offset) = page_bounds(query.page, query.limit, 10);

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM salon_reviews WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;

    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM salon_reviews WHERE user_id = ? \
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let reviews = attach_images(&state.db, reviews).await?;
    Ok(Json(ReviewPage {
        reviews,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// GET /api/reviews/:id
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = fetch_review(&state.db, id).await?;
    let responses = attach_images(&state.db, vec![review]).await?;
    Ok(Json(responses.into_iter().next().expect("just fetched")))
}

/// PUT /api/reviews/:id
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    if let Some(rating) = req.rating {
        if let Err(e) = validation::validate_rating(rating) {
            return Err(ApiError::validation_field("rating", e));
        }
    }

    let mut tx = state.db.begin().await?;
    let review: Option<Review> =
        sqlx::query_as("SELECT * FROM salon_reviews WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;
    let review = review
        .ok_or_else(|| ApiError::not_found("Review not found or you cannot edit it"))?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE salon_reviews SET rating = ?, title = ?, comment = ?, visit_date = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(req.rating.unwrap_or(review.rating))
    .bind(req.title.as_ref().or(review.title.as_ref()))
    .bind(req.comment.as_ref().or(review.comment.as_ref()))
    .bind(req.visit_date.as_ref().or(review.visit_date.as_ref()))
    .bind(&now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(images) = &req.images {
        sqlx::query("DELETE FROM review_images WHERE review_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (index, url) in images.iter().enumerate() {
            sqlx::query(
                "INSERT INTO review_images (review_id, image_url, display_order, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(url)
            .bind(index as i64)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
    }

    recompute_salon_rating(&mut tx, review.salon_id).await?;
    tx.commit().await?;

    let review = fetch_review(&state.db, id).await?;
    let responses = attach_images(&state.db, vec![review]).await?;
    Ok(Json(responses.into_iter().next().expect("just updated")))
}

/// DELETE /api/reviews/:id — owner or admin
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await?;
    let review: Option<Review> = sqlx::query_as("SELECT * FROM salon_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let review = review.ok_or_else(|| ApiError::not_found("Review not found"))?;

    if !user.is_admin() && review.user_id != user.id {
        return Err(ApiError::forbidden("You cannot delete this review"));
    }

    sqlx::query("DELETE FROM salon_reviews WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    recompute_salon_rating(&mut tx, review.salon_id).await?;
    tx.commit().await?;

    info!(review = id, user = user.id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/reviews/:id/like — toggles; likes_count tracks the rows
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
    let mut tx = state.db.begin().await?;
    let review: Option<(i64,)> = sqlx::query_as("SELECT id FROM salon_reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if review.is_none() {
        return Err(ApiError::not_found("Review not found"));
    }

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM review_likes WHERE review_id = ? AND user_id = ?")
            .bind(id)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;

    let liked = if existing.is_some() {
        sqlx::query("DELETE FROM review_likes WHERE review_id = ? AND user_id = ?")
            .bind(id)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE salon_reviews SET likes_count = likes_count - 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        false
    } else {
        sqlx::query("INSERT INTO review_likes (review_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(user.id)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE salon_reviews SET likes_count = likes_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        true
    };

    let (likes_count,): (i64,) =
        sqlx::query_as("SELECT likes_count FROM salon_reviews WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    tx.commit().await?;

    Ok(Json(LikeResponse { liked, likes_count }))
}

/// POST /api/reviews/:id/report
pub async fn report_review(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
    Json(req): Json<ReportReviewRequest>,
) -> Result<(StatusCode, Json<ReviewReport>), ApiError> {
    const REASONS: [&str; 5] = ["spam", "inappropriate", "fake", "offensive", "other"];
    if !REASONS.contains(&req.reason.as_str()) {
        return Err(ApiError::validation_field("reason", "Invalid report reason"));
    }

    let review = fetch_review(&state.db, id).await?;
    if review.user_id == user.id {
        return Err(ApiError::bad_request("You cannot report your own review"));
    }

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM review_reports WHERE review_id = ? AND user_id = ?")
            .bind(id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("You have already reported this review"));
    }

    let result = sqlx::query(
        "INSERT INTO review_reports (review_id, user_id, reason, description, status, created_at) \
         VALUES (?, ?, ?, ?, 'pending', ?)",
    )
    .bind(id)
    .bind(user.id)
    .bind(&req.reason)
    .bind(&req.description)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let report = sqlx::query_as::<_, ReviewReport>("SELECT * FROM review_reports WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/reviews/salon/:salonId/stats
pub async fn salon_stats(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
) -> Result<Json<ReviewStats>, ApiError> {
    let salon: Option<(i64,)> = sqlx::query_as("SELECT id FROM salons WHERE id = ?")
        .bind(salon_id)
        .fetch_optional(&state.db)
        .await?;
    if salon.is_none() {
        return Err(ApiError::not_found("Salon not found"));
    }

    #[allow(clippy::type_complexity)]
    let (total, average, five, four, three, two, one, verified): (
        i64,
        f64,
        i64,
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0.0), \
                COALESCE(SUM(CASE WHEN rating = 5 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN rating = 4 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN rating = 3 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN rating = 2 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN rating = 1 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN is_verified_visit = 1 THEN 1 ELSE 0 END), 0) \
         FROM salon_reviews WHERE salon_id = ? AND status = 'approved'",
    )
    .bind(salon_id)
    .fetch_one(&state.db)
    .await?;

    let thirty_days_ago = (chrono::Utc::now() - chrono::Duration::days(30)).to_rfc3339();
    let (recent, recent_average): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0.0) FROM salon_reviews \
         WHERE salon_id = ? AND status = 'approved' AND created_at >= ?",
    )
    .bind(salon_id)
    .bind(&thirty_days_ago)
    .fetch_one(&state.db)
    .await?;

    let bucket = |count: i64| RatingBucket {
        count,
        percentage: if total > 0 {
            ((count as f64 / total as f64) * 1000.0).round() / 10.0
        } else {
            0.0
        },
    };

    Ok(Json(ReviewStats {
        salon_id,
        total_reviews: total,
        average_rating: (average * 10.0).round() / 10.0,
        verified_reviews: verified,
        five_star: bucket(five),
        four_star: bucket(four),
        three_star: bucket(three),
        two_star: bucket(two),
        one_star: bucket(one),
        last_30_days_reviews: recent,
        last_30_days_average: (recent_average * 10.0).round() / 10.0,
    }))
}

/// GET /api/admin/reviews — all reviews with optional filters
pub async fn admin_list_reviews(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ReviewPage>, ApiError> {
    let (page, limit, offset) = page_bounds(query.page, query.limit, 20);

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM salon_reviews \
         WHERE (? IS NULL OR status = ?) AND (? IS NULL OR salon_id = ?) AND (? IS NULL OR user_id = ?)",
    )
    .bind(&query.status)
    .bind(&query.status)
    .bind(query.salon_id)
    .bind(query.salon_id)
    .bind(query.user_id)
    .bind(query.user_id)
    .fetch_one(&state.db)
    .await?;

    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM salon_reviews \
         WHERE (? IS NULL OR status = ?) AND (? IS NULL OR salon_id = ?) AND (? IS NULL OR user_id = ?) \
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(&query.status)
    .bind(&query.status)
    .bind(query.salon_id)
    .bind(query.salon_id)
    .bind(query.user_id)
    .bind(query.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let reviews = attach_images(&state.db, reviews).await?;
    Ok(Json(ReviewPage {
        reviews,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// PATCH /api/admin/reviews/:id/moderate
pub async fn moderate_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ModerateReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let review = moderate_review_record(&state.db, id, &req.status).await?;
    info!(review = id, status = %req.status, "Review moderated");
    Ok(Json(review))
}

/// GET /api/admin/reviews/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ReportPage>, ApiError> {
    let (page, limit, offset) = page_bounds(query.page, query.limit, 20);
    let status = query.status.unwrap_or_else(|| REPORT_PENDING.to_string());

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM review_reports WHERE status = ?")
            .bind(&status)
            .fetch_one(&state.db)
            .await?;

    let reports = sqlx::query_as::<_, ReviewReport>(
        "SELECT * FROM review_reports WHERE status = ? \
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(&status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ReportPage {
        reports,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// PATCH /api/admin/reviews/reports/:reportId
pub async fn handle_report(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(report_id): Path<i64>,
    Json(req): Json<HandleReportRequest>,
) -> Result<Json<ReviewReport>, ApiError> {
    if ![REPORT_REVIEWED, REPORT_DISMISSED].contains(&req.status.as_str()) {
        return Err(ApiError::validation_field("status", "Invalid report status"));
    }

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM review_reports WHERE id = ?")
        .bind(report_id)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_none() {
        return Err(ApiError::not_found("Report not found"));
    }

    // The synthetic admin-token user has no row to reference
    let reviewed_by = if user.id > 0 { Some(user.id) } else { None };

    sqlx::query(
        "UPDATE review_reports SET status = ?, reviewed_by = ?, reviewed_at = ? WHERE id = ?",
    )
    .bind(&req.status)
    .bind(reviewed_by)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(report_id)
    .execute(&state.db)
    .await?;

    let report = sqlx::query_as::<_, ReviewReport>("SELECT * FROM review_reports WHERE id = ?")
        .bind(report_id)
        .fetch_one(&state.db)
        .await?;
    info!(report = report_id, status = %req.status, "Report handled");
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil;

    async fn salon_rating(pool: &DbPool, salon_id: i64) -> (f64, i64) {
        sqlx::query_as("SELECT rating, total_reviews FROM salons WHERE id = ?")
            .bind(salon_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn review_request(salon_id: i64, rating: i64) -> CreateReviewRequest {
        CreateReviewRequest {
            salon_id,
            rating,
            title: None,
            comment: Some("Great cut".to_string()),
            visit_date: None,
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn creating_reviews_recomputes_salon_rating() {
        let pool = testutil::pool().await;
        let first = testutil::seed_customer(&pool, "a@test.io").await;
        let second = testutil::seed_customer(&pool, "b@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;

        create_review_record(&pool, first, &review_request(salon, 5))
            .await
            .unwrap();
        create_review_record(&pool, second, &review_request(salon, 4))
            .await
            .unwrap();

        let (rating, total) = salon_rating(&pool, salon).await;
        assert_eq!(total, 2);
        assert_eq!(rating, 4.5);
    }

    #[tokio::test]
    async fn second_review_for_same_salon_conflicts() {
        let pool = testutil::pool().await;
        let user = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;

        create_review_record(&pool, user, &review_request(salon, 5))
            .await
            .unwrap();
        assert!(create_review_record(&pool, user, &review_request(salon, 3))
            .await
            .is_err());

        let (_, total) = salon_rating(&pool, salon).await;
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn moderation_excludes_review_from_derived_rating() {
        let pool = testutil::pool().await;
        let first = testutil::seed_customer(&pool, "a@test.io").await;
        let second = testutil::seed_customer(&pool, "b@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;

        let low = create_review_record(&pool, first, &review_request(salon, 1))
            .await
            .unwrap();
        create_review_record(&pool, second, &review_request(salon, 5))
            .await
            .unwrap();
        assert_eq!(salon_rating(&pool, salon).await, (3.0, 2));

        moderate_review_record(&pool, low.review.id, REVIEW_HIDDEN)
            .await
            .unwrap();
        assert_eq!(salon_rating(&pool, salon).await, (5.0, 1));

        moderate_review_record(&pool, low.review.id, REVIEW_APPROVED)
            .await
            .unwrap();
        assert_eq!(salon_rating(&pool, salon).await, (3.0, 2));
    }

    #[tokio::test]
    async fn moderation_rejects_unknown_status() {
        let pool = testutil::pool().await;
        let user = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let review = create_review_record(&pool, user, &review_request(salon, 5))
            .await
            .unwrap();

        assert!(moderate_review_record(&pool, review.review.id, "vanished")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn verified_visit_flag_comes_from_redemptions() {
        let pool = testutil::pool().await;
        let user = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let coupon = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 10).await;

        sqlx::query(
            "INSERT INTO coupon_redemptions (coupon_id, customer_id, status, redeemed_at) \
             VALUES (?, ?, 'redeemed', ?)",
        )
        .bind(coupon)
        .bind(user)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        let review = create_review_record(&pool, user, &review_request(salon, 5))
            .await
            .unwrap();
        assert!(review.review.is_verified_visit);
    }
}
