//! Salon catalog management: CRUD, status toggles and image handling.
//!
//! `rating` and `total_reviews` are derived from approved reviews and are
//! never written by these handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation;
use crate::db::{
    BulkDeleteSalonsRequest, CreateSalonRequest, DbPool, Salon, SalonImage, SalonResponse,
    ToggleSalonStatusRequest, UpdateSalonRequest,
};
use crate::AppState;

const MAX_UPLOAD_FILES: usize = 5;
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

async fn images_for_salons(
    db: &DbPool,
    salon_ids: &[i64],
) -> Result<HashMap<i64, Vec<SalonImage>>, sqlx::Error> {
    if salon_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; salon_ids.len()].join(",");
    let sql = format!("SELECT * FROM salon_images WHERE salon_id IN ({placeholders}) ORDER BY id");
    let mut query = sqlx::query_as::<_, SalonImage>(&sql);
    for id in salon_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(db).await?;

    let mut map: HashMap<i64, Vec<SalonImage>> = HashMap::new();
    for image in rows {
        map.entry(image.salon_id).or_default().push(image);
    }
    Ok(map)
}

async fn load_salon(db: &DbPool, id: i64) -> Result<Salon, ApiError> {
    sqlx::query_as::<_, Salon>("SELECT * FROM salons WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Salon not found"))
}

fn validate_salon_fields(
    name: Option<&str>,
    phone: Option<&str>,
    opening_time: Option<&str>,
    closing_time: Option<&str>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = name {
        if let Err(e) = validation::validate_display_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(phone) = phone {
        if phone.trim().is_empty() {
            errors.add("phone", "Phone is required");
        }
    }
    if let Some(t) = opening_time {
        if let Err(e) = validation::validate_time_of_day(t) {
            errors.add("opening_time", e);
        }
    }
    if let Some(t) = closing_time {
        if let Err(e) = validation::validate_time_of_day(t) {
            errors.add("closing_time", e);
        }
    }
    errors.finish()
}

/// List all salons with their images
///
/// GET /api/salons
pub async fn list_salons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SalonResponse>>, ApiError> {
    let salons = sqlx::query_as::<_, Salon>("SELECT * FROM salons ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    let ids: Vec<i64> = salons.iter().map(|s| s.id).collect();
    let mut image_map = images_for_salons(&state.db, &ids).await?;

    let responses = salons
        .into_iter()
        .map(|salon| {
            let images = image_map.remove(&salon.id).unwrap_or_default();
            SalonResponse::from_salon(salon, images)
        })
        .collect();
    Ok(Json(responses))
}

/// Get one salon with its images
///
/// GET /api/salons/:id
pub async fn get_salon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SalonResponse>, ApiError> {
    let salon = load_salon(&state.db, id).await?;
    let images = sqlx::query_as::<_, SalonImage>(
        "SELECT * FROM salon_images WHERE salon_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(SalonResponse::from_salon(salon, images)))
}

/// Create a new salon
///
/// POST /api/admin/salons
pub async fn create_salon(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSalonRequest>,
) -> Result<(StatusCode, Json<SalonResponse>), ApiError> {
    validate_salon_fields(
        Some(&req.name),
        Some(&req.phone),
        req.opening_time.as_deref(),
        req.closing_time.as_deref(),
    )?;

    let city: Option<(i64,)> = sqlx::query_as("SELECT id FROM cities WHERE id = ?")
        .bind(req.city_id)
        .fetch_optional(&state.db)
        .await?;
    if city.is_none() {
        return Err(ApiError::not_found("City not found"));
    }

    let services = serde_json::to_string(&req.services)
        .map_err(|_| ApiError::validation_field("services", "Invalid services list"))?;
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;
    let result = sqlx::query(
        "INSERT INTO salons \
         (city_id, name, owner_name, email, phone, address, services, opening_time, closing_time, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(req.city_id)
    .bind(req.name.trim())
    .bind(&req.owner_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.address)
    .bind(&services)
    .bind(&req.opening_time)
    .bind(&req.closing_time)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    let salon_id = result.last_insert_rowid();

    for url in &req.images {
        sqlx::query(
            "INSERT INTO salon_images (salon_id, image_url, created_at) VALUES (?, ?, ?)",
        )
        .bind(salon_id)
        .bind(url)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(salon = salon_id, name = %req.name, "Salon created");

    let salon = load_salon(&state.db, salon_id).await?;
    let images = sqlx::query_as::<_, SalonImage>("SELECT * FROM salon_images WHERE salon_id = ?")
        .bind(salon_id)
        .fetch_all(&state.db)
        .await?;
    Ok((StatusCode::CREATED, Json(SalonResponse::from_salon(salon, images))))
}

/// Update a salon; when `images` is present the image set is replaced
///
/// PUT /api/admin/salons/:id
pub async fn update_salon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSalonRequest>,
) -> Result<Json<SalonResponse>, ApiError> {
    let existing = load_salon(&state.db, id).await?;

    validate_salon_fields(
        req.name.as_deref(),
        req.phone.as_deref(),
        req.opening_time.as_deref(),
        req.closing_time.as_deref(),
    )?;

    let services = match &req.services {
        Some(list) => Some(
            serde_json::to_string(list)
                .map_err(|_| ApiError::validation_field("services", "Invalid services list"))?,
        ),
        None => existing.services.clone(),
    };
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "UPDATE salons SET name = ?, owner_name = ?, email = ?, phone = ?, address = ?, \
         services = ?, opening_time = ?, closing_time = ?, updated_at = ? WHERE id = ?",
    )
    .bind(req.name.as_deref().unwrap_or(&existing.name))
    .bind(req.owner_name.as_ref().or(existing.owner_name.as_ref()))
    .bind(req.email.as_ref().or(existing.email.as_ref()))
    .bind(req.phone.as_deref().unwrap_or(&existing.phone))
    .bind(req.address.as_deref().unwrap_or(&existing.address))
    .bind(&services)
    .bind(req.opening_time.as_ref().or(existing.opening_time.as_ref()))
    .bind(req.closing_time.as_ref().or(existing.closing_time.as_ref()))
    .bind(&now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(images) = &req.images {
        sqlx::query("DELETE FROM salon_images WHERE salon_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for url in images {
            sqlx::query(
                "INSERT INTO salon_images (salon_id, image_url, created_at) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(url)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    let salon = load_salon(&state.db, id).await?;
    let images = sqlx::query_as::<_, SalonImage>("SELECT * FROM salon_images WHERE salon_id = ?")
        .bind(id)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(SalonResponse::from_salon(salon, images)))
}

/// Remove a salon's rows, then best-effort remove its stored objects.
/// Storage failures are logged and never block the database cleanup.
async fn delete_salon_rows(state: &AppState, id: i64) -> Result<(), ApiError> {
    let images = sqlx::query_as::<_, SalonImage>("SELECT * FROM salon_images WHERE salon_id = ?")
        .bind(id)
        .fetch_all(&state.db)
        .await?;

    let result = sqlx::query("DELETE FROM salons WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Salon not found"));
    }

    for image in images {
        if let Err(e) = state.storage.delete(&image.image_url).await {
            warn!(url = %image.image_url, error = %e, "Failed to remove stored image");
        }
    }
    Ok(())
}

/// DELETE /api/admin/salons/:id
pub async fn delete_salon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    delete_salon_rows(&state, id).await?;
    info!(salon = id, "Salon deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/salons/bulk-delete
pub async fn bulk_delete_salons(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkDeleteSalonsRequest>,
) -> Result<StatusCode, ApiError> {
    for id in req.ids {
        match delete_salon_rows(&state, id).await {
            Ok(()) => {}
            Err(e) => warn!(salon = id, error = %e, "Skipping salon in bulk delete"),
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/admin/salons/:id/status
pub async fn toggle_salon_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ToggleSalonStatusRequest>,
) -> Result<Json<SalonResponse>, ApiError> {
    load_salon(&state.db, id).await?;

    sqlx::query("UPDATE salons SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(req.is_active)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(&state.db)
        .await?;

    info!(salon = id, is_active = req.is_active, "Salon status changed");

    let salon = load_salon(&state.db, id).await?;
    let images = sqlx::query_as::<_, SalonImage>("SELECT * FROM salon_images WHERE salon_id = ?")
        .bind(id)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(SalonResponse::from_salon(salon, images)))
}

/// Upload gallery images for a salon (multipart, image/* only, max 5)
///
/// POST /api/admin/salons/:id/images
pub async fn upload_salon_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<SalonImage>>), ApiError> {
    let salon = load_salon(&state.db, id).await?;
    let prefix = crate::storage::sanitize_segment(&salon.name);

    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {e}")))?
    {
        if stored.len() >= MAX_UPLOAD_FILES {
            return Err(ApiError::validation_field(
                "images",
                format!("At most {MAX_UPLOAD_FILES} images per upload"),
            ));
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::validation_field("images", "Only image files are allowed"));
        }

        let original = field.file_name().unwrap_or("image").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::validation_field("images", "Image exceeds the 5 MB limit"));
        }

        let name = crate::storage::unique_name(&original);
        let url = state
            .storage
            .put(data, &name, Some(&prefix))
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store image: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO salon_images (salon_id, image_url, created_at) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(&url)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&state.db)
        .await?;

        let image = sqlx::query_as::<_, SalonImage>("SELECT * FROM salon_images WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&state.db)
            .await?;
        stored.push(image);
    }

    if stored.is_empty() {
        return Err(ApiError::validation_field("images", "No image files in upload"));
    }

    info!(salon = id, count = stored.len(), "Salon images uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Delete one salon image row, then best-effort remove the object
///
/// DELETE /api/admin/salons/images/:imageId
pub async fn delete_salon_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let image: Option<SalonImage> =
        sqlx::query_as("SELECT * FROM salon_images WHERE id = ?")
            .bind(image_id)
            .fetch_optional(&state.db)
            .await?;
    let image = image.ok_or_else(|| ApiError::not_found("Image not found"))?;

    sqlx::query("DELETE FROM salon_images WHERE id = ?")
        .bind(image_id)
        .execute(&state.db)
        .await?;

    if let Err(e) = state.storage.delete(&image.image_url).await {
        warn!(url = %image.image_url, error = %e, "Failed to remove stored image");
    }
    Ok(StatusCode::NO_CONTENT)
}
