//! City catalog management. Cities are soft-disabled in the normal flow;
//! hard delete exists as a separate admin action.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::validation;
use crate::db::{BulkCreateCitiesRequest, BulkCreateCitiesResponse, City, CreateCityRequest};
use crate::AppState;

/// List all cities
///
/// GET /api/cities
pub async fn list_cities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<City>>, ApiError> {
    let cities = sqlx::query_as::<_, City>("SELECT * FROM cities ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(cities))
}

/// Create a new city
///
/// POST /api/admin/cities
pub async fn create_city(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCityRequest>,
) -> Result<(StatusCode, Json<City>), ApiError> {
    let name = req.name.trim();
    if let Err(e) = validation::validate_display_name(name) {
        return Err(ApiError::validation_field("name", e));
    }

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM cities WHERE name = ?")
        .bind(name)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("City already exists"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("INSERT INTO cities (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await?;

    let city = sqlx::query_as::<_, City>("SELECT * FROM cities WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    info!(city = %city.name, "City created");
    Ok((StatusCode::CREATED, Json(city)))
}

/// Bulk-create cities, skipping names that already exist
///
/// POST /api/admin/cities/bulk
pub async fn bulk_create_cities(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkCreateCitiesRequest>,
) -> Result<Json<BulkCreateCitiesResponse>, ApiError> {
    let names: Vec<String> = req
        .names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(ApiError::validation_field("names", "No valid city names provided"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut inserted = Vec::new();
    let mut skipped = Vec::new();

    for name in names {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM cities WHERE name = ?")
            .bind(&name)
            .fetch_optional(&state.db)
            .await?;
        if existing.is_some() {
            skipped.push(name);
            continue;
        }
        sqlx::query("INSERT INTO cities (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&name)
            .bind(&now)
            .bind(&now)
            .execute(&state.db)
            .await?;
        inserted.push(name);
    }

    info!(
        inserted = inserted.len(),
        skipped = skipped.len(),
        "Bulk city insert"
    );
    Ok(Json(BulkCreateCitiesResponse { inserted, skipped }))
}

async fn set_city_active(state: &AppState, id: i64, is_active: bool) -> Result<City, ApiError> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM cities WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_none() {
        return Err(ApiError::not_found("City not found"));
    }

    sqlx::query("UPDATE cities SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(&state.db)
        .await?;

    let city = sqlx::query_as::<_, City>("SELECT * FROM cities WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    Ok(city)
}

/// PUT /api/admin/cities/:id/activate
pub async fn activate_city(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<City>, ApiError> {
    let city = set_city_active(&state, id, true).await?;
    info!(city = %city.name, "City activated");
    Ok(Json(city))
}

/// PUT /api/admin/cities/:id/deactivate
pub async fn deactivate_city(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<City>, ApiError> {
    let city = set_city_active(&state, id, false).await?;
    info!(city = %city.name, "City deactivated");
    Ok(Json(city))
}

/// Hard-delete a city (cascades to its salons)
///
/// DELETE /api/admin/cities/:id
pub async fn delete_city(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM cities WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("City not found"));
    }
    info!(city = id, "City deleted");
    Ok(StatusCode::NO_CONTENT)
}
