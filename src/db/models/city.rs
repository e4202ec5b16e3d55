use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCityRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateCitiesRequest {
    pub names: Vec<String>,
}

/// Result of a bulk insert: names actually inserted vs. already present.
#[derive(Debug, Serialize)]
pub struct BulkCreateCitiesResponse {
    pub inserted: Vec<String>,
    pub skipped: Vec<String>,
}
