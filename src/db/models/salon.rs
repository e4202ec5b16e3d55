//! Salon models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Salon {
    pub id: i64,
    pub city_id: i64,
    pub name: String,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    /// JSON array of service names, stored as text
    pub services: Option<String>,
    pub rating: f64,
    pub total_reviews: i64,
    pub is_active: bool,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalonImage {
    pub id: i64,
    pub salon_id: i64,
    pub image_url: String,
    pub is_primary: bool,
    pub kind: String,
    pub created_at: String,
}

/// Salon with its images and decoded services for list/detail views
#[derive(Debug, Clone, Serialize)]
pub struct SalonResponse {
    pub id: i64,
    pub city_id: i64,
    pub name: String,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    pub services: Vec<String>,
    pub rating: f64,
    pub total_reviews: i64,
    pub is_active: bool,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub images: Vec<SalonImage>,
    pub created_at: String,
    pub updated_at: String,
}

impl SalonResponse {
    pub fn from_salon(salon: Salon, images: Vec<SalonImage>) -> Self {
        let services = parse_services(salon.services.as_deref());
        Self {
            id: salon.id,
            city_id: salon.city_id,
            name: salon.name,
            owner_name: salon.owner_name,
            email: salon.email,
            phone: salon.phone,
            address: salon.address,
            services,
            rating: salon.rating,
            total_reviews: salon.total_reviews,
            is_active: salon.is_active,
            opening_time: salon.opening_time,
            closing_time: salon.closing_time,
            images,
            created_at: salon.created_at,
            updated_at: salon.updated_at,
        }
    }
}

/// Helper to parse the services JSON column
pub fn parse_services(json: Option<&str>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct CreateSalonRequest {
    pub city_id: i64,
    pub name: String,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub services: Vec<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    /// Pre-uploaded image URLs to attach on creation
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSalonRequest {
    pub name: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub services: Option<Vec<String>>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    /// When present, replaces the salon's image set
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleSalonStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteSalonsRequest {
    pub ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services() {
        assert_eq!(
            parse_services(Some(r#"["Haircut","Spa"]"#)),
            vec!["Haircut".to_string(), "Spa".to_string()]
        );
        assert!(parse_services(Some("not json")).is_empty());
        assert!(parse_services(None).is_empty());
    }
}
