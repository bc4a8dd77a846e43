use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A service provider. One-to-one with a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Provider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pincode: Option<String>,
    pub rating: Option<f64>,
    pub experience_years: Option<i32>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
    pub user_id: Uuid,
    pub business_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pincode: Option<String>,
    pub experience_years: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
    pub business_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pincode: Option<String>,
    pub experience_years: Option<i32>,
    pub is_available: Option<bool>,
}
