use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::bson_datetime_as_chrono;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Suspended,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Suspended => "suspended",
        }
    }
}

/// University record in the "universities" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct University {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<ObjectId>,
    pub license_limit: i64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub license_expiry: DateTime<Utc>,
    pub status: LicenseStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

/// Create a university together with its admin account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUniversityRequest {
    #[validate(length(min = 1, max = 200, message = "University name must not be empty"))]
    pub name: String,

    #[validate(email(message = "Invalid admin email format"))]
    pub admin_email: String,

    #[validate(length(min = 8, message = "Admin password must be at least 8 characters"))]
    pub admin_password: String,

    #[validate(length(min = 1, max = 100, message = "Admin name must not be empty"))]
    pub admin_full_name: String,

    #[validate(range(min = 1, message = "License limit must be positive"))]
    pub license_limit: i64,

    /// Days until the license expires; defaults to one week as the
    /// trial window for a newly created university.
    #[validate(range(min = 1, max = 3650, message = "Expiry must be between 1 and 3650 days"))]
    #[serde(default = "default_expiry_days")]
    pub license_expiry_days: i64,
}

fn default_expiry_days() -> i64 {
    7
}

#[derive(Debug, Serialize)]
pub struct UniversityDetail {
    pub id: String,
    pub name: String,
    pub admin_id: Option<String>,
    pub admin_email: Option<String>,
    pub license_limit: i64,
    pub license_expiry: DateTime<Utc>,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-university license usage row for the super admin dashboard
#[derive(Debug, Serialize)]
pub struct UniversityStatsRow {
    pub university_id: String,
    pub university_name: String,
    pub admin_email: Option<String>,
    pub total_licenses: i64,
    pub used_licenses: i64,
    pub remaining_licenses: i64,
    pub usage_percentage: f64,
}

/// Platform-wide totals for the super admin dashboard
#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub universities: u64,
    pub students: u64,
    pub total_licenses: i64,
    pub used_licenses: i64,
    pub sessions_active: u64,
    pub sessions_completed: u64,
    pub sessions_expired: u64,
}

/// University admin dashboard aggregates
#[derive(Debug, Serialize)]
pub struct UniversityDashboard {
    pub university_id: String,
    pub university_name: String,
    pub total_licenses: i64,
    pub used_licenses: i64,
    pub remaining_licenses: i64,
    pub usage_percentage: f64,
    pub students: u64,
    pub sessions_completed: u64,
    pub average_score: Option<f64>,
}

