use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::university::LicenseStatus;
use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Seat pool sold to a university, stored in "license_packages".
/// `used_licenses` never exceeds `total_licenses`; the reservation
/// update enforces the bound with a filtered increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePackage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub university_id: ObjectId,
    pub total_licenses: i64,
    pub used_licenses: i64,
    pub price_per_license: f64,
    pub status: LicenseStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl LicensePackage {
    pub fn remaining(&self) -> i64 {
        (self.total_licenses - self.used_licenses).max(0)
    }
}

/// One provisioned seat, stored in "student_licenses"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLicense {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: ObjectId,
    pub university_id: ObjectId,
    pub license_package_id: ObjectId,
    pub username: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLicensePackageRequest {
    pub university_id: String,

    #[validate(range(min = 1, max = 100000, message = "License count must be positive"))]
    pub total_licenses: i64,

    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    #[serde(default)]
    pub price_per_license: f64,

    #[validate(range(min = 1, max = 3650, message = "Expiry must be between 1 and 3650 days"))]
    #[serde(default = "default_package_expiry_days")]
    pub expires_in_days: i64,
}

fn default_package_expiry_days() -> i64 {
    365
}

#[derive(Debug, Serialize)]
pub struct LicensePackageView {
    pub id: String,
    pub university_id: String,
    pub total_licenses: i64,
    pub used_licenses: i64,
    pub remaining_licenses: i64,
    pub price_per_license: f64,
    pub status: LicenseStatus,
    pub expires_at: DateTime<Utc>,
}

impl From<LicensePackage> for LicensePackageView {
    fn from(package: LicensePackage) -> Self {
        let remaining = package.remaining();
        LicensePackageView {
            id: package.id.map(|id| id.to_hex()).unwrap_or_default(),
            university_id: package.university_id.to_hex(),
            total_licenses: package.total_licenses,
            used_licenses: package.used_licenses,
            remaining_licenses: remaining,
            price_per_license: package.price_per_license,
            status: package.status,
            expires_at: package.expires_at,
        }
    }
}

/// University admin request to provision a student seat
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProvisionStudentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub full_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ProvisionedStudent {
    pub student_id: String,
    pub email: String,
    pub full_name: String,
    pub username: String,
    pub license_id: String,
    pub license_package_id: String,
    pub remaining_licenses: i64,
}

/// Student row in the university admin's roster
#[derive(Debug, Serialize)]
pub struct StudentRosterEntry {
    pub student_id: String,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
