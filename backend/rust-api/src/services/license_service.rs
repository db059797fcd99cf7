use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOneAndUpdateOptions;
use mongodb::options::ReturnDocument;
use mongodb::Database;

use crate::middlewares::auth::Principal;
use crate::models::license::{CreateLicensePackageRequest, LicensePackage};
use crate::models::university::{LicenseStatus, University};
use crate::utils::time::chrono_to_bson;

/// Seat accounting for university license pools. The capacity check and
/// the usage increment are one filtered update, so the pool can never be
/// oversubscribed by concurrent provisioning.
pub struct LicenseService {
    mongo: Database,
}

#[derive(Debug, Clone, Copy)]
pub struct LicenseUsage {
    pub total: i64,
    pub used: i64,
    pub remaining: i64,
    pub percentage: f64,
}

impl LicenseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn packages(&self) -> mongodb::Collection<LicensePackage> {
        self.mongo.collection("license_packages")
    }

    /// Create a seat pool for a university (super admin)
    pub async fn create_package(
        &self,
        principal: &Principal,
        req: &CreateLicensePackageRequest,
    ) -> Result<LicensePackage> {
        let university_id = ObjectId::parse_str(&req.university_id)
            .map_err(|_| anyhow!("Invalid university id"))?;

        let university_exists = self
            .mongo
            .collection::<University>("universities")
            .count_documents(doc! { "_id": university_id })
            .await
            .context("Failed to verify university")?;
        if university_exists == 0 {
            bail!("University not found");
        }

        let now = Utc::now();
        let mut package = LicensePackage {
            id: None,
            university_id,
            total_licenses: req.total_licenses,
            used_licenses: 0,
            price_per_license: req.price_per_license,
            status: LicenseStatus::Active,
            expires_at: now + Duration::days(req.expires_in_days),
            created_by: Some(principal.id),
            created_at: now,
        };

        let insert_result = self
            .packages()
            .insert_one(&package)
            .await
            .context("Failed to insert license package")?;
        package.id = insert_result.inserted_id.as_object_id();

        tracing::info!(
            "License package created: university={} seats={}",
            university_id.to_hex(),
            req.total_licenses
        );

        Ok(package)
    }

    /// Atomically claim one seat from the newest active package with
    /// capacity. Returns the package after the increment.
    pub async fn reserve_seat(&self, university_id: &ObjectId) -> Result<LicensePackage> {
        let now = chrono_to_bson(Utc::now());

        let package = self
            .packages()
            .find_one_and_update(
                doc! {
                    "university_id": university_id,
                    "status": "active",
                    "expires_at": { "$gt": now },
                    "$expr": { "$lt": ["$used_licenses", "$total_licenses"] },
                },
                doc! { "$inc": { "used_licenses": 1 } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .sort(doc! { "created_at": -1 })
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .context("Failed to reserve license seat")?;

        package.ok_or_else(|| anyhow!("No available licenses remaining"))
    }

    /// Compensation for a failed provisioning step: hand the seat back
    pub async fn release_seat(&self, package_id: &ObjectId) -> Result<()> {
        let update_result = self
            .packages()
            .update_one(
                doc! {
                    "_id": package_id,
                    "used_licenses": { "$gt": 0 },
                },
                doc! { "$inc": { "used_licenses": -1 } },
            )
            .await
            .context("Failed to release license seat")?;

        if update_result.modified_count == 0 {
            tracing::warn!(
                "Seat release found nothing to decrement on package {}",
                package_id.to_hex()
            );
        }

        Ok(())
    }

    /// Aggregate usage across all packages of a university
    pub async fn usage_for(&self, university_id: &ObjectId) -> Result<LicenseUsage> {
        let cursor = self
            .packages()
            .find(doc! { "university_id": university_id })
            .await
            .context("Failed to query license packages")?;

        let packages: Vec<LicensePackage> = cursor
            .try_collect()
            .await
            .context("Failed to collect license packages")?;

        Ok(usage_from_packages(&packages))
    }
}

pub fn usage_from_packages(packages: &[LicensePackage]) -> LicenseUsage {
    let total: i64 = packages.iter().map(|p| p.total_licenses).sum();
    let used: i64 = packages.iter().map(|p| p.used_licenses).sum();
    let remaining = (total - used).max(0);
    let percentage = if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    LicenseUsage {
        total,
        used,
        remaining,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(total: i64, used: i64) -> LicensePackage {
        LicensePackage {
            id: Some(ObjectId::new()),
            university_id: ObjectId::new(),
            total_licenses: total,
            used_licenses: used,
            price_per_license: 10.0,
            status: LicenseStatus::Active,
            expires_at: Utc::now() + Duration::days(30),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn usage_sums_across_packages() {
        let usage = usage_from_packages(&[package(100, 40), package(50, 10)]);
        assert_eq!(usage.total, 150);
        assert_eq!(usage.used, 50);
        assert_eq!(usage.remaining, 100);
        assert!((usage.percentage - 33.333).abs() < 0.01);
    }

    #[test]
    fn usage_of_empty_pool_is_zero() {
        let usage = usage_from_packages(&[]);
        assert_eq!(usage.total, 0);
        assert_eq!(usage.remaining, 0);
        assert_eq!(usage.percentage, 0.0);
    }
}
