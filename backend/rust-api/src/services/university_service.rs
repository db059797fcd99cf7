use anyhow::{anyhow, bail, Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::middlewares::auth::Principal;
use crate::models::license::LicensePackage;
use crate::models::university::{
    CreateUniversityRequest, LicenseStatus, University, UniversityDetail, UniversityStatsRow,
};
use crate::models::user::{User, UserRole};

use super::license_service;

/// Создание университета (Super Admin): админский аккаунт и запись
/// университета создаются последовательно; при сбое на втором шаге
/// созданный аккаунт удаляется.
pub struct UniversityService {
    mongo: Database,
}

impl UniversityService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn universities(&self) -> mongodb::Collection<University> {
        self.mongo.collection("universities")
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.mongo.collection("users")
    }

    pub async fn create_university(
        &self,
        _principal: &Principal,
        req: &CreateUniversityRequest,
    ) -> Result<UniversityDetail> {
        let existing = self
            .users()
            .count_documents(doc! { "email": &req.admin_email })
            .await
            .context("Failed to check existing user")?;
        if existing > 0 {
            bail!("User with this email already exists");
        }

        // Step 1: the admin account
        let password_hash =
            hash(&req.admin_password, DEFAULT_COST).context("Failed to hash password")?;
        let now = Utc::now();
        let admin = User {
            id: None,
            email: req.admin_email.clone(),
            password_hash,
            full_name: req.admin_full_name.clone(),
            role: UserRole::UniversityAdmin,
            university_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let insert_result = self
            .users()
            .insert_one(&admin)
            .await
            .context("Failed to insert university admin")?;
        let admin_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted admin ID"))?;

        // Step 2: the university record; compensate on failure
        let university = University {
            id: None,
            name: req.name.clone(),
            admin_id: Some(admin_id),
            license_limit: req.license_limit,
            license_expiry: now + Duration::days(req.license_expiry_days),
            status: LicenseStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let university_id = match self.universities().insert_one(&university).await {
            Ok(insert_result) => insert_result
                .inserted_id
                .as_object_id()
                .ok_or_else(|| anyhow!("Failed to get inserted university ID"))?,
            Err(e) => {
                tracing::warn!("University creation rolled back: {}", e);
                let _ = self.users().delete_one(doc! { "_id": admin_id }).await;
                return Err(anyhow!(e).context("Failed to insert university"));
            }
        };

        // Step 3: point the admin account at its university
        if let Err(e) = self
            .users()
            .update_one(
                doc! { "_id": admin_id },
                doc! { "$set": { "university_id": university_id } },
            )
            .await
        {
            tracing::warn!("University creation rolled back at admin link: {}", e);
            let _ = self
                .universities()
                .delete_one(doc! { "_id": university_id })
                .await;
            let _ = self.users().delete_one(doc! { "_id": admin_id }).await;
            return Err(anyhow!(e).context("Failed to link admin to university"));
        }

        tracing::info!(
            "University created: {} ({}) admin={}",
            req.name,
            university_id.to_hex(),
            admin_id.to_hex()
        );

        Ok(UniversityDetail {
            id: university_id.to_hex(),
            name: req.name.clone(),
            admin_id: Some(admin_id.to_hex()),
            admin_email: Some(req.admin_email.clone()),
            license_limit: req.license_limit,
            license_expiry: university.license_expiry,
            status: university.status,
            created_at: now,
        })
    }

    /// Per-university license usage for the super admin dashboard
    pub async fn list_with_usage(&self) -> Result<Vec<UniversityStatsRow>> {
        let cursor = self
            .universities()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await
            .context("Failed to query universities")?;
        let universities: Vec<University> = cursor
            .try_collect()
            .await
            .context("Failed to collect universities")?;

        let cursor = self
            .mongo
            .collection::<LicensePackage>("license_packages")
            .find(doc! {})
            .await
            .context("Failed to query license packages")?;
        let packages: Vec<LicensePackage> = cursor
            .try_collect()
            .await
            .context("Failed to collect license packages")?;

        let admin_ids: Vec<ObjectId> = universities
            .iter()
            .filter_map(|u| u.admin_id)
            .collect();
        let cursor = self
            .users()
            .find(doc! { "_id": { "$in": admin_ids } })
            .await
            .context("Failed to query admins")?;
        let admins: Vec<User> = cursor
            .try_collect()
            .await
            .context("Failed to collect admins")?;

        let mut rows = Vec::with_capacity(universities.len());
        for university in universities {
            let Some(university_id) = university.id else {
                continue;
            };

            let own_packages: Vec<LicensePackage> = packages
                .iter()
                .filter(|p| p.university_id == university_id)
                .cloned()
                .collect();
            let usage = license_service::usage_from_packages(&own_packages);

            let admin_email = university.admin_id.and_then(|admin_id| {
                admins
                    .iter()
                    .find(|u| u.id == Some(admin_id))
                    .map(|u| u.email.clone())
            });

            rows.push(UniversityStatsRow {
                university_id: university_id.to_hex(),
                university_name: university.name,
                admin_email,
                total_licenses: usage.total,
                used_licenses: usage.used,
                remaining_licenses: usage.remaining,
                usage_percentage: usage.percentage,
            });
        }

        Ok(rows)
    }
}
