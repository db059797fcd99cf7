use anyhow::{anyhow, bail, Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::metrics::LICENSES_PROVISIONED_TOTAL;
use crate::middlewares::auth::Principal;
use crate::models::license::{
    ProvisionStudentRequest, ProvisionedStudent, StudentLicense, StudentRosterEntry,
};
use crate::models::notification::NotificationKind;
use crate::models::university::University;
use crate::models::user::{User, UserRole};

use super::license_service::LicenseService;
use super::notification_service::NotificationService;

/// Student provisioning for university admins.
///
/// The original check-then-insert-then-increment sequence is run as a
/// compensating saga: the seat is claimed first with an atomic guarded
/// increment, and every later failure releases the seat and deletes
/// whatever was already created. No orphaned account or miscounted pool
/// survives a partial failure.
pub struct StudentService {
    mongo: Database,
}

impl StudentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.mongo.collection("users")
    }

    fn licenses(&self) -> mongodb::Collection<StudentLicense> {
        self.mongo.collection("student_licenses")
    }

    pub async fn provision(
        &self,
        principal: &Principal,
        req: &ProvisionStudentRequest,
    ) -> Result<ProvisionedStudent> {
        let university = self.university_of(principal).await?;
        let university_id = university
            .id
            .ok_or_else(|| anyhow!("University has no id"))?;

        // Validation before any write
        let existing = self
            .users()
            .count_documents(doc! { "email": &req.email })
            .await
            .context("Failed to check existing user")?;
        if existing > 0 {
            LICENSES_PROVISIONED_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            bail!("User with this email already exists");
        }

        let license_service = LicenseService::new(self.mongo.clone());

        // Step 1: claim the seat. The filtered increment is the capacity
        // check; from here on every failure must compensate.
        let package = license_service.reserve_seat(&university_id).await?;
        let package_id = package.id.ok_or_else(|| anyhow!("Package has no id"))?;

        // Step 2: create the student account
        let student_id = match self.insert_student(req, university_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Provisioning rolled back at account creation: {}", e);
                let _ = license_service.release_seat(&package_id).await;
                LICENSES_PROVISIONED_TOTAL
                    .with_label_values(&["rolled_back"])
                    .inc();
                return Err(e);
            }
        };

        // Step 3: record the seat assignment
        let license = StudentLicense {
            id: None,
            student_id,
            university_id,
            license_package_id: package_id,
            username: req.username.clone(),
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        };

        let license_id = match self.licenses().insert_one(&license).await {
            Ok(insert_result) => insert_result
                .inserted_id
                .as_object_id()
                .ok_or_else(|| anyhow!("Failed to get inserted license ID"))?,
            Err(e) => {
                tracing::warn!("Provisioning rolled back at license insert: {}", e);
                let _ = self.users().delete_one(doc! { "_id": student_id }).await;
                let _ = license_service.release_seat(&package_id).await;
                LICENSES_PROVISIONED_TOTAL
                    .with_label_values(&["rolled_back"])
                    .inc();
                return Err(anyhow!(e).context("Failed to insert student license"));
            }
        };

        // Best-effort notification; provisioning already succeeded
        let notifications = NotificationService::new(self.mongo.clone());
        let _ = notifications
            .notify(
                principal.id,
                "Student provisioned",
                &format!(
                    "{} ({}) was added with username {}",
                    req.full_name, req.email, req.username
                ),
                NotificationKind::StudentProvisioned,
            )
            .await;

        let remaining = package.remaining();
        if remaining <= 5 {
            let _ = notifications
                .notify(
                    principal.id,
                    "License pool running low",
                    &format!("Only {} licenses remaining in the active package", remaining),
                    NotificationKind::LicensePoolLow,
                )
                .await;
        }

        LICENSES_PROVISIONED_TOTAL
            .with_label_values(&["provisioned"])
            .inc();

        tracing::info!(
            "Student provisioned: {} university={} package={} remaining={}",
            student_id.to_hex(),
            university_id.to_hex(),
            package_id.to_hex(),
            remaining
        );

        Ok(ProvisionedStudent {
            student_id: student_id.to_hex(),
            email: req.email.clone(),
            full_name: req.full_name.clone(),
            username: req.username.clone(),
            license_id: license_id.to_hex(),
            license_package_id: package_id.to_hex(),
            remaining_licenses: remaining,
        })
    }

    /// Roster of the admin's university: license rows joined with accounts
    pub async fn roster(&self, principal: &Principal) -> Result<Vec<StudentRosterEntry>> {
        let university = self.university_of(principal).await?;
        let university_id = university
            .id
            .ok_or_else(|| anyhow!("University has no id"))?;

        let cursor = self
            .licenses()
            .find(doc! { "university_id": university_id })
            .sort(doc! { "created_at": -1 })
            .await
            .context("Failed to query student licenses")?;
        let licenses: Vec<StudentLicense> = cursor
            .try_collect()
            .await
            .context("Failed to collect student licenses")?;

        let student_ids: Vec<ObjectId> = licenses.iter().map(|l| l.student_id).collect();
        let cursor = self
            .users()
            .find(doc! { "_id": { "$in": student_ids } })
            .await
            .context("Failed to query students")?;
        let students: Vec<User> = cursor
            .try_collect()
            .await
            .context("Failed to collect students")?;

        let mut roster = Vec::with_capacity(licenses.len());
        for license in licenses {
            let Some(student) = students
                .iter()
                .find(|u| u.id == Some(license.student_id))
            else {
                tracing::warn!(
                    "License {} references missing student {}",
                    license.id.map(|id| id.to_hex()).unwrap_or_default(),
                    license.student_id.to_hex()
                );
                continue;
            };

            roster.push(StudentRosterEntry {
                student_id: license.student_id.to_hex(),
                full_name: student.full_name.clone(),
                email: student.email.clone(),
                username: license.username,
                is_active: license.is_active && student.is_active,
                last_login: license.last_login,
                created_at: license.created_at,
            });
        }

        Ok(roster)
    }

    pub async fn university_of(&self, principal: &Principal) -> Result<University> {
        self.mongo
            .collection::<University>("universities")
            .find_one(doc! { "admin_id": principal.id })
            .await
            .context("Failed to query university")?
            .ok_or_else(|| anyhow!("No university assigned to this admin"))
    }

    async fn insert_student(
        &self,
        req: &ProvisionStudentRequest,
        university_id: ObjectId,
    ) -> Result<ObjectId> {
        let password_hash = hash(&req.password, DEFAULT_COST).context("Failed to hash password")?;

        let now = Utc::now();
        let student = User {
            id: None,
            email: req.email.clone(),
            password_hash,
            full_name: req.full_name.clone(),
            role: UserRole::Student,
            university_id: Some(university_id),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let insert_result = self
            .users()
            .insert_one(&student)
            .await
            .context("Failed to insert student")?;

        insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted student ID"))
    }
}
