use anyhow::{anyhow, Context, Result};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::middlewares::auth::Principal;
use crate::models::license::LicensePackage;
use crate::models::session::QuizSession;
use crate::models::university::{PlatformStats, University, UniversityDashboard};

use super::license_service;
use super::license_service::LicenseService;

/// Dashboard aggregates: straightforward sums and averages over fetched
/// rows, scoped by the caller's role.
pub struct ReportingService {
    mongo: Database,
}

impl ReportingService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// University admin dashboard: license usage plus session aggregates
    pub async fn university_dashboard(&self, principal: &Principal) -> Result<UniversityDashboard> {
        let university = self
            .mongo
            .collection::<University>("universities")
            .find_one(doc! { "admin_id": principal.id })
            .await
            .context("Failed to query university")?
            .ok_or_else(|| anyhow!("No university assigned to this admin"))?;
        let university_id = university
            .id
            .ok_or_else(|| anyhow!("University has no id"))?;

        let usage = LicenseService::new(self.mongo.clone())
            .usage_for(&university_id)
            .await?;

        let students = self
            .mongo
            .collection::<mongodb::bson::Document>("users")
            .count_documents(doc! { "university_id": university_id, "role": "student" })
            .await
            .context("Failed to count students")?;

        let cursor = self
            .mongo
            .collection::<QuizSession>("quiz_sessions")
            .find(doc! { "university_id": university_id, "status": "completed" })
            .await
            .context("Failed to query completed sessions")?;
        let completed: Vec<QuizSession> = cursor
            .try_collect()
            .await
            .context("Failed to collect completed sessions")?;

        Ok(UniversityDashboard {
            university_id: university_id.to_hex(),
            university_name: university.name,
            total_licenses: usage.total,
            used_licenses: usage.used,
            remaining_licenses: usage.remaining,
            usage_percentage: usage.percentage,
            students,
            sessions_completed: completed.len() as u64,
            average_score: average_score(&completed),
        })
    }

    /// Platform totals for the super admin dashboard
    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        let universities = self
            .mongo
            .collection::<mongodb::bson::Document>("universities")
            .count_documents(doc! {})
            .await
            .context("Failed to count universities")?;

        let students = self
            .mongo
            .collection::<mongodb::bson::Document>("users")
            .count_documents(doc! { "role": "student" })
            .await
            .context("Failed to count students")?;

        let sessions = self
            .mongo
            .collection::<mongodb::bson::Document>("quiz_sessions");
        let sessions_active = sessions
            .count_documents(doc! { "status": "active" })
            .await
            .context("Failed to count active sessions")?;
        let sessions_completed = sessions
            .count_documents(doc! { "status": "completed" })
            .await
            .context("Failed to count completed sessions")?;
        let sessions_expired = sessions
            .count_documents(doc! { "status": "expired" })
            .await
            .context("Failed to count expired sessions")?;

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
        let usage = license_service::usage_from_packages(&packages);

        Ok(PlatformStats {
            universities,
            students,
            total_licenses: usage.total,
            used_licenses: usage.used,
            sessions_active,
            sessions_completed,
            sessions_expired,
        })
    }

    /// The admin's university id, for scoping session lists
    pub async fn university_id_of(&self, principal: &Principal) -> Result<ObjectId> {
        let university = self
            .mongo
            .collection::<University>("universities")
            .find_one(doc! { "admin_id": principal.id })
            .await
            .context("Failed to query university")?
            .ok_or_else(|| anyhow!("No university assigned to this admin"))?;

        university.id.ok_or_else(|| anyhow!("University has no id"))
    }
}

fn average_score(sessions: &[QuizSession]) -> Option<f64> {
    let scores: Vec<i32> = sessions.iter().filter_map(|s| s.score).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionStatus;
    use chrono::Utc;

    fn scored_session(score: Option<i32>) -> QuizSession {
        QuizSession {
            id: Some(ObjectId::new()),
            student_id: ObjectId::new(),
            university_id: ObjectId::new(),
            status: SessionStatus::Completed,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            duration_minutes: 55,
            time_taken_minutes: Some(40),
            total_questions: Some(10),
            correct_answers: score.map(|s| (s / 10) as u32),
            score,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn average_ignores_unscored_sessions() {
        let sessions = vec![
            scored_session(Some(80)),
            scored_session(Some(40)),
            scored_session(None),
        ];
        assert_eq!(average_score(&sessions), Some(60.0));
    }

    #[test]
    fn average_of_nothing_is_none() {
        assert_eq!(average_score(&[]), None);
    }
}
