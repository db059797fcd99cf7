use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::Database;

use crate::models::audit_log::{AuditEventType, AuditLog};

/// Parameters for audit event logging
#[derive(Debug)]
pub struct AuditEventParams {
    pub event_type: AuditEventType,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<String>,
    pub error_message: Option<String>,
}

impl AuditEventParams {
    fn event(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            user_id: None,
            email: None,
            success: true,
            ip: None,
            user_agent: None,
            details: None,
            error_message: None,
        }
    }
}

/// Service for audit logging. Failures are never fatal to the calling
/// operation; callers discard the result after tracing it.
pub struct AuditService {
    mongo: Database,
}

impl AuditService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn log_event(&self, params: AuditEventParams) -> Result<()> {
        let audit_log = AuditLog {
            id: None,
            event_type: params.event_type,
            user_id: params.user_id,
            email: params.email,
            success: params.success,
            ip: params.ip,
            user_agent: params.user_agent,
            details: params.details,
            error_message: params.error_message,
            created_at: Utc::now(),
        };

        self.mongo
            .collection::<AuditLog>("audit_log")
            .insert_one(audit_log)
            .await
            .context("Failed to insert audit log")?;

        Ok(())
    }

    pub async fn log_login_success(
        &self,
        user_id: &str,
        email: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<()> {
        self.log_event(AuditEventParams {
            user_id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            ip,
            user_agent,
            ..AuditEventParams::event(AuditEventType::Login)
        })
        .await
    }

    pub async fn log_login_failed(
        &self,
        email: &str,
        ip: Option<String>,
        user_agent: Option<String>,
        error: &str,
    ) -> Result<()> {
        self.log_event(AuditEventParams {
            email: Some(email.to_string()),
            success: false,
            ip,
            user_agent,
            error_message: Some(error.to_string()),
            ..AuditEventParams::event(AuditEventType::LoginFailed)
        })
        .await
    }

    pub async fn log_register(&self, user_id: &str, email: &str, success: bool) -> Result<()> {
        let event_type = if success {
            AuditEventType::Register
        } else {
            AuditEventType::RegisterFailed
        };
        self.log_event(AuditEventParams {
            user_id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            success,
            ..AuditEventParams::event(event_type)
        })
        .await
    }

    pub async fn log_university_created(
        &self,
        actor_id: &str,
        university_name: &str,
        admin_email: &str,
    ) -> Result<()> {
        self.log_event(AuditEventParams {
            user_id: Some(actor_id.to_string()),
            email: Some(admin_email.to_string()),
            details: Some(format!("university={}", university_name)),
            ..AuditEventParams::event(AuditEventType::CreateUniversity)
        })
        .await
    }

    pub async fn log_license_package_created(
        &self,
        actor_id: &str,
        university_id: &str,
        seats: i64,
    ) -> Result<()> {
        self.log_event(AuditEventParams {
            user_id: Some(actor_id.to_string()),
            details: Some(format!("university={} seats={}", university_id, seats)),
            ..AuditEventParams::event(AuditEventType::CreateLicensePackage)
        })
        .await
    }

    pub async fn log_provision(
        &self,
        actor_id: &str,
        student_email: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()> {
        let event_type = if success {
            AuditEventType::ProvisionStudent
        } else {
            AuditEventType::ProvisionRolledBack
        };
        self.log_event(AuditEventParams {
            user_id: Some(actor_id.to_string()),
            email: Some(student_email.to_string()),
            success,
            error_message: error.map(|e| e.to_string()),
            ..AuditEventParams::event(event_type)
        })
        .await
    }

    pub async fn log_force_stop(&self, actor_id: &str, session_id: &str) -> Result<()> {
        self.log_event(AuditEventParams {
            user_id: Some(actor_id.to_string()),
            details: Some(format!("session={}", session_id)),
            ..AuditEventParams::event(AuditEventType::ForceStopSession)
        })
        .await
    }

    pub async fn log_questions_imported(&self, actor_id: &str, count: usize) -> Result<()> {
        self.log_event(AuditEventParams {
            user_id: Some(actor_id.to_string()),
            details: Some(format!("count={}", count)),
            ..AuditEventParams::event(AuditEventType::ImportQuestions)
        })
        .await
    }
}
