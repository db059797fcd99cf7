use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Audit log entry for authentication, admin and license events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub event_type: AuditEventType,

    /// Acting user id if authenticated (None for failed login attempts)
    pub user_id: Option<String>,

    /// Email/username used in the operation
    pub email: Option<String>,

    /// Whether the operation was successful
    pub success: bool,

    /// IP address of the client
    pub ip: Option<String>,

    /// User-Agent header
    pub user_agent: Option<String>,

    /// Additional details about the event
    pub details: Option<String>,

    /// Error message if operation failed
    pub error_message: Option<String>,

    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Login,
    LoginFailed,
    Register,
    RegisterFailed,
    Logout,
    RefreshToken,
    RefreshTokenFailed,
    ChangePassword,
    ChangePasswordFailed,
    AccessDenied,

    // Super admin actions
    CreateUniversity,
    CreateLicensePackage,
    ImportQuestions,

    // License pool actions (one row per seat movement)
    ProvisionStudent,
    ProvisionRolledBack,

    // Session administration
    ForceStopSession,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Login => "login",
            AuditEventType::LoginFailed => "login_failed",
            AuditEventType::Register => "register",
            AuditEventType::RegisterFailed => "register_failed",
            AuditEventType::Logout => "logout",
            AuditEventType::RefreshToken => "refresh_token",
            AuditEventType::RefreshTokenFailed => "refresh_token_failed",
            AuditEventType::ChangePassword => "change_password",
            AuditEventType::ChangePasswordFailed => "change_password_failed",
            AuditEventType::AccessDenied => "access_denied",
            AuditEventType::CreateUniversity => "create_university",
            AuditEventType::CreateLicensePackage => "create_license_package",
            AuditEventType::ImportQuestions => "import_questions",
            AuditEventType::ProvisionStudent => "provision_student",
            AuditEventType::ProvisionRolledBack => "provision_rolled_back",
            AuditEventType::ForceStopSession => "force_stop_session",
        }
    }
}
