use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Refresh token record. Only the SHA-256 hash of the opaque token is
/// stored; the plain value lives in the client's HTTP-only cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub token_hash: String,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", with = "bson_datetime_as_chrono")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "lastUsedAt", with = "bson_datetime_as_chrono")]
    pub last_used_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    /// Optional body fallback; the cookie is preferred
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
}
