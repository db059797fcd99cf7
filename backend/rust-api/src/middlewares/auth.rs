use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::user::UserRole;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,                    // user_id
    pub role: String,                   // super_admin, university_admin, student
    pub university_id: Option<String>,  // owning university (None for super admins)
    pub exp: usize,                     // expiration timestamp
    pub iat: usize,                     // issued at timestamp
}

/// The authenticated actor. Built from validated claims and passed
/// explicitly into every service operation; nothing reads auth state
/// ambiently.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: ObjectId,
    pub role: UserRole,
    pub university_id: Option<ObjectId>,
}

impl TryFrom<&JwtClaims> for Principal {
    type Error = AuthError;

    fn try_from(claims: &JwtClaims) -> Result<Self, Self::Error> {
        let id = ObjectId::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let role = UserRole::parse(&claims.role).ok_or(AuthError::InvalidToken)?;
        let university_id = claims
            .university_id
            .as_deref()
            .map(ObjectId::parse_str)
            .transpose()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Principal {
            id,
            role,
            university_id,
        })
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
    MissingToken,
    InvalidSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Token expired"),
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for AuthError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.to_string().contains("ExpiredSignature") {
                    AuthError::ExpiredToken
                } else if e.to_string().contains("InvalidSignature") {
                    AuthError::InvalidSignature
                } else {
                    AuthError::InvalidToken
                }
            })
    }
}

/// Validates the bearer token and stores claims in request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    tracing::debug!("Authenticated user: {} (role: {})", claims.sub, claims.role);

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub async fn super_admin_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    guard_role(&request, UserRole::SuperAdmin)?;
    Ok(next.run(request).await)
}

pub async fn university_admin_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    guard_role(&request, UserRole::UniversityAdmin)?;
    Ok(next.run(request).await)
}

fn guard_role(request: &Request, required: UserRole) -> Result<(), StatusCode> {
    let claims = request.extensions().get::<JwtClaims>();
    if let Some(claims) = claims {
        if claims.role == required.as_str() {
            return Ok(());
        }
    }
    tracing::warn!("Access denied: {} role required", required.as_str());
    Err(StatusCode::FORBIDDEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(role: &str, university_id: Option<&str>) -> JwtClaims {
        JwtClaims {
            sub: ObjectId::new().to_hex(),
            role: role.to_string(),
            university_id: university_id.map(|s| s.to_string()),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iat: chrono::Utc::now().timestamp() as usize,
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");

        let claims = claims_for("student", Some(&ObjectId::new().to_hex()));
        let token = service.generate_token(claims.clone()).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.role, claims.role);
        assert_eq!(validated.university_id, claims.university_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = JwtService::new("secret-a");
        let other = JwtService::new("secret-b");

        let token = service
            .generate_token(claims_for("super_admin", None))
            .unwrap();
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn principal_from_claims() {
        let university = ObjectId::new();
        let claims = claims_for("university_admin", Some(&university.to_hex()));

        let principal = Principal::try_from(&claims).unwrap();
        assert_eq!(principal.role, UserRole::UniversityAdmin);
        assert_eq!(principal.university_id, Some(university));
    }

    #[test]
    fn principal_rejects_unknown_role() {
        let claims = claims_for("janitor", None);
        assert!(Principal::try_from(&claims).is_err());
    }
}
