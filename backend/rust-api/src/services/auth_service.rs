use crate::middlewares::auth::JwtService;
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile, UserRole};
use anyhow::{anyhow, bail, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::utils::time::chrono_to_bson;

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService) -> Self {
        let access_token_ttl_seconds = std::env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(3600); // Default: 1 hour

        let refresh_token_ttl_seconds = std::env::var("JWT_REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(2592000); // Default: 30 days

        Self {
            mongo,
            jwt_service,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        }
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.mongo.collection("users")
    }

    fn refresh_tokens(&self) -> mongodb::Collection<RefreshToken> {
        self.mongo.collection("refresh_tokens")
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    /// Bootstrap registration: creates the initial super admin and is
    /// refused as soon as one exists. Students and university admins are
    /// provisioned through their respective admin flows.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        let super_admins = self
            .users()
            .count_documents(doc! { "role": "super_admin" })
            .await
            .context("Failed to count super admins")?;

        if super_admins > 0 {
            bail!("Registration is closed; accounts are provisioned by an administrator");
        }

        let existing_user = self
            .users()
            .find_one(doc! { "email": &req.email })
            .await
            .context("Failed to check existing user")?;

        if existing_user.is_some() {
            bail!("User with this email already exists");
        }

        let password_hash = self.hash_password(&req.password)?;

        let now = Utc::now();
        let user = User {
            id: None,
            email: req.email.clone(),
            password_hash,
            full_name: req.full_name,
            role: UserRole::SuperAdmin,
            university_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let insert_result = self
            .users()
            .insert_one(&user)
            .await
            .context("Failed to insert user")?;

        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted user ID"))?;

        let access_token = self.generate_access_token(&user_id, user.role, None)?;
        let refresh_token = self.create_refresh_token(&user_id, true, None, None).await?;

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);

        tracing::info!("Initial super admin registered: {}", req.email);

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: UserProfile::from(user_with_id),
        })
    }

    /// Login with email and password
    pub async fn login(
        &self,
        req: LoginRequest,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthResponse> {
        let user = self
            .users()
            .find_one(doc! { "email": &req.email })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("Invalid email or password"))?;

        if !user.is_active {
            bail!("User account is deactivated");
        }

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(
                email = %req.email,
                ip = ?ip,
                "Failed login attempt: invalid password"
            );
            bail!("Invalid email or password");
        }

        let user_id = user.id.ok_or_else(|| anyhow!("User ID not found"))?;

        let now = Utc::now();
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "lastLoginAt": chrono_to_bson(now) } },
            )
            .await
            .context("Failed to update last login timestamp")?;

        // Student logins also stamp the license row the dashboard reads
        if user.role == UserRole::Student {
            let _ = self
                .mongo
                .collection::<mongodb::bson::Document>("student_licenses")
                .update_one(
                    doc! { "student_id": user_id },
                    doc! { "$set": { "last_login": chrono_to_bson(now) } },
                )
                .await;
        }

        let access_token =
            self.generate_access_token(&user_id, user.role, user.university_id.as_ref())?;
        let refresh_token = self
            .create_refresh_token(&user_id, req.remember_me, ip.clone(), user_agent)
            .await?;

        tracing::info!(
            user_id = %user_id.to_hex(),
            email = %req.email,
            role = %user.role.as_str(),
            "Successful login"
        );

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    /// Exchange a valid refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let token_hash = self.hash_token(refresh_token);
        let now = Utc::now();

        let record = self
            .refresh_tokens()
            .find_one(doc! {
                "token_hash": &token_hash,
                "revoked": false,
                "expiresAt": { "$gt": chrono_to_bson(now) },
            })
            .await
            .context("Failed to query refresh token")?
            .ok_or_else(|| anyhow!("Invalid or expired refresh token"))?;

        let user = self
            .users()
            .find_one(doc! { "_id": record.user_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("User not found"))?;

        if !user.is_active {
            bail!("User account is deactivated");
        }

        self.refresh_tokens()
            .update_one(
                doc! { "_id": record.id },
                doc! { "$set": { "lastUsedAt": chrono_to_bson(now) } },
            )
            .await
            .context("Failed to stamp refresh token")?;

        self.generate_access_token(&record.user_id, user.role, user.university_id.as_ref())
    }

    /// Revoke the presented refresh token
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let token_hash = self.hash_token(refresh_token);

        self.refresh_tokens()
            .update_one(
                doc! { "token_hash": &token_hash },
                doc! { "$set": { "revoked": true } },
            )
            .await
            .context("Failed to revoke refresh token")?;

        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &ObjectId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self
            .users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("User not found"))?;

        if !self.verify_password(old_password, &user.password_hash)? {
            bail!("Current password is incorrect");
        }

        let password_hash = self.hash_password(new_password)?;
        let now = Utc::now();

        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updatedAt": chrono_to_bson(now),
                }},
            )
            .await
            .context("Failed to update password")?;

        // Sign out every other device
        self.refresh_tokens()
            .update_many(
                doc! { "user_id": user_id },
                doc! { "$set": { "revoked": true } },
            )
            .await
            .context("Failed to revoke refresh tokens")?;

        Ok(())
    }

    pub async fn profile(&self, user_id: &ObjectId) -> Result<UserProfile> {
        let user = self
            .users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("User not found"))?;

        Ok(UserProfile::from(user))
    }

    fn generate_access_token(
        &self,
        user_id: &ObjectId,
        role: UserRole,
        university_id: Option<&ObjectId>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = crate::middlewares::auth::JwtClaims {
            sub: user_id.to_hex(),
            role: role.as_str().to_string(),
            university_id: university_id.map(|id| id.to_hex()),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(claims)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))
    }

    async fn create_refresh_token(
        &self,
        user_id: &ObjectId,
        remember_me: bool,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let token_hash = self.hash_token(&token);

        let now = Utc::now();
        let ttl = if remember_me {
            self.refresh_token_ttl_seconds
        } else {
            86400 // 1 day if not "remember me"
        };
        let expires_at = now + Duration::seconds(ttl);

        let refresh_token = RefreshToken {
            id: None,
            user_id: *user_id,
            token_hash,
            created_at: now,
            expires_at,
            last_used_at: now,
            user_agent,
            ip,
            revoked: false,
        };

        self.refresh_tokens()
            .insert_one(&refresh_token)
            .await
            .context("Failed to insert refresh token")?;

        Ok(token)
    }

    /// Hash a token using SHA-256
    fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_hash_is_stable_and_hex() {
        let service = AuthService::new(
            mongodb::Client::with_options(
                mongodb::options::ClientOptions::builder()
                    .hosts(vec![mongodb::options::ServerAddress::Tcp {
                        host: "localhost".to_string(),
                        port: Some(27017),
                    }])
                    .build(),
            )
            .unwrap()
            .database("test"),
            JwtService::new("test-secret"),
        );

        let a = service.hash_token("token-value");
        let b = service.hash_token("token-value");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
