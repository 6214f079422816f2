use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use tripbook_shared::Masked;
use uuid::Uuid;

use crate::identity::{Principal, Role};
use crate::repository::UserRepository;
use crate::reservation::looks_like_email;
use crate::{CoreError, CoreResult};

pub const MAX_EMAIL_LEN: usize = 60;
pub const MIN_PASSWORD_LEN: usize = 8;

/// A registered account. Token subjects resolve to one of these on every
/// authenticated request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Masked<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn create(email: &str, password: &str, role: Role) -> CoreResult<Self> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;
        Ok(Self {
            id: Uuid::new_v4(),
            email,
            password_hash: Masked::new(hash_password(password)?),
            role,
            active: true,
            created_at: Utc::now(),
        })
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        match PasswordHash::new(self.password_hash.expose()) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn set_password(&mut self, password: &str) -> CoreResult<()> {
        validate_password(password)?;
        self.password_hash = Masked::new(hash_password(password)?);
        Ok(())
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id.to_string(), self.email.clone(), self.role)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: Masked<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: Masked<String>,
    pub new_password: Masked<String>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> CoreResult<()> {
    if email.len() > MAX_EMAIL_LEN || !looks_like_email(email) {
        return Err(CoreError::ValidationError("a valid email address is required".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("password hashing failed: {}", e)))
}

/// Account registration and administration.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Self-service sign-up. Always creates a regular user.
    pub async fn register(&self, new: NewUser) -> CoreResult<User> {
        let user = User::create(&new.email, new.password.expose(), Role::User)?;
        if self.users.find_user_by_email(&user.email).await?.is_some() {
            return Err(CoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        self.users.insert_user(&user).await?;
        info!(user_id = %user.id, "account registered");
        Ok(user)
    }

    pub async fn list(&self, principal: &Principal, active_only: bool) -> CoreResult<Vec<User>> {
        principal.require_admin("list accounts")?;
        self.users.list_users(active_only).await
    }

    /// Admins cannot be deactivated.
    pub async fn deactivate(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        principal.require_admin("deactivate accounts")?;
        let mut user = self.find(id).await?;
        if user.role == Role::Admin {
            return Err(CoreError::Conflict("admin accounts cannot be deactivated".to_string()));
        }
        if !user.active {
            return Ok(());
        }
        user.active = false;
        self.users.save_user(&user).await?;
        info!(user_id = %id, by = %principal.id, "account deactivated");
        Ok(())
    }

    pub async fn change_password(&self, principal: &Principal, change: PasswordChange) -> CoreResult<()> {
        let mut user = self.account_of(principal).await?;
        if !user.verify_password(change.current_password.expose()) {
            warn!(user_id = %user.id, "password change with wrong current password");
            return Err(CoreError::ValidationError("current password is incorrect".to_string()));
        }
        user.set_password(change.new_password.expose())?;
        self.users.save_user(&user).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Resolve a token subject to the live account behind it. Deactivated
    /// accounts are refused even while their tokens are unexpired.
    pub async fn principal_for(&self, subject: &str) -> CoreResult<Principal> {
        let id = Uuid::parse_str(subject)
            .map_err(|_| CoreError::NotFound(format!("Account {}", subject)))?;
        let user = self.find(id).await?;
        if !user.active {
            return Err(CoreError::Unauthorized("account has been deactivated".to_string()));
        }
        Ok(user.principal())
    }

    async fn account_of(&self, principal: &Principal) -> CoreResult<User> {
        let id = Uuid::parse_str(&principal.id)
            .map_err(|_| CoreError::NotFound(format!("Account {}", principal.id)))?;
        self.find(id).await
    }

    async fn find(&self, id: Uuid) -> CoreResult<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Account {}", id)))
    }
}
