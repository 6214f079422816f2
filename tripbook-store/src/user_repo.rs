use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tripbook_core::repository::UserRepository;
use tripbook_core::{CoreError, CoreResult, Role, User};
use tripbook_shared::Masked;
use uuid::Uuid;

use crate::error::db_error;

const USER_COLUMNS: &str = "id, email, password_hash, role, active, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|_| CoreError::StorageError(format!("unknown role '{}' on user {}", row.role, row.id)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: Masked::new(row.password_hash),
            role,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.password_hash.expose())
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            CoreError::Conflict(msg) if msg.contains("users_email_key") => {
                CoreError::Conflict(format!("email {} is already registered", user.email))
            }
            other => other,
        })?;

        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(User::try_from).transpose()
    }

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE active OR NOT $1 ORDER BY email",
            USER_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn save_user(&self, user: &User) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, active = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(user.id)
        .bind(user.password_hash.expose())
        .bind(user.active)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Account {}", user.id)));
        }
        Ok(())
    }
}
