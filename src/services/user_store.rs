//! src/services/user_store.rs
//!
//! User Directory Store: the single `users` table. Schema creation is
//! idempotent and runs at most once per store handle, on first use.

use crate::models::user::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Schema for the directory, applied by `ensure_schema` and `--migrate`.
pub const USERS_SCHEMA: &str = include_str!("../../migrations/0001_users.sql");

/// Columns read back into [`User`]. The cast accepts tables created with a
/// plain nullable `TIMESTAMP` column as well as `TIMESTAMPTZ`.
const USER_COLUMNS: &str = "id, name, email, photo_url, created_at::timestamptz AS created_at";

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("a user with email `{0}` already exists")]
    DuplicateEmail(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type UserStoreResult<T> = Result<T, UserStoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the table if needed. Safe to call repeatedly.
    async fn ensure_schema(&self) -> UserStoreResult<()>;

    async fn insert(&self, user: NewUser) -> UserStoreResult<User>;

    /// All users, newest first.
    async fn list(&self) -> UserStoreResult<Vec<User>>;

    async fn find(&self, id: i32) -> UserStoreResult<Option<User>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i32) -> UserStoreResult<bool>;

    /// Connectivity check used by readiness.
    async fn ping(&self) -> UserStoreResult<()>;
}

/// Postgres-backed store.
pub struct PgUserStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Run every statement of the schema file.
    pub async fn migrate(&self) -> UserStoreResult<()> {
        let statements = USERS_SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&self.pool).await?;
        }

        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ensure_schema(&self) -> UserStoreResult<()> {
        self.schema.get_or_try_init(|| self.migrate()).await?;
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> UserStoreResult<User> {
        self.ensure_schema().await?;
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, photo_url) VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                UserStoreError::DuplicateEmail(user.email.clone())
            } else {
                UserStoreError::Sqlx(err)
            }
        })
    }

    async fn list(&self) -> UserStoreResult<Vec<User>> {
        self.ensure_schema().await?;
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS}
             FROM users ORDER BY created_at DESC NULLS LAST, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find(&self, id: i32) -> UserStoreResult<Option<User>> {
        self.ensure_schema().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: i32) -> UserStoreResult<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> UserStoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryUsers {
    rows: Vec<User>,
    last_id: i32,
}

/// In-memory store with the same uniqueness rule as the table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<MemoryUsers>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ensure_schema(&self) -> UserStoreResult<()> {
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> UserStoreResult<User> {
        let mut users = self.users.lock().await;
        if users.rows.iter().any(|row| row.email == user.email) {
            return Err(UserStoreError::DuplicateEmail(user.email));
        }
        users.last_id += 1;
        let row = User {
            id: users.last_id,
            name: user.name,
            email: user.email,
            photo_url: user.photo_url,
            created_at: Some(Utc::now()),
        };
        users.rows.push(row.clone());
        Ok(row)
    }

    async fn list(&self) -> UserStoreResult<Vec<User>> {
        let mut rows = self.users.lock().await.rows.clone();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn find(&self, id: i32) -> UserStoreResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .rows
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn delete(&self, id: i32) -> UserStoreResult<bool> {
        let mut users = self.users.lock().await;
        let before = users.rows.len();
        users.rows.retain(|row| row.id != id);
        Ok(users.rows.len() < before)
    }

    async fn ping(&self) -> UserStoreResult<()> {
        Ok(())
    }
}
