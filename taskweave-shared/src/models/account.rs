/// Account model and database operations
///
/// Accounts are the identities that own Tasks, author Comments and upload
/// Files. They are created at registration, toggled active/inactive by an
/// administrator and never physically removed.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE account_role AS ENUM ('user', 'admin');
///
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY,
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     role account_role NOT NULL DEFAULT 'user',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
///
/// CREATE UNIQUE INDEX accounts_email_key ON accounts (LOWER(email));
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    /// Regular account
    User,

    /// May toggle other accounts' activation
    Admin,
}

impl AccountRole {
    /// Gets role as string
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::User => "user",
            AccountRole::Admin => "admin",
        }
    }
}

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Email address, unique and case-insensitive
    pub email: String,

    /// Argon2id credential hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Account role
    pub role: AccountRole,

    /// Inactive accounts cannot authenticate or refresh
    pub is_active: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Email address (normalised to lowercase)
    pub email: String,

    /// Argon2id hash, never plaintext
    pub password_hash: String,

    /// Initial role
    pub role: AccountRole,
}

impl NewAccount {
    /// Creates input for a regular account, normalising the email
    pub fn user(email: &str, password_hash: String) -> Self {
        Self {
            email: normalize_email(email),
            password_hash,
            role: AccountRole::User,
        }
    }
}

/// Lowercases and trims an email so lookups are case-insensitive everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, role, is_active, created_at, updated_at";

impl Account {
    /// Inserts a new active account
    ///
    /// # Errors
    ///
    /// Fails with a unique-constraint violation when the email is taken.
    pub async fn create(
        pool: &PgPool,
        data: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO accounts (id, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, TRUE, $5, $5) RETURNING {}",
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(Uuid::new_v4())
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.role)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Finds an account by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an account by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM accounts WHERE LOWER(email) = $1", ACCOUNT_COLUMNS);

        sqlx::query_as::<_, Account>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Sets the active flag, returning the updated account
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE accounts SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(active)
            .bind(now)
            .fetch_optional(pool)
            .await
    }
}
