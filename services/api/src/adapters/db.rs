//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the Postgres implementation of the
//! `ProfileStore` port and of the account directory. The `users` collection is one
//! JSONB document per uid; saves use the `||` operator, which replaces only the
//! top-level fields present in the patch.

use async_trait::async_trait;
use book_reels_core::domain::{Identity, ProfilePatch, UserProfileDocument};
use book_reels_core::ports::{PortError, PortResult, ProfileStore};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::adapters::accounts::{AccountDirectory, AccountError, AccountRecord};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter backed by a Postgres pool.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `users` and `accounts` tables if they are missing.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> PortError {
    PortError::StoreUnavailable(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    hashed_password: String,
}
impl AccountRow {
    fn to_domain(self) -> AccountRecord {
        AccountRecord {
            identity: Identity {
                uid: self.uid,
                display_name: self.display_name,
                email: Some(self.email),
                avatar_url: self.avatar_url,
            },
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn load(&self, uid: &str) -> PortResult<Option<UserProfileDocument>> {
        let document = sqlx::query_scalar::<_, Json<UserProfileDocument>>(
            "SELECT document FROM users WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(document.map(|Json(document)| document))
    }

    async fn save(&self, uid: &str, patch: &ProfilePatch) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (uid, document) VALUES ($1, $2) \
             ON CONFLICT (uid) DO UPDATE \
             SET document = users.document || EXCLUDED.document, updated_at = now()",
        )
        .bind(uid)
        .bind(Json(patch))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

//=========================================================================================
// `AccountDirectory` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountDirectory for DbAdapter {
    async fn create_account(&self, record: AccountRecord) -> Result<Identity, AccountError> {
        let identity = record.identity;
        sqlx::query(
            "INSERT INTO accounts (uid, email, display_name, avatar_url, hashed_password) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&identity.uid)
        .bind(identity.email.as_deref().unwrap_or_default())
        .bind(identity.display_name.as_deref())
        .bind(identity.avatar_url.as_deref())
        .bind(&record.hashed_password)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AccountError::EmailTaken,
            _ => AccountError::Unavailable(e.to_string()),
        })?;
        Ok(identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT uid, email, display_name, avatar_url, hashed_password \
             FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::Unavailable(e.to_string()))?;

        Ok(row.map(AccountRow::to_domain))
    }
}
