//! services/api/src/adapters/accounts.rs
//!
//! Local accounts behind the account picker: the directory contract, an in-memory
//! directory for database-less runs, and the argon2 password helpers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use book_reels_core::domain::Identity;
use book_reels_core::ports::PortError;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Account directory unavailable: {0}")]
    Unavailable(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// What the directory stores for one account.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub identity: Identity,
    pub hashed_password: String,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn create_account(&self, record: AccountRecord) -> Result<Identity, AccountError>;

    /// Looks an account up by its (case-insensitive) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, AccountError>;
}

//=========================================================================================
// Password Helpers
//=========================================================================================

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

/// Builds a new account record with a fresh uid.
pub fn new_account(
    email: &str,
    display_name: Option<String>,
    avatar_url: Option<String>,
    password: &str,
) -> Result<AccountRecord, AccountError> {
    Ok(AccountRecord {
        identity: Identity {
            uid: Uuid::new_v4().to_string(),
            display_name,
            email: Some(normalize_email(email)),
            avatar_url,
        },
        hashed_password: hash_password(password)?,
    })
}

/// Checks an email/password pair against the directory.
pub async fn verify_credentials(
    directory: &dyn AccountDirectory,
    email: &str,
    password: &str,
) -> Result<Identity, PortError> {
    let record = directory
        .find_by_email(&normalize_email(email))
        .await
        .map_err(|e| PortError::AuthFailure(e.to_string()))?
        .ok_or_else(|| PortError::AuthFailure("Invalid email or password".to_string()))?;

    let parsed_hash = PasswordHash::new(&record.hashed_password).map_err(|e| {
        warn!("Stored password hash for {} is unreadable: {}", record.identity.uid, e);
        PortError::AuthFailure("Authentication error".to_string())
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PortError::AuthFailure("Invalid email or password".to_string()))?;

    Ok(record.identity)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//=========================================================================================
// In-Memory Directory
//=========================================================================================

#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: Mutex<HashMap<String, AccountRecord>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn create_account(&self, record: AccountRecord) -> Result<Identity, AccountError> {
        let email = record.identity.email.clone().unwrap_or_default();
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(AccountError::EmailTaken);
        }
        let identity = record.identity.clone();
        accounts.insert(email, record);
        Ok(identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, AccountError> {
        Ok(self.accounts.lock().await.get(&normalize_email(email)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_accounts_verify_with_their_password() {
        let directory = InMemoryAccountDirectory::new();
        let record = new_account(" Ada@Example.com ", Some("Ada".into()), None, "correct horse").unwrap();
        let created = directory.create_account(record).await.unwrap();
        assert_eq!(created.email.as_deref(), Some("ada@example.com"));

        let identity = verify_credentials(&directory, "ADA@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(identity.uid, created.uid);

        let err = verify_credentials(&directory, "ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::AuthFailure(_)));
    }

    #[tokio::test]
    async fn duplicate_emails_are_rejected() {
        let directory = InMemoryAccountDirectory::new();
        let first = new_account("a@b.c", None, None, "password1").unwrap();
        let second = new_account("A@B.C", None, None, "password2").unwrap();
        directory.create_account(first).await.unwrap();
        assert!(matches!(
            directory.create_account(second).await,
            Err(AccountError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn unknown_email_fails_auth() {
        let directory = InMemoryAccountDirectory::new();
        assert!(verify_credentials(&directory, "nobody@example.com", "x").await.is_err());
    }
}
