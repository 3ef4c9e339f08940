//! User accounts: registration and login against the persistence store

use crate::db::{Database, DbError, UserRecord};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for AccountError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserExists(_) => AccountError::UsernameTaken,
            other => AccountError::Db(other),
        }
    }
}

/// Create an account. Usernames are matched exactly.
pub fn register(db: &Database, username: &str, password: &str) -> Result<(), AccountError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::MissingCredentials);
    }

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    db.insert_user(&UserRecord {
        username: username.to_string(),
        password_hash: hash_password(&salt, password),
        salt: BASE64.encode(salt),
        created_at: Utc::now(),
    })?;

    tracing::info!(username = %username, "Registered user");
    Ok(())
}

/// Check credentials and return the canonical username
pub fn login(db: &Database, username: &str, password: &str) -> Result<String, AccountError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::MissingCredentials);
    }

    let user = db
        .find_user(username)?
        .ok_or(AccountError::InvalidCredentials)?;
    let salt = BASE64
        .decode(&user.salt)
        .map_err(|_| AccountError::InvalidCredentials)?;

    if hash_password(&salt, password) != user.password_hash {
        tracing::info!(username = %username, "Rejected login");
        return Err(AccountError::InvalidCredentials);
    }
    Ok(user.username)
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}
