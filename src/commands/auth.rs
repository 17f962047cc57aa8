use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::db::JournalStore;
use crate::error::{JournalError, Result};
use crate::models::{Session, User};

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_TOKEN_BYTES: usize = 32;

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(JournalError::Validation(format!("Invalid email address: {:?}", email)));
    }
    Ok(email)
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

fn new_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn open_session(store: &impl JournalStore, user: User) -> Result<Session> {
    let token = new_session_token();
    store.insert_session(&token, &user.id)?;
    Ok(Session { token, user })
}

/// Register a new account and log it in.
pub fn signup(store: &impl JournalStore, email: &str, password: &str) -> Result<Session> {
    let email = normalize_email(email)?;

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(JournalError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if store.find_user_by_email(&email)?.is_some() {
        return Err(JournalError::EmailTaken(email));
    }

    let user = User {
        id: format!("USER-{}-{}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4()),
        email,
        password_hash: hash_password(password)?,
        created_at: Utc::now().timestamp(),
    };
    store.insert_user(&user)?;

    log::info!("Created account {}", user.id);

    open_session(store, user)
}

pub fn login(store: &impl JournalStore, email: &str, password: &str) -> Result<Session> {
    let email = normalize_email(email).map_err(|_| JournalError::InvalidCredentials)?;

    let user = store
        .find_user_by_email(&email)?
        .ok_or(JournalError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash) {
        log::debug!("Rejected login for {}", user.id);
        return Err(JournalError::InvalidCredentials);
    }

    open_session(store, user)
}

pub fn logout(store: &impl JournalStore, token: &str) -> Result<()> {
    store.delete_session(token)
}

/// The logged-in user for `token`, if the session still exists.
pub fn check_session(store: &impl JournalStore, token: &str) -> Result<Option<User>> {
    store.find_session_user(token)
}
