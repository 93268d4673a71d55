use crate::i18n::Msg;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::OnceLock;
use thiserror::Error;

pub const MIN_LEN: usize = 8;
pub const MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("password is empty")]
    Missing,
    #[error("password shorter than 8 characters")]
    TooShort,
    #[error("password longer than 128 characters")]
    TooLong,
    #[error("password has no uppercase letter")]
    NoUppercase,
    #[error("password has no lowercase letter")]
    NoLowercase,
    #[error("password has no digit")]
    NoDigit,
}

impl PasswordPolicyError {
    pub fn msg(self) -> Msg {
        match self {
            Self::Missing => Msg::PasswordRequired,
            Self::TooShort => Msg::PasswordTooShort,
            Self::TooLong => Msg::PasswordTooLong,
            Self::NoUppercase => Msg::PasswordNeedsUppercase,
            Self::NoLowercase => Msg::PasswordNeedsLowercase,
            Self::NoDigit => Msg::PasswordNeedsDigit,
        }
    }
}

/// Checks in a fixed order so callers always report the first failing rule.
pub fn check_strength(password: &str) -> Result<(), PasswordPolicyError> {
    let len = password.chars().count();
    if len == 0 {
        return Err(PasswordPolicyError::Missing);
    }
    if len > MAX_LEN {
        return Err(PasswordPolicyError::TooLong);
    }
    if len < MIN_LEN {
        return Err(PasswordPolicyError::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordPolicyError::NoUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordPolicyError::NoLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::NoDigit);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Burns the same verification cost as a real login when the account does
/// not exist.
pub fn verify_against_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_password("Dummy-Password-0").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
