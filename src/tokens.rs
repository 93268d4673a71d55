//! Signed access and refresh tokens.
//!
//! Both classes are HS256 JWTs sharing one secret. Validity is a pure function
//! of signature, issuer, audience and expiry: nothing is persisted, so there is
//! no revocation and the nonce is informational only.

use crate::config::Config;
use crate::model::{GroupName, Role};
use crate::users::User;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_number: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<GroupName>,
    pub nonce: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Identity fields copied into every token.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub section_number: Option<u8>,
    pub group_name: Option<GroupName>,
}

impl From<&User> for Subject {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id.clone(),
            username: u.username.clone(),
            role: u.role,
            section_number: u.section_number,
            group_name: u.group_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("wrong token type")]
    WrongType,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            &cfg.jwt_secret,
            cfg.jwt_issuer.clone(),
            cfg.jwt_audience.clone(),
            cfg.access_token_ttl,
            cfg.refresh_token_ttl,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_pair(&self, subject: &Subject) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access: self.issue_access_at(subject, now)?,
            refresh: self.sign(subject, now, self.refresh_ttl, Some(TokenType::Refresh))?,
        })
    }

    /// Issues an access token as if minted at `issued_at` (unix seconds).
    pub fn issue_access_at(&self, subject: &Subject, issued_at: i64) -> Result<String, TokenError> {
        self.sign(subject, issued_at, self.access_ttl, None)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type.is_some() {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != Some(TokenType::Refresh) {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn sign(
        &self,
        subject: &Subject,
        issued_at: i64,
        ttl: Duration,
        token_type: Option<TokenType>,
    ) -> Result<String, TokenError> {
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| issued_at.checked_add(secs))
            .ok_or_else(|| TokenError::Signing(format!("token lifetime {ttl:?} out of range")))?;
        let claims = Claims {
            user_id: subject.user_id.clone(),
            username: subject.username.clone(),
            role: subject.role,
            section_number: subject.section_number,
            group_name: subject.group_name,
            nonce: new_nonce(),
            token_type,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

fn new_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
