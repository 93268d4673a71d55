use super::error::AppError;
use super::types::AppState;
use crate::cookies;
use crate::i18n::{Lang, Msg};
use crate::tokens::Claims;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, StatusCode};
use axum::Json;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::debug;

/// `Json<T>` whose rejections become a localized 400, or 413 past the body limit.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(Self(v)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                debug!(event = "request.body_too_large", reason = %rejection.body_text(), "rejected body");
                Err(AppError::new(StatusCode::PAYLOAD_TOO_LARGE, Msg::PayloadTooLarge))
            }
            Err(rejection) => {
                debug!(event = "request.bad_json", reason = %rejection.body_text(), "rejected body");
                Err(AppError::bad_request(Msg::InvalidJson))
            }
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Lang
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Lang::from_headers(&parts.headers))
    }
}

/// Access token lookup order: bearer header, student cookie, admin cookie.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    bearer
        .or_else(|| cookies::get(headers, cookies::ACCESS_TOKEN))
        .or_else(|| cookies::get(headers, cookies::ADMIN_TOKEN))
}

/// Claims of a verified access token.
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers).ok_or_else(AppError::unauthorized)?;
        Ok(Self(state.tokens.verify_access(&token)?))
    }
}

/// Like [`AuthUser`] but also requires the admin role.
pub struct AdminUser(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::forbidden(Msg::Forbidden));
        }
        Ok(Self(claims))
    }
}

/// Present when the request carries a valid access token; never rejects.
pub struct MaybeUser(pub Option<Claims>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = access_token(&parts.headers).and_then(|t| state.tokens.verify_access(&t).ok());
        Ok(Self(claims))
    }
}

/// Socket peer address, or the first forwarded hop when proxy headers are
/// trusted. Falls back to loopback when nothing is known.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
        let real = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real {
            return ip;
        }
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
