//! Request extractors for the bearer-token surface.

use super::{ApiError, AppState};
use crate::auth::VerifiedClaims;
use crate::database::models::UserRecord;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Verified token claims; does not require the caller to exist yet. This is
/// what the login upsert consumes.
pub(crate) struct AuthClaims(pub VerifiedClaims);

/// A logged-in user resolved from the verified email claim.
pub(crate) struct CurrentUser(pub UserRecord);

/// Optional variant for public endpoints whose response depends on who is
/// looking (private post visibility). A present-but-invalid token is still
/// rejected.
pub(crate) struct OptionalViewer(pub Option<UserRecord>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".into()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".into()))?;
    Ok(Some(token.trim()))
}

fn verify(parts: &Parts, state: &AppState) -> Result<Option<VerifiedClaims>, ApiError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };
    let claims = state
        .verifier
        .verify(token)
        .map_err(|err| ApiError::Unauthorized(err.to_string()))?;
    Ok(Some(claims))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match verify(parts, state)? {
            Some(claims) => Ok(AuthClaims(claims)),
            None => Err(ApiError::Unauthorized("missing bearer token".into())),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthClaims(claims) = AuthClaims::from_request_parts(parts, state).await?;
        let user = state
            .accounts
            .find_by_email(&claims.email)?
            .ok_or_else(|| ApiError::Unauthorized("unknown user, log in first".into()))?;
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalViewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match verify(parts, state)? {
            Some(claims) => Ok(OptionalViewer(state.accounts.find_by_email(&claims.email)?)),
            None => Ok(OptionalViewer(None)),
        }
    }
}
