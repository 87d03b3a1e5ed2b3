//! Authentication extractor.
//!
//! When `AUTH_TOKEN` is configured, requests must carry
//! `Authorization: Bearer <AUTH_TOKEN>`. Without it the API is open.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Authenticated caller extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// Presented the configured token
    Token,
    /// No token is configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.auth_token.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) if token == expected => Ok(AuthUser::Token),
                Some(_) => Err(AppError::Unauthorized("invalid bearer token")),
                None => Err(AppError::Unauthorized(
                    "invalid authorization header format",
                )),
            },
            None => Err(AppError::Unauthorized("missing authorization header")),
        }
    }
}
