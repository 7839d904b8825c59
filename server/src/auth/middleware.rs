//! Authentication middleware.
//!
//! Bearer token extraction. When `AUTH_SECRET` is configured the token must
//! match it; otherwise requests are accepted anonymously.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, StatusCode, Uri},
};
use serde::Deserialize;

use crate::AppState;

/// Authenticated caller extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The bearer token, or "anonymous" when no secret is configured
    pub token: String,
}

impl AuthUser {
    pub fn is_anonymous(&self) -> bool {
        self.token == ANONYMOUS
    }
}

const ANONYMOUS: &str = "anonymous";

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Browsers cannot set headers on WebSocket upgrades, so the token
        // may also come as a `token` query parameter.
        let token = match parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
        {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) => Some(token.to_string()),
                None => {
                    return Err((
                        StatusCode::UNAUTHORIZED,
                        "Invalid authorization header format",
                    ))
                }
            },
            None => query_token(&parts.uri),
        };

        match (&state.config.auth_secret, token) {
            (_, Some(token)) if token.is_empty() => {
                Err((StatusCode::UNAUTHORIZED, "Empty bearer token"))
            }
            (Some(secret), Some(token)) => {
                if &token == secret {
                    Ok(AuthUser { token })
                } else {
                    tracing::warn!("rejected request with invalid token");
                    Err((StatusCode::UNAUTHORIZED, "Invalid token"))
                }
            }
            (Some(_), None) => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
            (None, Some(token)) => Ok(AuthUser { token }),
            // No auth configured, allow anonymous access
            (None, None) => Ok(AuthUser {
                token: ANONYMOUS.to_string(),
            }),
        }
    }
}

/// Query parameters that may carry the token.
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.token)
}
