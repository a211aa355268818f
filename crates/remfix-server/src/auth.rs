use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Require a valid admin bearer token on `/api/admin/*` routes.
///
/// The predecessor system only checked that an `authorization` header was
/// *present*; this middleware validates the token value against
/// `REMFIX_ADMIN_TOKEN`. With no token configured the admin surface is
/// disabled outright — every request gets 401.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.config.admin_token else {
        return AppError::Unauthorized.into_response();
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match presented {
        Some(token) if signature_matches(token, expected) => next.run(request).await,
        _ => AppError::Unauthorized.into_response(),
    }
}

/// Compare digests rather than the raw strings so the comparison shape does
/// not depend on where the first mismatching byte sits. Shared by the admin
/// middleware and the webhook secret check.
pub fn signature_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_pass() {
        assert!(signature_matches("tok_abc123", "tok_abc123"));
    }

    #[test]
    fn mismatched_tokens_fail() {
        assert!(!signature_matches("tok_abc123", "tok_abc124"));
        assert!(!signature_matches("", "tok_abc123"));
        assert!(!signature_matches("tok_abc123x", "tok_abc123"));
    }
}
