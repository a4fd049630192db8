//! `Token` header check for admin routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::error::AdminError;
use crate::state::AppState;

const TOKEN_HEADER: &str = "token";

/// Proof that the request carried the admin token.
///
/// Add it as a handler argument to guard the route.
#[derive(Debug, Clone, Copy)]
pub struct AdminToken;

impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AdminError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AdminError::Unauthorized)?;

        if bool::from(provided.as_bytes().ct_eq(state.admin_token.as_bytes())) {
            Ok(AdminToken)
        } else {
            tracing::warn!("Rejected admin request with invalid token");
            Err(AdminError::Unauthorized)
        }
    }
}
