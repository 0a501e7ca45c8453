use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::auth::{ACCESS_TOKEN_COOKIE, AppState};
use crate::error::ApiError;

/// Find the access credential: an `Authorization: Bearer` header wins over
/// the access cookie.
pub fn access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let mut parts = v.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
                    Some(token.to_string())
                }
                _ => None,
            }
        });

    bearer.or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
}

/// Verify the access credential and attach its payload to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(req.headers(), &jar)
        .ok_or_else(|| ApiError::Unauthorized("no access token provided".into()))?;

    let payload = state.tokens.verify(&token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::Unauthorized(e.to_string())
    })?;

    req.extensions_mut().insert(payload);
    Ok(next.run(req).await)
}
