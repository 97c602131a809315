use crate::auth::{AuthContext, verify_jwt};
use crate::http::state::AppState;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

/// Pure function to extract and validate an [`AuthContext`] from the
/// Authorization header.
fn extract_auth_context(auth_header: Option<&str>, jwt_secret: &str) -> Option<AuthContext> {
    auth_header
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|token| verify_jwt(token, jwt_secret).ok())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok());

    let ctx = extract_auth_context(auth_header, &state.config.jwt_secret);

    let (mut parts, body) = req.into_parts();
    parts.extensions.insert(ctx);
    let req = Request::from_parts(parts, body);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_yields_no_context() {
        assert!(extract_auth_context(None, "a-secret-at-least-32-characters-long").is_none());
    }

    #[test]
    fn malformed_token_yields_no_context() {
        let header = Some("Bearer not-a-real-jwt");
        assert!(extract_auth_context(header, "a-secret-at-least-32-characters-long").is_none());
    }
}
