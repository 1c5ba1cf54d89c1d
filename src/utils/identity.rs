// src/utils/identity.rs

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// The already-verified identity of the caller, as asserted by the upstream
/// gateway. Authentication itself happens outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub i64);

/// Header the gateway uses to forward the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Axum Middleware: Caller Identity.
///
/// Intercepts requests and reads the trusted 'X-User-Id' header.
/// If present and numeric, injects `CallerId` into the request extensions.
/// If absent or malformed, returns 401 Unauthorized.
pub async fn identity_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());

    match user_id {
        Some(id) => {
            req.extensions_mut().insert(CallerId(id));
            Ok(next.run(req).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}
