use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::{AppState, Subject};

/// Axum middleware that requires a valid `Authorization: Bearer <token>`
/// header and resolves it to the [`Subject`] it authenticates.
///
/// Returns 401 for missing, malformed, or unrecognized tokens. Applied to
/// all routes — no public endpoints. The resolved subject is stashed in the
/// request extensions for handlers to pull out and pass to
/// [`genesis_iam::IamKernel::check`].
pub async fn require_bearer_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match provided.and_then(|token| state.auth_tokens.get(token).copied()) {
        Some(subject) => {
            request.extensions_mut().insert(Subject(subject));
            next.run(request).await
        }
        None => (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response(),
    }
}
