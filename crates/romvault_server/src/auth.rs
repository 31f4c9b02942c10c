use crate::state::AppState;
use romvault_core::prelude::*;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

/// A wrapper struct indicating a request has been authenticated.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub User);

impl<S, R, A> FromRequestParts<AppState<S, R, A>> for AuthenticatedUser
where
    S: StorageBackend,
    R: RecordStore,
    A: AuthProvider,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, R, A>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|auth_header| auth_header.to_str().ok())
            .map(|header_str| {
                header_str
                    .strip_prefix("Bearer ")
                    .unwrap_or(header_str)
                    .trim()
            })
            .unwrap_or("");

        match state.auth.verify(token).await {
            Ok(user) => Ok(AuthenticatedUser(user)),
            Err(_) => Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string())),
        }
    }
}
