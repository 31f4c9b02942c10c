use romvault_core::prelude::*;

/// Accepts every caller with every scope.
///
/// The bearer token, if any, becomes the user id so tests can act as
/// several users. An empty token is `dev_user`.
#[derive(Clone)]
pub struct AllowAllAuth;

impl AuthProvider for AllowAllAuth {
    async fn verify(&self, token: &str) -> Result<User, AuthError> {
        let id = match token.trim() {
            "" => "dev_user",
            token => token,
        };
        Ok(User {
            id: id.to_string(),
            scopes: vec!["admin".to_string(), "read".to_string(), "write".to_string()],
        })
    }
}
