//! Static bearer token auth, typically for a private blob endpoint.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};

/// Adds `Authorization: Bearer <token>` to every request.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// Read the token from an environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        std::env::var(var)
            .map(Self::new)
            .map_err(|_| CloudError::Auth(format!("{} not set", var)))
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").field("token", &"***").finish()
    }
}

impl CloudAuth for BearerToken {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        headers.push(("Authorization".into(), format!("Bearer {}", self.token)));
        Ok(())
    }
}
