//! Request signing for catalog, band and blob endpoints.

mod bearer;
mod none;

pub use bearer::BearerToken;
pub use none::NoAuth;

use crate::error::Result;

/// Trait for signing outgoing HTTP requests.
///
/// Implementations push authentication headers (e.g. a Bearer token) into
/// `headers` before the request is sent.
pub trait CloudAuth: Send + Sync {
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}
