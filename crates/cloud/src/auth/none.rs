//! No-op authentication for public endpoints.

use crate::auth::CloudAuth;
use crate::error::Result;

/// No authentication. Earth Search and the public Sentinel-2 bucket need none.
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        _headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        Ok(())
    }
}
