use std::sync::Arc;

use async_trait::async_trait;

use crate::account::Account;
use crate::context::AuthContext;
use crate::error::AuthError;

/// A pluggable authentication mechanism, evaluated once per login attempt.
///
/// Returning `Ok(())` means the attempt is accepted; any `Err` means it is
/// not. Implementations must not keep state between calls: the host invokes
/// them concurrently for unrelated attempts.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `args` are the extra words following the mechanism identifier in the
    /// domain configuration, in order.
    async fn authenticate(
        &self,
        account: &Account,
        password: &str,
        context: &AuthContext,
        args: &[String],
    ) -> Result<(), AuthError>;
}

pub type ArcAuthenticator = Arc<dyn Authenticator>;
