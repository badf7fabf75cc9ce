use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use authguide_ext::{Account, AuthContext, AuthError, Authenticator};

/// Accounts known to the host itself, used by the `local` mechanism and as a
/// fallback when a custom mechanism turns an attempt down.
#[derive(Clone, Debug, Default)]
pub struct LocalAuthenticator {
    accounts: HashMap<String, String>,
}

impl LocalAuthenticator {
    pub fn new(accounts: HashMap<String, String>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn authenticate(
        &self,
        account: &Account,
        password: &str,
        _context: &AuthContext,
        _args: &[String],
    ) -> Result<(), AuthError> {
        tracing::debug!(user=%account, "local login");
        let hash = match self.accounts.get(account.name()) {
            None => {
                return Err(AuthError::AuthFailed(format!(
                    "Account {} does not exist",
                    account
                )))
            }
            Some(h) => h,
        };

        tracing::debug!(user=%account, "verify password");
        match verify_password(password, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::AuthFailed("Wrong password".into())),
            Err(e) => {
                tracing::error!(user=%account, err=%e, "unusable password hash");
                Err(AuthError::Internal(e.to_string()))
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    use argon2::{
        password_hash::{PasswordHasher, SaltString},
        Argon2,
    };
    use rand::rngs::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Argon2 error: {}", e))?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    use argon2::{
        password_hash::{PasswordHash, PasswordVerifier},
        Argon2,
    };
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid hashed password: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
