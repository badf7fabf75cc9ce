use std::sync::Arc;

use crate::account::Account;
use crate::error::AuthError;

/// Host-level hook notified of authentication outcomes, so other
/// subsystems (lockout counters, metrics, notifications) can react.
pub trait AuthListener: Send + Sync {
    fn on_success(&self, _account: &Account) {}
    fn on_failure(&self, account: &Account, err: &AuthError);
}

#[derive(Clone, Default)]
pub struct Listeners(Vec<Arc<dyn AuthListener>>);

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Arc<dyn AuthListener>) {
        self.0.push(listener);
    }

    pub fn notify_success(&self, account: &Account) {
        self.0.iter().for_each(|l| l.on_success(account));
    }

    pub fn notify_failure(&self, account: &Account, err: &AuthError) {
        self.0.iter().for_each(|l| l.on_failure(account, err));
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listeners").field(&self.0.len()).finish()
    }
}
