use std::sync::Arc;

use async_trait::async_trait;

use authguide_ext::audit::{AuditEvent, AuditSink, DenyReason, TracingAudit};
use authguide_ext::context::{ORIGINATING_CLIENT_IP, PROTOCOL};
use authguide_ext::listener::Listeners;
use authguide_ext::{Account, AuthContext, AuthError, Authenticator};

use crate::config::{GuideConfig, MissingContextPolicy};
use crate::login::verify_password;

/// Identifier under which the guide mechanism is registered
pub const ID: &str = "customAuthGuide";

const FAILURE_MESSAGE: &str = "customAuthGuide Authentication failed";

/// A single reference account, further restricted by protocol and by
/// originating client IP.
///
/// This is a demonstration of the mechanism contract, not a credential
/// store: never put real accounts in it.
pub struct GuideAuthenticator {
    config: GuideConfig,
    audit: Arc<dyn AuditSink>,
    listeners: Listeners,
}

enum Lookup<'a> {
    Found(&'a str),
    Skip,
    Deny,
}

impl GuideAuthenticator {
    pub fn new(config: GuideConfig) -> Self {
        Self {
            config,
            audit: Arc::new(TracingAudit),
            listeners: Listeners::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    /// Evaluates the rules in order and stops at the first one that fails.
    ///
    /// `Ok(false)` is a rejection; an `Err` means no decision could be taken.
    pub fn is_authenticated(
        &self,
        account: &Account,
        password: &str,
        context: &AuthContext,
    ) -> Result<bool, AuthError> {
        if account.name() != self.config.username || !self.secret_matches(password)? {
            return Ok(false);
        }

        match self.lookup(account, context, PROTOCOL)? {
            Lookup::Deny => return Ok(false),
            Lookup::Found(proto) if self.config.denied_protocols.iter().any(|p| p == proto) => {
                self.deny(account, DenyReason::Protocol(proto.to_string()));
                return Ok(false);
            }
            _ => (),
        }

        match self.lookup(account, context, ORIGINATING_CLIENT_IP)? {
            Lookup::Deny => return Ok(false),
            Lookup::Found(ip) if self.config.denied_origin_ips.iter().any(|d| d == ip) => {
                self.deny(account, DenyReason::OriginIp(ip.to_string()));
                return Ok(false);
            }
            _ => (),
        }

        self.audit.record(AuditEvent::Accepted {
            mechanism: ID.into(),
            account: account.name().into(),
        });
        Ok(true)
    }

    fn secret_matches(&self, password: &str) -> Result<bool, AuthError> {
        match &self.config.password_hash {
            Some(hash) => {
                verify_password(password, hash).map_err(|e| AuthError::Internal(e.to_string()))
            }
            None => Ok(password == self.config.password),
        }
    }

    fn lookup<'a>(
        &self,
        account: &Account,
        context: &'a AuthContext,
        key: &'static str,
    ) -> Result<Lookup<'a>, AuthError> {
        match (context.get(key), self.config.on_missing_context) {
            (Some(v), _) => Ok(Lookup::Found(v)),
            (None, MissingContextPolicy::Error) => {
                tracing::error!(user=%account, field=key, "context field is missing");
                Err(AuthError::MissingContextField(key))
            }
            (None, MissingContextPolicy::Reject) => {
                self.deny(account, DenyReason::MissingContext(key));
                Ok(Lookup::Deny)
            }
            (None, MissingContextPolicy::Skip) => Ok(Lookup::Skip),
        }
    }

    fn deny(&self, account: &Account, reason: DenyReason) {
        self.audit.record(AuditEvent::Denied {
            mechanism: ID.into(),
            account: account.name().into(),
            reason,
        });
    }
}

#[async_trait]
impl Authenticator for GuideAuthenticator {
    async fn authenticate(
        &self,
        account: &Account,
        password: &str,
        context: &AuthContext,
        args: &[String],
    ) -> Result<(), AuthError> {
        tracing::trace!(user=%account, args=?args, "guide authentication");

        if self.is_authenticated(account, password, context)? {
            self.listeners.notify_success(account);
            return Ok(());
        }

        let err = AuthError::AuthFailed(FAILURE_MESSAGE.into());
        self.audit.record(AuditEvent::Failed {
            mechanism: ID.into(),
            account: account.name().into(),
        });
        self.listeners.notify_failure(account, &err);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use authguide_ext::audit::{MemoryAudit, NoAudit};
    use authguide_ext::listener::AuthListener;

    use crate::login::hash_password;

    const USER: &str = "testuser@example.com";
    const PASS: &str = "test123";

    fn ctx(proto: &str, ip: &str) -> AuthContext {
        AuthContext::new()
            .with(PROTOCOL, proto)
            .with(ORIGINATING_CLIENT_IP, ip)
    }

    fn guide(config: GuideConfig) -> (GuideAuthenticator, Arc<MemoryAudit>) {
        let audit = Arc::new(MemoryAudit::new());
        (GuideAuthenticator::new(config).with_audit(audit.clone()), audit)
    }

    #[derive(Default)]
    struct Counter {
        ok: AtomicUsize,
        ko: AtomicUsize,
    }

    impl AuthListener for Counter {
        fn on_success(&self, _account: &Account) {
            self.ok.fetch_add(1, Ordering::SeqCst);
        }
        fn on_failure(&self, _account: &Account, err: &AuthError) {
            assert!(err.is_rejection());
            self.ko.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let (g, _) = guide(GuideConfig::default());
        let user = Account::new(USER);

        assert!(g.authenticate(&user, PASS, &ctx("pop3", "1.2.3.4"), &[]).await.is_ok());
        assert_eq!(
            g.authenticate(&user, PASS, &ctx("imap", "1.2.3.4"), &[]).await,
            Err(AuthError::AuthFailed(FAILURE_MESSAGE.into()))
        );
        assert_eq!(
            g.authenticate(&user, PASS, &ctx("pop3", "54.83.74.191"), &[]).await,
            Err(AuthError::AuthFailed(FAILURE_MESSAGE.into()))
        );

        let other = Account::new("other@example.com");
        for pass in [PASS, "", "anything"] {
            assert!(g
                .authenticate(&other, pass, &ctx("pop3", "1.2.3.4"), &[])
                .await
                .unwrap_err()
                .is_rejection());
        }
    }

    #[test]
    fn test_wrong_secret() {
        let (g, audit) = guide(GuideConfig::default());
        let user = Account::new(USER);
        for pass in ["", "test1234", "TEST123", " test123"] {
            assert_eq!(g.is_authenticated(&user, pass, &ctx("pop3", "1.2.3.4")), Ok(false));
        }
        // credential mismatches carry no specific reason
        assert!(audit.events().is_empty());
    }

    #[test]
    fn test_imap_denied_regardless_of_ip() {
        let (g, audit) = guide(GuideConfig::default());
        let user = Account::new(USER);
        for ip in ["1.2.3.4", "54.83.74.191", "::1"] {
            assert_eq!(g.is_authenticated(&user, PASS, &ctx("imap", ip)), Ok(false));
        }
        assert!(audit.events().iter().all(|e| matches!(
            e,
            AuditEvent::Denied { reason: DenyReason::Protocol(p), .. } if p == "imap"
        )));
        assert_eq!(audit.events().len(), 3);
    }

    #[test]
    fn test_blocked_ip_denied() {
        let (g, audit) = guide(GuideConfig::default());
        let user = Account::new(USER);
        for proto in ["pop3", "http", "smtp"] {
            assert_eq!(
                g.is_authenticated(&user, PASS, &ctx(proto, "54.83.74.191")),
                Ok(false)
            );
        }
        assert_eq!(
            audit.events()[0],
            AuditEvent::Denied {
                mechanism: ID.into(),
                account: USER.into(),
                reason: DenyReason::OriginIp("54.83.74.191".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_audit_and_listeners() {
        let counter = Arc::new(Counter::default());
        let mut listeners = Listeners::new();
        listeners.push(counter.clone());
        let (g, audit) = guide(GuideConfig::default());
        let g = g.with_listeners(listeners);
        let user = Account::new(USER);

        g.authenticate(&user, PASS, &ctx("pop3", "1.2.3.4"), &[])
            .await
            .unwrap();
        g.authenticate(&user, PASS, &ctx("imap", "1.2.3.4"), &[])
            .await
            .unwrap_err();
        g.authenticate(&user, "nope", &ctx("pop3", "1.2.3.4"), &[])
            .await
            .unwrap_err();

        assert_eq!(counter.ok.load(Ordering::SeqCst), 1);
        assert_eq!(counter.ko.load(Ordering::SeqCst), 2);

        let events = audit.events();
        assert!(matches!(events[0], AuditEvent::Accepted { .. }));
        assert!(matches!(events[1], AuditEvent::Denied { .. }));
        assert!(matches!(events[2], AuditEvent::Failed { .. }));
        assert!(matches!(events[3], AuditEvent::Failed { .. }));
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.account() == USER));
        assert!(!format!("{:?}", events).contains(PASS));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let (g, _) = guide(GuideConfig::default());
        let user = Account::new(USER);
        for (proto, ip) in [("pop3", "1.2.3.4"), ("imap", "1.2.3.4")] {
            let c = ctx(proto, ip);
            let first = g.authenticate(&user, PASS, &c, &[]).await;
            for _ in 0..10 {
                assert_eq!(g.authenticate(&user, PASS, &c, &[]).await, first);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_context_policies() {
        let user = Account::new(USER);
        let no_ip = AuthContext::new().with(PROTOCOL, "pop3");
        let no_proto = AuthContext::new().with(ORIGINATING_CLIENT_IP, "1.2.3.4");

        let (g, _) = guide(GuideConfig::default());
        assert_eq!(
            g.authenticate(&user, PASS, &no_ip, &[]).await,
            Err(AuthError::MissingContextField(ORIGINATING_CLIENT_IP))
        );
        assert_eq!(
            g.authenticate(&user, PASS, &no_proto, &[]).await,
            Err(AuthError::MissingContextField(PROTOCOL))
        );
        // context is only looked at once credentials match
        assert!(g
            .authenticate(&user, "nope", &AuthContext::new(), &[])
            .await
            .unwrap_err()
            .is_rejection());

        let (g, audit) = guide(GuideConfig {
            on_missing_context: MissingContextPolicy::Reject,
            ..GuideConfig::default()
        });
        assert!(g
            .authenticate(&user, PASS, &no_ip, &[])
            .await
            .unwrap_err()
            .is_rejection());
        assert!(matches!(
            &audit.events()[0],
            AuditEvent::Denied { reason: DenyReason::MissingContext(ORIGINATING_CLIENT_IP), .. }
        ));

        // a missing protocol stops the chain before the IP rule
        let (g, audit) = guide(GuideConfig {
            on_missing_context: MissingContextPolicy::Reject,
            ..GuideConfig::default()
        });
        let blocked_no_proto = AuthContext::new().with(ORIGINATING_CLIENT_IP, "54.83.74.191");
        assert_eq!(g.is_authenticated(&user, PASS, &blocked_no_proto), Ok(false));
        assert_eq!(
            audit.events(),
            vec![AuditEvent::Denied {
                mechanism: ID.into(),
                account: USER.into(),
                reason: DenyReason::MissingContext(PROTOCOL),
            }]
        );

        let (g, _) = guide(GuideConfig {
            on_missing_context: MissingContextPolicy::Skip,
            ..GuideConfig::default()
        });
        assert!(g.authenticate(&user, PASS, &no_ip, &[]).await.is_ok());
        assert!(g.authenticate(&user, PASS, &AuthContext::new(), &[]).await.is_ok());
        assert!(g
            .authenticate(&user, PASS, &ctx("imap", "1.2.3.4"), &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_decisions_ignore_audit_sink() {
        let (recorded, _) = guide(GuideConfig::default());
        let silent = GuideAuthenticator::new(GuideConfig::default()).with_audit(Arc::new(NoAudit));
        let cases = [
            (USER, PASS, ctx("pop3", "1.2.3.4")),
            (USER, PASS, ctx("imap", "1.2.3.4")),
            (USER, PASS, ctx("pop3", "54.83.74.191")),
            (USER, "nope", ctx("pop3", "1.2.3.4")),
            ("other@example.com", PASS, ctx("pop3", "1.2.3.4")),
            (USER, PASS, AuthContext::new().with(PROTOCOL, "pop3")),
        ];
        for (name, pass, c) in cases.iter() {
            let user = Account::new(*name);
            assert_eq!(
                silent.authenticate(&user, pass, c, &[]).await,
                recorded.authenticate(&user, pass, c, &[]).await,
            );
        }
    }

    #[test]
    fn test_hashed_reference_secret() {
        let (g, _) = guide(GuideConfig {
            username: "bob@example.org".into(),
            password_hash: Some(hash_password("hunter2").unwrap()),
            ..GuideConfig::default()
        });
        let bob = Account::new("bob@example.org");
        assert_eq!(g.is_authenticated(&bob, "hunter2", &ctx("pop3", "1.2.3.4")), Ok(true));
        // the clear-text default is ignored once a hash is set
        assert_eq!(g.is_authenticated(&bob, PASS, &ctx("pop3", "1.2.3.4")), Ok(false));

        let (g, _) = guide(GuideConfig {
            password_hash: Some("garbage".into()),
            ..GuideConfig::default()
        });
        assert!(matches!(
            g.is_authenticated(&Account::new(USER), PASS, &ctx("pop3", "1.2.3.4")),
            Err(AuthError::Internal(_))
        ));
    }
}
