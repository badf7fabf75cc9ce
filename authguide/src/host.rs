use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use authguide_ext::{
    Account, AuthContext, AuthError, Authenticator, Extension, ExtensionError, MechanismRegistry,
};

use crate::config::{Config, DomainConfig};
use crate::login::LocalAuthenticator;

pub type ArcAuthHost = Arc<AuthHost>;

/// Parsed form of a domain's `auth_mech` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMech {
    Local,
    Custom { id: String, args: Vec<String> },
}

impl FromStr for AuthMech {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        match words.next() {
            Some("local") if words.next().is_none() => Ok(Self::Local),
            Some(word) => match word.strip_prefix("custom:") {
                Some(id) if !id.is_empty() => Ok(Self::Custom {
                    id: id.to_string(),
                    args: words.map(str::to_string).collect(),
                }),
                _ => Err(ExtensionError::InvalidMechanism(s.to_string())),
            },
            None => Err(ExtensionError::InvalidMechanism(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct DomainPolicy {
    mech: AuthMech,
    fallback_to_local: bool,
}

impl DomainPolicy {
    fn parse(config: &DomainConfig) -> Result<Self> {
        Ok(Self {
            mech: config.auth_mech.parse()?,
            fallback_to_local: config.fallback_to_local,
        })
    }
}

/// Routes login attempts to the mechanism configured for the account's
/// domain. Owns the mechanism registry and the loaded extensions.
pub struct AuthHost {
    registry: MechanismRegistry,
    extensions: Vec<Arc<dyn Extension>>,
    local: LocalAuthenticator,
    domains: HashMap<String, DomainPolicy>,
    default_domain: Option<DomainPolicy>,
}

impl AuthHost {
    /// Loads the extensions in order, then checks every domain setting
    /// against what they registered.
    pub fn bootstrap(config: &Config, extensions: Vec<Arc<dyn Extension>>) -> Result<Self> {
        let mut registry = MechanismRegistry::new();
        for ext in extensions.iter() {
            ext.init(&mut registry)
                .with_context(|| format!("Unable to load extension {}", ext.name()))?;
            tracing::info!(extension = ext.name(), "extension loaded");
        }

        let mut domains = HashMap::new();
        for (name, dconf) in config.domains.iter() {
            let policy = DomainPolicy::parse(dconf)
                .with_context(|| format!("Invalid auth_mech for domain {}", name))?;
            if domains
                .insert(name.to_ascii_lowercase(), policy)
                .is_some()
            {
                bail!("Domain {} is configured several times", name);
            }
        }
        let default_domain = config
            .default_domain
            .as_ref()
            .map(DomainPolicy::parse)
            .transpose()
            .context("Invalid auth_mech for default domain")?;

        for (name, policy) in domains
            .iter()
            .map(|(n, p)| (n.as_str(), p))
            .chain(default_domain.iter().map(|p| ("default", p)))
        {
            if let AuthMech::Custom { id, .. } = &policy.mech {
                if !registry.contains(id) {
                    tracing::warn!(domain = name, mechanism = %id, "domain uses an unregistered mechanism, its logins will fail");
                }
            }
        }

        let mut mechanisms = registry.ids().collect::<Vec<_>>();
        mechanisms.sort();
        tracing::info!(mechanisms=?mechanisms, "{} domains configured", domains.len());
        Ok(Self {
            registry,
            extensions,
            local: LocalAuthenticator::new(config.local_accounts.clone()),
            domains,
            default_domain,
        })
    }

    /// Accepts by returning `Ok(())`. A custom mechanism's rejection is
    /// retried against local accounts when the domain allows it; errors that
    /// are not rejections are never retried.
    pub async fn authenticate(
        &self,
        account: &Account,
        password: &str,
        context: &AuthContext,
    ) -> Result<(), AuthError> {
        let policy = account
            .domain()
            .and_then(|d| self.domains.get(&d))
            .or(self.default_domain.as_ref())
            .ok_or_else(|| AuthError::NoMechanism(account.name().to_string()))?;

        let (id, args) = match &policy.mech {
            AuthMech::Local => {
                return self.local.authenticate(account, password, context, &[]).await
            }
            AuthMech::Custom { id, args } => (id, args),
        };

        let mech = self
            .registry
            .get(id)
            .ok_or_else(|| AuthError::UnknownMechanism(id.clone()))?;

        match mech.authenticate(account, password, context, args).await {
            Err(e) if e.is_rejection() && policy.fallback_to_local => {
                tracing::debug!(user=%account, mechanism=%id, "falling back to local authentication");
                self.local
                    .authenticate(account, password, context, &[])
                    .await
            }
            res => res,
        }
    }

    /// Destroys the extensions in reverse load order.
    pub fn shutdown(&self) {
        for ext in self.extensions.iter().rev() {
            ext.destroy();
            tracing::info!(extension = ext.name(), "extension unloaded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use authguide_ext::context::{ORIGINATING_CLIENT_IP, PROTOCOL};

    use crate::extension::GuideExtension;
    use crate::login::hash_password;

    fn ctx(proto: &str, ip: &str) -> AuthContext {
        AuthContext::new()
            .with(PROTOCOL, proto)
            .with(ORIGINATING_CLIENT_IP, ip)
    }

    fn config(mech: &str, fallback: bool) -> Config {
        let mut config = Config::default();
        config.domains.insert(
            "Example.com".into(),
            DomainConfig {
                auth_mech: mech.into(),
                fallback_to_local: fallback,
            },
        );
        config.local_accounts.insert(
            "testuser@example.com".into(),
            hash_password("local-pass").unwrap(),
        );
        config
    }

    fn guide_host(config: &Config) -> AuthHost {
        let ext: Arc<dyn Extension> = Arc::new(GuideExtension::new(config.guide.clone()));
        AuthHost::bootstrap(config, vec![ext]).unwrap()
    }

    #[test]
    fn test_parse_auth_mech() {
        assert_eq!("local".parse::<AuthMech>(), Ok(AuthMech::Local));
        assert_eq!(
            "custom:customAuthGuide".parse::<AuthMech>(),
            Ok(AuthMech::Custom {
                id: "customAuthGuide".into(),
                args: vec![]
            })
        );
        assert_eq!(
            "custom:customAuthGuide  a b".parse::<AuthMech>(),
            Ok(AuthMech::Custom {
                id: "customAuthGuide".into(),
                args: vec!["a".into(), "b".into()]
            })
        );
        for bad in ["", "custom:", "ldap", "local extra"] {
            assert!(bad.parse::<AuthMech>().is_err(), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_routes_to_guide() {
        let host = guide_host(&config("custom:customAuthGuide", false));
        let user = Account::new("testuser@EXAMPLE.com");
        // account names are compared verbatim by the guide
        assert!(host
            .authenticate(&user, "test123", &ctx("pop3", "1.2.3.4"))
            .await
            .is_err());

        let user = Account::new("testuser@example.com");
        assert!(host
            .authenticate(&user, "test123", &ctx("pop3", "1.2.3.4"))
            .await
            .is_ok());
        assert!(host
            .authenticate(&user, "test123", &ctx("imap", "1.2.3.4"))
            .await
            .unwrap_err()
            .is_rejection());
        // no fallback: the local password is useless
        assert!(host
            .authenticate(&user, "local-pass", &ctx("pop3", "1.2.3.4"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_fallback_to_local() {
        let host = guide_host(&config("custom:customAuthGuide", true));
        let user = Account::new("testuser@example.com");

        assert!(host
            .authenticate(&user, "local-pass", &ctx("imap", "1.2.3.4"))
            .await
            .is_ok());
        assert!(host
            .authenticate(&user, "test123", &ctx("imap", "1.2.3.4"))
            .await
            .is_err());
        // internal errors are not retried locally
        assert_eq!(
            host.authenticate(&user, "test123", &AuthContext::new().with(PROTOCOL, "pop3"))
                .await,
            Err(AuthError::MissingContextField(ORIGINATING_CLIENT_IP))
        );
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let host = guide_host(&config("custom:somethingElse", false));
        let user = Account::new("testuser@example.com");
        assert_eq!(
            host.authenticate(&user, "test123", &ctx("pop3", "1.2.3.4"))
                .await,
            Err(AuthError::UnknownMechanism("somethingElse".into()))
        );

        let stranger = Account::new("someone@elsewhere.org");
        assert_eq!(
            host.authenticate(&stranger, "x", &ctx("pop3", "1.2.3.4"))
                .await,
            Err(AuthError::NoMechanism("someone@elsewhere.org".into()))
        );

        let mut conf = config("custom:somethingElse", false);
        conf.default_domain = Some(DomainConfig::default());
        let host = guide_host(&conf);
        assert!(host
            .authenticate(&stranger, "x", &ctx("pop3", "1.2.3.4"))
            .await
            .unwrap_err()
            .is_rejection());
    }

    #[test]
    fn test_invalid_domain_config() {
        let conf = config("custom", false);
        let ext: Arc<dyn Extension> = Arc::new(GuideExtension::new(conf.guide.clone()));
        assert!(AuthHost::bootstrap(&conf, vec![ext]).is_err());
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Extension for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn init(&self, _registry: &mut MechanismRegistry) -> Result<(), ExtensionError> {
            self.log.lock().unwrap().push(format!("init {}", self.name));
            Ok(())
        }
        fn destroy(&self) {
            self.log.lock().unwrap().push(format!("destroy {}", self.name));
        }
    }

    #[test]
    fn test_extension_lifecycle_order() {
        let log = Arc::new(Mutex::new(vec![]));
        let exts: Vec<Arc<dyn Extension>> = vec![
            Arc::new(Recorder {
                name: "first",
                log: log.clone(),
            }),
            Arc::new(Recorder {
                name: "second",
                log: log.clone(),
            }),
        ];
        let host = AuthHost::bootstrap(&Config::default(), exts).unwrap();
        host.shutdown();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init first", "init second", "destroy second", "destroy first"]
        );
    }

    #[test]
    fn test_duplicate_extension() {
        let conf = Config::default();
        let exts: Vec<Arc<dyn Extension>> = vec![
            Arc::new(GuideExtension::new(conf.guide.clone())),
            Arc::new(GuideExtension::new(conf.guide.clone())),
        ];
        assert!(AuthHost::bootstrap(&conf, exts).is_err());
    }
}
