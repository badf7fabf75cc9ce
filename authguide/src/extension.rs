use std::sync::Arc;

use authguide_ext::audit::{AuditSink, TracingAudit};
use authguide_ext::listener::Listeners;
use authguide_ext::{Extension, ExtensionError, MechanismRegistry};

use crate::config::GuideConfig;
use crate::guide::{GuideAuthenticator, ID};

/// Registers the guide mechanism.
///
/// To use it on a domain:
/// ```toml
/// [domains."example.com"]
/// auth_mech = "custom:customAuthGuide"
/// fallback_to_local = false
/// ```
/// and `auth_mech = "local"` with `fallback_to_local = true` to switch back.
pub struct GuideExtension {
    config: GuideConfig,
    audit: Arc<dyn AuditSink>,
    listeners: Listeners,
}

impl GuideExtension {
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
}

impl Extension for GuideExtension {
    fn name(&self) -> &str {
        ID
    }

    fn init(&self, registry: &mut MechanismRegistry) -> Result<(), ExtensionError> {
        let guide = GuideAuthenticator::new(self.config.clone())
            .with_audit(self.audit.clone())
            .with_listeners(self.listeners.clone());
        registry.register(ID, Arc::new(guide))
    }

    fn destroy(&self) {
        tracing::debug!(extension = ID, "extension destroyed");
    }
}
