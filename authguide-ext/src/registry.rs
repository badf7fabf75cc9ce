use std::collections::HashMap;

use crate::error::ExtensionError;
use crate::mechanism::ArcAuthenticator;

/// Host-owned table of custom authentication mechanisms, filled once at
/// startup by the extensions and read-only afterwards.
#[derive(Clone, Default)]
pub struct MechanismRegistry {
    mechanisms: HashMap<String, ArcAuthenticator>,
}

impl MechanismRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, mechanism: ArcAuthenticator) -> Result<(), ExtensionError> {
        if !is_identifier(id) {
            return Err(ExtensionError::InvalidMechanism(id.to_string()));
        }
        if self.mechanisms.contains_key(id) {
            return Err(ExtensionError::DuplicateMechanism(id.to_string()));
        }

        tracing::debug!(mechanism = id, "registered authentication mechanism");
        self.mechanisms.insert(id.to_string(), mechanism);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<ArcAuthenticator> {
        self.mechanisms.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mechanisms.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.mechanisms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mechanisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }
}

impl std::fmt::Debug for MechanismRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.mechanisms.keys()).finish()
    }
}

// Mechanism ids end up in space separated configuration values
fn is_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}
