use std::collections::BTreeMap;

/// Protocol the attempt comes from, eg. `imap`, `pop3`, `http`.
pub const PROTOCOL: &str = "proto";
/// Originating client IP, after proxy resolution.
pub const ORIGINATING_CLIENT_IP: &str = "ocip";
/// IP of the direct peer, which may be a proxy.
pub const ORIGIN_IP: &str = "oip";
/// Host-specific session identifier, only meaningful in logs.
pub const SESSION: &str = "session";

/// Per-attempt metadata supplied by the host.
///
/// Keys are free-form strings; the constants of this module name the ones
/// the host knows how to fill. A context lives for a single authentication
/// call and is never mutated by a mechanism.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthContext(BTreeMap<String, String>);

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get(PROTOCOL)
    }

    pub fn originating_client_ip(&self) -> Option<&str> {
        self.get(ORIGINATING_CLIENT_IP)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AuthContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
