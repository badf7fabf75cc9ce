use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub guide: GuideConfig,

    pub default_domain: Option<DomainConfig>,
    #[serde(default)]
    pub domains: HashMap<String, DomainConfig>,

    /// Account name to argon2 PHC hash, used by the `local` mechanism
    #[serde(default)]
    pub local_accounts: HashMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingContextPolicy {
    /// Fail with an internal error, distinct from a rejection
    #[default]
    Error,
    /// Reject the attempt
    Reject,
    /// Consider the rule satisfied
    Skip,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GuideConfig {
    #[serde(default = "default_username")]
    pub username: String,
    /// Clear-text reference secret, ignored when `password_hash` is set
    #[serde(default = "default_password")]
    pub password: String,
    pub password_hash: Option<String>,

    #[serde(default = "default_denied_protocols")]
    pub denied_protocols: Vec<String>,
    #[serde(default = "default_denied_origin_ips")]
    pub denied_origin_ips: Vec<String>,

    #[serde(default)]
    pub on_missing_context: MissingContextPolicy,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            password_hash: None,
            denied_protocols: default_denied_protocols(),
            denied_origin_ips: default_denied_origin_ips(),
            on_missing_context: MissingContextPolicy::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    /// `local`, or `custom:<mechanism id> [arg ...]`
    #[serde(default = "default_auth_mech")]
    pub auth_mech: String,
    #[serde(default)]
    pub fallback_to_local: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            auth_mech: default_auth_mech(),
            fallback_to_local: false,
        }
    }
}

pub fn read_config<T: serde::de::DeserializeOwned>(config_file: PathBuf) -> Result<T> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_file.as_path())?;

    let mut config = String::new();
    file.read_to_string(&mut config)?;

    Ok(toml::from_str(&config)?)
}

fn default_username() -> String {
    "testuser@example.com".into()
}

fn default_password() -> String {
    "test123".into()
}

fn default_denied_protocols() -> Vec<String> {
    vec!["imap".into()]
}

fn default_denied_origin_ips() -> Vec<String> {
    vec!["54.83.74.191".into()]
}

fn default_auth_mech() -> String {
    "local".into()
}
