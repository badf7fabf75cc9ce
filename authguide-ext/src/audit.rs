use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Why a mechanism turned down an attempt whose credentials were correct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyReason {
    Protocol(String),
    OriginIp(String),
    MissingContext(&'static str),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(p) => write!(f, "protocol {} is not permitted", p),
            Self::OriginIp(ip) => write!(f, "IP {} is not permitted", ip),
            Self::MissingContext(k) => write!(f, "context field '{}' is missing", k),
        }
    }
}

/// Audit trail entries. They carry the account name, never the secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditEvent {
    Accepted {
        mechanism: String,
        account: String,
    },
    Denied {
        mechanism: String,
        account: String,
        reason: DenyReason,
    },
    Failed {
        mechanism: String,
        account: String,
    },
}

impl AuditEvent {
    pub fn account(&self) -> &str {
        match self {
            Self::Accepted { account, .. }
            | Self::Denied { account, .. }
            | Self::Failed { account, .. } => account,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Forwards audit events to `tracing`, info on acceptance, warn otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: AuditEvent) {
        match event {
            AuditEvent::Accepted { mechanism, account } => {
                tracing::info!(mechanism=%mechanism, user=%account, "{} Authentication success", mechanism)
            }
            AuditEvent::Denied {
                mechanism,
                account,
                reason,
            } => {
                tracing::warn!(mechanism=%mechanism, user=%account, reason=%reason, "{} Authentication failed, {} for this user", mechanism, reason)
            }
            AuditEvent::Failed { mechanism, account } => {
                tracing::warn!(mechanism=%mechanism, user=%account, "{} Authentication failed", mechanism)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit(Mutex<Vec<AuditEvent>>);

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event)
    }
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAudit;

impl AuditSink for NoAudit {
    fn record(&self, _event: AuditEvent) {}
}
