use futures::Future;
use rand::prelude::*;

use super::decode::auth_plain;
use super::types::*;

/// What the daemon-side login callback decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
    /// The decision could not be taken, the client may retry later
    TempFail,
}

#[derive(Debug, PartialEq)]
pub enum AuthRes {
    Success(String),
    Failed(Option<String>, Option<FailCode>),
}

#[derive(Debug, PartialEq)]
pub enum State {
    Error,
    Init,
    HandshakePart(Version),
    HandshakeDone,
    AuthPlainProgress { id: u64, request: AuthRequest },
    AuthDone { id: u64, res: AuthRes },
}

const SERVER_MAJOR: u64 = 1;
const SERVER_MINOR: u64 = 2;

async fn try_auth_plain<X, F>(data: &[u8], request: AuthRequest, login: X) -> AuthRes
where
    X: FnOnce(String, String, AuthRequest) -> F,
    F: Future<Output = Verdict>,
{
    let (ubin, pbin) = match auth_plain(data) {
        Ok(([], (authz, user, pass))) if authz.is_empty() || authz == user => (user, pass),
        Ok(_) => {
            tracing::error!("Impersonating user is not supported");
            return AuthRes::Failed(None, None);
        }
        Err(e) => {
            tracing::error!(err=?e, "Could not parse the SASL PLAIN data chunk");
            return AuthRes::Failed(None, None);
        }
    };

    let (user, password) = match (std::str::from_utf8(ubin), std::str::from_utf8(pbin)) {
        (Ok(u), Ok(p)) => (u.to_string(), p.to_string()),
        _ => {
            tracing::error!("Username or password contain invalid UTF-8 characters");
            return AuthRes::Failed(None, None);
        }
    };

    match login(user.clone(), password, request).await {
        Verdict::Accepted => AuthRes::Success(user),
        Verdict::Rejected => {
            tracing::warn!(user=%user, "login failed");
            AuthRes::Failed(Some(user), None)
        }
        Verdict::TempFail => AuthRes::Failed(Some(user), Some(FailCode::TempFail)),
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Init
    }
}

impl State {
    pub fn new() -> Self {
        Self::Init
    }

    pub async fn progress<X, F>(&mut self, cmd: ClientCommand, login: X)
    where
        X: FnOnce(String, String, AuthRequest) -> F,
        F: Future<Output = Verdict>,
    {
        let new_state = 'state: {
            match (std::mem::replace(self, State::Error), cmd) {
                (Self::Init, ClientCommand::Version(v)) => Self::HandshakePart(v),
                (Self::HandshakePart(version), ClientCommand::Cpid(_cpid)) => {
                    if version.major != SERVER_MAJOR {
                        tracing::error!(
                            client_major = version.major,
                            server_major = SERVER_MAJOR,
                            "Unsupported client major version"
                        );
                        break 'state Self::Error;
                    }

                    Self::HandshakeDone
                }
                (
                    Self::HandshakeDone | Self::AuthDone { .. },
                    ClientCommand::Auth {
                        id,
                        mech,
                        service,
                        mut options,
                    },
                ) => {
                    if mech != Mechanism::Plain {
                        tracing::error!(mechanism=?mech, "Unsupported Authentication Mechanism");
                        break 'state Self::AuthDone {
                            id,
                            res: AuthRes::Failed(None, None),
                        };
                    }

                    let resp = options
                        .iter()
                        .position(|o| matches!(o, AuthOption::Resp(_)))
                        .map(|i| options.remove(i));
                    let request = AuthRequest { service, options };
                    match resp {
                        Some(AuthOption::Resp(data)) => Self::AuthDone {
                            id,
                            res: try_auth_plain(&data, request, login).await,
                        },
                        _ => Self::AuthPlainProgress { id, request },
                    }
                }
                (
                    Self::HandshakeDone | Self::AuthDone { .. } | Self::AuthPlainProgress { .. },
                    ClientCommand::Invalid { id },
                ) => {
                    tracing::warn!(auth_id = id, "Malformed request, failing it");
                    Self::AuthDone {
                        id,
                        res: AuthRes::Failed(None, None),
                    }
                }
                (
                    Self::AuthPlainProgress { id, request },
                    ClientCommand::Cont { id: cid, data },
                ) => {
                    if cid != id {
                        tracing::error!(
                            auth_id = id,
                            cont_id = cid,
                            "CONT id does not match AUTH id"
                        );
                        break 'state Self::AuthDone {
                            id,
                            res: AuthRes::Failed(None, None),
                        };
                    }

                    Self::AuthDone {
                        id,
                        res: try_auth_plain(&data, request, login).await,
                    }
                }
                _ => {
                    tracing::error!("This command is not valid in this context");
                    Self::Error
                }
            }
        };
        tracing::debug!(state=?new_state, "Made progress");
        *self = new_state;
    }

    pub fn response(&self) -> Vec<ServerCommand> {
        match self {
            Self::HandshakeDone => {
                let mut cookie = [0u8; 16];
                thread_rng().fill(&mut cookie);

                vec![
                    ServerCommand::Version(Version {
                        major: SERVER_MAJOR,
                        minor: SERVER_MINOR,
                    }),
                    ServerCommand::Mech {
                        kind: Mechanism::Plain,
                        parameters: vec![MechanismParameters::PlainText],
                    },
                    ServerCommand::Spid(std::process::id().into()),
                    ServerCommand::Cuid(thread_rng().gen::<u32>().into()),
                    ServerCommand::Cookie(cookie),
                    ServerCommand::Done,
                ]
            }
            Self::AuthPlainProgress { id, .. } => vec![ServerCommand::Cont {
                id: *id,
                data: None,
            }],
            Self::AuthDone {
                id,
                res: AuthRes::Success(user),
            } => vec![ServerCommand::Ok {
                id: *id,
                user_id: Some(user.clone()),
            }],
            Self::AuthDone {
                id,
                res: AuthRes::Failed(maybe_user, maybe_code),
            } => vec![ServerCommand::Fail {
                id: *id,
                user_id: maybe_user.clone(),
                code: maybe_code.clone(),
            }],
            _ => vec![],
        }
    }
}
