#[derive(Debug, Clone, PartialEq)]
pub enum Mechanism {
    Plain,
    Login,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthOption {
    /// Unique session ID, for logging
    Session(u64),
    /// Local IP the client connected to, eg. 127.0.0.1 or ::1
    LocalIp(String),
    /// Remote client IP
    RemoteIp(String),
    LocalPort(u16),
    RemotePort(u16),
    /// Client IP as seen by a proxy in front of the daemon; `RemoteIp` is then the proxy
    RealRemoteIp(String),
    RealLocalIp(String),
    /// Transport is secured (localhost, SSL, TLS)
    Secured(Option<String>),
    /// One of "insecure", "trusted" or "TLS"
    Transport(String),
    /// Ignore auth penalty tracking for this request
    NoPenalty,
    Debug,
    UnknownPair(String, Vec<u8>),
    UnknownBool(Vec<u8>),
    /// Initial response, inlined in the AUTH command
    Resp(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

#[derive(Debug, PartialEq)]
pub enum ClientCommand {
    Version(Version),
    /// Finishes the client handshake
    Cpid(u64),
    Auth {
        /// Connection-specific request identifier
        id: u64,
        mech: Mechanism,
        /// Protocol requesting authentication, eg. pop3, imap, smtp
        service: String,
        options: Vec<AuthOption>,
    },
    Cont {
        /// Must match the id of the pending AUTH
        id: u64,
        data: Vec<u8>,
    },
    /// AUTH or CONT that could not be parsed past its id
    Invalid { id: u64 },
}

/// What the daemon knows about an authentication request, besides the
/// credentials themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub service: String,
    pub options: Vec<AuthOption>,
}

impl AuthRequest {
    pub fn session(&self) -> Option<u64> {
        self.options.iter().find_map(|o| match o {
            AuthOption::Session(id) => Some(*id),
            _ => None,
        })
    }

    pub fn remote_ip(&self) -> Option<&str> {
        self.options.iter().find_map(|o| match o {
            AuthOption::RemoteIp(ip) => Some(ip.as_str()),
            _ => None,
        })
    }

    pub fn real_remote_ip(&self) -> Option<&str> {
        self.options.iter().find_map(|o| match o {
            AuthOption::RealRemoteIp(ip) => Some(ip.as_str()),
            _ => None,
        })
    }

    /// IP of the end user, seen through proxies when possible
    pub fn client_ip(&self) -> Option<&str> {
        self.real_remote_ip().or_else(|| self.remote_ip())
    }
}

#[derive(Debug)]
pub enum MechanismParameters {
    /// Secrets travel in clear text
    PlainText,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailCode {
    /// Temporary internal failure
    TempFail,
}

#[derive(Debug)]
pub enum ServerCommand {
    Version(Version),
    Spid(u64),
    Cuid(u64),
    Mech {
        kind: Mechanism,
        parameters: Vec<MechanismParameters>,
    },
    /// Connection-specific 128 bit cookie
    Cookie([u8; 16]),
    /// Finishes the server handshake
    Done,
    Fail {
        id: u64,
        user_id: Option<String>,
        code: Option<FailCode>,
    },
    Cont {
        id: u64,
        data: Option<Vec<u8>>,
    },
    Ok {
        id: u64,
        user_id: Option<String>,
    },
}
