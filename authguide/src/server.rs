use std::net::SocketAddr;

use anyhow::{anyhow, bail, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::BufStream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::bytes::BytesMut;

use authguide_ext::context::{ORIGINATING_CLIENT_IP, ORIGIN_IP, PROTOCOL, SESSION};
use authguide_ext::{Account, AuthContext};
use authguide_sasl::{
    decode::client_command,
    encode::Encode,
    flow::{State, Verdict},
    types::AuthRequest,
};

use crate::config::AuthConfig;
use crate::host::ArcAuthHost;

/// Longest command line accepted from a daemon, newline included
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// Dovecot-compatible authentication endpoint: mail daemons connect to it
/// and delegate their PLAIN logins to the host.
pub struct AuthServer {
    host: ArcAuthHost,
    bind_addr: SocketAddr,
}

impl AuthServer {
    pub fn new(config: AuthConfig, host: ArcAuthHost) -> Self {
        Self {
            bind_addr: config.bind_addr,
            host,
        }
    }

    pub async fn run(self, must_exit: watch::Receiver<bool>) -> Result<()> {
        let tcp = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(
            "SASL Authentication Protocol listening on {:#}",
            self.bind_addr
        );
        serve(tcp, self.host, must_exit).await
    }
}

/// Accepts connections on an already bound listener until `must_exit`
/// turns true, then drains the running sessions.
pub async fn serve(
    tcp: TcpListener,
    host: ArcAuthHost,
    mut must_exit: watch::Receiver<bool>,
) -> Result<()> {
    let mut connections = FuturesUnordered::new();

    while !*must_exit.borrow() {
        let wait_conn_finished = async {
            if connections.is_empty() {
                futures::future::pending().await
            } else {
                connections.next().await
            }
        };

        let (socket, remote_addr) = tokio::select! {
            a = tcp.accept() => a?,
            _ = wait_conn_finished => continue,
            _ = must_exit.changed() => continue,
        };

        tracing::info!("AUTH: accepted connection from {}", remote_addr);
        let conn = tokio::spawn(NetLoop::new(socket, host.clone(), must_exit.clone()).run_error());

        connections.push(conn);
    }
    drop(tcp);

    tracing::info!("AUTH server shutting down, draining remaining connections...");
    while connections.next().await.is_some() {}

    Ok(())
}

/// Translates what the daemon told us about the request into the
/// attributes mechanisms look at.
pub fn request_context(request: &AuthRequest) -> AuthContext {
    let mut ctx = AuthContext::new().with(PROTOCOL, request.service.as_str());
    if let Some(ip) = request.client_ip() {
        ctx.insert(ORIGINATING_CLIENT_IP, ip);
    }
    if let Some(ip) = request.remote_ip() {
        ctx.insert(ORIGIN_IP, ip);
    }
    if let Some(session) = request.session() {
        ctx.insert(SESSION, session.to_string());
    }
    ctx
}

struct NetLoop {
    host: ArcAuthHost,
    stream: BufStream<TcpStream>,
    stop: watch::Receiver<bool>,
    state: State,
    read_buf: Vec<u8>,
    write_buf: BytesMut,
}

impl NetLoop {
    fn new(stream: TcpStream, host: ArcAuthHost, stop: watch::Receiver<bool>) -> Self {
        Self {
            host,
            stream: BufStream::new(stream),
            state: State::Init,
            stop,
            read_buf: Vec::new(),
            write_buf: BytesMut::new(),
        }
    }

    async fn run_error(self) {
        match self.run().await {
            Ok(()) => tracing::info!("Auth session succeeded"),
            Err(e) => tracing::error!(err=?e, "Auth session failed"),
        }
    }

    async fn run(mut self) -> Result<()> {
        loop {
            let mut limited = (&mut self.stream).take(MAX_LINE_LEN as u64);
            tokio::select! {
                read_res = limited.read_until(b'\n', &mut self.read_buf) => {
                    let bread = read_res?;
                    if bread == 0 {
                        tracing::info!("Reading buffer empty, connection has been closed. Exiting AUTH session.");
                        return Ok(())
                    }
                    if bread == MAX_LINE_LEN && self.read_buf.last() != Some(&b'\n') {
                        bail!("Command line longer than {} bytes", MAX_LINE_LEN);
                    }

                    let (_, cmd) = client_command(&self.read_buf).map_err(|_| anyhow!("Unable to parse command"))?;
                    // no trace of the command itself, it may carry the password
                    tracing::trace!("Received command");

                    let host = self.host.clone();
                    let check = move |user: String, pass: String, request: AuthRequest| {
                        login(host, user, pass, request)
                    };
                    self.state.progress(cmd, check).await;
                    if matches!(self.state, State::Error) {
                        bail!("Internal state is in error, previous logs explain what went wrong");
                    }

                    let srv_cmds = self.state.response();
                    srv_cmds.iter().try_for_each(|r| {
                        tracing::trace!(cmd=?r, "Sent command");
                        r.encode(&mut self.write_buf)
                    })?;

                    if !srv_cmds.is_empty() {
                        self.stream.write_all(&self.write_buf).await?;
                        self.stream.flush().await?;
                    }

                    self.read_buf.clear();
                    self.write_buf.clear();
                },
                _ = self.stop.changed() => {
                    tracing::debug!("Server is stopping, quitting this runner");
                    return Ok(())
                }
            }
        }
    }
}

async fn login(host: ArcAuthHost, user: String, pass: String, request: AuthRequest) -> Verdict {
    let account = Account::new(user);
    let context = request_context(&request);
    match host.authenticate(&account, &pass, &context).await {
        Ok(()) => Verdict::Accepted,
        Err(e) if e.is_rejection() => Verdict::Rejected,
        Err(e) => {
            tracing::error!(user=%account, err=%e, "authentication could not complete");
            Verdict::TempFail
        }
    }
}
