use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use authguide::config::*;
use authguide::extension::GuideExtension;
use authguide::host::AuthHost;
use authguide::login::hash_password;
use authguide::server::AuthServer;
use authguide_ext::context::{ORIGINATING_CLIENT_IP, PROTOCOL};
use authguide_ext::{Account, AuthContext, AuthError, Extension};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// A special mode dedicated to developers, NOT INTENDED FOR PRODUCTION
    #[clap(long)]
    dev: bool,

    #[clap(short, long, env = "AUTHGUIDE_CONFIG", default_value = "authguide.toml")]
    /// Path to the main configuration file
    config_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the SASL authentication endpoint
    Daemon,
    /// Runs a single login attempt through the configured mechanisms
    Check {
        #[clap(short, long)]
        account: String,
        #[clap(short, long, default_value = "pop3")]
        protocol: String,
        /// Originating client IP. Required by the guide mechanism unless
        /// on_missing_context is set to reject or skip
        #[clap(short, long)]
        origin_ip: Option<String>,
        #[clap(env = "AUTHGUIDE_PASSWORD")]
        maybe_password: Option<String>,
    },
    #[clap(subcommand)]
    /// Specific tooling, not part of a normal workflow
    Tools(ToolsCommand),
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// Hash a password for the local_accounts section
    PasswordHash {
        #[clap(env = "AUTHGUIDE_PASSWORD")]
        maybe_password: Option<String>,
    },
}

fn dev_config() -> Config {
    use std::net::*;
    let mut config = Config {
        auth: Some(AuthConfig {
            bind_addr: SocketAddr::new(IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1)), 12345),
        }),
        ..Config::default()
    };
    config.domains.insert(
        "example.com".to_string(),
        DomainConfig {
            auth_mech: format!("custom:{}", authguide::guide::ID),
            fallback_to_local: false,
        },
    );
    config
}

fn extensions(config: &Config) -> Vec<Arc<dyn Extension>> {
    vec![Arc::new(GuideExtension::new(config.guide.clone()))]
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "main=info,authguide=info,authguide_ext=info")
    }

    // Abort on panic, an auth decision must never be left half-taken
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{}", panic_info);
        eprintln!("{:?}", backtrace::Backtrace::new());
        std::process::abort();
    }));

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config: Config = if args.dev {
        dev_config()
    } else {
        read_config(args.config_file)?
    };

    match &args.command {
        Command::Daemon => {
            let auth_config = match config.auth.clone() {
                Some(c) => c,
                None => bail!("The [auth] section is required to run the daemon"),
            };
            let host = Arc::new(AuthHost::bootstrap(&config, extensions(&config))?);
            let (exit_signal, _provoke_exit) = watch_ctrl_c();
            let res = AuthServer::new(auth_config, host.clone())
                .run(exit_signal)
                .await;
            host.shutdown();
            res?;
        }
        Command::Check {
            account,
            protocol,
            origin_ip,
            maybe_password,
        } => {
            let password = match maybe_password {
                Some(pwd) => pwd.clone(),
                None => rpassword::prompt_password("Enter password: ")?,
            };

            let mut context = AuthContext::new().with(PROTOCOL, protocol.as_str());
            if let Some(ip) = origin_ip {
                context.insert(ORIGINATING_CLIENT_IP, ip.as_str());
            }

            let host = AuthHost::bootstrap(&config, extensions(&config))?;
            let res = host
                .authenticate(&Account::new(account.as_str()), &password, &context)
                .await;
            host.shutdown();
            let (line, code) = check_outcome(&res);
            println!("{}", line);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::Tools(ToolsCommand::PasswordHash { maybe_password }) => {
            let password = match maybe_password {
                Some(pwd) => pwd.clone(),
                None => {
                    let password = rpassword::prompt_password("Enter password: ")?;
                    let password_confirm = rpassword::prompt_password("Confirm password: ")?;
                    if password != password_confirm {
                        bail!("Passwords don't match.");
                    }
                    password
                }
            };
            println!("{}", hash_password(&password)?);
        }
    }

    Ok(())
}

/// What `check` prints and its exit code
fn check_outcome(res: &Result<(), AuthError>) -> (String, i32) {
    match res {
        Ok(()) => ("accepted".into(), 0),
        Err(e) if e.is_rejection() => (format!("rejected: {}", e), 1),
        Err(e) => (format!("error: {}", e), 2),
    }
}

fn watch_ctrl_c() -> (watch::Receiver<bool>, Arc<watch::Sender<bool>>) {
    let (send_cancel, watch_cancel) = watch::channel(false);
    let send_cancel = Arc::new(send_cancel);
    let send_cancel_2 = send_cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(err=%e, "failed to install CTRL+C signal handler");
            return;
        }
        tracing::info!("Received CTRL+C, shutting down.");
        let _ = send_cancel.send(true);
    });
    (watch_cancel, send_cancel_2)
}
