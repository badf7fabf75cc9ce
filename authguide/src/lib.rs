pub mod config;
pub mod extension;
pub mod guide;
pub mod host;
pub mod login;
pub mod server;
