pub mod account;
pub mod audit;
pub mod context;
pub mod error;
pub mod extension;
pub mod listener;
pub mod mechanism;
pub mod registry;

// An authentication attempt is made of 3 things:
// - An identity (account)
// - A clear-text secret, never stored nor logged
// - Some per-attempt metadata supplied by the host (context)

pub use account::Account;
pub use context::AuthContext;
pub use error::{AuthError, ExtensionError};
pub use extension::Extension;
pub use mechanism::{ArcAuthenticator, Authenticator};
pub use registry::MechanismRegistry;
