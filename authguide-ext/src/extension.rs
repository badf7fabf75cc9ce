use crate::error::ExtensionError;
use crate::registry::MechanismRegistry;

/// A unit of functionality loaded by the host at startup.
///
/// The host calls [`Extension::init`] once, in load order, then
/// [`Extension::destroy`] once when shutting down, in reverse order.
pub trait Extension: Send + Sync {
    /// Unique name of the extension. It must be an identifier.
    fn name(&self) -> &str;

    fn init(&self, registry: &mut MechanismRegistry) -> Result<(), ExtensionError>;

    fn destroy(&self) {}
}
