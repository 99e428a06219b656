//! Session collaborator interface.

use callbridge_protocol::Value;

use crate::error::HandlerError;
use crate::registry::Params;

/// The hosting side of one proxy session.
///
/// The host decides when exchanges happen; the proxy only asks for them.
pub trait SessionHandler: Send + Sync {
    /// Parameters sent to the peer when it (re)initializes.
    ///
    /// Called synchronously from the proxy; should be fast.
    fn fetch_init_params(&self) -> Vec<Option<Value>>;

    /// Signal that an exchange should be scheduled.
    ///
    /// May be called many times before the exchange runs; hosts should
    /// coalesce.
    fn notify_exchange_needed(&self);

    /// Handle a call whose method is not registered on the proxy.
    fn default_call_handler(&self, method: &str, params: &Params) -> Result<(), HandlerError>;
}
