//! Capability traits the embedding host registers at startup.
//!
//! The sync engine never reaches into the host process; everything it needs
//! from the outside world comes in through these two interfaces.

/// Sink for user-facing sync status lines.
///
/// Called from the client pull flow at sync start, completion and failure.
/// Implementations are responsible for marshalling onto whatever execution
/// context their UI requires.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, is_error: bool);
}

/// The host connection, as far as address resolution cares: the remote
/// address of the currently connected host, if any.
pub trait HostLink: Send + Sync {
    fn connected_address(&self) -> Option<String>;
}

/// A [`HostLink`] for standalone use where no host connection exists.
pub struct NoHost;

impl HostLink for NoHost {
    fn connected_address(&self) -> Option<String> {
        None
    }
}
