//! Error taxonomy for the time-tick core.
//!
//! Library-facing failures are typed with [`thiserror`] so callers can match on them; the binary
//! entrypoint wraps everything in `anyhow::Result` at the wiring layer.

use thiserror::Error;

/// Why [`crate::ticktable::ProxyTickTable::submit_tick`] refused a report before it ever touched
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("source id is not a registered proxy")]
    UnknownProxy,
    #[error("tick report is malformed")]
    Malformed,
}

/// Failures surfaced by [`crate::registry::ChannelRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no channels are registered")]
    NoChannels,
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
}

/// Failure surfaced by the channel-name transform collaborator.
#[derive(Debug, Error)]
pub enum ChannelNameError {
    #[error("channel name {0:?} does not match the expected prefix shape")]
    InvalidShape(String),
}
