//! Shared scalar types for the time-tick core.

/// A dense identifier for a proxy, assigned by the membership layer. The coordinator's own
/// identity is drawn from the same space and appears as one of the proxies in every round.
pub type ProxyId = u64;

/// A 64-bit hybrid logical clock value.
pub type Timestamp = u64;

/// `0` means "unset": no report has ever named this channel.
pub const UNSET_TIMESTAMP: Timestamp = 0;

/// Reserved to mean "no DDL barrier is outstanding".
pub const NO_BARRIER: Timestamp = Timestamp::MAX;
