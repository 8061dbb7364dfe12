//! The channel-name mapping that derives delta-channel names from DML-channel names.
//!
//! This is an external collaborator: the core only consumes the pure transform, it never decides
//! how physical channels are named or hashed. [`PrefixChannelNameMapper`] is a reference
//! implementation good enough to wire up a standalone binary and to exercise the core in tests.

use crate::error::ChannelNameError;

/// Derives a delta-channel sibling name from a DML-channel name.
pub trait ChannelNameMapper: Send + Sync {
    /// Returns the delta channel name paired with `dml_channel`.
    ///
    /// Fails with [`ChannelNameError::InvalidShape`] if `dml_channel` does not match the shape
    /// this mapper expects; callers abort recovery on that failure rather than guessing.
    fn dml_to_delta(&self, dml_channel: &str) -> Result<String, ChannelNameError>;
}

/// Maps `{dml_prefix}{n}` to `{delta_prefix}{n}` by stripping and re-prepending a fixed prefix.
pub struct PrefixChannelNameMapper {
    dml_prefix: String,
    delta_prefix: String,
}

impl PrefixChannelNameMapper {
    pub fn new(dml_prefix: impl Into<String>, delta_prefix: impl Into<String>) -> Self {
        Self {
            dml_prefix: dml_prefix.into(),
            delta_prefix: delta_prefix.into(),
        }
    }
}

impl ChannelNameMapper for PrefixChannelNameMapper {
    fn dml_to_delta(&self, dml_channel: &str) -> Result<String, ChannelNameError> {
        let suffix = dml_channel
            .strip_prefix(self.dml_prefix.as_str())
            .ok_or_else(|| ChannelNameError::InvalidShape(dml_channel.to_string()))?;

        Ok(format!("{}{suffix}", self.delta_prefix))
    }
}
