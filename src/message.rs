//! Wire shape of the heartbeat the Dispatcher emits.

use crate::model::{ProxyId, Timestamp};

/// The only message kind this core ever emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    TimeTick,
}

/// A single heartbeat, broadcast on exactly one channel.
///
/// Mirrors `base.msgType = TimeTick`, `base.msgId = 0`, `base.timestamp = minTs`,
/// `base.sourceId = coordinatorId`, `beginTs = endTs = minTs`, `hashValues = [0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeTickMsg {
    pub msg_type: MsgType,
    pub msg_id: u64,
    pub timestamp: Timestamp,
    pub source_id: ProxyId,
    pub begin_ts: Timestamp,
    pub end_ts: Timestamp,
    pub hash_values: Vec<u32>,
}

impl TimeTickMsg {
    /// Build the heartbeat for a channel whose fused safe time is `min_ts`.
    pub fn heartbeat(coordinator_id: ProxyId, min_ts: Timestamp) -> Self {
        Self {
            msg_type: MsgType::TimeTick,
            msg_id: 0,
            timestamp: min_ts,
            source_id: coordinator_id,
            begin_ts: min_ts,
            end_ts: min_ts,
            hash_values: vec![0],
        }
    }
}

/// A message pack as published through [`crate::registry::ChannelRegistry::broadcast`].
///
/// Only one variant is produced today; the enum leaves room for the registry to carry other
/// broker traffic without changing its public shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePack {
    TimeTick(TimeTickMsg),
}
