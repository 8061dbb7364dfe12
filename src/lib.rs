//! Time-tick synchronization core for a distributed vector-database coordinator.
//!
//! Fuses per-proxy [`ticktable::TickReport`]s into a single monotonically advancing safe time
//! per channel and publishes it as a heartbeat, while honouring an outstanding DDL [`barrier`].

pub mod barrier;
pub mod channel_name;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod model;
pub mod reducer;
pub mod registry;
pub mod ticktable;
pub mod watchdog;

pub use barrier::DdlBarrier;
pub use channel_name::{ChannelNameMapper, PrefixChannelNameMapper};
pub use config::CoreSettings;
pub use dispatcher::{Dispatcher, DispatcherState};
pub use message::{MessagePack, MsgType, TimeTickMsg};
pub use model::{ProxyId, Timestamp, NO_BARRIER, UNSET_TIMESTAMP};
pub use reducer::Reducer;
pub use registry::{ChannelRegistry, Family, MessageStream};
pub use ticktable::{ProxyEntry, Snapshot, TickOutcome, TickReport};
