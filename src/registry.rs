//! Owns the mutable set of in-use physical channels and exposes broadcast primitives.
//!
//! The message-stream client itself is an external collaborator; this module only depends on the
//! [`MessageStream`] trait it implements.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::message::MessagePack;

/// The two disjoint channel families tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Dml,
    Delta,
}

/// The message-stream client the registry publishes through. Specified only by the interface the
/// core consumes; a real implementation lives outside this crate.
#[async_trait]
pub trait MessageStream: Send + Sync {
    /// Publish `pack` on `channel`. Implementations own their own retry policy; a single failed
    /// send here surfaces as [`RegistryError::BroadcastFailed`] to the caller.
    async fn send(&self, channel: &str, pack: &MessagePack) -> Result<(), String>;
}

#[derive(Default)]
struct FamilyMembership {
    order: Vec<String>,
    present: HashSet<String>,
}

impl FamilyMembership {
    fn add(&mut self, name: &str) {
        if self.present.insert(name.to_string()) {
            self.order.push(name.to_string());
        }
    }

    fn remove(&mut self, name: &str) {
        if self.present.remove(name) {
            self.order.retain(|n| n != name);
        }
    }
}

/// Owns the channel sets and the broadcaster used to publish on them.
pub struct ChannelRegistry {
    stream: Arc<dyn MessageStream>,
    dml: RwLock<FamilyMembership>,
    delta: RwLock<FamilyMembership>,
}

impl ChannelRegistry {
    pub fn new(stream: Arc<dyn MessageStream>) -> Self {
        Self {
            stream,
            dml: RwLock::new(FamilyMembership::default()),
            delta: RwLock::new(FamilyMembership::default()),
        }
    }

    fn family(&self, family: Family) -> &RwLock<FamilyMembership> {
        match family {
            Family::Dml => &self.dml,
            Family::Delta => &self.delta,
        }
    }

    /// Idempotent: re-adding an already-registered name is a no-op.
    pub fn add_channels(&self, family: Family, names: impl IntoIterator<Item = impl AsRef<str>>) {
        let mut guard = self.family(family).write();
        for name in names {
            guard.add(name.as_ref());
        }
    }

    /// Idempotent: removing an absent name is a no-op.
    pub fn remove_channels(
        &self,
        family: Family,
        names: impl IntoIterator<Item = impl AsRef<str>>,
    ) {
        let mut guard = self.family(family).write();
        for name in names {
            guard.remove(name.as_ref());
        }
    }

    /// Ordered snapshot of the channels currently registered for `family`.
    pub fn list_channels(&self, family: Family) -> Vec<String> {
        self.family(family).read().order.clone()
    }

    /// Any currently-registered channel in `family`, or [`RegistryError::NoChannels`] if empty.
    pub fn pick_one(&self, family: Family) -> Result<String, RegistryError> {
        self.family(family)
            .read()
            .order
            .first()
            .cloned()
            .ok_or(RegistryError::NoChannels)
    }

    /// Publish `pack` to every channel in `names`. The underlying stream may have already
    /// accepted some sends by the time one fails; the registry reports the first failure and
    /// leaves ordered retries to the broadcaster's own layer.
    pub async fn broadcast(&self, names: &[String], pack: &MessagePack) -> Result<(), RegistryError> {
        for name in names {
            self.stream
                .send(name, pack)
                .await
                .map_err(RegistryError::BroadcastFailed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStream {
        sent: Mutex<Vec<(String, MessagePack)>>,
    }

    #[async_trait]
    impl MessageStream for RecordingStream {
        async fn send(&self, channel: &str, pack: &MessagePack) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((channel.to_string(), pack.clone()));
            Ok(())
        }
    }

    #[test]
    fn add_channels_is_idempotent() {
        let registry = ChannelRegistry::new(Arc::new(RecordingStream::default()));
        registry.add_channels(Family::Dml, ["c0", "c1"]);
        registry.add_channels(Family::Dml, ["c0"]);
        assert_eq!(registry.list_channels(Family::Dml), vec!["c0", "c1"]);
    }

    #[test]
    fn remove_absent_channel_is_noop() {
        let registry = ChannelRegistry::new(Arc::new(RecordingStream::default()));
        registry.add_channels(Family::Dml, ["c0"]);
        registry.remove_channels(Family::Dml, ["does-not-exist"]);
        assert_eq!(registry.list_channels(Family::Dml), vec!["c0"]);
    }

    #[test]
    fn pick_one_fails_when_empty() {
        let registry = ChannelRegistry::new(Arc::new(RecordingStream::default()));
        assert!(matches!(
            registry.pick_one(Family::Dml),
            Err(RegistryError::NoChannels)
        ));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_named_channel() {
        let stream = Arc::new(RecordingStream::default());
        let registry = ChannelRegistry::new(stream.clone());
        registry.add_channels(Family::Dml, ["c0", "c1"]);

        let pack = MessagePack::TimeTick(crate::message::TimeTickMsg::heartbeat(1, 100));
        registry
            .broadcast(&["c0".to_string(), "c1".to_string()], &pack)
            .await
            .unwrap();

        let sent = stream.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
    }
}
