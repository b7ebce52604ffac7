//! Channel id lifecycle, shared by client and server contexts: ids are allocated
//! monotonically starting at 1, never reused while the manager lives, and removal is
//! idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::types::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Open,
    Closing,
}

struct ChannelRecord<H> {
    handle: H,
    state: ChannelState,
}

/// Maps channel ids to transport handles (e.g. `Arc<dyn ChannelWriter>`).
pub struct ChannelManager<H> {
    next_id: AtomicU64,
    channels: Mutex<HashMap<ChannelId, ChannelRecord<H>>>,
}

impl<H: Clone> Default for ChannelManager<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> ChannelManager<H> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn new_channel(&self, handle: H) -> ChannelId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.channels.lock().unwrap().insert(
            id,
            ChannelRecord {
                handle,
                state: ChannelState::Open,
            },
        );
        id
    }

    pub fn get(&self, id: ChannelId) -> Option<H> {
        let channels = self.channels.lock().unwrap();
        let record = channels.get(&id)?;
        if record.state == ChannelState::Open {
            Some(record.handle.clone())
        } else {
            None
        }
    }

    pub fn is_valid(&self, id: ChannelId) -> bool {
        self.channels
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|r| r.state == ChannelState::Open)
    }

    pub fn mark_closing(&self, id: ChannelId) {
        if let Some(record) = self.channels.lock().unwrap().get_mut(&id) {
            record.state = ChannelState::Closing;
        }
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove(&self, id: ChannelId) -> Option<H> {
        self.channels.lock().unwrap().remove(&id).map(|r| r.handle)
    }

    pub fn active_channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.state == ChannelState::Open)
            .count()
    }

    pub fn visit_all(&self, mut f: impl FnMut(ChannelId, &H)) {
        for (id, record) in self.channels.lock().unwrap().iter() {
            f(*id, &record.handle);
        }
    }

    /// Iterates every channel and then clears the table, under one lock so no channel can be
    /// registered or looked up between the visit and the erase. Used for whole-context
    /// teardown, where `visit_all` followed by a separate clear would race a concurrent
    /// `new_channel`.
    pub fn visit_and_remove_all(&self, mut f: impl FnMut(ChannelId, &H)) {
        let mut channels = self.channels.lock().unwrap();
        for (id, record) in channels.iter() {
            f(*id, &record.handle);
        }
        channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mgr: ChannelManager<u32> = ChannelManager::new();
        let a = mgr.new_channel(10);
        let b = mgr.new_channel(20);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        mgr.remove(a);
        let c = mgr.new_channel(30);
        assert_eq!(c, 3);
    }

    #[test]
    fn remove_is_idempotent_and_invalidates() {
        let mgr: ChannelManager<u32> = ChannelManager::new();
        let id = mgr.new_channel(1);
        assert!(mgr.is_valid(id));
        assert!(mgr.remove(id).is_some());
        assert!(!mgr.is_valid(id));
        assert!(mgr.remove(id).is_none());
    }

    #[test]
    fn visit_and_remove_all_clears_the_table() {
        let mgr: ChannelManager<u32> = ChannelManager::new();
        mgr.new_channel(1);
        mgr.new_channel(2);

        let mut seen = Vec::new();
        mgr.visit_and_remove_all(|id, handle| seen.push((id, *handle)));

        seen.sort();
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
        assert_eq!(mgr.active_channel_count(), 0);
    }

    #[test]
    fn mark_closing_invalidates_without_removing() {
        let mgr: ChannelManager<u32> = ChannelManager::new();
        let id = mgr.new_channel(1);
        mgr.mark_closing(id);
        assert!(!mgr.is_valid(id));
        assert!(mgr.get(id).is_none());
        assert!(mgr.remove(id).is_some());
    }
}
