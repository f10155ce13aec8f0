// Registries of live games, one entry per channel.
//
// The backing maps are never exposed; callers get only atomic
// insert-if-absent / get / remove operations, which is what prevents two
// racing "start game" commands from creating duplicate sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::engine::channel_game::ChannelGame;
use crate::engine::session::GameSession;
use crate::metrics;

/// Live ephemeral lobby sessions. At most one per channel; the session's
/// driver task removes its entry on every exit path.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<i64, Arc<GameSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the channel slot. Returns false if a session already holds it.
    pub fn insert_if_absent(&self, channel_id: i64, session: Arc<GameSession>) -> bool {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&channel_id) {
            return false;
        }
        map.insert(channel_id, session);
        metrics::ACTIVE_SESSIONS.set(map.len() as i64);
        true
    }

    pub fn get(&self, channel_id: i64) -> Option<Arc<GameSession>> {
        self.inner.lock().unwrap().get(&channel_id).cloned()
    }

    pub fn remove(&self, channel_id: i64) -> Option<Arc<GameSession>> {
        let mut map = self.inner.lock().unwrap();
        let removed = map.remove(&channel_id);
        metrics::ACTIVE_SESSIONS.set(map.len() as i64);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Long-lived persistent channel games, loaded from storage at startup
/// and bound/unbound through the API.
#[derive(Clone, Default)]
pub struct ChannelGameRegistry {
    inner: Arc<Mutex<HashMap<i64, Arc<ChannelGame>>>>,
}

impl ChannelGameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_if_absent(&self, channel_id: i64, game: Arc<ChannelGame>) -> bool {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&channel_id) {
            return false;
        }
        map.insert(channel_id, game);
        metrics::CHANNEL_GAMES.set(map.len() as i64);
        true
    }

    pub fn get(&self, channel_id: i64) -> Option<Arc<ChannelGame>> {
        self.inner.lock().unwrap().get(&channel_id).cloned()
    }

    pub fn remove(&self, channel_id: i64) -> Option<Arc<ChannelGame>> {
        let mut map = self.inner.lock().unwrap();
        let removed = map.remove(&channel_id);
        metrics::CHANNEL_GAMES.set(map.len() as i64);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
