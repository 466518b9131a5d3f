use std::collections::HashMap;
use std::sync::Arc;

use crate::fec::DecoderCache;
use crate::log::log_sink::LogSink;
use crate::sink_warn;

use super::user::{MediaKind, User};

/// Aggregates remote peers by display name, binding up to two SSRCs
/// (video, audio) per peer and routing validated RTP to the right peer's
/// FEC reassembly cache. Owned explicitly by the engine facade as an
/// `Arc<Mutex<UserManager>>`, never a hidden global.
pub struct UserManager {
    users: HashMap<String, User>,
    ssrc_index: HashMap<u32, String>,
    logger: Arc<dyn LogSink>,
}

impl UserManager {
    pub fn new(logger: Arc<dyn LogSink>) -> Self {
        Self {
            users: HashMap::new(),
            ssrc_index: HashMap::new(),
            logger,
        }
    }

    /// Binds `ssrc` (carrying media `kind`) to the user named `name`,
    /// creating the user if this is its first SSRC. Returns `true` exactly
    /// when this call caused the user to transition from having no bound
    /// SSRCs to having one, i.e. when a join event should fire.
    pub fn insert(&mut self, ssrc: u32, name: &str, kind: MediaKind) -> bool {
        if let Some(existing_name) = self.ssrc_index.get(&ssrc)
            && existing_name != name
        {
            // Peer restarted under the same SSRC with a new identity. Drop
            // the stale binding; the old user is reaped via BYE or eviction.
            let existing_name = existing_name.clone();
            if let Some(old_user) = self.users.get_mut(&existing_name) {
                old_user.clear(ssrc);
            }
            self.ssrc_index.remove(&ssrc);
        }

        let user = self
            .users
            .entry(name.to_string())
            .or_insert_with(|| User::new(name));
        let was_empty = user.has_no_ssrcs();

        if !user.bind(ssrc, kind) {
            sink_warn!(
                self.logger,
                "ssrc {ssrc} rejected for user {name}: slot already bound to a different ssrc"
            );
            return false;
        }

        self.ssrc_index.insert(ssrc, name.to_string());
        was_empty && !user.has_no_ssrcs()
    }

    /// Clears the SSRC binding. Returns `true` exactly when this was the
    /// user's last bound SSRC, i.e. when a leave event should fire; the
    /// user record itself is dropped in that case.
    pub fn remove(&mut self, ssrc: u32) -> bool {
        let Some(name) = self.ssrc_index.remove(&ssrc) else {
            return false;
        };
        let Some(user) = self.users.get_mut(&name) else {
            return false;
        };
        user.clear(ssrc);
        if user.has_no_ssrcs() {
            self.users.remove(&name);
            true
        } else {
            false
        }
    }

    /// Local exit from the room: drops every tracked peer without emitting
    /// individual leave events.
    pub fn clear_all(&mut self) {
        self.users.clear();
        self.ssrc_index.clear();
    }

    pub fn user_for_ssrc(&self, ssrc: u32) -> Option<&User> {
        let name = self.ssrc_index.get(&ssrc)?;
        self.users.get(name)
    }

    pub fn kind_for_ssrc(&self, ssrc: u32) -> Option<MediaKind> {
        self.user_for_ssrc(ssrc)?.kind_of(ssrc)
    }

    /// Resolves `ssrc` all the way to the peer's display name, which media
    /// slot it occupies, and the FEC reassembly cache for that slot, in one
    /// lookup so the RTP receive path doesn't re-walk the SSRC index per
    /// field it needs.
    pub fn route_for_ssrc(&self, ssrc: u32) -> Option<(&str, MediaKind, &DecoderCache)> {
        let name = self.ssrc_index.get(&ssrc)?;
        let user = self.users.get(name)?;
        let kind = user.kind_of(ssrc)?;
        Some((name.as_str(), kind, user.cache_for(kind)))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::noop_log_sink::NoopLogSink;

    fn manager() -> UserManager {
        UserManager::new(Arc::new(NoopLogSink))
    }

    #[test]
    fn join_fires_exactly_once_on_first_ssrc() {
        let mut mgr = manager();
        assert!(mgr.insert(100, "alice", MediaKind::Video));
        assert!(!mgr.insert(101, "alice", MediaKind::Audio));
        assert_eq!(mgr.user_count(), 1);
    }

    #[test]
    fn leave_fires_exactly_once_when_last_ssrc_cleared() {
        let mut mgr = manager();
        mgr.insert(100, "alice", MediaKind::Video);
        mgr.insert(101, "alice", MediaKind::Audio);
        assert!(!mgr.remove(100));
        assert!(mgr.remove(101));
        assert_eq!(mgr.user_count(), 0);
    }

    #[test]
    fn duplicate_slot_binding_is_rejected() {
        let mut mgr = manager();
        mgr.insert(100, "alice", MediaKind::Video);
        assert!(!mgr.insert(200, "alice", MediaKind::Video));
        assert_eq!(mgr.kind_for_ssrc(100), Some(MediaKind::Video));
        assert_eq!(mgr.kind_for_ssrc(200), None);
    }

    #[test]
    fn clear_all_drops_every_user_without_leave_semantics() {
        let mut mgr = manager();
        mgr.insert(100, "alice", MediaKind::Video);
        mgr.insert(200, "bob", MediaKind::Video);
        mgr.clear_all();
        assert_eq!(mgr.user_count(), 0);
        assert!(mgr.user_for_ssrc(100).is_none());
    }

    #[test]
    fn ssrc_reused_under_new_name_migrates_binding() {
        let mut mgr = manager();
        mgr.insert(100, "alice", MediaKind::Video);
        mgr.insert(100, "alice-reconnected", MediaKind::Video);
        assert!(mgr.user_for_ssrc(100).is_some());
        assert_eq!(mgr.user_for_ssrc(100).unwrap().name, "alice-reconnected");
    }
}
