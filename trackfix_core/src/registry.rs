use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use log::info;
use uuid::Uuid;

use crate::{model::Track, session::EditingSession};

/// Process-wide map from opaque session id to editing session.
///
/// The map lock covers only the id lookup and is never held across an edit:
/// callers receive the session behind its own mutex and serialize on that.
/// Distinct sessions can therefore be edited in parallel, while concurrent
/// requests against one session are totally ordered by its lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<EditingSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a freshly decoded track in a session and returns its id.
    pub fn create(&self, track: Track) -> String {
        let session_id = Uuid::new_v4().simple().to_string();
        let session = Arc::new(Mutex::new(EditingSession::new(track)));

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(session_id.clone(), session);
        info!("Created session {session_id} ({} live)", sessions.len());

        session_id
    }

    /// Looks up a live session. The returned handle owns its own lock; the
    /// registry lock is released before this returns.
    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<EditingSession>>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Removes a session, returning it if it was live.
    pub fn delete(&self, session_id: &str) -> Option<Arc<Mutex<EditingSession>>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
        if removed.is_some() {
            info!("Deleted session {session_id}");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TrackMetadata, TrackPoint, TrackSegment};

    fn sample_track() -> Track {
        Track::new(
            vec![TrackSegment::new(vec![TrackPoint::new(0.0, 0.0)])],
            TrackMetadata::with_format("gpx"),
        )
    }

    #[test]
    fn create_then_get_then_delete() {
        let registry = SessionRegistry::new();
        let id = registry.create(sample_track());

        let session = registry.get(&id).expect("session should be live");
        assert_eq!(session.lock().unwrap().current_track().num_points(), 1);

        assert!(registry.delete(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.delete(&id).is_none());
    }

    #[test]
    fn ids_are_opaque_and_distinct() {
        let registry = SessionRegistry::new();
        let a = registry.create(sample_track());
        let b = registry.create(sample_track());
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn concurrent_creates_and_lookups() {
        let registry = Arc::new(SessionRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = registry.create(sample_track());
                    assert!(registry.get(&id).is_some());
                    id
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for id in &ids {
            assert!(registry.delete(id).is_some());
        }
    }

    #[test]
    fn sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.create(sample_track());
        let b = registry.create(sample_track());

        {
            let session = registry.get(&a).unwrap();
            let mut session = session.lock().unwrap();
            session.reroute(0, 0, 1.0, 1.0, "straight", 0.0).unwrap();
        }

        let session = registry.get(&b).unwrap();
        let session = session.lock().unwrap();
        assert_eq!(
            session.current_track().segments[0].points[0].lat,
            Some(0.0)
        );
    }
}
