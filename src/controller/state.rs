//! Controller state: the single-flight pipeline state, the resolution,
//! connection tracking, and a view of the cache's current artifact.
//!
//! All methods are pure state transitions with no I/O. Owned exclusively by
//! the controller loop. Error strings are machine-readable wire reasons.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::ipc::protocol::Snapshot;
use crate::wallpaper::cache::ArtifactInfo;
use crate::wallpaper::{Category, Resolution};

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Two-state machine guarding change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Loading(Category),
}

#[derive(Debug)]
pub struct ControllerState {
    pipeline: PipelineState,
    /// Captured once at startup; only `force-hd` changes it.
    resolution: Resolution,
    /// Published by the cache under its lock; read at snapshot time.
    current: watch::Receiver<Option<ArtifactInfo>>,
    connections: HashSet<ConnectionId>,
    subscribers: HashSet<ConnectionId>,
}

impl ControllerState {
    pub fn new(resolution: Resolution, current: watch::Receiver<Option<ArtifactInfo>>) -> Self {
        Self {
            pipeline: PipelineState::Idle,
            resolution,
            current,
            connections: HashSet::new(),
            subscribers: HashSet::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    // -- Single flight --

    /// `Idle → Loading(category)`. Rejected with `busy` while loading;
    /// requests are never queued.
    pub fn begin_change(&mut self, category: Category) -> Result<(), &'static str> {
        match self.pipeline {
            PipelineState::Loading(_) => Err("busy"),
            PipelineState::Idle => {
                self.pipeline = PipelineState::Loading(category);
                Ok(())
            }
        }
    }

    /// `Loading → Idle`. Returns the category that was loading, or `None`
    /// if already idle.
    pub fn finish_change(&mut self) -> Option<Category> {
        match std::mem::take(&mut self.pipeline) {
            PipelineState::Loading(category) => Some(category),
            PipelineState::Idle => None,
        }
    }

    pub fn force_high_definition(&mut self) -> Resolution {
        self.resolution = Resolution::UHD;
        self.resolution
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            loading: match self.pipeline {
                PipelineState::Loading(category) => Some(category),
                PipelineState::Idle => None,
            },
            resolution: self.resolution,
            current: self.current.borrow().clone(),
        }
    }

    // -- Connections --

    pub fn add_connection(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    /// Drop a connection and its subscription.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.subscribers.remove(&id);
    }

    /// Subscribe a handshaken connection to UI events.
    pub fn subscribe(&mut self, id: ConnectionId) -> Result<(), &'static str> {
        if !self.connections.contains(&id) {
            return Err("not_connected");
        }
        self.subscribers.insert(id);
        Ok(())
    }

    pub fn subscribers(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.subscribers.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fresh() -> ControllerState {
        ControllerState::new(Resolution::FALLBACK, watch::channel(None).1)
    }

    #[test]
    fn starts_idle() {
        let s = fresh();
        assert_eq!(s.pipeline, PipelineState::Idle);
        assert_eq!(s.snapshot().loading, None);
    }

    #[test]
    fn second_change_is_busy() {
        let mut s = fresh();
        s.begin_change(Category::Nature).unwrap();
        assert_eq!(s.begin_change(Category::City), Err("busy"));
        assert_eq!(s.pipeline, PipelineState::Loading(Category::Nature));
    }

    #[test]
    fn finish_returns_to_idle_once() {
        let mut s = fresh();
        s.begin_change(Category::Tech).unwrap();
        assert_eq!(s.finish_change(), Some(Category::Tech));
        assert_eq!(s.finish_change(), None);
        assert!(s.begin_change(Category::Random).is_ok());
    }

    #[test]
    fn force_hd_overrides_captured_resolution() {
        let mut s =
            ControllerState::new(Resolution::new(1280, 800).unwrap(), watch::channel(None).1);
        assert_eq!(s.force_high_definition(), Resolution::UHD);
        assert_eq!(s.snapshot().resolution, Resolution::UHD);
    }

    #[test]
    fn snapshot_reflects_loading_and_current() {
        let (tx, rx) = watch::channel(None);
        let mut s = ControllerState::new(Resolution::FALLBACK, rx);
        let info = ArtifactInfo {
            path: PathBuf::from("/tmp/IoWall_a.jpg"),
            category: Category::Abstract,
        };
        tx.send_replace(Some(info.clone()));
        s.begin_change(Category::City).unwrap();

        let snap = s.snapshot();
        assert_eq!(snap.loading, Some(Category::City));
        assert_eq!(snap.current, Some(info));

        tx.send_replace(None);
        assert_eq!(s.snapshot().current, None);
    }

    #[test]
    fn subscribe_requires_connection() {
        let mut s = fresh();
        let c = ConnectionId::new();
        assert_eq!(s.subscribe(c), Err("not_connected"));

        s.add_connection(c);
        s.subscribe(c).unwrap();
        assert_eq!(s.subscribers().collect::<Vec<_>>(), vec![c]);

        s.remove_connection(c);
        assert_eq!(s.subscribers().count(), 0);
        assert_eq!(s.subscribe(c), Err("not_connected"));
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
