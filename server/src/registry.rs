//! Connected sessions and their last reported positions
//!
//! This module tracks every participant currently connected to the server:
//! - Session lifecycle (register on accept, remove on disconnect)
//! - Monotonic session id assignment starting at 1
//! - Last-write-wins player positions used as enemy steering targets
//! - Best-effort fan-out of encoded lines to each session's outbound channel
//!
//! Sessions and positions are independently locked collections. Only the
//! position update and the join snapshot hold both, always positions first.
//! The update checks membership so that a report racing a disconnect cannot
//! resurrect an entry, and the snapshot queues its lines before a concurrent
//! removal can complete and announce LEAVE.

use log::{debug, info};
use shared::protocol::Message;
use shared::{nearest_position, Vec2};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Sender half feeding a session's writer task. Lines carry no terminator.
pub type Outbound = mpsc::UnboundedSender<String>;

/// A connected participant
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier, never reused within a process
    pub id: u32,
    /// Name announced via JOIN, if any
    pub display_name: Option<String>,
    outbound: Outbound,
}

impl Session {
    fn new(id: u32, outbound: Outbound) -> Self {
        Self {
            id,
            display_name: None,
            outbound,
        }
    }

    /// Queues a line for this session. Returns false once the writer is gone.
    pub fn send(&self, line: &str) -> bool {
        self.outbound.send(line.to_string()).is_ok()
    }
}

/// Server-side table of sessions and player positions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u32, Session>>,
    positions: RwLock<HashMap<u32, Vec2>>,
    next_session_id: AtomicU32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU32::new(1),
        }
    }

    /// Registers a fully constructed session and returns its id
    ///
    /// WELCOME is queued on the outbound channel before the session becomes
    /// visible to broadcasts, so it is always the first line the peer sees and
    /// a concurrent fan-out never observes a half-built entry.
    pub async fn register(&self, outbound: Outbound) -> u32 {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let _ = outbound.send(Message::Welcome { session_id }.encode());
        self.sessions
            .write()
            .await
            .insert(session_id, Session::new(session_id, outbound));

        info!("Session {} registered", session_id);
        session_id
    }

    /// Removes a session and its position entry
    ///
    /// Returns true only for the call that actually removed the session, so
    /// callers can use it to guard one-shot cleanup such as the LEAVE notice.
    pub async fn remove(&self, session_id: u32) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        self.positions.write().await.remove(&session_id);

        if removed {
            info!("Session {} removed", session_id);
        }
        removed
    }

    /// Records a position for a live session; reports for removed sessions are dropped
    pub async fn update_position(&self, session_id: u32, position: Vec2) -> bool {
        let mut positions = self.positions.write().await;
        if !self.sessions.read().await.contains_key(&session_id) {
            return false;
        }
        positions.insert(session_id, position);
        true
    }

    pub async fn set_display_name(&self, session_id: u32, name: Option<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.display_name = name;
        }
    }

    pub async fn display_name(&self, session_id: u32) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .and_then(|s| s.display_name.clone())
    }

    pub async fn position_of(&self, session_id: u32) -> Option<Vec2> {
        self.positions.read().await.get(&session_id).copied()
    }

    /// Snapshot of every known player position
    pub async fn all_positions(&self) -> HashMap<u32, Vec2> {
        self.positions.read().await.clone()
    }

    /// Queues POS for every known position except the session's own, in id order
    ///
    /// The positions read lock is held while sending, so a peer removed
    /// concurrently is either skipped or queued before its LEAVE.
    pub async fn send_positions_to(&self, session_id: u32) -> usize {
        let positions = self.positions.read().await;
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(&session_id) else {
            return 0;
        };

        let mut peers: Vec<(u32, Vec2)> = positions
            .iter()
            .filter(|(id, _)| **id != session_id)
            .map(|(id, position)| (*id, *position))
            .collect();
        peers.sort_unstable_by_key(|(id, _)| *id);

        peers
            .into_iter()
            .filter(|(id, position)| session.send(&Message::pos(*id, *position).encode()))
            .count()
    }

    /// Euclidean-nearest player position, `None` when nobody has reported one
    pub async fn nearest_to(&self, x: f32, y: f32) -> Option<Vec2> {
        let positions = self.positions.read().await;
        nearest_position(positions.values().copied(), Vec2::new(x, y))
    }

    pub async fn has_positions(&self) -> bool {
        !self.positions.read().await.is_empty()
    }

    /// Sends a line to a single session
    pub async fn send_to(&self, session_id: u32, line: &str) -> bool {
        match self.sessions.read().await.get(&session_id) {
            Some(session) => session.send(line),
            None => false,
        }
    }

    /// Sends a line to every session except `exclude`
    ///
    /// Delivery is best-effort per recipient: a closed channel is logged and
    /// skipped. Returns the number of sessions the line was queued for.
    pub async fn broadcast(&self, line: &str, exclude: Option<u32>) -> usize {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;

        for (session_id, session) in sessions.iter() {
            if Some(*session_id) == exclude {
                continue;
            }

            if session.send(line) {
                delivered += 1;
            } else {
                debug!("Dropped broadcast to closing session {}", session_id);
            }
        }

        delivered
    }

    pub async fn session_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn channel() -> (Outbound, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_session_ids_start_at_one_and_increase() {
        block_on(async {
            let registry = SessionRegistry::new();
            let mut ids = Vec::new();
            for _ in 0..5 {
                let (tx, _rx) = channel();
                ids.push(registry.register(tx).await);
            }
            assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        });
    }

    #[test]
    fn test_register_queues_welcome_first() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, mut rx) = channel();
            let id = registry.register(tx).await;

            assert_eq!(rx.try_recv().unwrap(), format!("WELCOME|{}", id));
            assert!(rx.try_recv().is_err());
        });
    }

    #[test]
    fn test_ids_are_not_reused_after_remove() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx1, _rx1) = channel();
            let first = registry.register(tx1).await;
            assert!(registry.remove(first).await);

            let (tx2, _rx2) = channel();
            let second = registry.register(tx2).await;
            assert!(second > first);
        });
    }

    #[test]
    fn test_remove_is_reported_once() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, _rx) = channel();
            let id = registry.register(tx).await;

            assert!(registry.remove(id).await);
            assert!(!registry.remove(id).await);
            assert!(registry.is_empty().await);
        });
    }

    #[test]
    fn test_remove_drops_position() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, _rx) = channel();
            let id = registry.register(tx).await;

            assert!(registry.update_position(id, Vec2::new(5.0, 5.0)).await);
            registry.remove(id).await;

            assert!(registry.all_positions().await.is_empty());
            assert_eq!(registry.position_of(id).await, None);
        });
    }

    #[test]
    fn test_update_position_for_removed_session_is_noop() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, _rx) = channel();
            let id = registry.register(tx).await;
            registry.remove(id).await;

            assert!(!registry.update_position(id, Vec2::new(1.0, 2.0)).await);
            assert!(!registry.has_positions().await);
        });
    }

    #[test]
    fn test_update_position_last_write_wins() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, _rx) = channel();
            let id = registry.register(tx).await;

            registry.update_position(id, Vec2::new(1.0, 1.0)).await;
            registry.update_position(id, Vec2::new(9.0, 3.0)).await;

            assert_eq!(registry.position_of(id).await, Some(Vec2::new(9.0, 3.0)));
            assert_eq!(registry.all_positions().await.len(), 1);
        });
    }

    #[test]
    fn test_nearest_to() {
        block_on(async {
            let registry = SessionRegistry::new();
            assert_eq!(registry.nearest_to(0.0, 0.0).await, None);

            let (tx1, _rx1) = channel();
            let (tx2, _rx2) = channel();
            let a = registry.register(tx1).await;
            let b = registry.register(tx2).await;
            registry.update_position(a, Vec2::new(400.0, 300.0)).await;
            registry.update_position(b, Vec2::new(20.0, 10.0)).await;

            assert_eq!(
                registry.nearest_to(0.0, 0.0).await,
                Some(Vec2::new(20.0, 10.0))
            );
            assert_eq!(
                registry.nearest_to(390.0, 310.0).await,
                Some(Vec2::new(400.0, 300.0))
            );
        });
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx1, mut rx1) = channel();
            let (tx2, mut rx2) = channel();
            let a = registry.register(tx1).await;
            registry.register(tx2).await;
            rx1.try_recv().unwrap();
            rx2.try_recv().unwrap();

            let delivered = registry.broadcast("JOINED|1", Some(a)).await;

            assert_eq!(delivered, 1);
            assert!(rx1.try_recv().is_err());
            assert_eq!(rx2.try_recv().unwrap(), "JOINED|1");
        });
    }

    #[test]
    fn test_broadcast_survives_closed_recipient() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx1, rx1) = channel();
            let (tx2, mut rx2) = channel();
            registry.register(tx1).await;
            registry.register(tx2).await;
            drop(rx1);
            rx2.try_recv().unwrap();

            let delivered = registry.broadcast("ENDEAD|4", None).await;

            assert_eq!(delivered, 1);
            assert_eq!(rx2.try_recv().unwrap(), "ENDEAD|4");
        });
    }

    #[test]
    fn test_send_to_unknown_session() {
        block_on(async {
            let registry = SessionRegistry::new();
            assert!(!registry.send_to(42, "WELCOME|42").await);
        });
    }

    #[test]
    fn test_display_name() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx, _rx) = channel();
            let id = registry.register(tx).await;

            assert_eq!(registry.display_name(id).await, None);
            registry.set_display_name(id, Some("Player".into())).await;
            assert_eq!(registry.display_name(id).await, Some("Player".into()));
        });
    }

    #[test]
    fn test_send_positions_to_skips_self_in_id_order() {
        block_on(async {
            let registry = SessionRegistry::new();
            let (tx1, _rx1) = channel();
            let (tx2, _rx2) = channel();
            let (tx3, mut rx3) = channel();
            let a = registry.register(tx1).await;
            let b = registry.register(tx2).await;
            let joiner = registry.register(tx3).await;
            rx3.try_recv().unwrap();

            registry.update_position(b, Vec2::new(7.0, 8.0)).await;
            registry.update_position(a, Vec2::new(1.0, 2.0)).await;
            registry.update_position(joiner, Vec2::new(5.0, 5.0)).await;

            assert_eq!(registry.send_positions_to(joiner).await, 2);
            assert_eq!(rx3.try_recv().unwrap(), format!("POS|{}|1|2", a));
            assert_eq!(rx3.try_recv().unwrap(), format!("POS|{}|7|8", b));
            assert!(rx3.try_recv().is_err());

            assert_eq!(registry.send_positions_to(99).await, 0);
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_joiner_never_sees_position_after_leave() {
        for _ in 0..200 {
            let registry = std::sync::Arc::new(SessionRegistry::new());
            let (leaver_tx, _leaver_rx) = mpsc::unbounded_channel();
            let (joiner_tx, mut joiner_rx) = mpsc::unbounded_channel();
            let leaver = registry.register(leaver_tx).await;
            registry
                .update_position(leaver, Vec2::new(3.0, 4.0))
                .await;
            let joiner = registry.register(joiner_tx).await;

            let departing = {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if registry.remove(leaver).await {
                        registry
                            .broadcast(&Message::Leave { session_id: leaver }.encode(), None)
                            .await;
                    }
                })
            };
            let snapshot = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.send_positions_to(joiner).await })
            };
            departing.await.unwrap();
            snapshot.await.unwrap();

            let mut lines = Vec::new();
            while let Ok(line) = joiner_rx.try_recv() {
                lines.push(line);
            }
            let pos = lines.iter().position(|l| l.starts_with(&format!("POS|{}|", leaver)));
            let leave = lines.iter().position(|l| *l == format!("LEAVE|{}", leaver));
            assert!(leave.is_some());
            if let Some(pos) = pos {
                assert!(pos < leave.unwrap(), "POS after LEAVE: {:?}", lines);
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_registration_yields_distinct_ids() {
        let registry = std::sync::Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                registry.register(tx).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 32);
        assert_eq!(registry.session_ids().await, ids);
    }
}
