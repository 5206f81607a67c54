//! Per-session turn serialization.
//!
//! Turns within one session run strictly one after another; turns of
//! different sessions run in parallel. History clears and session deletes
//! take the same lock so they never interleave with a turn.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each session id maps to a `Semaphore(1)`; holding the permit grants
/// exclusive access until it is dropped.
#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn acquire(&self, session_id: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let sem = self.semaphore(session_id);

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }
        tracing::debug!(session_id, "turn queued behind an in-flight turn");
        sem.acquire_owned().await.map_err(|_| SessionBusy)
    }

    fn semaphore(&self, session_id: &str) -> Arc<Semaphore> {
        self.locks
            .lock()
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody holds or waits for. A caller between looking up
    /// the semaphore and taking its permit still owns a clone of the `Arc`,
    /// so the entry stays.
    pub fn prune_idle(&self) {
        self.locks
            .lock()
            .retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() == 0);
    }
}

/// The session's semaphore was closed while waiting.
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn different_sessions_run_concurrently() {
        let map = SessionLockMap::new();
        let _p1 = map.acquire("s1").await.unwrap();
        let _p2 = map.acquire("s2").await.unwrap();
        assert_eq!(map.session_count(), 2);
    }

    #[tokio::test]
    async fn same_session_waits_for_release() {
        let map = Arc::new(SessionLockMap::new());
        let p1 = map.acquire("s1").await.unwrap();

        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let map = map.clone();
            let entered = entered.clone();
            tokio::spawn(async move {
                let _p2 = map.acquire("s1").await.unwrap();
                entered.store(true, Ordering::SeqCst);
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!entered.load(Ordering::SeqCst));

        drop(p1);
        handle.await.unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = SessionLockMap::new();
        let held = map.acquire("busy").await.unwrap();
        drop(map.acquire("idle").await.unwrap());

        map.prune_idle();
        assert_eq!(map.session_count(), 1);
        drop(held);
    }

    #[tokio::test]
    async fn prune_keeps_locks_about_to_be_taken() {
        let map = SessionLockMap::new();
        // Looked up but not yet acquired, as inside `acquire`.
        let sem = map.semaphore("s1");
        map.prune_idle();
        assert_eq!(map.session_count(), 1);

        let _first = sem.try_acquire_owned().unwrap();
        let second = tokio::time::timeout(Duration::from_millis(50), map.acquire("s1")).await;
        assert!(second.is_err(), "a second turn of s1 must wait");
    }
}
