//! Bounded pool of authenticated SSH sessions per `(address, user)`.
//!
//! A [`Lease`] holds one semaphore permit for its key. Sessions go back to
//! the idle list only through [`Lease::release`]; a lease dropped after a
//! failed or timed-out call takes its session down with it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use ssh2::Session;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CapabilityError, ToolResult};

/// Absolute deadline of one remote call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    seconds: u64,
}

impl Deadline {
    /// `None` when `seconds` is 0 or too far out to represent, both meaning
    /// no deadline.
    pub(crate) fn after(seconds: u64) -> Option<Self> {
        if seconds == 0 {
            return None;
        }
        let at = Instant::now().checked_add(Duration::from_secs(seconds))?;
        Some(Self { at, seconds })
    }

    pub(crate) fn remaining(self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub(crate) fn expired(self) -> bool {
        self.remaining().is_zero()
    }

    pub(crate) fn seconds(self) -> u64 {
        self.seconds
    }

    pub(crate) fn instant(self) -> Instant {
        self.at
    }

    pub(crate) fn error(self) -> CapabilityError {
        CapabilityError::Timeout {
            seconds: self.seconds,
            partial: None,
        }
    }
}

struct Slot {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Session>>,
}

/// Per-script SSH session pool.
pub struct SessionPool {
    size: usize,
    slots: DashMap<(String, String), Arc<Slot>>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("size", &self.size)
            .field("keys", &self.slots.len())
            .finish()
    }
}

impl SessionPool {
    /// Pool allowing `size` live sessions per key (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            slots: DashMap::new(),
        }
    }

    /// Live-session limit per key.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Idle sessions currently cached for a key.
    #[must_use]
    pub fn idle(&self, address: &str, user: &str) -> usize {
        self.slots
            .get(&(address.to_owned(), user.to_owned()))
            .map_or(0, |slot| {
                slot.idle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
    }

    /// Drop every idle session.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    fn slot(&self, address: &str, user: &str) -> Arc<Slot> {
        Arc::clone(
            &self
                .slots
                .entry((address.to_owned(), user.to_owned()))
                .or_insert_with(|| {
                    Arc::new(Slot {
                        permits: Arc::new(Semaphore::new(self.size)),
                        idle: Mutex::new(Vec::new()),
                    })
                }),
        )
    }

    /// Wait for a permit, bounded by `deadline`, and take an idle session
    /// if one is cached.
    pub(crate) async fn checkout(
        &self,
        address: &str,
        user: &str,
        deadline: Option<Deadline>,
    ) -> ToolResult<Lease> {
        let slot = self.slot(address, user);
        let acquire = Arc::clone(&slot.permits).acquire_owned();
        let permit = match deadline {
            Some(d) => tokio::time::timeout_at(d.instant(), acquire)
                .await
                .map_err(|_| d.error())?,
            None => acquire.await,
        }
        .map_err(|_| CapabilityError::config("session pool closed"))?;

        let session = slot
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        debug!(address, user, reused = session.is_some(), "ssh session checked out");
        Ok(Lease {
            slot,
            session,
            _permit: permit,
        })
    }
}

/// One checked-out key of the pool.
pub(crate) struct Lease {
    slot: Arc<Slot>,
    session: Option<Session>,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    /// Cached session, if the pool had one.
    pub(crate) fn take_idle(&mut self) -> Option<Session> {
        self.session.take()
    }

    /// Return a healthy session for later calls.
    pub(crate) fn release(self, session: Session) {
        self.slot
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_release_returns_session() {
        let pool = SessionPool::new(2);
        let mut lease = pool.checkout("h:22", "u", None).await.unwrap();
        assert!(lease.take_idle().is_none());
        lease.release(Session::new().unwrap());
        assert_eq!(pool.idle("h:22", "u"), 1);

        let mut again = pool.checkout("h:22", "u", None).await.unwrap();
        assert!(again.take_idle().is_some());
        assert_eq!(pool.idle("h:22", "u"), 0);
        drop(again);
        assert_eq!(pool.idle("h:22", "u"), 0);
    }

    #[tokio::test]
    async fn test_exhausted_pool_waits_until_deadline() {
        let pool = SessionPool::new(1);
        let _held = pool.checkout("h:22", "u", None).await.unwrap();
        let err = pool
            .checkout("h:22", "u", Deadline::after(1))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        // Other keys are independent.
        pool.checkout("h:22", "other", Deadline::after(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_lease_frees_permit() {
        let pool = SessionPool::new(1);
        drop(pool.checkout("h:22", "u", None).await.unwrap());
        pool.checkout("h:22", "u", Deadline::after(1))
            .await
            .unwrap();
    }

    #[test]
    fn test_zero_deadline_is_none() {
        assert!(Deadline::after(0).is_none());
        assert!(!Deadline::after(5).unwrap().expired());
        assert_eq!(SessionPool::new(0).size(), 1);
    }

    #[test]
    fn test_unrepresentable_deadline_is_none() {
        assert!(Deadline::after(u64::MAX).is_none());
    }
}
