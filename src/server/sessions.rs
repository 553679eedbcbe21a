//! Authenticated session registry.
//!
//! Maps connection identifiers to the entry that succeeded in Bind, with a
//! TTL. Expired sessions are evicted lazily on lookup and periodically by
//! a background garbage-collection task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::directory::Entry;
use crate::errors::{CerberusError, Result};

/// A single authenticated connection.
#[derive(Debug, Clone)]
struct Session {
    entry: Arc<Entry>,
    expire_at: Instant,
    refreshable: bool,
}

/// Registry of authenticated connections, safe for concurrent use from
/// every connection handler.
#[derive(Debug)]
pub struct SessionRegistry {
    reg: DashMap<u64, Session>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Creates a registry whose sessions live for `ttl` after their last
    /// refresh.
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            reg: DashMap::new(),
            ttl,
        })
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Registers the entry as authenticated for the given connection.
    /// Fails when the connection already holds an unexpired session.
    pub fn new_session(&self, id: u64, entry: Arc<Entry>, refreshable: bool) -> Result<()> {
        let now = Instant::now();
        let session = Session {
            entry,
            expire_at: now + self.ttl,
            refreshable,
        };

        match self.reg.entry(id) {
            MapEntry::Occupied(occupied) if now <= occupied.get().expire_at => {
                Err(CerberusError::AlreadyAuthenticated)
            }
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(session);
                Ok(())
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(session);
                Ok(())
            }
        }
    }

    /// Returns the authenticated entry for the connection, or `None` when
    /// the connection never bound or its session expired. Expired sessions
    /// are evicted on the spot; refreshable ones get a fresh TTL.
    pub fn session(&self, id: u64) -> Option<Arc<Entry>> {
        let now = Instant::now();
        {
            let mut session = self.reg.get_mut(&id)?;
            if now <= session.expire_at {
                if session.refreshable {
                    session.expire_at = now + self.ttl;
                }
                return Some(session.entry.clone());
            }
        }

        trace!(conn_id = id, "evicting expired session");
        self.reg.remove(&id);
        None
    }

    /// Removes the session of the given connection. Deleting an absent
    /// session is a no-op.
    pub fn delete(&self, id: u64) {
        self.reg.remove(&id);
    }

    /// Removes every expired session.
    pub fn gc(&self) {
        let now = Instant::now();
        let before = self.reg.len();
        self.reg.retain(|_, session| now <= session.expire_at);

        let evicted = before - self.reg.len();
        if evicted > 0 {
            debug!(evicted, "session garbage collection");
        }
    }

    /// Number of registered sessions, expired ones included until the next
    /// collection.
    pub fn len(&self) -> usize {
        self.reg.len()
    }

    /// Returns true when no session is registered.
    pub fn is_empty(&self) -> bool {
        self.reg.is_empty()
    }

    /// Runs `gc()` every half TTL until the cancellation token fires.
    pub async fn run_gc(self: Arc<Self>, shutdown: CancellationToken) {
        let period = (self.ttl / 2).max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.gc(),
                _ = shutdown.cancelled() => break,
            }
        }
        debug!("session garbage collection stopped");
    }
}
