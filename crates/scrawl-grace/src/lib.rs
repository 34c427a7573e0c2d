//! Disconnect grace-period scheduler for Scrawl.
//!
//! When a player's connection drops, the engine does not remove them
//! immediately — it starts a grace window and only applies the departure
//! if the window expires without a reconnect. This crate owns that
//! window: a pending-marker map plus one spawned timer task per marker.
//!
//! # Race handling
//!
//! Reconnects and expiries race. The expiry task removes its own marker
//! *under the scheduler lock* before running the expiry handler, and
//! [`GraceScheduler::resolve`] removes the marker and aborts the task
//! under the same lock. Whichever side wins the lock claims the marker;
//! the loser observes it gone and does nothing. A generation token guards
//! against an aborted task that was already past its sleep firing for a
//! marker that has since been replaced.
//!
//! # Integration
//!
//! Keys are caller-defined: the room layer uses `(RoomCode, PlayerId)`,
//! the session layer `(SessionId, PlayerId)`, so the same player can have
//! independent room and session grace windows.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrawl_protocol::ConnId;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the grace-period scheduler.
#[derive(Debug, Clone)]
pub struct GraceConfig {
    /// How long a disconnected player may be absent before the departure
    /// is applied.
    pub grace_period: Duration,
}

impl Default for GraceConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Pending {
    /// The connection that was live when the window started. Returned to
    /// the caller on resolve so stale-connection checks can compare it.
    conn: ConnId,
    /// Guards against a superseded timer task claiming the marker.
    token: u64,
    task: JoinHandle<()>,
}

/// Pending disconnect windows keyed by `K`, each backed by one spawned
/// timer task.
///
/// Cheap to clone; clones share the same marker map.
pub struct GraceScheduler<K> {
    config: GraceConfig,
    inner: Arc<Mutex<HashMap<K, Pending>>>,
    next_token: Arc<AtomicU64>,
}

impl<K> Clone for GraceScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            next_token: Arc::clone(&self.next_token),
        }
    }
}

impl<K> GraceScheduler<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    pub fn new(config: GraceConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The configured grace window.
    pub fn grace_period(&self) -> Duration {
        self.config.grace_period
    }

    /// Start a grace window for `key`.
    ///
    /// If the window expires before [`resolve`](Self::resolve) is called,
    /// `on_expire` runs once on a spawned task. Starting a new window for
    /// a key that already has one replaces it: the old timer is aborted
    /// and its handler never runs.
    pub fn begin<F, Fut>(&self, key: K, conn: ConnId, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let grace = self.config.grace_period;
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            // Claim the marker atomically. If a resolve (or a replacing
            // begin) got there first, the token no longer matches and the
            // departure must not be applied.
            let claimed = {
                let mut map = inner.lock().expect("grace lock poisoned");
                match map.get(&task_key) {
                    Some(pending) if pending.token == token => {
                        map.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };

            if claimed {
                debug!(key = ?task_key, "grace period expired");
                on_expire().await;
            } else {
                trace!(key = ?task_key, "grace expiry lost race to resolve");
            }
        });

        let mut map = self.inner.lock().expect("grace lock poisoned");
        if let Some(old) = map.insert(key.clone(), Pending { conn, token, task }) {
            old.task.abort();
            debug!(key = ?key, "grace window restarted");
        } else {
            debug!(key = ?key, grace_secs = grace.as_secs(), "grace window started");
        }
    }

    /// Cancel the window for `key`, if one is pending.
    ///
    /// Returns the connection id captured when the window began, or
    /// `None` if no window was pending (already expired or never
    /// started). Idempotent.
    pub fn resolve(&self, key: &K) -> Option<ConnId> {
        let pending = self.inner.lock().expect("grace lock poisoned").remove(key)?;
        pending.task.abort();
        debug!(key = ?key, "grace window resolved");
        Some(pending.conn)
    }

    /// Cancel every pending window whose key matches `pred`.
    ///
    /// Used when a whole session or room ends and its individual windows
    /// no longer matter.
    pub fn resolve_where(&self, pred: impl Fn(&K) -> bool) -> Vec<(K, ConnId)> {
        let mut map = self.inner.lock().expect("grace lock poisoned");
        let keys: Vec<K> = map.keys().filter(|k| pred(k)).cloned().collect();
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(pending) = map.remove(&key) {
                pending.task.abort();
                resolved.push((key, pending.conn));
            }
        }
        if !resolved.is_empty() {
            debug!(count = resolved.len(), "grace windows bulk-resolved");
        }
        resolved
    }

    /// Whether a window is currently pending for `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.inner
            .lock()
            .expect("grace lock poisoned")
            .contains_key(key)
    }

    /// Whether any pending window's key matches `pred`.
    pub fn has_pending_where(&self, pred: impl Fn(&K) -> bool) -> bool {
        self.inner
            .lock()
            .expect("grace lock poisoned")
            .keys()
            .any(|k| pred(k))
    }

    /// Number of windows currently pending.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().expect("grace lock poisoned").len()
    }
}

impl<K> Default for GraceScheduler<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(GraceConfig::default())
    }
}
