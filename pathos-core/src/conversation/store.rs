//! In-memory session store
//!
//! Sessions live in a concurrent map keyed by session id. Each session sits behind its
//! own async mutex, so turns on different sessions run concurrently while turns on the
//! same session are serialized for their full duration.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::Session;

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Map value: the session and when it was last handed out
type SessionStorage = DashMap<String, (SessionHandle, Instant)>;

/// Initial state for sessions the store creates
#[derive(Debug, Clone)]
struct SessionDefaults {
    affect: String,
    expression: String,
}

/// A session resolved by [`SessionStore::get_or_create`]
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Id the session is stored under
    pub id: String,
    /// The session itself
    pub handle: SessionHandle,
    /// True if the store minted this session on this call
    pub created: bool,
}

/// Concurrent map of live sessions.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<SessionStorage>,
    defaults: Arc<RwLock<SessionDefaults>>,
}

impl SessionStore {
    /// Create an empty store whose new sessions start with the given states.
    pub fn new(default_affect: impl Into<String>, default_expression: impl Into<String>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            defaults: Arc::new(RwLock::new(SessionDefaults {
                affect: default_affect.into(),
                expression: default_expression.into(),
            })),
        }
    }

    /// Expression label given to sessions created from now on
    pub fn set_default_expression(&self, expression: impl Into<String>) {
        let mut defaults = self.defaults.write().unwrap_or_else(|e| e.into_inner());
        defaults.expression = expression.into();
    }

    fn defaults(&self) -> SessionDefaults {
        self.defaults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Look up a session, creating one when `id` is absent, empty, or unknown.
    ///
    /// Unknown ids are never adopted: a fresh session always gets a newly minted UUID.
    pub fn get_or_create(&self, id: Option<&str>) -> SessionEntry {
        let now = Instant::now();

        if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
            if let Some(mut entry) = self.sessions.get_mut(id) {
                entry.1 = now;
                return SessionEntry {
                    id: id.to_string(),
                    handle: entry.0.clone(),
                    created: false,
                };
            }
        }

        let id = Uuid::new_v4().to_string();
        let defaults = self.defaults();
        let handle = Arc::new(Mutex::new(Session::new(
            id.clone(),
            defaults.affect,
            defaults.expression,
        )));
        self.sessions.insert(id.clone(), (handle.clone(), now));
        debug!(session_id = %id, "Created session");

        SessionEntry {
            id,
            handle,
            created: true,
        }
    }

    fn handle(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.0.clone())
    }

    /// Acquire exclusive access to a session, waiting for any turn in progress.
    pub async fn lock(&self, id: &str) -> Option<OwnedMutexGuard<Session>> {
        let handle = self.handle(id)?;
        Some(handle.lock_owned().await)
    }

    /// Run `f` with the session locked.
    pub async fn with_lock<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut guard = self.lock(id).await?;
        Some(f(&mut guard))
    }

    /// Consistent copy of a session
    pub async fn snapshot(&self, id: &str) -> Option<Session> {
        self.with_lock(id, |session| session.clone()).await
    }

    /// Check whether a session exists
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Drop a session. A turn already holding it finishes against the detached copy.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Return true if there are no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all live sessions
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Remove sessions that have not been used for longer than `max_idle`.
    ///
    /// Sessions that are locked or referenced by a turn are kept regardless of age.
    /// Returns the number of sessions removed.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let is_idle = |handle: &SessionHandle, last_used: &Instant| {
            Arc::strong_count(handle) == 1
                && now.duration_since(*last_used) > max_idle
                && handle.try_lock().is_ok()
        };

        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                let (handle, last_used) = entry.value();
                is_idle(handle, last_used)
            })
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .into_iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id, |_, (handle, last_used)| is_idle(handle, last_used))
                    .is_some()
            })
            .count()
    }

    /// Spawn a background task that sweeps idle sessions every `interval`.
    pub fn spawn_sweeper(self, interval: Duration, max_idle: Duration) -> JoinHandle<()> {
        info!(
            interval_secs = interval.as_secs(),
            max_idle_secs = max_idle.as_secs(),
            "Starting idle session sweeper"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep_idle(max_idle);
                if removed > 0 {
                    debug!(
                        removed = removed,
                        remaining = self.len(),
                        "Swept idle sessions"
                    );
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
