//! Browser-session storage for the authorization flow.
//!
//! The flow only needs a small string key/value map per browser session. The
//! in-memory store expires idle sessions, cleaning them up lazily in the same
//! way the response caches do.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "canvas_session";

/// Longest idle lifetime a session can have. Longer TTLs are clamped.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Scoped key/value storage keyed by session id.
///
/// The `_many` variants read or write several keys as one step, so concurrent
/// requests in the same session never observe a mix of each other's values.
pub trait SessionStore: Send + Sync {
    /// Returns one value per key, in order.
    fn get_many(&self, session_id: &str, keys: &[&str]) -> Vec<Option<String>>;
    /// Stores each value under its key; `None` removes the key.
    fn set_many(&self, session_id: &str, values: &[(&str, Option<String>)]);

    fn get(&self, session_id: &str, key: &str) -> Option<String> {
        self.get_many(session_id, &[key]).pop().flatten()
    }

    fn set(&self, session_id: &str, key: &str, value: Option<String>) {
        self.set_many(session_id, &[(key, value)]);
    }
}

struct SessionEntry {
    values: HashMap<String, String>,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub struct MemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    ttl: Duration,
    last_cleanup: Mutex<Instant>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        if ttl > MAX_SESSION_TTL {
            tracing::warn!(
                ttl_secs = ttl.as_secs(),
                max_secs = MAX_SESSION_TTL.as_secs(),
                "Session TTL too large, clamping"
            );
        }

        Self {
            sessions: DashMap::new(),
            ttl: ttl.min(MAX_SESSION_TTL),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.ttl
    }

    fn maybe_cleanup(&self) {
        const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock()
            && last_cleanup.elapsed() >= CLEANUP_INTERVAL
        {
            *last_cleanup = Instant::now();
            drop(last_cleanup);
            self.sessions.retain(|_, entry| !entry.is_expired());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(1800))
    }
}

impl SessionStore for MemorySessionStore {
    fn get_many(&self, session_id: &str, keys: &[&str]) -> Vec<Option<String>> {
        self.maybe_cleanup();

        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return vec![None; keys.len()];
        };
        if entry.is_expired() {
            drop(entry);
            self.sessions.remove(session_id);
            return vec![None; keys.len()];
        }
        entry.expires_at = self.deadline();
        keys.iter().map(|key| entry.values.get(*key).cloned()).collect()
    }

    fn set_many(&self, session_id: &str, values: &[(&str, Option<String>)]) {
        self.maybe_cleanup();

        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                values: HashMap::new(),
                expires_at: self.deadline(),
            });
        if entry.is_expired() {
            entry.values.clear();
        }
        entry.expires_at = self.deadline();
        for (key, value) in values {
            match value {
                Some(value) => {
                    entry.values.insert(key.to_string(), value.clone());
                }
                None => {
                    entry.values.remove(*key);
                }
            }
        }
    }
}

/// A store scoped to one browser session.
pub struct Session<'a> {
    store: &'a dyn SessionStore,
    id: String,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a dyn SessionStore, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }

    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        self.store.get_many(&self.id, keys)
    }

    pub fn set_many(&self, values: &[(&str, Option<String>)]) {
        self.store.set_many(&self.id, values)
    }
}

/// Authorization request parameters carried from the authorize step to role
/// selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowContext {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

impl FlowContext {
    const KEYS: [&'static str; 4] = ["client_id", "redirect_uri", "state", "scope"];

    pub fn load(session: &Session<'_>) -> Self {
        let mut values = session.get_many(&Self::KEYS).into_iter();
        let mut next = || values.next().flatten();
        Self {
            client_id: next(),
            redirect_uri: next(),
            state: next(),
            scope: next(),
        }
    }

    pub fn save(&self, session: &Session<'_>) {
        let [client_id, redirect_uri, state, scope] = Self::KEYS;
        session.set_many(&[
            (client_id, self.client_id.clone()),
            (redirect_uri, self.redirect_uri.clone()),
            (state, self.state.clone()),
            (scope, self.scope.clone()),
        ]);
    }
}
