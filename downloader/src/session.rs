//! Per-session state, keyed by a cookie-carried session id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use solaredge::ExportBundle;
use uuid::Uuid;

use crate::credentials::{CredentialError, CredentialTable};

pub const COOKIE_NAME: &str = "downloader_session";

/// State private to one user session.
#[derive(Debug, Default)]
pub struct Session {
    pub authenticated: bool,
    /// Files from the last successful Generate, served by the download routes.
    pub bundle: Option<ExportBundle>,
}

impl Session {
    /// Runs the credential check; flips `authenticated` only on success.
    pub fn authenticate(
        &mut self,
        table: &CredentialTable,
        username: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        table.verify(username, password)?;
        self.authenticated = true;
        Ok(())
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
        self.bundle = None;
    }
}

/// Sessions idle for longer than this are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

/// In-memory session map. Nothing survives a restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `session` under a fresh id, evicting idle sessions first.
    pub fn insert(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.lock();
        self.evict_idle(&mut sessions, Instant::now());
        sessions.insert(
            id,
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
        id
    }

    pub fn remove(&self, id: Uuid) -> Option<Session> {
        self.lock().remove(&id).map(|e| e.session)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_authenticated(&self, id: Uuid) -> bool {
        self.with(id, |s| s.authenticated).unwrap_or(false)
    }

    /// Run `f` against the session if it exists and has not gone idle.
    pub fn with<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let idle = now.duration_since(sessions.get(&id)?.last_seen);
        if idle > self.idle_timeout {
            sessions.remove(&id);
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(f(&mut entry.session))
    }

    /// Drop every session not seen since `now - idle_timeout`.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        self.evict_idle(&mut self.lock(), now)
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Entry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, e| now.saturating_duration_since(e.last_seen) <= self.idle_timeout);
        before - sessions.len()
    }
}

/// Session id from the request's `Cookie` header(s).
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

pub fn set_cookie(id: Uuid) -> String {
    format!("{COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn clear_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
