//! In-process session records keyed by the `session_id` cookie.
//!
//! Each operation touches a single entry under its shard lock and returns
//! before any await point, so a transition on one id can never interleave
//! with another transition on the same id.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{LoggedIn, LoggingIn, Session, SessionId};

struct Entry {
    session: Session,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

pub struct SessionStore {
    entries: DashMap<SessionId, Entry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Open a `LoggingIn` session under a fresh id.
    pub fn begin_login(&self, token_secret: String) -> SessionId {
        self.purge_expired();

        let id = SessionId::generate();
        self.entries.insert(
            id.clone(),
            Entry {
                session: Session::LoggingIn(LoggingIn { token_secret }),
                expires_at: Instant::now() + self.ttl,
            },
        );
        id
    }

    /// Live session for `id`; expired records read as absent.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let now = Instant::now();
        {
            let entry = self.entries.get(id)?;
            if !entry.is_expired(now) {
                return Some(entry.session.clone());
            }
        }
        self.entries.remove_if(id, |_, entry| entry.is_expired(now));
        None
    }

    /// Swap `LoggingIn` for `LoggedIn`, only while the record still holds
    /// `expected_token_secret`.
    pub fn complete_login(
        &self,
        id: &SessionId,
        expected_token_secret: &str,
        profile: LoggedIn,
    ) -> bool {
        let now = Instant::now();
        let Some(mut entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.is_expired(now) {
            return false;
        }

        match &entry.session {
            Session::LoggingIn(pending) if pending.token_secret == expected_token_secret => {
                entry.session = Session::LoggedIn(profile);
                entry.expires_at = now + self.ttl;
                true
            }
            _ => false,
        }
    }

    /// Apply `update` to a `LoggedIn` record. Any other stage is left untouched.
    pub fn update_logged_in_profile<F>(&self, id: &SessionId, update: F) -> bool
    where
        F: FnOnce(&mut LoggedIn),
    {
        let now = Instant::now();
        let Some(mut entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.is_expired(now) {
            return false;
        }

        match &mut entry.session {
            Session::LoggedIn(profile) => {
                update(profile);
                true
            }
            Session::LoggingIn(_) => false,
        }
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Drop every expired record; returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
