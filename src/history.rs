//! Per-session list of recently submitted feedback.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Entries kept per session
pub const HISTORY_CAPACITY: usize = 5;
/// Sessions tracked before the least recently touched one is dropped
pub const MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub text: String,
    pub category: Option<String>,
    pub product: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(text: &str, category: Option<String>, product: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            category,
            product,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, most-recent-first list, unique by exact text.
#[derive(Debug, Clone)]
pub struct RecentSubmissions {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl RecentSubmissions {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Puts `entry` at the front, replacing any entry with the same text and
    /// dropping the oldest beyond capacity.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.text != entry.text);
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn get(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Session {
    recent: RecentSubmissions,
    touched: DateTime<Utc>,
}

pub struct SessionHistory {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(MAX_SESSIONS)
    }
}

impl SessionHistory {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .read()
            .map_err(|_| ApiError::Internal("session history lock poisoned".to_string()))
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .write()
            .map_err(|_| ApiError::Internal("session history lock poisoned".to_string()))
    }

    pub fn record(&self, session_id: &str, entry: HistoryEntry) -> ApiResult<()> {
        let mut sessions = self.write()?;

        if !sessions.contains_key(session_id) && sessions.len() >= self.max_sessions {
            let stalest = sessions
                .iter()
                .min_by_key(|(_, s)| s.touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = stalest {
                sessions.remove(&id);
            }
        }

        let session = sessions.entry(session_id.to_string()).or_insert_with(|| Session {
            recent: RecentSubmissions::new(HISTORY_CAPACITY),
            touched: Utc::now(),
        });
        session.recent.record(entry);
        session.touched = Utc::now();
        Ok(())
    }

    /// Entries for a session, newest first. Unknown sessions are empty.
    pub fn entries(&self, session_id: &str) -> ApiResult<Vec<HistoryEntry>> {
        Ok(self
            .read()?
            .get(session_id)
            .map(|session| session.recent.entries())
            .unwrap_or_default())
    }

    pub fn find(&self, session_id: &str, entry_id: Uuid) -> ApiResult<Option<HistoryEntry>> {
        Ok(self
            .read()?
            .get(session_id)
            .and_then(|session| session.recent.get(entry_id))
            .cloned())
    }

    pub fn session_count(&self) -> ApiResult<usize> {
        Ok(self.read()?.len())
    }
}
