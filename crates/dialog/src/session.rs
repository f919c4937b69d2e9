use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{SessionId, UserId},
    error::DialogError,
};
use tokio::sync::Mutex;

use crate::pager::PageState;

/// Flat per-session key/value scratch space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scratch(BTreeMap<String, Value>);

impl Scratch {
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_i64_list(&self, key: &str) -> Vec<i64> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    pub fn push_i64(&mut self, key: &str, value: i64) {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(Value::from(value)),
            other => *other = Value::Array(vec![Value::from(value)]),
        }
    }

    /// The page cursor stored under `key`, without re-normalization against
    /// fresh data. Missing values read as page 0 of 1.
    pub fn page_state(&self, key: &str) -> PageState {
        let page = self.get_i64(&format!("{key}.page")).unwrap_or(0);
        let total = self
            .get_i64(&format!("{key}.total_pages"))
            .and_then(|total| usize::try_from(total).ok())
            .unwrap_or(1);
        PageState::new(page, total)
    }

    pub fn set_page_state(&mut self, key: &str, state: PageState) {
        self.set(&format!("{key}.page"), state.page() as u64);
        self.set(&format!("{key}.total_pages"), state.total_pages() as u64);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session<S> {
    pub id: SessionId,
    pub owner: UserId,
    pub step: S,
    pub scratch: Scratch,
}

struct StoreInner<S> {
    sessions: HashMap<SessionId, Session<S>>,
    by_owner: HashMap<UserId, SessionId>,
}

/// Live sessions of one dialog kind. Each owner has at most one; starting
/// again replaces the previous session. The lock is never held across I/O.
pub struct SessionStore<S> {
    inner: Mutex<StoreInner<S>>,
}

impl<S: Clone> SessionStore<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sessions: HashMap::new(),
                by_owner: HashMap::new(),
            }),
        }
    }

    pub async fn create(&self, owner: UserId, step: S) -> SessionId {
        let id = SessionId::new();
        let mut inner = self.inner.lock().await;
        if let Some(previous) = inner.by_owner.insert(owner, id) {
            inner.sessions.remove(&previous);
        }
        inner.sessions.insert(
            id,
            Session {
                id,
                owner,
                step,
                scratch: Scratch::default(),
            },
        );
        id
    }

    pub async fn get(&self, id: SessionId) -> Result<Session<S>, DialogError> {
        self.inner
            .lock()
            .await
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| DialogError::session_not_found(id))
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.inner.lock().await.sessions.contains_key(&id)
    }

    pub async fn mutate<R>(
        &self,
        id: SessionId,
        apply: impl FnOnce(&mut Session<S>) -> R,
    ) -> Result<R, DialogError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| DialogError::session_not_found(id))?;
        Ok(apply(session))
    }

    pub async fn destroy(&self, id: SessionId) -> Option<Session<S>> {
        let mut inner = self.inner.lock().await;
        let session = inner.sessions.remove(&id)?;
        if inner.by_owner.get(&session.owner) == Some(&id) {
            inner.by_owner.remove(&session.owner);
        }
        Some(session)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<S: Clone> Default for SessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
