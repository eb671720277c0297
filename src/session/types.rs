use crate::utils::{Result, SessionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Reserved attribute key backing `is_auth`/`set_auth`
pub const AUTH_KEY: &str = "_isAuth";

/// Reserved attribute key backing `username`/`set_username`
pub const USERNAME_KEY: &str = "_username";

/// A dynamically-typed attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Server-side state for one client.
///
/// A `Session` is always handed out as `Arc<Session>`: the manager keeps the
/// map entry, callers hold shared references. Every attribute operation goes
/// through the session's own `RwLock`, so readers never see a half-applied
/// write. Two requests carrying the same id may interleave their writes;
/// the last write to a key wins.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    last_accessed: RwLock<DateTime<Utc>>,
    data: RwLock<HashMap<String, Value>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_data(id, HashMap::new())
    }

    /// Creates a session that starts out with the given attributes
    pub fn with_data(id: impl Into<String>, data: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_accessed: RwLock::new(now),
            data: RwLock::new(data),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn last_accessed(&self) -> DateTime<Utc> {
        *self.last_accessed.read().await
    }

    /// Marks the session as used now
    pub(crate) async fn touch(&self) {
        *self.last_accessed.write().await = Utc::now();
    }

    pub async fn is_auth(&self) -> bool {
        let guard = self.data.read().await;
        guard.get(AUTH_KEY).and_then(Value::as_bool).unwrap_or(false)
    }

    pub async fn set_auth(&self, is_auth: bool) {
        self.set(AUTH_KEY, is_auth).await;
    }

    pub async fn username(&self) -> String {
        self.get_string(USERNAME_KEY).await
    }

    pub async fn set_username(&self, username: impl Into<String>) {
        self.set(USERNAME_KEY, username.into()).await;
    }

    /// Returns a copy of the value stored under `key`
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.data.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut guard = self.data.write().await;
        guard.insert(key.into(), value.into());
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.write().await.remove(key)
    }

    /// Integer view of `key`; absent or non-integer values read as 0.
    ///
    /// A 0 result is ambiguous. Use [`Session::try_get_int`] to tell the cases apart.
    pub async fn get_int(&self, key: &str) -> i64 {
        let guard = self.data.read().await;
        guard.get(key).and_then(Value::as_int).unwrap_or_default()
    }

    /// String view of `key`; absent or non-string values read as "".
    pub async fn get_string(&self, key: &str) -> String {
        let guard = self.data.read().await;
        guard
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub async fn try_get_int(&self, key: &str) -> Result<i64> {
        let guard = self.data.read().await;
        let value = guard
            .get(key)
            .ok_or_else(|| SessionError::attribute_not_found(key))?;
        value
            .as_int()
            .ok_or_else(|| SessionError::attribute_type(key, "int", value.type_name()))
    }

    pub async fn try_get_string(&self, key: &str) -> Result<String> {
        let guard = self.data.read().await;
        let value = guard
            .get(key)
            .ok_or_else(|| SessionError::attribute_not_found(key))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::attribute_type(key, "string", value.type_name()))
    }

    pub async fn try_get_bool(&self, key: &str) -> Result<bool> {
        let guard = self.data.read().await;
        let value = guard
            .get(key)
            .ok_or_else(|| SessionError::attribute_not_found(key))?;
        value
            .as_bool()
            .ok_or_else(|| SessionError::attribute_type(key, "bool", value.type_name()))
    }

    pub async fn keys(&self) -> Vec<String> {
        self.data.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Consistent copy of every attribute, taken under a single read lock
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.data.read().await.clone()
    }
}
