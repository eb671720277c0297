use crate::config::{CookieConfig, SessionConfig};
use crate::session::cookie::{CookieSink, CookieSource, build_set_cookie};
use crate::session::id::generate_id;
use crate::session::sweep::{self, SweepPolicy, SweepResult};
use crate::session::types::{Session, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared map from session id to session
pub(crate) type SessionMap = Arc<RwLock<HashMap<String, Arc<Session>>>>;

/// In-memory registry of live sessions.
///
/// The manager owns every map entry. Lookups hand out `Arc<Session>`
/// clones that stay usable after eviction but are no longer reachable
/// through the manager. Create one per process and share it with `Arc`.
pub struct SessionManager {
    sessions: SessionMap,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates an empty manager.
    ///
    /// Cookie settings that fail [`CookieConfig::validate`] are replaced by
    /// the defaults so that no configured value can add attributes to the
    /// `Set-Cookie` header.
    pub fn new(mut config: SessionConfig) -> Self {
        if let Err(e) = config.cookie.validate() {
            warn!(error = %e, "Invalid cookie settings, using defaults");
            config.cookie = CookieConfig::default();
        }

        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Shorthand for a manager with the given limits and default cookie
    /// settings. A zero duration disables that limit.
    pub fn with_limits(timeout: Duration, expiration: Duration) -> Self {
        Self::new(SessionConfig::new(timeout, expiration))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolves the session for a request.
    ///
    /// Reads the session cookie from `request` and returns the matching live
    /// session. A missing cookie, an unknown id or an evicted id all lead to
    /// a fresh session whose cookie is written to `response`.
    pub async fn get<R, W>(&self, request: &R, response: &mut W) -> Arc<Session>
    where
        R: CookieSource + ?Sized,
        W: CookieSink + ?Sized,
    {
        let session_id = request.cookie(&self.config.cookie.name).unwrap_or_default();
        self.get_by_id(&session_id, response).await
    }

    /// Same as [`SessionManager::get`] for an id obtained some other way
    pub async fn get_by_id<W>(&self, session_id: &str, response: &mut W) -> Arc<Session>
    where
        W: CookieSink + ?Sized,
    {
        if let Some(session) = self.lookup(session_id).await {
            return session;
        }

        let session = self.insert_new(HashMap::new(), None).await;
        debug!(session_id = %session.id(), "New session created");
        self.write_cookie(response, session.id());
        session
    }

    /// Returns the live session for `session_id` without creating one
    pub async fn find(&self, session_id: &str) -> Option<Arc<Session>> {
        self.lookup(session_id).await
    }

    pub async fn has(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Inserts `session`, replacing any entry with the same id, and binds
    /// the client to it through the session cookie
    pub async fn set<W>(&self, response: &mut W, session: Arc<Session>)
    where
        W: CookieSink + ?Sized,
    {
        let id = session.id().to_string();
        let replaced = {
            let mut guard = self.sessions.write().await;
            guard.insert(id.clone(), session).is_some()
        };

        debug!(session_id = %id, replaced = replaced, "Session set");
        self.write_cookie(response, &id);
    }

    /// Removes a session; returns false if it was not present
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    /// Moves the attributes of `session` to a freshly minted id, drops the
    /// old entry and rebinds the client cookie. Call after a privilege
    /// change such as login.
    ///
    /// Attributes are copied before the map lock is taken. A write made
    /// through another handle to the old session after the copy, including
    /// any write after this call returns, does not reach the renewed one.
    pub async fn renew<W>(&self, response: &mut W, session: &Session) -> Arc<Session>
    where
        W: CookieSink + ?Sized,
    {
        let data = session.snapshot().await;
        let renewed = self.insert_new(data, Some(session.id())).await;

        debug!(
            old_session_id = %session.id(),
            session_id = %renewed.id(),
            "Session renewed"
        );
        self.write_cookie(response, renewed.id());
        renewed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Runs one eviction pass now
    pub async fn sweep(&self) -> SweepResult {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one eviction pass as if the current time were `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepResult {
        sweep::sweep_at(&self.sessions, SweepPolicy::from_config(&self.config), now).await
    }

    /// Starts the background sweep task (every `sweep_interval_secs`).
    ///
    /// Returns a JoinHandle for graceful shutdown coordination and a shutdown
    /// sender to signal the task to stop.
    pub fn start_sweep_task(&self) -> (JoinHandle<()>, mpsc::Sender<()>) {
        let policy = SweepPolicy::from_config(&self.config);
        if policy.is_disabled() {
            info!("Timeout and expiration disabled, sweep will not evict sessions");
        }
        sweep::start_sweep_task(
            Arc::clone(&self.sessions),
            policy,
            self.config.sweep_interval(),
        )
    }

    async fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        if session_id.is_empty() {
            return None;
        }

        let session = {
            let guard = self.sessions.read().await;
            guard.get(session_id).cloned()
        }?;

        if self.config.timeout().is_some() {
            session.touch().await;
        }

        let last_accessed = session.last_accessed().await;
        debug!(
            session_id = %session.id(),
            created_at = %session.created_at(),
            last_accessed = %last_accessed,
            "Session found"
        );
        Some(session)
    }

    /// Registers a new session under an unused id, optionally retiring
    /// `retire` in the same critical section
    async fn insert_new(
        &self,
        data: HashMap<String, Value>,
        retire: Option<&str>,
    ) -> Arc<Session> {
        self.insert_new_with(data, retire, generate_id).await
    }

    async fn insert_new_with<F>(
        &self,
        data: HashMap<String, Value>,
        retire: Option<&str>,
        mut next_id: F,
    ) -> Arc<Session>
    where
        F: FnMut() -> String,
    {
        let mut data = Some(data);
        loop {
            let id = next_id();
            let mut guard = self.sessions.write().await;
            if guard.contains_key(&id) {
                warn!(session_id = %id, "Generated session id collided, retrying");
                continue;
            }

            let session = Arc::new(Session::with_data(
                id.clone(),
                data.take().unwrap_or_default(),
            ));
            guard.insert(id, Arc::clone(&session));
            if let Some(old) = retire {
                guard.remove(old);
            }
            return session;
        }
    }

    fn write_cookie<W>(&self, response: &mut W, session_id: &str)
    where
        W: CookieSink + ?Sized,
    {
        response.set_cookie(build_set_cookie(&self.config.cookie, session_id));
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
