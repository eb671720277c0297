//! Background eviction of stale sessions
//!
//! A sweep runs in two phases. The scan holds the map's read lock and builds
//! a deletion list; the apply step takes the write lock only to remove the
//! listed ids. Request handling is never blocked for a full scan. The cost
//! is a window between the phases: a session looked up after the scan
//! listed it is still removed, and the next request with that id gets a new
//! session.

use crate::config::SessionConfig;
use crate::session::manager::SessionMap;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info};

/// Why a session was picked for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Older than the absolute expiration
    Expired,
    /// Idle for longer than the inactivity timeout
    TimedOut,
}

/// Eviction limits; `None` disables a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepPolicy {
    pub timeout: Option<Duration>,
    pub expiration: Option<Duration>,
}

impl SweepPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            expiration: config.expiration(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.timeout.is_none() && self.expiration.is_none()
    }

    /// Decides whether a session with the given timestamps is stale at `now`.
    ///
    /// Expiration is checked first; both limits are strict (`>`).
    pub fn check(
        &self,
        created_at: DateTime<Utc>,
        last_accessed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<EvictionReason> {
        if let Some(expiration) = self.expiration {
            if exceeds(created_at, now, expiration) {
                return Some(EvictionReason::Expired);
            }
        }
        if let Some(timeout) = self.timeout {
            if exceeds(last_accessed, now, timeout) {
                return Some(EvictionReason::TimedOut);
            }
        }
        None
    }
}

fn exceeds(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    // negative ages (clock went backwards) never exceed
    now.signed_duration_since(since)
        .to_std()
        .map(|age| age > limit)
        .unwrap_or(false)
}

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Sessions present during the scan
    pub sessions_scanned: usize,
    /// Sessions listed for exceeding the expiration
    pub expired: usize,
    /// Sessions listed for exceeding the inactivity timeout
    pub timed_out: usize,
    /// Sessions actually removed in the apply step
    pub removed: usize,
}

/// Runs one scan-then-delete pass over `sessions` as of `now`
pub(crate) async fn sweep_at(
    sessions: &SessionMap,
    policy: SweepPolicy,
    now: DateTime<Utc>,
) -> SweepResult {
    let mut result = SweepResult::default();

    // Phase 1: scan under the read lock
    let delete_list = {
        let guard = sessions.read().await;
        result.sessions_scanned = guard.len();

        if policy.is_disabled() {
            Vec::new()
        } else {
            let mut list = Vec::new();
            for (id, session) in guard.iter() {
                let last_accessed = session.last_accessed().await;
                if let Some(reason) = policy.check(session.created_at(), last_accessed, now) {
                    match reason {
                        EvictionReason::Expired => result.expired += 1,
                        EvictionReason::TimedOut => result.timed_out += 1,
                    }
                    list.push((id.clone(), reason));
                }
            }
            list
        }
    };

    if delete_list.is_empty() {
        debug!(
            sessions_scanned = result.sessions_scanned,
            "Session sweep found nothing to evict"
        );
        return result;
    }

    // Phase 2: remove under the write lock
    {
        let mut guard = sessions.write().await;
        for (id, reason) in &delete_list {
            if guard.remove(id).is_some() {
                result.removed += 1;
                debug!(session_id = %id, reason = ?reason, "Evicted session");
            }
        }
    }

    info!(
        sessions_scanned = result.sessions_scanned,
        expired = result.expired,
        timed_out = result.timed_out,
        removed = result.removed,
        "Session sweep complete"
    );

    result
}

/// Starts the periodic sweep task.
///
/// The first sweep fires one `period` after start. The task stops when a
/// message arrives on the returned sender or when every sender is dropped.
pub(crate) fn start_sweep_task(
    sessions: SessionMap,
    policy: SweepPolicy,
    period: Duration,
) -> (JoinHandle<()>, mpsc::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            timeout = ?policy.timeout,
            expiration = ?policy.expiration,
            "Session sweep task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_at(&sessions, policy, Utc::now()).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Sweep task received shutdown signal, stopping...");
                    break;
                }
            }
        }
    });

    (handle, shutdown_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::Session;
    use chrono::TimeDelta;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn policy(timeout: u64, expiration: u64) -> SweepPolicy {
        SweepPolicy::from_config(&SessionConfig::new(
            Duration::from_secs(timeout),
            Duration::from_secs(expiration),
        ))
    }

    async fn map_with(ids: &[&str]) -> SessionMap {
        let map: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        {
            let mut guard = map.write().await;
            for id in ids {
                guard.insert(id.to_string(), Arc::new(Session::new(*id)));
            }
        }
        map
    }

    #[test]
    fn test_check_expiration() {
        let p = policy(0, 10);
        let created = Utc::now();
        assert_eq!(p.check(created, created, created + TimeDelta::seconds(5)), None);
        assert_eq!(p.check(created, created, created + TimeDelta::seconds(10)), None);
        assert_eq!(
            p.check(created, created, created + TimeDelta::seconds(11)),
            Some(EvictionReason::Expired)
        );
    }

    #[test]
    fn test_check_timeout_uses_last_access() {
        let p = policy(10, 0);
        let created = Utc::now();
        let accessed = created + TimeDelta::seconds(100);
        assert_eq!(p.check(created, accessed, accessed + TimeDelta::seconds(5)), None);
        assert_eq!(
            p.check(created, accessed, accessed + TimeDelta::seconds(11)),
            Some(EvictionReason::TimedOut)
        );
    }

    #[test]
    fn test_check_expiration_wins_over_timeout() {
        let p = policy(10, 10);
        let created = Utc::now();
        assert_eq!(
            p.check(created, created, created + TimeDelta::seconds(60)),
            Some(EvictionReason::Expired)
        );
    }

    #[test]
    fn test_check_disabled() {
        let p = policy(0, 0);
        assert!(p.is_disabled());
        let created = Utc::now() - TimeDelta::days(365);
        assert_eq!(p.check(created, created, Utc::now()), None);
    }

    #[test]
    fn test_check_clock_skew() {
        let p = policy(1, 1);
        let now = Utc::now();
        let future = now + TimeDelta::seconds(30);
        assert_eq!(p.check(future, future, now), None);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let map = map_with(&["a", "b"]).await;
        let later = Utc::now() + TimeDelta::seconds(11);

        let result = sweep_at(&map, policy(0, 10), later).await;

        assert_eq!(result.sessions_scanned, 2);
        assert_eq!(result.expired, 2);
        assert_eq!(result.removed, 2);
        assert!(map.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh() {
        let map = map_with(&["a"]).await;
        let result = sweep_at(&map, policy(30, 30), Utc::now()).await;
        assert_eq!(result.removed, 0);
        assert_eq!(map.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_disabled_never_evicts() {
        let map = map_with(&["a", "b", "c"]).await;
        let far_future = Utc::now() + TimeDelta::days(3650);

        let result = sweep_at(&map, policy(0, 0), far_future).await;

        assert_eq!(result, SweepResult {
            sessions_scanned: 3,
            ..SweepResult::default()
        });
        assert_eq!(map.read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_timeout_spares_recently_touched() {
        let map = map_with(&["idle", "busy"]).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        let busy = map.read().await.get("busy").cloned().unwrap();
        busy.touch().await;

        // idle was last touched at creation, busy just now
        let short = SweepPolicy {
            timeout: Some(Duration::from_millis(100)),
            expiration: None,
        };
        let now = busy.last_accessed().await + TimeDelta::milliseconds(50);
        let result = sweep_at(&map, short, now).await;

        assert_eq!(result.timed_out, 1);
        assert_eq!(result.removed, 1);
        let guard = map.read().await;
        assert!(guard.contains_key("busy"));
        assert!(!guard.contains_key("idle"));
    }

    #[tokio::test]
    async fn test_sweep_task_stops_on_shutdown() {
        let map = map_with(&[]).await;
        let (handle, shutdown) = start_sweep_task(map, policy(0, 0), Duration::from_secs(60));

        shutdown.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweep task did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_task_runs_on_interval() {
        let map = map_with(&["a"]).await;
        let short = SweepPolicy {
            timeout: None,
            expiration: Some(Duration::from_millis(10)),
        };
        let (handle, shutdown) =
            start_sweep_task(Arc::clone(&map), short, Duration::from_millis(20));

        let mut evicted = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if map.read().await.is_empty() {
                evicted = true;
                break;
            }
        }
        assert!(evicted, "session was not evicted by the background sweep");

        shutdown.send(()).await.unwrap();
        handle.await.unwrap();
    }
}
