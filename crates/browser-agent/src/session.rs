//! Browser session registry with task isolation and expiry.
//!
//! One session bundles a browser, an isolated context, and a page, keyed by
//! an opaque identifier. Skills acquire sessions through the task-scoped
//! path: the session identifier equals the task identifier, which makes the
//! browser context a per-task security boundary.
//!
//! Sessions expire `session_timeout` after their last use; a background
//! sweeper destroys expired entries. Lookups refresh the expiry, so a
//! session in active use never expires mid-call. Driver handles are never
//! closed while the registry lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use browser_driver::{BrowserConfig, Driver, DriverHandles, PageOps};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::skills::RequestContext;

pub const DEFAULT_SESSION_ID: &str = "default";

/// What a skill gets back from session acquisition: the identifier for
/// response envelopes and the page to drive. The reference is valid until
/// the caller next suspends; the registry retains ownership.
#[derive(Clone)]
pub struct SessionRef {
    pub id: String,
    pub task_id: Option<String>,
    pub page: Arc<dyn PageOps>,
}

impl std::fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRef")
            .field("id", &self.id)
            .field("task_id", &self.task_id)
            .finish()
    }
}

struct SessionClock {
    last_used: Instant,
    expires_at: Instant,
}

struct SessionEntry {
    id: String,
    task_id: Option<String>,
    handles: DriverHandles,
    created: Instant,
    clock: std::sync::Mutex<SessionClock>,
}

impl SessionEntry {
    fn new(id: String, task_id: Option<String>, handles: DriverHandles, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            id,
            task_id,
            handles,
            created: now,
            clock: std::sync::Mutex::new(SessionClock {
                last_used: now,
                expires_at: now + timeout,
            }),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        let clock = self.clock.lock().expect("session clock poisoned");
        clock.expires_at <= now
    }

    /// Marks the session used now, extending its expiry.
    fn touch(&self, timeout: Duration) {
        let now = Instant::now();
        let mut clock = self.clock.lock().expect("session clock poisoned");
        if now > clock.last_used {
            clock.last_used = now;
        }
        clock.expires_at = clock.last_used + timeout;
    }

    fn session_ref(&self) -> SessionRef {
        SessionRef {
            id: self.id.clone(),
            task_id: self.task_id.clone(),
            page: Arc::clone(&self.handles.page),
        }
    }
}

/// Process-wide registry of browser sessions.
pub struct SessionManager {
    driver: Arc<dyn Driver>,
    browser_config: BrowserConfig,
    session_timeout: Duration,
    sweep_interval: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    shutdown_tx: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    weak_self: std::sync::Weak<Self>,
}

impl SessionManager {
    pub fn new(
        driver: Arc<dyn Driver>,
        browser_config: BrowserConfig,
        session_timeout: Duration,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new_cyclic(|weak| Self {
            driver,
            browser_config,
            session_timeout,
            sweep_interval,
            sessions: RwLock::new(HashMap::new()),
            shutdown_tx,
            sweeper: Mutex::new(None),
            closed: AtomicBool::new(false),
            weak_self: weak.clone(),
        })
    }

    /// Starts the background reclamation loop. Call once after construction.
    pub async fn spawn_sweeper(&self) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let swept = manager.close_expired().await;
                        if swept > 0 {
                            info!(target = "agent.session", swept, "expired sessions reclaimed");
                        }
                    }
                }
            }
            debug!(target = "agent.session", "sweeper stopped");
        });

        *self.sweeper.lock().await = Some(handle);
    }

    fn ensure_running(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AgentError::Shutdown);
        }
        Ok(())
    }

    /// Launches a fresh session with an explicit configuration and a
    /// generated `session_<nanos>` identifier. Test and tooling entry
    /// point; the request path uses [`task_session`](Self::task_session).
    pub async fn launch_session(&self, config: &BrowserConfig) -> Result<SessionRef> {
        self.ensure_running()?;

        let handles = self
            .driver
            .launch(config)
            .await
            .map_err(AgentError::SessionLaunchFailed)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let id = format!("session_{nanos}");
        let entry = SessionEntry::new(id.clone(), None, handles, self.session_timeout);
        let session = entry.session_ref();

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), entry);
        drop(sessions);

        info!(target = "agent.session", session_id = %id, "session launched");
        Ok(session)
    }

    /// Returns the shared `"default"` session, creating it on first use.
    ///
    /// Retained for tests and legacy tooling; skills use the task-scoped
    /// path so that tenants never share browser state.
    pub async fn default_session(&self) -> Result<SessionRef> {
        self.get_or_create(DEFAULT_SESSION_ID, None).await
    }

    /// Returns the session owned by the request's task, creating it on
    /// first use. A request without a task identity gets a generated
    /// `task_<hex>` identifier of its own.
    pub async fn task_session(&self, ctx: &RequestContext) -> Result<SessionRef> {
        let task_id = ctx
            .task_id
            .clone()
            .unwrap_or_else(|| format!("task_{}", uuid::Uuid::new_v4().simple()));
        self.get_or_create(&task_id, Some(task_id.clone())).await
    }

    async fn get_or_create(&self, id: &str, task_id: Option<String>) -> Result<SessionRef> {
        self.ensure_running()?;

        // Fast path under the reader lock.
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(id) {
                if !entry.is_expired(Instant::now()) {
                    entry.touch(self.session_timeout);
                    debug!(target = "agent.session", session_id = %id, "reusing session");
                    return Ok(entry.session_ref());
                }
            }
        }

        // Slow path: re-check under the writer lock, then launch. Holding
        // the writer lock across the launch is what guarantees that two
        // callers racing for the same task end up with one session.
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(id) {
            if !entry.is_expired(Instant::now()) {
                entry.touch(self.session_timeout);
                debug!(target = "agent.session", session_id = %id, "reusing session (double-check)");
                return Ok(entry.session_ref());
            }
        }
        let stale = sessions.remove(id);

        info!(target = "agent.session", session_id = %id, "creating session");
        let handles = match self.driver.launch(&self.browser_config).await {
            Ok(handles) => handles,
            Err(err) => {
                drop(sessions);
                if let Some(entry) = stale {
                    close_handles(&entry.handles).await;
                }
                return Err(AgentError::SessionLaunchFailed(err));
            }
        };

        let entry = SessionEntry::new(id.to_string(), task_id, handles, self.session_timeout);
        let session = entry.session_ref();
        sessions.insert(id.to_string(), entry);
        drop(sessions);

        if let Some(entry) = stale {
            close_handles(&entry.handles).await;
        }

        Ok(session)
    }

    /// Pure lookup. Fails with `SessionNotFound` for unknown identifiers
    /// and `SessionExpired` for entries past their expiry; an expired
    /// entry is evicted and destroyed on the way out.
    pub async fn get(&self, id: &str) -> Result<SessionRef> {
        self.ensure_running()?;

        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Err(AgentError::SessionNotFound(id.to_string())),
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    entry.touch(self.session_timeout);
                    return Ok(entry.session_ref());
                }
                Some(_) => {}
            }
        }

        // Expired: evict under the writer lock, destroy outside it.
        let removed = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(id) {
                Some(entry) if entry.is_expired(Instant::now()) => {}
                Some(entry) => {
                    // Revived between the locks.
                    entry.touch(self.session_timeout);
                    return Ok(entry.session_ref());
                }
                None => return Err(AgentError::SessionNotFound(id.to_string())),
            }
            sessions.remove(id)
        };

        if let Some(entry) = removed {
            close_handles(&entry.handles).await;
        }
        Err(AgentError::SessionExpired(id.to_string()))
    }

    /// Destroys the identified session.
    pub async fn close_session(&self, id: &str) -> Result<()> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id)
        };

        let entry = removed.ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        close_handles(&entry.handles).await;
        info!(target = "agent.session", session_id = %id, "session closed");
        Ok(())
    }

    /// Sweeps the registry, destroying every expired session. Returns the
    /// number of sessions reclaimed.
    pub async fn close_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<SessionEntry> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id))
                .collect()
        };

        let count = expired.len();
        for entry in &expired {
            debug!(
                target = "agent.session",
                session_id = %entry.id,
                age_secs = entry.created.elapsed().as_secs(),
                "closing expired session"
            );
            close_handles(&entry.handles).await;
        }
        count
    }

    /// Number of live registry entries.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Closes every session, stops the sweeper, and stops the driver.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target = "agent.session", "shutting down session manager");

        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.sweeper.lock().await.take() {
            let _ = handle.await;
        }

        let entries: Vec<SessionEntry> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            close_handles(&entry.handles).await;
        }

        if let Err(err) = self.driver.shutdown().await {
            warn!(target = "agent.session", error = %err, "driver shutdown failed");
        }
    }
}

/// Closes a handle triple: context first, then browser. Failures are
/// logged and swallowed so a failing handle cannot leak a registry entry.
async fn close_handles(handles: &DriverHandles) {
    if let Err(err) = handles.context.close().await {
        warn!(target = "agent.session", error = %err, "context close failed");
    }
    if let Err(err) = handles.browser.close().await {
        warn!(target = "agent.session", error = %err, "browser close failed");
    }
}
