// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared session pool.
//!
//! The pool owns at most one live connection+session pair against the
//! configured endpoint. Sessions are created lazily on first demand,
//! reference-counted across concurrent borrowers, disposed after sitting
//! idle for the configured timeout, and discarded immediately when an
//! operation fails with a session-fatal error.
//!
//! The one critical concurrency invariant: at most one connection attempt is
//! in flight at any time. Concurrent acquirers while the pool is connecting
//! all await the same shared attempt and observe the same session or the
//! same failure.
//!
//! # Examples
//!
//! ```rust,ignore
//! use twinlink_opcua::client::SessionPool;
//!
//! let pool = SessionPool::new(connector, config.idle_timeout);
//! let results = pool
//!     .with_session(|session| async move { session.read_value(&node_id).await })
//!     .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::client::transport::{UaConnection, UaConnector, UaSession};
use crate::error::{OpcUaError, OpcUaResult, SessionError};

// =============================================================================
// PoolState
// =============================================================================

/// Observable state of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoolState {
    /// No session and no connection attempt.
    #[default]
    Empty,

    /// A connection attempt is in flight.
    Connecting,

    /// A shared session is live.
    Active,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
        }
    }
}

// =============================================================================
// SharedLink
// =============================================================================

/// One live connection+session pair handed out by the pool.
///
/// Borrowers hold this only for the scope of one operation; the pool is the
/// sole owner of its lifecycle.
#[derive(Clone)]
pub struct SharedLink {
    /// The underlying connection.
    pub connection: Arc<dyn UaConnection>,

    /// The session issued over the connection.
    pub session: Arc<dyn UaSession>,

    /// Pool generation this link belongs to.
    generation: u64,
}

impl fmt::Debug for SharedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLink")
            .field("generation", &self.generation)
            .finish()
    }
}

type ConnectFuture = Shared<BoxFuture<'static, Result<SharedLink, Arc<OpcUaError>>>>;

// =============================================================================
// PoolInner
// =============================================================================

struct PoolInner {
    /// The live link, if any.
    link: Option<SharedLink>,

    /// The in-flight connection attempt shared by concurrent acquirers.
    pending: Option<ConnectFuture>,

    /// Number of borrowers currently inside an operation.
    refcount: usize,

    /// Pending idle-disposal timer.
    idle_task: Option<JoinHandle<()>>,

    /// Incremented on every disposal so stale timers can recognize
    /// themselves.
    generation: u64,
}

impl PoolInner {
    fn cancel_idle_task(&mut self) {
        if let Some(task) = self.idle_task.take() {
            task.abort();
        }
    }
}

/// Closes and forgets the current link, best-effort.
///
/// Close failures are logged and swallowed; the caller's operation already
/// resolved on its own terms.
async fn dispose_inner(inner: &mut PoolInner, stats: &PoolStats, reason: &str) {
    inner.cancel_idle_task();
    inner.generation = inner.generation.wrapping_add(1);

    let Some(link) = inner.link.take() else {
        return;
    };

    tracing::info!(reason = reason, "Disposing shared OPC UA session");
    stats.record_disposal();

    if let Err(err) = link.session.close().await {
        tracing::warn!(error = %err, "Failed to close shared session");
    }
    if let Err(err) = link.connection.disconnect().await {
        tracing::warn!(error = %err, "Failed to disconnect shared connection");
    }
}

// =============================================================================
// SessionPool
// =============================================================================

/// Reference-counted pool around a single shared connection+session.
///
/// # Thread Safety
///
/// The pool is `Send + Sync` and is shared freely across tasks; all state
/// sits behind one async mutex.
pub struct SessionPool {
    connector: Arc<dyn UaConnector>,
    idle_timeout: Duration,
    inner: Arc<Mutex<PoolInner>>,
    stats: Arc<PoolStats>,
}

impl SessionPool {
    /// Creates a pool over the given connector.
    ///
    /// No connection is opened until the first [`SessionPool::with_session`]
    /// call.
    pub fn new(connector: Arc<dyn UaConnector>, idle_timeout: Duration) -> Self {
        Self {
            connector,
            idle_timeout,
            inner: Arc::new(Mutex::new(PoolInner {
                link: None,
                pending: None,
                refcount: 0,
                idle_task: None,
                generation: 0,
            })),
            stats: Arc::new(PoolStats::new()),
        }
    }

    /// Returns the pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Returns the observable pool state.
    pub async fn state(&self) -> PoolState {
        let inner = self.inner.lock().await;
        if inner.link.is_some() {
            PoolState::Active
        } else if inner.pending.is_some() {
            PoolState::Connecting
        } else {
            PoolState::Empty
        }
    }

    /// Runs one operation against the shared session.
    ///
    /// Acquires the session (creating it if needed), invokes the operation,
    /// and releases the session afterwards regardless of outcome. An
    /// operation error classified as session-fatal disposes the shared
    /// session immediately so the next acquire starts clean; the error is
    /// returned to the caller either way.
    pub async fn with_session<F, Fut, T>(&self, operation: F) -> OpcUaResult<T>
    where
        F: FnOnce(Arc<dyn UaSession>) -> Fut,
        Fut: Future<Output = OpcUaResult<T>>,
    {
        let link = self.acquire().await?;
        let result = operation(Arc::clone(&link.session)).await;

        let fatal = matches!(&result, Err(err) if err.is_session_fatal());
        if fatal {
            if let Err(err) = &result {
                err.log("pooled operation");
            }
        }
        self.release(fatal).await;

        result
    }

    /// Tears down the shared session, if any.
    ///
    /// Intended for process shutdown; concurrent borrowers see their next
    /// operation fail through the transport.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending = None;
        dispose_inner(&mut inner, &self.stats, "shutdown").await;
    }

    // =========================================================================
    // Acquire / Release
    // =========================================================================

    /// Borrows the shared link, connecting if the pool is empty.
    async fn acquire(&self) -> OpcUaResult<SharedLink> {
        self.stats.record_acquire();

        let attempt = {
            let mut inner = self.inner.lock().await;

            if let Some(link) = &inner.link {
                let link = link.clone();
                inner.refcount += 1;
                inner.cancel_idle_task();
                return Ok(link);
            }

            match &inner.pending {
                Some(pending) => pending.clone(),
                None => {
                    let attempt = self.spawn_connect_attempt(inner.generation);
                    inner.pending = Some(attempt.clone());
                    attempt
                }
            }
        };

        match attempt.await {
            Ok(link) => {
                let mut inner = self.inner.lock().await;
                inner.pending = None;
                if inner.link.is_none() {
                    inner.link = Some(link.clone());
                }
                inner.refcount += 1;
                inner.cancel_idle_task();
                Ok(link)
            }
            Err(err) => {
                let mut inner = self.inner.lock().await;
                inner.pending = None;
                drop(inner);

                self.stats.record_connect_failure();
                Err(OpcUaError::session(SessionError::creation_failed_with(
                    format!("Shared session attempt failed: {err}"),
                    Box::new(err),
                )))
            }
        }
    }

    /// Returns the borrow taken by [`SessionPool::acquire`].
    ///
    /// On a fatal operation error the link is disposed immediately; otherwise
    /// the idle-disposal timer is armed once the last borrower leaves.
    async fn release(&self, fatal: bool) {
        let mut inner = self.inner.lock().await;
        inner.refcount = inner.refcount.saturating_sub(1);

        if fatal {
            self.stats.record_fatal_reset();
            dispose_inner(&mut inner, &self.stats, "session-fatal error").await;
            return;
        }

        if inner.refcount == 0 && inner.link.is_some() {
            self.arm_idle_timer(&mut inner);
        }
    }

    /// Builds the single shared connect+create-session attempt.
    fn spawn_connect_attempt(&self, generation: u64) -> ConnectFuture {
        let connector = Arc::clone(&self.connector);
        let stats = Arc::clone(&self.stats);
        let endpoint = connector.endpoint().to_string();

        async move {
            tracing::info!(endpoint = %endpoint, "Opening shared OPC UA session");

            let connection = connector.connect().await.map_err(Arc::new)?;
            match connection.create_session().await {
                Ok(session) => {
                    stats.record_connect();
                    Ok(SharedLink {
                        connection,
                        session,
                        generation,
                    })
                }
                Err(err) => {
                    // A half-open connection must not outlive the failed
                    // attempt.
                    if let Err(disconnect_err) = connection.disconnect().await {
                        tracing::warn!(
                            error = %disconnect_err,
                            "Failed to disconnect after session creation failure"
                        );
                    }
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Arms the idle-disposal timer for the current generation.
    fn arm_idle_timer(&self, inner: &mut PoolInner) {
        inner.cancel_idle_task();

        let pool_inner = Arc::clone(&self.inner);
        let stats = Arc::clone(&self.stats);
        let generation = inner.generation;
        let delay = self.idle_timeout;

        tracing::debug!(idle_timeout = ?delay, "Arming shared session idle timer");

        inner.idle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut inner = pool_inner.lock().await;
            if inner.generation != generation || inner.refcount > 0 {
                return;
            }
            stats.record_idle_disposal();
            dispose_inner(&mut inner, &stats, "idle timeout").await;
        }));
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("endpoint", &self.connector.endpoint())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

// =============================================================================
// PoolStats
// =============================================================================

/// Statistics for pool operations.
#[derive(Debug)]
pub struct PoolStats {
    acquires: AtomicU64,
    connects: AtomicU64,
    connect_failures: AtomicU64,
    disposals: AtomicU64,
    idle_disposals: AtomicU64,
    fatal_resets: AtomicU64,
}

impl PoolStats {
    /// Creates new pool statistics.
    pub fn new() -> Self {
        Self {
            acquires: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            disposals: AtomicU64::new(0),
            idle_disposals: AtomicU64::new(0),
            fatal_resets: AtomicU64::new(0),
        }
    }

    fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_disposal(&self) {
        self.disposals.fetch_add(1, Ordering::Relaxed);
    }

    fn record_idle_disposal(&self) {
        self.idle_disposals.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fatal_reset(&self) {
        self.fatal_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of session borrows.
    pub fn acquires(&self) -> u64 {
        self.acquires.load(Ordering::Relaxed)
    }

    /// Returns the number of successful connection attempts.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connection attempts.
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of disposals of any kind.
    pub fn disposals(&self) -> u64 {
        self.disposals.load(Ordering::Relaxed)
    }

    /// Returns the number of disposals triggered by the idle timer.
    pub fn idle_disposals(&self) -> u64 {
        self.idle_disposals.load(Ordering::Relaxed)
    }

    /// Returns the number of disposals triggered by fatal errors.
    pub fn fatal_resets(&self) -> u64 {
        self.fatal_resets.load(Ordering::Relaxed)
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
