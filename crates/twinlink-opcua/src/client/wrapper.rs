// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! High-level OPC UA client facade.
//!
//! [`OpcUaClient`] is the entry point the routing layer talks to. It decides,
//! per operation, which session strategy applies:
//!
//! - `read_nodes` borrows the shared pooled session (reads are the hot path)
//! - `write_nodes`, `browse_node`, and `browse_tree` each run inside one
//!   ephemeral session that is torn down before the call returns
//! - `subscribe_nodes` opens a dedicated connection whose lifetime is handed
//!   to the returned [`SubscriptionHandle`]
//!
//! Per-node failures are data, not exceptions: an unreadable node id becomes
//! a failing entry in the result list while the rest of the batch proceeds.
//! Only session-fatal errors (and whole-service failures) propagate, which
//! also resets the shared pool so the next caller starts clean.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::browse::{child_from_reference, TreeBrowser};
use crate::config::{OpcUaConfig, TreeSettings};
use crate::error::OpcUaResult;
use crate::types::{BrowseChild, NodeId, ReadResult, StatusCode, TreeNode, WriteRequest, WriteResult};

use super::pool::{PoolState, PoolStats, SessionPool};
use super::subscription::{
    NotificationCallback, SubscribeOptions, SubscriptionHandle, SubscriptionRequest,
};
use super::transport::{BrowseOptions, UaConnector, UaSession};

// =============================================================================
// TreeBrowseOptions
// =============================================================================

/// Caller-supplied overrides for a tree walk.
///
/// Absent fields fall back to the configured [`TreeSettings`]; supplied depth
/// and fan-out values are clamped to their safe ranges before the walk runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeBrowseOptions {
    /// Start node; the root folder alias when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_node: Option<NodeId>,

    /// Maximum descent depth, clamped to `[0, 10]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Maximum children kept per node, clamped to `[1, 100]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_children_per_node: Option<usize>,
}

impl TreeBrowseOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start node.
    pub fn with_start_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.start_node = Some(node_id.into());
        self
    }

    /// Sets the maximum depth.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the per-node fan-out cap.
    pub fn with_max_children(mut self, children: usize) -> Self {
        self.max_children_per_node = Some(children);
        self
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Counters for client operations.
#[derive(Debug, Default)]
pub struct ClientStats {
    reads: AtomicU64,
    writes: AtomicU64,
    browses: AtomicU64,
    tree_walks: AtomicU64,
    subscriptions: AtomicU64,
    errors: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl ClientStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_read(&self, duration: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.record_response_time(duration);
    }

    fn record_write(&self, duration: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.record_response_time(duration);
    }

    fn record_browse(&self) {
        self.browses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tree_walk(&self) {
        self.tree_walks.fetch_add(1, Ordering::Relaxed);
    }

    fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_response_time(&self, duration: Duration) {
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Total read batches served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total write batches served.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total single-level browses served.
    pub fn browses(&self) -> u64 {
        self.browses.load(Ordering::Relaxed)
    }

    /// Total tree walks served.
    pub fn tree_walks(&self) -> u64 {
        self.tree_walks.load(Ordering::Relaxed)
    }

    /// Total subscriptions established.
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Total failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Average read/write response time, if any were recorded.
    pub fn average_response_time(&self) -> Option<Duration> {
        let completed = self.reads() + self.writes();
        if completed == 0 {
            return None;
        }
        let total = self.total_response_time_us.load(Ordering::Relaxed);
        Some(Duration::from_micros(total / completed))
    }
}

// =============================================================================
// OpcUaClient
// =============================================================================

/// High-level client over one configured endpoint.
pub struct OpcUaClient {
    config: OpcUaConfig,
    connector: Arc<dyn UaConnector>,
    pool: SessionPool,
    stats: Arc<ClientStats>,
}

impl OpcUaClient {
    /// Creates a client over `connector` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(connector: Arc<dyn UaConnector>, config: OpcUaConfig) -> OpcUaResult<Self> {
        config.validate()?;

        let pool = SessionPool::new(Arc::clone(&connector), config.idle_timeout);

        tracing::info!(
            endpoint = %config.endpoint,
            idle_timeout = ?config.idle_timeout,
            "client created"
        );

        Ok(Self {
            config,
            connector,
            pool,
            stats: Arc::new(ClientStats::new()),
        })
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &OpcUaConfig {
        &self.config
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Returns the shared pool counters.
    pub fn pool_stats(&self) -> &PoolStats {
        self.pool.stats()
    }

    /// Returns the shared pool state.
    pub async fn pool_state(&self) -> PoolState {
        self.pool.state().await
    }

    /// Tears down the shared session, if any.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reads the value attribute of each node, in order.
    ///
    /// Runs on the shared pooled session. Reads are issued sequentially; a
    /// node that fails with a non-fatal error becomes a failing entry in the
    /// result list and the batch continues.
    ///
    /// # Errors
    ///
    /// Returns an error only when the session itself is unusable (connect
    /// failure or a session-fatal fault, which also resets the pool).
    pub async fn read_nodes(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let result = self
            .pool
            .with_session(|session| async move {
                let mut results = Vec::with_capacity(node_ids.len());
                for node_id in node_ids {
                    results.push(read_one(session.as_ref(), node_id).await?);
                }
                Ok(results)
            })
            .await;

        match &result {
            Ok(results) => {
                self.stats.record_read(started.elapsed());
                tracing::debug!(
                    requested = node_ids.len(),
                    good = results.iter().filter(|r| r.is_good()).count(),
                    "read batch complete"
                );
            }
            Err(_) => self.stats.record_error(),
        }

        result
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Writes the value attribute of each node in one batched request.
    ///
    /// Runs inside an ephemeral session. The server reports one status per
    /// item; a rejected item never aborts its siblings.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established or the write
    /// service call fails as a whole.
    pub async fn write_nodes(&self, requests: &[WriteRequest]) -> OpcUaResult<Vec<WriteResult>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let writes: Vec<_> = requests
            .iter()
            .map(|request| (request.node_id.clone(), request.value.clone()))
            .collect();

        let started = Instant::now();
        let result = self
            .with_ephemeral_session("write", |session| async move {
                let raw = session.write_values(&writes).await?;
                Ok(raw
                    .into_iter()
                    .map(|outcome| WriteResult::new(outcome.node_id, StatusCode::new(outcome.status)))
                    .collect::<Vec<_>>())
            })
            .await;

        match &result {
            Ok(results) => {
                self.stats.record_write(started.elapsed());
                tracing::debug!(
                    requested = requests.len(),
                    good = results.iter().filter(|r| r.is_good()).count(),
                    "write batch complete"
                );
            }
            Err(_) => self.stats.record_error(),
        }

        result
    }

    // =========================================================================
    // Browse
    // =========================================================================

    /// Lists the direct forward references of one node.
    ///
    /// Runs inside an ephemeral session.
    pub async fn browse_node(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseChild>> {
        let result = self
            .with_ephemeral_session("browse", |session| async move {
                let references = session.browse(node_id, &BrowseOptions::default()).await?;
                Ok(references.iter().map(child_from_reference).collect::<Vec<_>>())
            })
            .await;

        match &result {
            Ok(children) => {
                self.stats.record_browse();
                tracing::debug!(node_id = %node_id, children = children.len(), "browse complete");
            }
            Err(_) => self.stats.record_error(),
        }

        result
    }

    /// Walks the subtree under the requested start node.
    ///
    /// Runs inside an ephemeral session. Caller-supplied depth and fan-out
    /// overrides are clamped to their safe ranges first.
    pub async fn browse_tree(&self, options: &TreeBrowseOptions) -> OpcUaResult<TreeNode> {
        let settings = TreeSettings {
            max_depth: TreeSettings::clamp_depth(
                options.max_depth.unwrap_or(self.config.tree.max_depth),
            ),
            max_children_per_node: TreeSettings::clamp_children(
                options
                    .max_children_per_node
                    .unwrap_or(self.config.tree.max_children_per_node),
            ),
        };
        let start = options
            .start_node
            .clone()
            .unwrap_or_else(NodeId::root_folder);

        let result = self
            .with_ephemeral_session("tree walk", |session| {
                let settings = settings.clone();
                let start = start.clone();
                async move {
                    let browser = TreeBrowser::new(session, settings);
                    browser.browse_tree(&start).await
                }
            })
            .await;

        match &result {
            Ok(tree) => {
                self.stats.record_tree_walk();
                tracing::info!(
                    start = %start,
                    nodes = tree.node_count(),
                    depth = tree.depth(),
                    "tree walk complete"
                );
            }
            Err(_) => self.stats.record_error(),
        }

        result
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    /// Establishes a subscription over a dedicated connection.
    ///
    /// The returned handle owns the connection and session; nothing is torn
    /// down until [`SubscriptionHandle::dispose`] runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, session, subscription, or any
    /// monitored item cannot be created. Partially created server resources
    /// are rolled back before the error is returned.
    pub async fn subscribe_nodes(
        &self,
        items: &[SubscriptionRequest],
        callback: NotificationCallback,
        options: &SubscribeOptions,
    ) -> OpcUaResult<SubscriptionHandle> {
        let connection = self.connector.connect().await?;
        let session = match connection.create_session().await {
            Ok(session) => session,
            Err(err) => {
                self.stats.record_error();
                if let Err(teardown) = connection.disconnect().await {
                    tracing::warn!(error = %teardown, "disconnect failed after session failure");
                }
                return Err(err);
            }
        };

        match SubscriptionHandle::establish(
            Arc::clone(&connection),
            Arc::clone(&session),
            &self.config.subscription,
            items,
            options,
            callback,
        )
        .await
        {
            Ok(handle) => {
                self.stats.record_subscription();
                Ok(handle)
            }
            Err(err) => {
                self.stats.record_error();
                if let Err(teardown) = session.close().await {
                    tracing::warn!(error = %teardown, "session close failed after subscribe failure");
                }
                if let Err(teardown) = connection.disconnect().await {
                    tracing::warn!(error = %teardown, "disconnect failed after subscribe failure");
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // Ephemeral session scope
    // =========================================================================

    /// Runs one operation inside a connect/session/teardown scope.
    ///
    /// Teardown failures are logged and swallowed; the operation's own result
    /// is what the caller sees.
    async fn with_ephemeral_session<F, Fut, T>(
        &self,
        context: &'static str,
        operation: F,
    ) -> OpcUaResult<T>
    where
        F: FnOnce(Arc<dyn UaSession>) -> Fut,
        Fut: Future<Output = OpcUaResult<T>>,
    {
        let connection = self.connector.connect().await?;
        let session = match connection.create_session().await {
            Ok(session) => session,
            Err(err) => {
                if let Err(teardown) = connection.disconnect().await {
                    tracing::warn!(
                        context,
                        error = %teardown,
                        "disconnect failed after session failure"
                    );
                }
                return Err(err);
            }
        };

        let result = operation(Arc::clone(&session)).await;

        if let Err(err) = session.close().await {
            tracing::warn!(context, error = %err, "ephemeral session close failed");
        }
        if let Err(err) = connection.disconnect().await {
            tracing::warn!(context, error = %err, "ephemeral disconnect failed");
        }

        result
    }
}

impl std::fmt::Debug for OpcUaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaClient")
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

/// Reads one node's value, converting a non-fatal failure into a failing
/// result entry. Session-fatal faults propagate so the pool resets.
async fn read_one(session: &dyn UaSession, node_id: &NodeId) -> OpcUaResult<ReadResult> {
    match session.read_value(node_id).await {
        Ok(raw) => {
            if raw.is_good() {
                let mut result = ReadResult::success(
                    raw.node_id,
                    StatusCode::new(raw.status),
                    raw.value.normalize(),
                );
                if let Some(ts) = raw.server_timestamp {
                    result = result.with_server_timestamp(ts);
                }
                if let Some(ts) = raw.source_timestamp {
                    result = result.with_source_timestamp(ts);
                }
                Ok(result)
            } else {
                Ok(ReadResult::failure(raw.node_id, StatusCode::new(raw.status)))
            }
        }
        Err(err) if err.is_session_fatal() => Err(err),
        Err(err) => {
            tracing::debug!(node_id = %node_id, error = %err, "node read failed");
            Ok(ReadResult::failure(
                node_id.clone(),
                StatusCode::new(err.status_text()),
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
