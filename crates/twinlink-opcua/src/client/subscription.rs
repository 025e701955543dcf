// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value-change subscriptions over a dedicated session.
//!
//! A subscription is the one exception to the ephemeral-session rule: its
//! session must stay open as long as the caller wants notifications. The
//! [`SubscriptionHandle`] therefore owns both the connection and the session,
//! and tears everything down in [`SubscriptionHandle::dispose`]:
//!
//! 1. delete the monitored items
//! 2. delete the subscription
//! 3. close the session
//! 4. disconnect
//!
//! Teardown failures are logged and swallowed; by the time `dispose` runs the
//! caller's interest in the server is already over.
//!
//! # Examples
//!
//! ```rust,ignore
//! let handle = client
//!     .subscribe_nodes(
//!         &[SubscriptionRequest::new("ns=2;s=Temperature")],
//!         Arc::new(|notification| println!("{notification:?}")),
//!         &SubscribeOptions::default(),
//!     )
//!     .await?;
//!
//! // ... notifications arrive through the callback ...
//!
//! handle.dispose().await?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SubscriptionSettings;
use crate::error::{OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{NodeId, StatusCode};
use crate::variant::Value;

use super::transport::{
    DataChangeCallback, MonitorParams, RawDataChange, SubscriptionParams, UaConnection, UaSession,
};

// =============================================================================
// SubscriptionRequest / SubscribeOptions
// =============================================================================

/// One node to monitor, with an optional per-item sampling override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// The node to monitor.
    pub node_id: NodeId,

    /// Sampling interval for this item; the configured default applies when
    /// absent.
    #[serde(default, with = "humantime_serde::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_interval: Option<Duration>,
}

impl SubscriptionRequest {
    /// Creates a request with the default sampling interval.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            sampling_interval: None,
        }
    }

    /// Sets a per-item sampling interval.
    pub fn with_sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = Some(interval);
        self
    }
}

/// Per-call overrides for subscription creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOptions {
    /// Publishing interval override.
    #[serde(default, with = "humantime_serde::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishing_interval: Option<Duration>,

    /// Maximum notifications per publish override (0 = no limit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_notifications_per_publish: Option<u32>,
}

// =============================================================================
// DataChangeNotification
// =============================================================================

/// One value change delivered to the caller's callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChangeNotification {
    /// The monitored node.
    pub node_id: NodeId,

    /// Normalized sampled value.
    pub value: Value,

    /// Status of the sampled value.
    pub status_code: StatusCode,

    /// Source timestamp, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataChangeNotification {
    fn from_raw(raw: RawDataChange) -> Self {
        Self {
            node_id: raw.node_id,
            value: raw.value.normalize(),
            status_code: StatusCode::new(raw.status),
            source_timestamp: raw.source_timestamp,
        }
    }
}

/// Callback invoked for each value-change notification.
pub type NotificationCallback = Arc<dyn Fn(DataChangeNotification) + Send + Sync>;

// =============================================================================
// SubscriptionHandle
// =============================================================================

/// A live subscription and the transport resources backing it.
///
/// Dropping the handle without calling [`dispose`](Self::dispose) leaks the
/// server-side subscription until the connection dies; a warning is logged
/// when that happens.
pub struct SubscriptionHandle {
    connection: Arc<dyn UaConnection>,
    session: Arc<dyn UaSession>,
    subscription_id: u32,
    monitored_item_ids: Vec<u32>,
    notifications: Arc<AtomicU64>,
    disposed: AtomicBool,
}

impl SubscriptionHandle {
    /// Creates the subscription and its monitored items on `session`.
    ///
    /// On any monitored-item failure the items created so far and the
    /// subscription itself are rolled back (best-effort) before the error is
    /// returned; the caller keeps responsibility for the session in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if subscription creation or any monitored-item
    /// registration fails.
    pub(crate) async fn establish(
        connection: Arc<dyn UaConnection>,
        session: Arc<dyn UaSession>,
        settings: &SubscriptionSettings,
        items: &[SubscriptionRequest],
        options: &SubscribeOptions,
        callback: NotificationCallback,
    ) -> OpcUaResult<Self> {
        let params = SubscriptionParams {
            publishing_interval: options
                .publishing_interval
                .unwrap_or(settings.publishing_interval),
            max_keep_alive_count: settings.max_keep_alive_count,
            lifetime_count: settings.lifetime_count,
            max_notifications_per_publish: options
                .max_notifications_per_publish
                .unwrap_or(settings.max_notifications_per_publish),
            priority: settings.priority,
            publishing_enabled: true,
        };

        let subscription_id = session.create_subscription(&params).await?;
        let notifications = Arc::new(AtomicU64::new(0));

        let mut monitored_item_ids = Vec::with_capacity(items.len());
        for item in items {
            let monitor_params = MonitorParams {
                node_id: item.node_id.clone(),
                sampling_interval: item.sampling_interval.unwrap_or(settings.sampling_interval),
                queue_size: settings.queue_size,
                discard_oldest: true,
            };

            let callback = Arc::clone(&callback);
            let counter = Arc::clone(&notifications);
            let on_change: DataChangeCallback = Arc::new(move |raw| {
                counter.fetch_add(1, Ordering::Relaxed);
                callback(DataChangeNotification::from_raw(raw));
            });

            match session
                .create_monitored_item(subscription_id, &monitor_params, on_change)
                .await
            {
                Ok(item_id) => monitored_item_ids.push(item_id),
                Err(err) => {
                    Self::rollback(&session, subscription_id, &monitored_item_ids).await;
                    return Err(err);
                }
            }
        }

        tracing::info!(
            subscription_id = subscription_id,
            items = monitored_item_ids.len(),
            publishing_interval = ?params.publishing_interval,
            "subscription established"
        );

        Ok(Self {
            connection,
            session,
            subscription_id,
            monitored_item_ids,
            notifications,
            disposed: AtomicBool::new(false),
        })
    }

    /// Removes partially created items after a failed establish.
    async fn rollback(session: &Arc<dyn UaSession>, subscription_id: u32, item_ids: &[u32]) {
        if !item_ids.is_empty() {
            if let Err(err) = session.delete_monitored_items(subscription_id, item_ids).await {
                err.log("monitored item rollback");
            }
        }
        if let Err(err) = session.delete_subscription(subscription_id).await {
            err.log("subscription rollback");
        }
    }

    /// Returns the server-assigned subscription id.
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    /// Returns the number of monitored items.
    pub fn monitored_item_count(&self) -> usize {
        self.monitored_item_ids.len()
    }

    /// Returns the number of notifications delivered so far.
    pub fn notifications_received(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tears down the monitored items, the subscription, and the session.
    ///
    /// Teardown steps are best-effort: individual failures are logged and
    /// swallowed so later steps still run.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::AlreadyDisposed`] if called twice.
    pub async fn dispose(&self) -> OpcUaResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(OpcUaError::subscription(SubscriptionError::AlreadyDisposed));
        }

        if let Err(err) = self
            .session
            .delete_monitored_items(self.subscription_id, &self.monitored_item_ids)
            .await
        {
            err.log("monitored item teardown");
        }

        if let Err(err) = self.session.delete_subscription(self.subscription_id).await {
            err.log("subscription teardown");
        }

        if let Err(err) = self.session.close().await {
            tracing::warn!(error = %err, "session close failed during subscription disposal");
        }

        if let Err(err) = self.connection.disconnect().await {
            tracing::warn!(error = %err, "disconnect failed during subscription disposal");
        }

        tracing::info!(
            subscription_id = self.subscription_id,
            notifications = self.notifications_received(),
            "subscription disposed"
        );

        Ok(())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            tracing::warn!(
                subscription_id = self.subscription_id,
                "subscription handle dropped without dispose"
            );
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("subscription_id", &self.subscription_id)
            .field("monitored_items", &self.monitored_item_ids.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::client::transport::{
        AttributeId, BrowseOptions, BrowseReference, RawReadResult, RawWriteResult, UaSession,
    };
    use crate::variant::Variant;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct ScriptedSession {
        log: CallLog,
        fail_item_at: Option<usize>,
        callbacks: Mutex<Vec<DataChangeCallback>>,
    }

    impl ScriptedSession {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                fail_item_at: None,
                callbacks: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(log: CallLog, index: usize) -> Self {
            Self {
                fail_item_at: Some(index),
                ..Self::new(log)
            }
        }

        fn record(&self, entry: impl Into<String>) {
            if let Ok(mut log) = self.log.lock() {
                log.push(entry.into());
            }
        }

        fn fire(&self, raw: RawDataChange) {
            let callbacks = self.callbacks.lock().expect("callback lock");
            for callback in callbacks.iter() {
                callback(raw.clone());
            }
        }
    }

    #[async_trait]
    impl UaSession for ScriptedSession {
        async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<RawReadResult> {
            Ok(RawReadResult::good(node_id.clone(), Variant::Null))
        }

        async fn read_attributes(
            &self,
            node_id: &NodeId,
            attributes: &[AttributeId],
        ) -> OpcUaResult<Vec<RawReadResult>> {
            Ok(attributes
                .iter()
                .map(|_| RawReadResult::good(node_id.clone(), Variant::Null))
                .collect())
        }

        async fn write_values(
            &self,
            writes: &[(NodeId, Variant)],
        ) -> OpcUaResult<Vec<RawWriteResult>> {
            Ok(writes
                .iter()
                .map(|(node_id, _)| RawWriteResult {
                    node_id: node_id.clone(),
                    status: "Good".to_string(),
                })
                .collect())
        }

        async fn browse(
            &self,
            _node_id: &NodeId,
            _options: &BrowseOptions,
        ) -> OpcUaResult<Vec<BrowseReference>> {
            Ok(Vec::new())
        }

        async fn create_subscription(&self, _params: &SubscriptionParams) -> OpcUaResult<u32> {
            self.record("create_subscription");
            Ok(7)
        }

        async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
            self.record(format!("delete_subscription:{subscription_id}"));
            Ok(())
        }

        async fn create_monitored_item(
            &self,
            _subscription_id: u32,
            params: &MonitorParams,
            on_change: DataChangeCallback,
        ) -> OpcUaResult<u32> {
            let mut callbacks = self.callbacks.lock().expect("callback lock");
            if self.fail_item_at == Some(callbacks.len()) {
                return Err(OpcUaError::subscription(SubscriptionError::monitor_failed(
                    params.node_id.as_str(),
                    "server rejected the item",
                )));
            }
            callbacks.push(on_change);
            self.record(format!("create_monitored_item:{}", params.node_id));
            Ok(callbacks.len() as u32)
        }

        async fn delete_monitored_items(
            &self,
            subscription_id: u32,
            monitored_item_ids: &[u32],
        ) -> OpcUaResult<()> {
            self.record(format!(
                "delete_monitored_items:{subscription_id}:{}",
                monitored_item_ids.len()
            ));
            Ok(())
        }

        async fn close(&self) -> OpcUaResult<()> {
            self.record("close");
            Ok(())
        }
    }

    struct ScriptedConnection {
        session: Arc<ScriptedSession>,
        log: CallLog,
    }

    #[async_trait]
    impl UaConnection for ScriptedConnection {
        async fn create_session(&self) -> OpcUaResult<Arc<dyn UaSession>> {
            Ok(Arc::clone(&self.session) as Arc<dyn UaSession>)
        }

        async fn disconnect(&self) -> OpcUaResult<()> {
            if let Ok(mut log) = self.log.lock() {
                log.push("disconnect".to_string());
            }
            Ok(())
        }
    }

    fn scripted(
        fail_item_at: Option<usize>,
    ) -> (Arc<ScriptedConnection>, Arc<ScriptedSession>, CallLog) {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let session = Arc::new(match fail_item_at {
            Some(index) => ScriptedSession::failing_at(Arc::clone(&log), index),
            None => ScriptedSession::new(Arc::clone(&log)),
        });
        let connection = Arc::new(ScriptedConnection {
            session: Arc::clone(&session),
            log: Arc::clone(&log),
        });
        (connection, session, log)
    }

    fn requests(ids: &[&str]) -> Vec<SubscriptionRequest> {
        ids.iter().map(|id| SubscriptionRequest::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_establish_creates_subscription_and_items() {
        let (connection, session, log) = scripted(None);

        let handle = SubscriptionHandle::establish(
            connection,
            session,
            &SubscriptionSettings::default(),
            &requests(&["ns=2;i=1", "ns=2;i=2"]),
            &SubscribeOptions::default(),
            Arc::new(|_| {}),
        )
        .await
        .unwrap();

        assert_eq!(handle.subscription_id(), 7);
        assert_eq!(handle.monitored_item_count(), 2);

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "create_subscription",
                "create_monitored_item:ns=2;i=1",
                "create_monitored_item:ns=2;i=2",
            ]
        );
    }

    #[tokio::test]
    async fn test_notifications_are_normalized() {
        let (connection, session, _log) = scripted(None);

        let received: Arc<Mutex<Vec<DataChangeNotification>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let handle = SubscriptionHandle::establish(
            connection,
            Arc::clone(&session) as Arc<dyn UaSession>,
            &SubscriptionSettings::default(),
            &requests(&["ns=2;i=1"]),
            &SubscribeOptions::default(),
            Arc::new(move |notification| {
                sink.lock().unwrap().push(notification);
            }),
        )
        .await
        .unwrap();

        session.fire(RawDataChange {
            node_id: NodeId::new("ns=2;i=1"),
            value: Variant::FloatArray(vec![1.5, 2.5]),
            status: "Good".to_string(),
            source_timestamp: None,
        });

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].node_id.as_str(), "ns=2;i=1");
        assert!(received[0].status_code.is_good());
        let json = serde_json::to_string(&received[0].value).unwrap();
        assert_eq!(json, "[1.5,2.5]");
        assert_eq!(handle.notifications_received(), 1);

        handle.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispose_order() {
        let (connection, session, log) = scripted(None);

        let handle = SubscriptionHandle::establish(
            connection,
            session,
            &SubscriptionSettings::default(),
            &requests(&["ns=2;i=1"]),
            &SubscribeOptions::default(),
            Arc::new(|_| {}),
        )
        .await
        .unwrap();

        handle.dispose().await.unwrap();
        assert!(handle.is_disposed());

        let log = log.lock().unwrap();
        let teardown: Vec<&str> = log.iter().map(String::as_str).skip(2).collect();
        assert_eq!(
            teardown,
            vec![
                "delete_monitored_items:7:1",
                "delete_subscription:7",
                "close",
                "disconnect",
            ]
        );
    }

    #[tokio::test]
    async fn test_double_dispose_is_rejected() {
        let (connection, session, _log) = scripted(None);

        let handle = SubscriptionHandle::establish(
            connection,
            session,
            &SubscriptionSettings::default(),
            &requests(&["ns=2;i=1"]),
            &SubscribeOptions::default(),
            Arc::new(|_| {}),
        )
        .await
        .unwrap();

        handle.dispose().await.unwrap();
        let second = handle.dispose().await;
        assert!(matches!(
            second,
            Err(OpcUaError::Subscription(SubscriptionError::AlreadyDisposed))
        ));
    }

    #[tokio::test]
    async fn test_failed_item_rolls_back() {
        let (connection, session, log) = scripted(Some(1));

        let result = SubscriptionHandle::establish(
            connection,
            session,
            &SubscriptionSettings::default(),
            &requests(&["ns=2;i=1", "ns=2;i=2"]),
            &SubscribeOptions::default(),
            Arc::new(|_| {}),
        )
        .await;

        assert!(result.is_err());

        let log = log.lock().unwrap();
        assert!(log.contains(&"delete_monitored_items:7:1".to_string()));
        assert!(log.contains(&"delete_subscription:7".to_string()));
        // The session itself stays open; its owner decides its fate.
        assert!(!log.contains(&"close".to_string()));
    }
}
