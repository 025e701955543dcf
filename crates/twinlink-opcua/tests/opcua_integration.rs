// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA Integration Tests
//!
//! Most tests in this file run against an in-process simulated server wired
//! through the transport traits, so they need no network and always run.
//! The tests at the bottom target a real OPC UA server and are `#[ignore]`d.
//!
//! # Running Against a Real Server
//!
//! ## Using Prosys OPC UA Simulation Server (recommended)
//!
//! Download from: https://www.prosysopc.com/products/opc-ua-simulation-server/
//!
//! ## Using node-opcua
//!
//! ```bash
//! npm install node-opcua
//! node ./scripts/opcua-simulator.js
//! ```
//!
//! # Environment Variables
//!
//! - `OPC_UA_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://localhost:4840)
//!
//! # Running Tests
//!
//! ```bash
//! # Simulated-server tests
//! cargo test -p twinlink-opcua --test opcua_integration
//!
//! # Real-server tests (requires a simulator and the real transport)
//! cargo test -p twinlink-opcua --features real-transport \
//!     --test opcua_integration -- --ignored
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use twinlink_opcua::client::{
    AttributeId, BrowseOptions, BrowseReference, DataChangeCallback, MonitorParams, RawDataChange,
    RawReadResult, RawWriteResult, SubscriptionParams, UaConnection, UaConnector, UaSession,
};
use twinlink_opcua::{
    DataChangeNotification, NodeClass, NodeId, OpcUaClient, OpcUaConfig, OpcUaResult, PoolState,
    SubscribeOptions, SubscriptionRequest, TreeBrowseOptions, Value, Variant, WriteRequest,
};

// =============================================================================
// Test Configuration
// =============================================================================

/// Default test endpoint
const DEFAULT_TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";

/// Get test endpoint from environment or use default
#[allow(dead_code)]
fn test_endpoint() -> String {
    std::env::var("OPC_UA_ENDPOINT").unwrap_or_else(|_| DEFAULT_TEST_ENDPOINT.to_string())
}

// =============================================================================
// Simulated Server
// =============================================================================

/// In-process OPC UA server backing the transport traits.
///
/// Nodes are registered up front with their identity attributes; variables
/// additionally carry a value and a data type name. A one-shot injected
/// service fault lets tests exercise the session-fatal path.
struct SimServer {
    meta: RwLock<HashMap<String, (String, NodeClass)>>,
    values: RwLock<HashMap<String, Variant>>,
    data_types: RwLock<HashMap<String, String>>,
    children: RwLock<HashMap<String, Vec<BrowseReference>>>,
    fatal: Mutex<Option<String>>,
    log: Mutex<Vec<String>>,
    connects: AtomicU32,
    next_monitored_id: AtomicU32,
    callbacks: Mutex<HashMap<String, DataChangeCallback>>,
}

impl SimServer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            meta: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            data_types: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
            fatal: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            connects: AtomicU32::new(0),
            next_monitored_id: AtomicU32::new(1),
            callbacks: Mutex::new(HashMap::new()),
        })
    }

    fn add_folder(&self, node_id: &str, display_name: &str) {
        let mut meta = self.meta.write().unwrap();
        meta.insert(
            node_id.to_string(),
            (display_name.to_string(), NodeClass::Object),
        );
    }

    fn add_variable(&self, node_id: &str, display_name: &str, value: Variant, data_type: &str) {
        let mut meta = self.meta.write().unwrap();
        meta.insert(
            node_id.to_string(),
            (display_name.to_string(), NodeClass::Variable),
        );
        drop(meta);
        self.values
            .write()
            .unwrap()
            .insert(node_id.to_string(), value);
        self.data_types
            .write()
            .unwrap()
            .insert(node_id.to_string(), data_type.to_string());
    }

    /// Records `child` as a browse reference under `parent`.
    fn link(&self, parent: &str, child: &str) {
        let meta = self.meta.read().unwrap();
        let (display_name, node_class) = meta
            .get(child)
            .cloned()
            .unwrap_or_else(|| (child.to_string(), NodeClass::Unknown));
        drop(meta);

        let mut children = self.children.write().unwrap();
        children
            .entry(parent.to_string())
            .or_default()
            .push(BrowseReference {
                node_id: NodeId::new(child),
                display_name: Some(display_name.clone()),
                browse_name: display_name,
                node_class,
                type_definition: None,
            });
    }

    fn set_value(&self, node_id: &str, value: Variant) {
        self.values
            .write()
            .unwrap()
            .insert(node_id.to_string(), value);
    }

    /// Makes the next service call fail with the given status.
    fn inject_fault(&self, status: &str) {
        *self.fatal.lock().unwrap() = Some(status.to_string());
    }

    /// Delivers a data change to the monitored item for `node_id`.
    fn fire(&self, node_id: &str, value: Variant) {
        let callbacks = self.callbacks.lock().unwrap();
        if let Some(callback) = callbacks.get(node_id) {
            callback(RawDataChange {
                node_id: NodeId::new(node_id),
                value,
                status: "Good".to_string(),
                source_timestamp: None,
            });
        }
    }

    fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    fn take_fault(&self) -> Option<twinlink_opcua::OpcUaError> {
        self.fatal
            .lock()
            .unwrap()
            .take()
            .map(|status| {
                twinlink_opcua::OpcUaError::from_service_fault(&status, "simulated service fault")
            })
    }

    fn read_node(&self, node_id: &NodeId) -> RawReadResult {
        let values = self.values.read().unwrap();
        match values.get(node_id.as_str()) {
            Some(value) => RawReadResult::good(node_id.clone(), value.clone()),
            None => RawReadResult::bad(node_id.clone(), "BadNodeIdUnknown"),
        }
    }
}

struct SimConnector {
    server: Arc<SimServer>,
}

struct SimConnection {
    server: Arc<SimServer>,
}

struct SimSession {
    server: Arc<SimServer>,
}

#[async_trait]
impl UaConnector for SimConnector {
    async fn connect(&self) -> OpcUaResult<Arc<dyn UaConnection>> {
        self.server.record("connect");
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimConnection {
            server: Arc::clone(&self.server),
        }))
    }

    fn endpoint(&self) -> &str {
        DEFAULT_TEST_ENDPOINT
    }
}

#[async_trait]
impl UaConnection for SimConnection {
    async fn create_session(&self) -> OpcUaResult<Arc<dyn UaSession>> {
        self.server.record("create_session");
        Ok(Arc::new(SimSession {
            server: Arc::clone(&self.server),
        }))
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.server.record("disconnect");
        Ok(())
    }
}

#[async_trait]
impl UaSession for SimSession {
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<RawReadResult> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }
        Ok(self.server.read_node(node_id))
    }

    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> OpcUaResult<Vec<RawReadResult>> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }

        let meta = self.server.meta.read().unwrap();
        let identity = meta.get(node_id.as_str()).cloned();
        drop(meta);

        let mut results = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            let result = match attribute {
                AttributeId::DisplayName | AttributeId::BrowseName => match &identity {
                    Some((display_name, _)) => RawReadResult::good(
                        node_id.clone(),
                        Variant::String(display_name.clone()),
                    ),
                    None => RawReadResult::bad(node_id.clone(), "BadNodeIdUnknown"),
                },
                AttributeId::NodeClass => match &identity {
                    Some((_, node_class)) => RawReadResult::good(
                        node_id.clone(),
                        Variant::String(node_class.name().to_string()),
                    ),
                    None => RawReadResult::bad(node_id.clone(), "BadNodeIdUnknown"),
                },
                AttributeId::Value => self.server.read_node(node_id),
                AttributeId::DataType => {
                    let data_types = self.server.data_types.read().unwrap();
                    match data_types.get(node_id.as_str()) {
                        Some(name) => RawReadResult::good(
                            node_id.clone(),
                            Variant::String(name.clone()),
                        ),
                        None => RawReadResult::bad(node_id.clone(), "BadAttributeIdInvalid"),
                    }
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> OpcUaResult<Vec<RawWriteResult>> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }
        self.server.record("write_values");

        let mut values = self.server.values.write().unwrap();
        Ok(writes
            .iter()
            .map(|(node_id, value)| {
                let status = if values.contains_key(node_id.as_str()) {
                    values.insert(node_id.as_str().to_string(), value.clone());
                    "Good"
                } else {
                    "BadNodeIdUnknown"
                };
                RawWriteResult {
                    node_id: node_id.clone(),
                    status: status.to_string(),
                }
            })
            .collect())
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        _options: &BrowseOptions,
    ) -> OpcUaResult<Vec<BrowseReference>> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }
        self.server.record(format!("browse:{}", node_id.as_str()));

        let children = self.server.children.read().unwrap();
        Ok(children.get(node_id.as_str()).cloned().unwrap_or_default())
    }

    async fn create_subscription(&self, _params: &SubscriptionParams) -> OpcUaResult<u32> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }
        self.server.record("create_subscription");
        Ok(7)
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        self.server
            .record(format!("delete_subscription:{subscription_id}"));
        Ok(())
    }

    async fn create_monitored_item(
        &self,
        _subscription_id: u32,
        params: &MonitorParams,
        on_change: DataChangeCallback,
    ) -> OpcUaResult<u32> {
        if let Some(err) = self.server.take_fault() {
            return Err(err);
        }
        self.server
            .record(format!("create_monitored_item:{}", params.node_id.as_str()));
        self.server
            .callbacks
            .lock()
            .unwrap()
            .insert(params.node_id.as_str().to_string(), on_change);
        Ok(self.server.next_monitored_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<()> {
        self.server.record(format!(
            "delete_monitored_items:{subscription_id}:{}",
            monitored_item_ids.len()
        ));
        Ok(())
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.server.record("close");
        Ok(())
    }
}

/// Builds a client over a fresh simulated server.
fn sim_client() -> (OpcUaClient, Arc<SimServer>) {
    let server = SimServer::new();
    let connector = Arc::new(SimConnector {
        server: Arc::clone(&server),
    });
    let client = OpcUaClient::new(connector, OpcUaConfig::new(DEFAULT_TEST_ENDPOINT))
        .expect("valid config");
    (client, server)
}

fn ids(raw: &[&str]) -> Vec<NodeId> {
    raw.iter().map(|id| NodeId::new(*id)).collect()
}

// =============================================================================
// Read Tests
// =============================================================================

#[tokio::test]
async fn test_read_single_node() {
    let (client, server) = sim_client();
    server.add_variable(
        "ns=2;i=10",
        "Samples",
        Variant::DoubleArray(vec![10.5, -3.2]),
        "Double",
    );

    let results = client.read_nodes(&ids(&["ns=2;i=10"])).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node_id.as_str(), "ns=2;i=10");
    assert!(results[0].status_code.is_good());
    assert_eq!(
        results[0].value,
        Some(Value::List(vec![Value::Float(10.5), Value::Float(-3.2)]))
    );
}

#[tokio::test]
async fn test_read_unknown_node_yields_failure_record() {
    let (client, _server) = sim_client();

    let results = client.read_nodes(&ids(&["ns=2;i=999"])).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(!results[0].status_code.is_good());
    assert_eq!(results[0].status_code.as_str(), "BadNodeIdUnknown");
    assert!(results[0].value.is_none());
}

#[tokio::test]
async fn test_batch_read_preserves_order_and_isolates_failures() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Int32(1), "Int32");
    server.add_variable("ns=2;i=3", "B", Variant::Int32(3), "Int32");

    let results = client
        .read_nodes(&ids(&["ns=2;i=1", "ns=2;i=2", "ns=2;i=3"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].node_id.as_str(), "ns=2;i=1");
    assert_eq!(results[1].node_id.as_str(), "ns=2;i=2");
    assert_eq!(results[2].node_id.as_str(), "ns=2;i=3");

    assert_eq!(results[0].value, Some(Value::Int(1)));
    assert!(!results[1].status_code.is_good());
    assert_eq!(results[2].value, Some(Value::Int(3)));
}

#[tokio::test]
async fn test_empty_batch_read() {
    let (client, server) = sim_client();

    let results = client.read_nodes(&[]).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(server.connects(), 0);
}

#[tokio::test]
async fn test_batch_read_of_many_nodes() {
    let (client, server) = sim_client();
    for i in 0..100 {
        server.add_variable(
            &format!("ns=2;i={}", 1000 + i),
            &format!("Node{i}"),
            Variant::Double(i as f64),
            "Double",
        );
    }

    let node_ids: Vec<NodeId> = (0..100)
        .map(|i| NodeId::new(format!("ns=2;i={}", 1000 + i)))
        .collect();
    let results = client.read_nodes(&node_ids).await.unwrap();

    assert_eq!(results.len(), 100);
    assert!(results.iter().all(|r| r.status_code.is_good()));
    // The whole batch runs on one pooled session.
    assert_eq!(server.connects(), 1);
}

// =============================================================================
// Session Pool Tests
// =============================================================================

#[tokio::test]
async fn test_session_reused_across_batches() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Int32(1), "Int32");

    client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();

    assert_eq!(server.connects(), 1);
    assert_eq!(client.pool_state().await, PoolState::Active);
    assert_eq!(client.pool_stats().acquires(), 2);
    assert_eq!(client.pool_stats().connects(), 1);
}

#[tokio::test]
async fn test_fatal_fault_resets_pool_and_reconnects() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Int32(1), "Int32");

    client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    server.inject_fault("BadSessionClosed");

    let err = client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap_err();
    assert!(err.is_session_fatal());
    assert_eq!(client.pool_state().await, PoolState::Empty);
    assert_eq!(client.pool_stats().fatal_resets(), 1);

    // The next batch reconnects transparently.
    let results = client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    assert!(results[0].status_code.is_good());
    assert_eq!(server.connects(), 2);
}

#[tokio::test]
async fn test_shutdown_closes_pooled_session() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Int32(1), "Int32");

    client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    client.shutdown().await;

    assert_eq!(client.pool_state().await, PoolState::Empty);
    let log = server.log();
    assert!(log.contains(&"close".to_string()));
    assert!(log.contains(&"disconnect".to_string()));
}

// =============================================================================
// Write Tests
// =============================================================================

#[tokio::test]
async fn test_write_nodes_reports_per_item_status() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Int32(1), "Int32");

    let results = client
        .write_nodes(&[
            WriteRequest::new("ns=2;i=1", Variant::Int32(42)),
            WriteRequest::new("ns=2;i=2", Variant::Int32(7)),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_good());
    assert_eq!(results[1].status_code.as_str(), "BadNodeIdUnknown");

    // The accepted write is visible to a subsequent read.
    let read = client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    assert_eq!(read[0].value, Some(Value::Int(42)));
}

#[tokio::test]
async fn test_empty_batch_write() {
    let (client, server) = sim_client();

    let results = client.write_nodes(&[]).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(server.connects(), 0);
}

// =============================================================================
// Browse Tests
// =============================================================================

#[tokio::test]
async fn test_browse_node_lists_children() {
    let (client, server) = sim_client();
    server.add_folder("RootFolder", "Root");
    server.add_folder("ns=2;i=100", "Devices");
    server.add_variable("ns=2;i=101", "Temperature", Variant::Double(21.5), "Double");
    server.link("RootFolder", "ns=2;i=100");
    server.link("RootFolder", "ns=2;i=101");

    let children = client.browse_node(&NodeId::root_folder()).await.unwrap();

    assert_eq!(children.len(), 2);
    assert_eq!(children[0].display_name, "Devices");
    assert_eq!(children[0].node_class, NodeClass::Object);
    assert_eq!(children[1].display_name, "Temperature");
    assert_eq!(children[1].node_class, NodeClass::Variable);
}

#[tokio::test]
async fn test_browse_tree_bounded_by_depth_and_fanout() {
    let (client, server) = sim_client();
    server.add_folder("RootFolder", "Root");
    for i in 0..3 {
        let id = format!("ns=2;i={}", 100 + i);
        server.add_folder(&id, &format!("Folder{i}"));
        server.link("RootFolder", &id);
        // Grandchildren must stay unvisited at depth 1.
        let grandchild = format!("ns=2;i={}", 200 + i);
        server.add_folder(&grandchild, &format!("Nested{i}"));
        server.link(&id, &grandchild);
    }

    let options = TreeBrowseOptions::new().with_max_depth(1).with_max_children(2);
    let tree = client.browse_tree(&options).await.unwrap();

    assert_eq!(tree.display_name, "Root");
    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].display_name, "Folder0");
    assert_eq!(tree.children[1].display_name, "Folder1");
    assert!(tree.children.iter().all(|child| child.is_leaf()));
    // Depth-capped nodes are never browsed.
    let log = server.log();
    assert_eq!(
        log.iter().filter(|e| e.starts_with("browse:")).count(),
        1
    );
}

#[tokio::test]
async fn test_browse_tree_reads_variable_values() {
    let (client, server) = sim_client();
    server.add_folder("RootFolder", "Root");
    server.add_variable(
        "ns=2;i=10",
        "Samples",
        Variant::DoubleArray(vec![10.5, -3.2]),
        "Double",
    );
    server.link("RootFolder", "ns=2;i=10");

    let tree = client
        .browse_tree(&TreeBrowseOptions::new().with_max_depth(2))
        .await
        .unwrap();

    assert_eq!(tree.children.len(), 1);
    let variable = &tree.children[0];
    assert_eq!(variable.node_class, NodeClass::Variable);
    assert_eq!(variable.data_type.as_deref(), Some("Double"));
    assert!(variable.status_code.as_ref().is_some_and(|s| s.is_good()));
    assert_eq!(
        variable.value,
        Some(Value::List(vec![Value::Float(10.5), Value::Float(-3.2)]))
    );
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_subscription_delivers_normalized_notifications() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Double(0.0), "Double");

    let received: Arc<Mutex<Vec<DataChangeNotification>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let callback = Arc::new(move |notification: DataChangeNotification| {
        sink.lock().unwrap().push(notification);
    });

    let handle = client
        .subscribe_nodes(
            &[SubscriptionRequest::new("ns=2;i=1")],
            callback,
            &SubscribeOptions::default(),
        )
        .await
        .unwrap();

    server.fire("ns=2;i=1", Variant::DoubleArray(vec![1.5, 2.5]));

    let notifications = received.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].node_id.as_str(), "ns=2;i=1");
    assert!(notifications[0].status_code.is_good());
    assert_eq!(
        notifications[0].value,
        Value::List(vec![Value::Float(1.5), Value::Float(2.5)])
    );
    drop(notifications);

    assert_eq!(handle.notifications_received(), 1);
    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_subscription_dispose_order() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Double(0.0), "Double");
    server.add_variable("ns=2;i=2", "B", Variant::Double(0.0), "Double");

    let callback = Arc::new(|_notification: DataChangeNotification| {});
    let handle = client
        .subscribe_nodes(
            &[
                SubscriptionRequest::new("ns=2;i=1"),
                SubscriptionRequest::new("ns=2;i=2"),
            ],
            callback,
            &SubscribeOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(handle.monitored_item_count(), 2);
    handle.dispose().await.unwrap();
    assert!(handle.is_disposed());

    let log = server.log();
    let position = |entry: &str| {
        log.iter()
            .position(|e| e.starts_with(entry))
            .unwrap_or_else(|| panic!("missing log entry {entry}"))
    };
    assert!(position("delete_monitored_items") < position("delete_subscription"));
    assert!(position("delete_subscription") < position("close"));
    assert!(position("close") < position("disconnect"));
}

#[tokio::test]
async fn test_subscription_uses_dedicated_connection() {
    let (client, server) = sim_client();
    server.add_variable("ns=2;i=1", "A", Variant::Double(0.0), "Double");

    // Warm up the pool, then subscribe.
    client.read_nodes(&ids(&["ns=2;i=1"])).await.unwrap();
    let callback = Arc::new(|_notification: DataChangeNotification| {});
    let handle = client
        .subscribe_nodes(
            &[SubscriptionRequest::new("ns=2;i=1")],
            callback,
            &SubscribeOptions::default(),
        )
        .await
        .unwrap();

    // One connect for the pool, one for the subscription.
    assert_eq!(server.connects(), 2);

    // Disposing the subscription leaves the pooled session alone.
    handle.dispose().await.unwrap();
    assert_eq!(client.pool_state().await, PoolState::Active);
}

// =============================================================================
// Real Server Tests (Requires OPC UA Simulator)
// =============================================================================

#[cfg(feature = "real-transport")]
mod real_server {
    use super::*;
    use twinlink_opcua::RealConnector;

    fn real_client() -> OpcUaClient {
        let config = OpcUaConfig::new(test_endpoint());
        let connector = Arc::new(RealConnector::new(config.clone()));
        OpcUaClient::new(connector, config).expect("valid config")
    }

    /// Expected node: ns=2;s=Demo.Static.Scalar.Double
    #[tokio::test]
    #[ignore = "Requires OPC UA simulator"]
    async fn test_real_server_read() {
        let client = real_client();

        let results = client
            .read_nodes(&ids(&["ns=2;s=Demo.Static.Scalar.Double"]))
            .await
            .expect("read against simulator");

        assert_eq!(results.len(), 1);
        assert!(results[0].status_code.is_good());
        client.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA simulator"]
    async fn test_real_server_browse_tree() {
        let client = real_client();

        let tree = client
            .browse_tree(&TreeBrowseOptions::new().with_max_depth(2).with_max_children(10))
            .await
            .expect("tree walk against simulator");

        assert!(!tree.children.is_empty());
        client.shutdown().await;
    }
}
