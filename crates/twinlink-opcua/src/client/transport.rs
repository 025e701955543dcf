// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! This module defines the seam between the session/traversal logic and the
//! underlying OPC UA client library. Three object-safe traits model the
//! protocol's resource hierarchy:
//!
//! - [`UaConnector`] opens connections to one configured endpoint
//! - [`UaConnection`] creates sessions and owns the transport teardown
//! - [`UaSession`] issues reads, writes, browses, and subscriptions
//!
//! Splitting connection from session matters because teardown is ordered:
//! a session is closed first, then its connection is disconnected. The pool
//! and the ephemeral helper both rely on holding the two handles separately.
//!
//! Textual attributes (DisplayName, BrowseName, NodeClass, DataType) are
//! returned as string variants; implementations own the mapping from their
//! library's localized/qualified/numeric forms. The Value attribute arrives
//! as the protocol variant untouched.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::OpcUaResult;
use crate::types::{NodeClass, NodeId};
use crate::variant::Variant;

// =============================================================================
// AttributeId
// =============================================================================

/// The node attributes this layer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    /// Localized display name (attribute 4).
    DisplayName,

    /// Namespace-qualified browse name (attribute 3).
    BrowseName,

    /// Node class (attribute 2).
    NodeClass,

    /// Current value (attribute 13).
    Value,

    /// Declared data type (attribute 14).
    DataType,
}

impl AttributeId {
    /// Returns the protocol attribute id.
    pub fn protocol_id(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Value => 13,
            Self::DataType => 14,
        }
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayName => write!(f, "DisplayName"),
            Self::BrowseName => write!(f, "BrowseName"),
            Self::NodeClass => write!(f, "NodeClass"),
            Self::Value => write!(f, "Value"),
            Self::DataType => write!(f, "DataType"),
        }
    }
}

// =============================================================================
// RawReadResult / RawWriteResult
// =============================================================================

/// One attribute read as delivered by the transport.
///
/// The status is the service status name; the value is the protocol variant
/// before normalization.
#[derive(Debug, Clone)]
pub struct RawReadResult {
    /// The node that was read.
    pub node_id: NodeId,

    /// Service status name (e.g. `Good`, `BadNodeIdUnknown`).
    pub status: String,

    /// The attribute value.
    pub value: Variant,

    /// Server timestamp, if reported.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp, if reported.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl RawReadResult {
    /// Creates a successful raw read.
    pub fn good(node_id: NodeId, value: Variant) -> Self {
        Self {
            node_id,
            status: "Good".to_string(),
            value,
            server_timestamp: None,
            source_timestamp: None,
        }
    }

    /// Creates a failed raw read.
    pub fn bad(node_id: NodeId, status: impl Into<String>) -> Self {
        Self {
            node_id,
            status: status.into(),
            value: Variant::Null,
            server_timestamp: None,
            source_timestamp: None,
        }
    }

    /// Returns `true` if the read succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status == "Good"
    }
}

/// One write outcome as delivered by the transport.
#[derive(Debug, Clone)]
pub struct RawWriteResult {
    /// The node that was written.
    pub node_id: NodeId,

    /// Service status name.
    pub status: String,
}

// =============================================================================
// Browse
// =============================================================================

/// Browse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseDirection {
    /// Follow forward references.
    #[default]
    Forward,

    /// Follow inverse references.
    Inverse,

    /// Follow both directions.
    Both,
}

/// Parameters for a single-level browse.
#[derive(Debug, Clone)]
pub struct BrowseOptions {
    /// Direction of references to follow.
    pub direction: BrowseDirection,

    /// Whether to include subtypes of the reference type.
    pub include_subtypes: bool,

    /// Node class filter mask (0 = all classes).
    pub node_class_mask: u32,

    /// Result field mask (0x3f = all fields).
    pub result_mask: u32,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            direction: BrowseDirection::Forward,
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: 0x3f,
        }
    }
}

/// One reference returned by a browse.
#[derive(Debug, Clone)]
pub struct BrowseReference {
    /// The referenced node.
    pub node_id: NodeId,

    /// Localized display name, if the server reported one.
    pub display_name: Option<String>,

    /// Namespace-qualified browse name.
    pub browse_name: String,

    /// The referenced node's class.
    pub node_class: NodeClass,

    /// Type definition node id, if reported.
    pub type_definition: Option<String>,
}

// =============================================================================
// Subscription
// =============================================================================

/// Parameters for creating a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionParams {
    /// Requested publishing interval.
    pub publishing_interval: Duration,

    /// Requested maximum keep-alive count.
    pub max_keep_alive_count: u32,

    /// Requested lifetime count.
    pub lifetime_count: u32,

    /// Maximum notifications per publish response (0 = no limit).
    pub max_notifications_per_publish: u32,

    /// Subscription priority.
    pub priority: u8,

    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
}

/// Parameters for one monitored item.
#[derive(Debug, Clone)]
pub struct MonitorParams {
    /// The node to monitor.
    pub node_id: NodeId,

    /// Sampling interval for this item.
    pub sampling_interval: Duration,

    /// Pending-notification queue size.
    pub queue_size: u32,

    /// Whether to discard the oldest queued notification on overflow.
    pub discard_oldest: bool,
}

/// One value-change notification as delivered by the transport.
#[derive(Debug, Clone)]
pub struct RawDataChange {
    /// The monitored node.
    pub node_id: NodeId,

    /// The new value.
    pub value: Variant,

    /// Service status name of the sampled value.
    pub status: String,

    /// Source timestamp, if reported.
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// Callback invoked by the transport for each value change.
pub type DataChangeCallback = Arc<dyn Fn(RawDataChange) + Send + Sync>;

// =============================================================================
// UaConnector / UaConnection / UaSession
// =============================================================================

/// Opens connections to one configured OPC UA endpoint.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the pool shares one connector
/// across all acquiring tasks.
#[async_trait]
pub trait UaConnector: Send + Sync {
    /// Establishes a connection to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self) -> OpcUaResult<Arc<dyn UaConnection>>;

    /// Returns the server endpoint URL.
    fn endpoint(&self) -> &str;
}

/// One live connection to the server.
#[async_trait]
pub trait UaConnection: Send + Sync {
    /// Creates a session over this connection.
    ///
    /// # Errors
    ///
    /// Returns an error if session creation or activation fails.
    async fn create_session(&self) -> OpcUaResult<Arc<dyn UaSession>>;

    /// Closes the connection.
    ///
    /// Called after any sessions on this connection have been closed.
    async fn disconnect(&self) -> OpcUaResult<()>;
}

/// One live session, through which all node operations are issued.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// Reads one node's value attribute.
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<RawReadResult>;

    /// Reads several attributes of one node in a single request.
    ///
    /// The result order matches the attribute order.
    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> OpcUaResult<Vec<RawReadResult>>;

    /// Writes several nodes' value attributes in a single request.
    ///
    /// The result order matches the request order; each entry carries that
    /// item's own status.
    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> OpcUaResult<Vec<RawWriteResult>>;

    /// Lists the references of one node.
    async fn browse(
        &self,
        node_id: &NodeId,
        options: &BrowseOptions,
    ) -> OpcUaResult<Vec<BrowseReference>>;

    /// Creates a subscription, returning its server-assigned id.
    async fn create_subscription(&self, params: &SubscriptionParams) -> OpcUaResult<u32>;

    /// Deletes a subscription.
    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()>;

    /// Registers a monitored item on a subscription.
    ///
    /// The callback is invoked for every sampled value change until the item
    /// is deleted.
    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        params: &MonitorParams,
        on_change: DataChangeCallback,
    ) -> OpcUaResult<u32>;

    /// Deletes monitored items from a subscription.
    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<()>;

    /// Closes the session.
    async fn close(&self) -> OpcUaResult<()>;
}

// =============================================================================
// Tests
// =============================================================================
