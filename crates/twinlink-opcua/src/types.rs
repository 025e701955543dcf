// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA data types.
//!
//! This module defines the data records exchanged with the OPC UA layer:
//! node identifiers, semantic status codes, per-node read/write results,
//! browse references, and the recursive tree node produced by address-space
//! traversal.
//!
//! Node identifiers are opaque strings. This layer never parses them; they
//! are handed verbatim to the underlying protocol library, which owns their
//! syntax. Status codes are carried as semantic names (`Good`,
//! `BadNodeIdUnknown`) rather than raw numeric codes, matching what callers
//! serialize outward.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::variant::{Value, Variant};

// =============================================================================
// NodeId
// =============================================================================

/// An opaque identifier for a node in the server's address space.
///
/// Wraps the string form (`"ns=2;i=10"`, `"ns=2;s=Temperature"`, or a
/// well-known alias such as `"RootFolder"`) without interpreting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Well-known alias for the server's root folder.
    pub const ROOT_FOLDER: &'static str = "RootFolder";

    /// Creates a node id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the node id naming the root folder.
    pub fn root_folder() -> Self {
        Self(Self::ROOT_FOLDER.to_string())
    }

    /// Returns the string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the string form.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// A semantic status tag for a read or write outcome.
///
/// Carries the service status name (`Good`, `BadNodeIdUnknown`, ...) or, for
/// failures caught client-side, the error's description. Comparisons against
/// success happen through [`StatusCode::is_good`], never by re-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(String);

impl StatusCode {
    /// The canonical success status name.
    pub const GOOD: &'static str = "Good";

    /// Creates a status code from its name or description.
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// Returns the success status.
    pub fn good() -> Self {
        Self(Self::GOOD.to_string())
    }

    /// Returns `true` if this status denotes success.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 == Self::GOOD
    }

    /// Returns the status text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StatusCode {
    fn from(status: &str) -> Self {
        Self(status.to_string())
    }
}

impl From<String> for StatusCode {
    fn from(status: String) -> Self {
        Self(status)
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// The class of a node in the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeClass {
    /// An object node.
    Object,

    /// A variable node carrying a value.
    Variable,

    /// A method node.
    Method,

    /// An object type node.
    ObjectType,

    /// A variable type node.
    VariableType,

    /// A reference type node.
    ReferenceType,

    /// A data type node.
    DataType,

    /// A view node.
    View,

    /// A node class this layer does not recognize.
    #[default]
    Unknown,
}

impl NodeClass {
    /// Maps a node class name to the enum, degrading unrecognized names to
    /// [`NodeClass::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "Object" => Self::Object,
            "Variable" => Self::Variable,
            "Method" => Self::Method,
            "ObjectType" => Self::ObjectType,
            "VariableType" => Self::VariableType,
            "ReferenceType" => Self::ReferenceType,
            "DataType" => Self::DataType,
            "View" => Self::View,
            _ => Self::Unknown,
        }
    }

    /// Returns the class name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns `true` if nodes of this class carry a value attribute.
    #[inline]
    pub fn has_value(&self) -> bool {
        matches!(self, Self::Variable)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// ReadResult
// =============================================================================

/// Result of reading one node's value attribute.
///
/// A batch read of N nodes produces exactly N of these, in request order,
/// each independently successful or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    /// The node that was read.
    pub node_id: NodeId,

    /// Status of the read.
    pub status_code: StatusCode,

    /// The normalized value, `None` on failure.
    pub value: Option<Value>,

    /// Server timestamp, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl ReadResult {
    /// Creates a successful read result.
    pub fn success(node_id: NodeId, status_code: StatusCode, value: Value) -> Self {
        Self {
            node_id,
            status_code,
            value: Some(value),
            server_timestamp: None,
            source_timestamp: None,
        }
    }

    /// Creates a failed read result carrying the failure's status text.
    pub fn failure(node_id: NodeId, status_code: StatusCode) -> Self {
        Self {
            node_id,
            status_code,
            value: None,
            server_timestamp: None,
            source_timestamp: None,
        }
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(ts);
        self
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(ts);
        self
    }

    /// Returns `true` if the read succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }
}

// =============================================================================
// WriteRequest / WriteResult
// =============================================================================

/// One node/value pair in a batched write.
///
/// The value is carried as a protocol variant and passed through untouched;
/// this layer performs no data-type coercion or shape validation. A value
/// whose shape does not match the target's declared data type surfaces as
/// that item's failing status from the server.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// The node to write.
    pub node_id: NodeId,

    /// The value to write.
    pub value: Variant,
}

impl WriteRequest {
    /// Creates a write request.
    pub fn new(node_id: impl Into<NodeId>, value: Variant) -> Self {
        Self {
            node_id: node_id.into(),
            value,
        }
    }
}

/// Result of writing one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// The node that was written.
    pub node_id: NodeId,

    /// Status of the write.
    pub status_code: StatusCode,
}

impl WriteResult {
    /// Creates a write result.
    pub fn new(node_id: NodeId, status_code: StatusCode) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the write succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }
}

// =============================================================================
// BrowseChild
// =============================================================================

/// One forward reference returned by a single-level browse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseChild {
    /// The referenced node.
    pub node_id: NodeId,

    /// Localized display name, empty when the server reports none.
    pub display_name: String,

    /// Namespace-qualified browse name.
    pub browse_name: String,

    /// The referenced node's class.
    pub node_class: NodeClass,

    /// Type definition node id, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_definition: Option<String>,
}

// =============================================================================
// TreeNode
// =============================================================================

/// One node in a traversed address-space snapshot.
///
/// Built bottom-up during a tree walk and fully owned by the caller once
/// returned. No node id repeats along any root-to-leaf path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// The node id.
    pub node_id: NodeId,

    /// Localized display name.
    pub display_name: String,

    /// Namespace-qualified browse name.
    pub browse_name: String,

    /// The node's class.
    pub node_class: NodeClass,

    /// Declared data type (Variable nodes only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Status of the node's own value read, when one was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,

    /// Normalized current value (Variable nodes only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Child nodes in server-reported order.
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Creates a tree node with identity attributes and no children.
    pub fn new(
        node_id: NodeId,
        display_name: impl Into<String>,
        browse_name: impl Into<String>,
        node_class: NodeClass,
    ) -> Self {
        Self {
            node_id,
            display_name: display_name.into(),
            browse_name: browse_name.into(),
            node_class,
            data_type: None,
            status_code: None,
            value: None,
            children: Vec::new(),
        }
    }

    /// Creates a stub leaf from a browse reference, used when descending
    /// into the referenced node failed.
    pub fn stub(reference: &BrowseChild) -> Self {
        Self::new(
            reference.node_id.clone(),
            reference.display_name.clone(),
            reference.browse_name.clone(),
            reference.node_class,
        )
    }

    /// Sets the declared data type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Sets the value-read status.
    pub fn with_status_code(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the normalized value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Returns `true` if this node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the total number of nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Returns the maximum root-to-leaf edge count of this subtree.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }
}

// =============================================================================
// Tests
// =============================================================================
