// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded recursive traversal of the server address space.
//!
//! [`TreeBrowser`] walks forward references from a start node and assembles a
//! [`TreeNode`] snapshot. Three bounds keep the walk finite on arbitrary
//! (including adversarial) address spaces:
//!
//! - **Depth cap**: descent stops once `depth >= max_depth`; nodes at the cap
//!   are returned as leaves regardless of server-reported children.
//! - **Fan-out cap**: each browse result is truncated to
//!   `max_children_per_node` entries, preserving server order.
//! - **Cycle guard**: a visited set scoped to one `browse_tree` call skips any
//!   reference whose target was already expanded, so no root-to-leaf path
//!   repeats a node id.
//!
//! A child that cannot be read or browsed is kept in the tree as a leaf stub
//! built from the browse reference metadata; one unreachable subtree never
//! aborts the surrounding traversal.
//!
//! # Examples
//!
//! ```rust,ignore
//! use twinlink_opcua::browse::TreeBrowser;
//! use twinlink_opcua::config::TreeSettings;
//!
//! let browser = TreeBrowser::new(session, TreeSettings::default());
//! let tree = browser.browse_tree(&NodeId::root_folder()).await?;
//! println!("visited {} nodes", tree.node_count());
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::client::transport::{AttributeId, BrowseOptions, BrowseReference, UaSession};
use crate::config::TreeSettings;
use crate::error::OpcUaResult;
use crate::types::{BrowseChild, NodeClass, NodeId, StatusCode, TreeNode};
use crate::variant::Variant;

// =============================================================================
// Attribute batches
// =============================================================================

/// Identity attributes read for every visited node.
const IDENTITY_ATTRIBUTES: [AttributeId; 3] = [
    AttributeId::DisplayName,
    AttributeId::BrowseName,
    AttributeId::NodeClass,
];

/// Value attributes read for Variable nodes only.
const VALUE_ATTRIBUTES: [AttributeId; 2] = [AttributeId::Value, AttributeId::DataType];

// =============================================================================
// Reference conversion
// =============================================================================

/// Converts a transport browse reference into the outward child record.
///
/// A missing display name falls back to the node id string so the record is
/// always renderable.
pub fn child_from_reference(reference: &BrowseReference) -> BrowseChild {
    BrowseChild {
        node_id: reference.node_id.clone(),
        display_name: reference
            .display_name
            .clone()
            .unwrap_or_else(|| reference.node_id.as_str().to_string()),
        browse_name: reference.browse_name.clone(),
        node_class: reference.node_class,
        type_definition: reference.type_definition.clone(),
    }
}

// =============================================================================
// BrowseStatistics
// =============================================================================

/// Counters for traversal operations.
#[derive(Debug, Default)]
pub struct BrowseStatistics {
    browse_calls: AtomicU64,
    nodes_visited: AtomicU64,
    stubbed_children: AtomicU64,
    truncated_nodes: AtomicU64,
}

impl BrowseStatistics {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_browse(&self) {
        self.browse_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_node(&self) {
        self.nodes_visited.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stub(&self) {
        self.stubbed_children.fetch_add(1, Ordering::Relaxed);
    }

    fn record_truncation(&self) {
        self.truncated_nodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Total browse service calls issued.
    pub fn browse_calls(&self) -> u64 {
        self.browse_calls.load(Ordering::Relaxed)
    }

    /// Total nodes materialized into trees.
    pub fn nodes_visited(&self) -> u64 {
        self.nodes_visited.load(Ordering::Relaxed)
    }

    /// Children replaced by stub leaves after a failed descent.
    pub fn stubbed_children(&self) -> u64 {
        self.stubbed_children.load(Ordering::Relaxed)
    }

    /// Nodes whose child list was truncated to the fan-out cap.
    pub fn truncated_nodes(&self) -> u64 {
        self.truncated_nodes.load(Ordering::Relaxed)
    }
}

// =============================================================================
// TreeBrowser
// =============================================================================

/// Recursive address-space walker bound to one session.
///
/// The browser borrows a live session for its whole lifetime; callers are
/// expected to run one traversal per ephemeral session and tear the session
/// down afterwards.
pub struct TreeBrowser {
    session: Arc<dyn UaSession>,
    settings: TreeSettings,
    stats: Arc<BrowseStatistics>,
}

impl TreeBrowser {
    /// Creates a browser over a session with the given bounds.
    ///
    /// `settings` is taken as already validated; per-call clamping of
    /// caller-supplied bounds happens at the client facade.
    pub fn new(session: Arc<dyn UaSession>, settings: TreeSettings) -> Self {
        Self {
            session,
            settings,
            stats: Arc::new(BrowseStatistics::new()),
        }
    }

    /// Returns the traversal statistics.
    pub fn stats(&self) -> &BrowseStatistics {
        &self.stats
    }

    /// Walks the subtree under `root` and returns its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the root node itself cannot be read or browsed.
    /// Failures below the root are captured as stub leaves instead.
    pub async fn browse_tree(&self, root: &NodeId) -> OpcUaResult<TreeNode> {
        let mut visited = HashSet::new();
        let tree = self.descend(root, 0, &mut visited).await?;

        tracing::debug!(
            root = %root,
            nodes = tree.node_count(),
            depth = tree.depth(),
            "tree traversal complete"
        );

        Ok(tree)
    }

    /// Visits one node and recurses into its children.
    ///
    /// The depth check runs before the node is marked visited and before any
    /// browse is issued, so a node at the cap costs only its attribute reads.
    fn descend<'a>(
        &'a self,
        node_id: &'a NodeId,
        depth: u32,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, OpcUaResult<TreeNode>> {
        async move {
            let mut node = self.read_identity(node_id).await?;

            if node.node_class.has_value() {
                self.read_variable_value(&mut node).await;
            }

            self.stats.record_node();

            if depth >= self.settings.max_depth {
                return Ok(node);
            }

            visited.insert(node_id.as_str().to_string());

            let mut references = self
                .session
                .browse(node_id, &BrowseOptions::default())
                .await?;
            self.stats.record_browse();

            if references.len() > self.settings.max_children_per_node {
                references.truncate(self.settings.max_children_per_node);
                self.stats.record_truncation();
            }

            for reference in &references {
                if visited.contains(reference.node_id.as_str()) {
                    continue;
                }

                match self.descend(&reference.node_id, depth + 1, visited).await {
                    Ok(child) => node.children.push(child),
                    Err(err) => {
                        tracing::warn!(
                            parent = %node_id,
                            child = %reference.node_id,
                            error = %err,
                            "child descent failed, keeping stub leaf"
                        );
                        self.stats.record_stub();
                        node.children.push(TreeNode::stub(&child_from_reference(reference)));
                    }
                }
            }

            Ok(node)
        }
        .boxed()
    }

    /// Reads DisplayName, BrowseName, and NodeClass in one batched request.
    ///
    /// Bad per-attribute statuses degrade to fallbacks (node id string for
    /// names, `Unknown` for the class); only a failed service call propagates.
    async fn read_identity(&self, node_id: &NodeId) -> OpcUaResult<TreeNode> {
        let results = self
            .session
            .read_attributes(node_id, &IDENTITY_ATTRIBUTES)
            .await?;

        let display_name =
            text_attribute(results.first()).unwrap_or_else(|| node_id.as_str().to_string());
        let browse_name =
            text_attribute(results.get(1)).unwrap_or_else(|| node_id.as_str().to_string());
        let node_class = text_attribute(results.get(2))
            .map(|name| NodeClass::from_name(&name))
            .unwrap_or_default();

        Ok(TreeNode::new(
            node_id.clone(),
            display_name,
            browse_name,
            node_class,
        ))
    }

    /// Reads Value and DataType for a Variable node, best-effort.
    ///
    /// Any failure lands in the node's own `status_code` and leaves `value`
    /// null; it is never surfaced as a traversal failure.
    async fn read_variable_value(&self, node: &mut TreeNode) {
        match self
            .session
            .read_attributes(&node.node_id, &VALUE_ATTRIBUTES)
            .await
        {
            Ok(results) => {
                if let Some(value_read) = results.first() {
                    node.status_code = Some(StatusCode::new(value_read.status.clone()));
                    if value_read.is_good() {
                        node.value = Some(value_read.value.clone().normalize());
                    }
                }
                if let Some(name) =
                    results.get(1).filter(|r| r.is_good()).and_then(|r| match &r.value {
                        Variant::String(name) => Some(name.clone()),
                        _ => None,
                    })
                {
                    node.data_type = Some(name);
                }
            }
            Err(err) => {
                tracing::debug!(
                    node_id = %node.node_id,
                    error = %err,
                    "value read failed during traversal"
                );
                node.status_code = Some(StatusCode::new(err.status_text()));
            }
        }
    }
}

/// Extracts a good string attribute from a raw read, if present.
fn text_attribute(result: Option<&crate::client::transport::RawReadResult>) -> Option<String> {
    let result = result?;
    if !result.is_good() {
        return None;
    }
    match &result.value {
        Variant::String(text) => Some(text.clone()),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
