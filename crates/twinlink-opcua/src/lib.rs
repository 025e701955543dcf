// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session management and address-space traversal for Twinlink.
//!
//! This crate provides a high-level OPC UA client for reading, writing,
//! browsing, and monitoring nodes on a single server endpoint. Sessions are
//! pooled and reused across batched operations, and the address space can be
//! walked into a bounded tree snapshot suitable for serialization.
//!
//! # Features
//!
//! - Pooled OPC UA session with lazy connect and idle expiry
//! - Batched read/write operations on node values
//! - One-level browsing and bounded recursive tree traversal
//! - Subscription-based data change notifications
//! - Pluggable transport layer for testing without a live server
//!
//! # Error Handling
//!
//! This crate provides a layered error hierarchy through the [`error`] module:
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and channel establishment failures
//! ├── Session       - Session-fatal faults that poison the pool
//! ├── Operation     - Per-node read/write/browse failures
//! ├── Subscription  - Subscription and monitored-item errors
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use twinlink_opcua::{OpcUaClient, OpcUaConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpcUaConfig::from_env();
//!     let client = OpcUaClient::new(connector, config)?;
//!
//!     // Read a node value
//!     let results = client.read_nodes(&["ns=2;s=MyNode".into()]).await?;
//!     println!("Value: {:?}", results[0].value);
//!
//!     // Walk the address space below the Objects folder
//!     let tree = client.browse_tree(&Default::default()).await?;
//!     println!("Nodes visited: {}", tree.node_count());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod variant;

// Re-export commonly used types
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ErrorSeverity, FatalKind, OpcUaError,
    OpcUaResult, OperationError, SessionError, SubscriptionError,
};

pub use config::{
    OpcUaConfig, OpcUaConfigBuilder, SubscriptionSettings, TreeSettings, DEFAULT_ENDPOINT,
};

pub use types::{
    BrowseChild, NodeClass, NodeId, ReadResult, StatusCode, TreeNode, WriteRequest, WriteResult,
};

pub use variant::{Value, Variant};

// Re-export client types
pub use client::{
    ClientStats, OpcUaClient, PoolState, PoolStats, SessionPool, TreeBrowseOptions, UaConnection,
    UaConnector, UaSession,
};

// Re-export real transport when feature is enabled
#[cfg(feature = "real-transport")]
pub use client::RealConnector;

// Re-export subscription types
pub use client::{
    DataChangeNotification, NotificationCallback, SubscribeOptions, SubscriptionHandle,
    SubscriptionRequest,
};

// Re-export browse types
pub use browse::{BrowseStatistics, TreeBrowser};
