// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client implementations.
//!
//! This module provides the session-oriented client layers of the crate:
//!
//! - **Transport Layer**: Abstract connector/connection/session traits
//! - **Session Pool**: Lazily connected, shared session with idle expiry
//! - **Subscription**: Monitored-item lifecycle bound to a dedicated session
//! - **Client Wrapper**: High-level read/write/browse/subscribe API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        OpcUaClient                              │
//! │            (High-level read/write/browse/subscribe)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       SessionPool                               │
//! │          (Lazy connect, reuse, idle expiry, fatal reset)        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              UaConnector / UaConnection / UaSession             │
//! │                   (Abstract transport layer)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use twinlink_opcua::client::OpcUaClient;
//! use twinlink_opcua::config::OpcUaConfig;
//!
//! let config = OpcUaConfig::new("opc.tcp://localhost:4840");
//! let client = OpcUaClient::new(connector, config)?;
//!
//! // Read node values
//! let results = client.read_nodes(&["ns=2;s=Temperature".into()]).await?;
//! println!("Temperature: {:?}", results[0].value);
//!
//! // Subscribe to data changes
//! let handle = client
//!     .subscribe_nodes(items, callback, Default::default())
//!     .await?;
//! handle.dispose().await?;
//! ```

pub mod pool;
pub mod subscription;
pub mod transport;
mod wrapper;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use pool::{PoolState, PoolStats, SessionPool};
pub use subscription::{
    DataChangeNotification, NotificationCallback, SubscribeOptions, SubscriptionHandle,
    SubscriptionRequest,
};
pub use transport::{
    AttributeId, BrowseDirection, BrowseOptions, BrowseReference, DataChangeCallback,
    MonitorParams, RawDataChange, RawReadResult, RawWriteResult, SubscriptionParams, UaConnection,
    UaConnector, UaSession,
};
pub use wrapper::{ClientStats, OpcUaClient, TreeBrowseOptions};

#[cfg(feature = "real-transport")]
pub use real_transport::RealConnector;
