// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client configuration.
//!
//! Configuration is resolved once at startup: the endpoint comes from the
//! `OPC_UA_ENDPOINT` environment variable with a localhost fallback, and
//! everything else carries defaults tuned for typical polling workloads.
//! There is no runtime reconfiguration path; a changed endpoint means a new
//! client.
//!
//! # Examples
//!
//! ```
//! use twinlink_opcua::config::OpcUaConfig;
//!
//! let config = OpcUaConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.endpoint, "opc.tcp://localhost:4840");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};

/// Environment variable naming the server endpoint.
pub const ENDPOINT_ENV_VAR: &str = "OPC_UA_ENDPOINT";

/// Fallback endpoint when the environment provides none.
pub const DEFAULT_ENDPOINT: &str = "opc.tcp://localhost:4840";

// =============================================================================
// OpcUaConfig
// =============================================================================

/// OPC UA client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// How long the shared session may sit unused before disposal.
    #[serde(default = "default_idle_timeout")]
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Tree traversal defaults and bounds.
    #[serde(default)]
    pub tree: TreeSettings,

    /// Subscription defaults.
    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

fn default_application_name() -> String {
    "Twinlink OPC UA Client".to_string()
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(30)
}

impl OpcUaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OpcUaConfigBuilder {
        OpcUaConfigBuilder::default()
    }

    /// Creates a simple configuration with just the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Resolves configuration from the environment.
    ///
    /// Reads [`ENDPOINT_ENV_VAR`], falling back to [`DEFAULT_ENDPOINT`] when
    /// unset or empty.
    pub fn from_env() -> Self {
        let endpoint = std::env::var(ENDPOINT_ENV_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        tracing::debug!(endpoint = %endpoint, "Resolved OPC UA endpoint");
        Self::new(endpoint)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.endpoint.is_empty() {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_endpoint(&self.endpoint, "Endpoint must not be empty"),
            ));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_endpoint(
                    &self.endpoint,
                    "Endpoint must start with opc.tcp://",
                ),
            ));
        }

        if self.idle_timeout.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "idle_timeout",
                "Idle timeout must be greater than 0",
            )));
        }

        self.tree.validate()?;

        Ok(())
    }
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            application_name: default_application_name(),
            idle_timeout: default_idle_timeout(),
            tree: TreeSettings::default(),
            subscription: SubscriptionSettings::default(),
        }
    }
}

// =============================================================================
// OpcUaConfigBuilder
// =============================================================================

/// Builder for `OpcUaConfig`.
#[derive(Debug, Default)]
pub struct OpcUaConfigBuilder {
    endpoint: Option<String>,
    application_name: Option<String>,
    idle_timeout: Option<Duration>,
    tree: Option<TreeSettings>,
    subscription: Option<SubscriptionSettings>,
}

impl OpcUaConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the shared-session idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Sets the tree traversal settings.
    pub fn tree(mut self, tree: TreeSettings) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Sets the subscription settings.
    pub fn subscription(mut self, subscription: SubscriptionSettings) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcUaResult<OpcUaConfig> {
        let config = OpcUaConfig {
            endpoint: self.endpoint.unwrap_or_default(),
            application_name: self.application_name.unwrap_or_else(default_application_name),
            idle_timeout: self.idle_timeout.unwrap_or_else(default_idle_timeout),
            tree: self.tree.unwrap_or_default(),
            subscription: self.subscription.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// TreeSettings
// =============================================================================

/// Defaults and hard bounds for address-space tree traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSettings {
    /// Default maximum traversal depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Default maximum children kept per node.
    #[serde(default = "default_max_children")]
    pub max_children_per_node: usize,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_children() -> usize {
    25
}

impl TreeSettings {
    /// Hard upper bound on traversal depth.
    pub const DEPTH_LIMIT: u32 = 10;

    /// Hard bounds on children kept per node.
    pub const CHILDREN_RANGE: (usize, usize) = (1, 100);

    /// Clamps a requested depth into the supported range.
    pub fn clamp_depth(requested: u32) -> u32 {
        requested.min(Self::DEPTH_LIMIT)
    }

    /// Clamps a requested per-node child cap into the supported range.
    pub fn clamp_children(requested: usize) -> usize {
        let (min, max) = Self::CHILDREN_RANGE;
        requested.clamp(min, max)
    }

    /// Validates the defaults sit inside the hard bounds.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.max_depth > Self::DEPTH_LIMIT {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "tree.max_depth",
                format!("must be at most {}", Self::DEPTH_LIMIT),
            )));
        }

        let (min, max) = Self::CHILDREN_RANGE;
        if self.max_children_per_node < min || self.max_children_per_node > max {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "tree.max_children_per_node",
                format!("must be within {min}..={max}"),
            )));
        }

        Ok(())
    }
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_children_per_node: default_max_children(),
        }
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Defaults for subscriptions and monitored items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Requested publishing interval.
    #[serde(default = "default_publishing_interval")]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Default per-item sampling interval.
    #[serde(default = "default_sampling_interval")]
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Per-item notification queue size; oldest entries are discarded when
    /// the consumer falls behind.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Requested maximum keep-alive count.
    #[serde(default = "default_max_keep_alive_count")]
    pub max_keep_alive_count: u32,

    /// Requested lifetime count.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Maximum notifications per publish response (0 = no limit).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Subscription priority.
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_queue_size() -> u32 {
    10
}

fn default_max_keep_alive_count() -> u32 {
    20
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_priority() -> u8 {
    1
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            max_keep_alive_count: default_max_keep_alive_count(),
            lifetime_count: default_lifetime_count(),
            max_notifications_per_publish: 0,
            priority: default_priority(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
