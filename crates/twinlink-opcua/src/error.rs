// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA error types and session-fatal classification.
//!
//! This module provides the error type hierarchy for OPC UA operations,
//! designed for:
//!
//! - **Extensibility**: Easy to add new error variants
//! - **Diagnostics**: Detailed error information for debugging
//! - **Recovery**: Explicit classification of session-fatal conditions
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and transport issues
//! ├── Session       - Session lifecycle errors (incl. fatal states)
//! ├── Operation     - Read/write operation failures
//! ├── Browse        - Node browsing failures
//! ├── Subscription  - Subscription and monitoring errors
//! └── Configuration - Invalid settings
//! ```
//!
//! # Session-Fatal Classification
//!
//! A small closed set of conditions poisons a shared session: the session id
//! becoming invalid, the session or secure channel being closed underneath
//! us, or the TCP connection being reset or aborted. These are modeled as
//! [`FatalKind`] and mapped from service status names and I/O error kinds at
//! this one boundary. Pool logic asks [`OpcUaError::is_session_fatal`] and
//! never inspects error text.
//!
//! # Examples
//!
//! ```
//! use twinlink_opcua::error::{FatalKind, OpcUaError};
//!
//! let error = OpcUaError::from_service_fault("BadSessionIdInvalid", "read failed");
//! assert!(error.is_session_fatal());
//! assert_eq!(error.fatal_kind(), Some(FatalKind::SessionIdInvalid));
//! ```

use std::fmt;
use std::io;
use thiserror::Error;
use tracing::Level;

/// Result type for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// FatalKind
// =============================================================================

/// Closed enumeration of session-fatal error conditions.
///
/// Any one of these means the shared session (or its secure channel) is
/// unusable and must be discarded rather than retried. Transport
/// implementations map their library's status codes and I/O failures into
/// this enum when constructing errors; nothing downstream matches on error
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    /// The server no longer recognizes the session id.
    SessionIdInvalid,

    /// The session was closed by the server or by a competing client.
    SessionClosed,

    /// The secure channel id is no longer valid.
    SecureChannelIdInvalid,

    /// The secure channel was closed underneath the session.
    SecureChannelClosed,

    /// The TCP connection was aborted.
    ConnectionAborted,

    /// The TCP connection was reset by the peer.
    ConnectionReset,
}

impl FatalKind {
    /// Maps an OPC UA service status name to a fatal kind, if it is one.
    pub fn from_status_name(name: &str) -> Option<Self> {
        match name {
            "BadSessionIdInvalid" => Some(Self::SessionIdInvalid),
            "BadSessionClosed" => Some(Self::SessionClosed),
            "BadSecureChannelIdInvalid" => Some(Self::SecureChannelIdInvalid),
            "BadSecureChannelClosed" => Some(Self::SecureChannelClosed),
            _ => None,
        }
    }

    /// Maps an I/O error kind to a fatal kind, if it is one.
    pub fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionReset => Some(Self::ConnectionReset),
            io::ErrorKind::ConnectionAborted => Some(Self::ConnectionAborted),
            _ => None,
        }
    }

    /// Returns the canonical status name for this kind.
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::SessionIdInvalid => "BadSessionIdInvalid",
            Self::SessionClosed => "BadSessionClosed",
            Self::SecureChannelIdInvalid => "BadSecureChannelIdInvalid",
            Self::SecureChannelClosed => "BadSecureChannelClosed",
            Self::ConnectionAborted => "BadConnectionAborted",
            Self::ConnectionReset => "BadConnectionClosed",
        }
    }
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionIdInvalid => write!(f, "session id invalid"),
            Self::SessionClosed => write!(f, "session closed"),
            Self::SecureChannelIdInvalid => write!(f, "secure channel id invalid"),
            Self::SecureChannelClosed => write!(f, "secure channel closed"),
            Self::ConnectionAborted => write!(f, "connection aborted"),
            Self::ConnectionReset => write!(f, "connection reset"),
        }
    }
}

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for OPC UA operations.
///
/// This enum categorizes errors by their domain, making it easy to handle
/// specific error types while maintaining a unified interface.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Node browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a connection refused error.
    pub fn connection_refused(endpoint: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::refused(endpoint))
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a session creation failed error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::Session(SessionError::creation_failed(message))
    }

    /// Creates a session-fatal error of the given kind.
    pub fn session_fatal(kind: FatalKind, message: impl Into<String>) -> Self {
        Self::Session(SessionError::fatal(kind, message))
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    /// Creates a bad status error for a specific node.
    pub fn bad_status(node_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::Operation(OperationError::bad_status(node_id, status))
    }

    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browse(BrowseError::browse_failed(node_id, message))
    }

    /// Maps a service fault returned by the underlying library into an error.
    ///
    /// This is the single classification boundary: status names naming a
    /// session-fatal condition become [`SessionError::Fatal`]; everything
    /// else becomes an operation-level bad status.
    pub fn from_service_fault(status_name: &str, detail: impl Into<String>) -> Self {
        match FatalKind::from_status_name(status_name) {
            Some(kind) => Self::session_fatal(kind, detail),
            None => Self::Operation(OperationError::BadStatus {
                node_id: String::new(),
                status: status_name.to_string(),
                detail: detail.into(),
            }),
        }
    }

    /// Maps an I/O error into a connection error, classifying fatal kinds.
    pub fn from_io(error: io::Error) -> Self {
        match FatalKind::from_io_kind(error.kind()) {
            Some(kind) => Self::session_fatal(kind, error.to_string()),
            None => Self::Connection(ConnectionError::io(error.to_string(), error)),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the fatal kind if this error poisons the shared session.
    pub fn fatal_kind(&self) -> Option<FatalKind> {
        match self {
            Self::Session(SessionError::Fatal { kind, .. }) => Some(*kind),
            Self::Connection(ConnectionError::Io { source, .. }) => {
                FatalKind::from_io_kind(source.kind())
            }
            _ => None,
        }
    }

    /// Returns `true` if this error means the shared session must be
    /// discarded rather than reused.
    #[inline]
    pub fn is_session_fatal(&self) -> bool {
        self.fatal_kind().is_some()
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Retryable errors are typically transient issues that may succeed
    /// on a subsequent attempt with appropriate backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Operation(_) => false,
            Self::Browse(_) => true,
            Self::Subscription(_) => true,
            Self::Configuration(_) => false,
        }
    }

    /// Returns the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Operation(_) => "operation",
            Self::Browse(_) => "browse",
            Self::Subscription(_) => "subscription",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns the semantic status text for per-node result records.
    ///
    /// For errors carrying a service status name this is that name; for
    /// everything else it is the error's display form, matching how per-node
    /// failures surface in read results.
    pub fn status_text(&self) -> String {
        match self {
            Self::Operation(OperationError::BadStatus { status, .. }) => status.clone(),
            Self::Session(SessionError::Fatal { kind, .. }) => kind.status_name().to_string(),
            other => other.to_string(),
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(_) => ErrorSeverity::Error,
            Self::Session(SessionError::Fatal { .. }) => ErrorSeverity::Warning,
            Self::Session(_) => ErrorSeverity::Error,
            Self::Operation(_) => ErrorSeverity::Warning,
            Self::Browse(_) => ErrorSeverity::Warning,
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors for OPC UA.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused.
    #[error("Connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}'")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed unexpectedly")]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// Generic I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            source: None,
        }
    }

    /// Creates a connection refused error with source.
    pub fn refused_with(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            source: Some(source),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(endpoint: impl Into<String>) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. } => true,
            Self::TimedOut { .. } => true,
            Self::Closed { .. } => true,
            Self::NotConnected => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            Self::InvalidEndpoint { .. } => false,
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session creation failed.
    #[error("Failed to create session: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The session is in a fatal state and must be discarded.
    #[error("Session unusable ({kind}): {message}")]
    Fatal {
        /// The classified fatal condition.
        kind: FatalKind,
        /// Error detail.
        message: String,
    },

    /// The session is not active.
    #[error("Session is not active")]
    NotActive,

    /// Session close failed.
    #[error("Failed to close session: {message}")]
    CloseFailed {
        /// Error message.
        message: String,
    },
}

impl SessionError {
    /// Creates a session creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a session creation failed error with source.
    pub fn creation_failed_with(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::CreationFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a session-fatal error.
    pub fn fatal(kind: FatalKind, message: impl Into<String>) -> Self {
        Self::Fatal {
            kind,
            message: message.into(),
        }
    }

    /// Creates a session close failed error.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CreationFailed { .. } => true,
            // Fatal errors are retryable only through a fresh session.
            Self::Fatal { .. } => true,
            Self::NotActive => true,
            Self::CloseFailed { .. } => false,
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read/write operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read operation failed.
    #[error("Failed to read node '{node_id}': {message}")]
    ReadFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Write operation failed.
    #[error("Failed to write node '{node_id}': {message}")]
    WriteFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server returned a bad status for a node.
    #[error("Bad status '{status}' for node '{node_id}'")]
    BadStatus {
        /// The node the status applies to.
        node_id: String,
        /// The service status name (e.g. `BadNodeIdUnknown`).
        status: String,
        /// Additional detail.
        detail: String,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status: status.into(),
            detail: String::new(),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Node browsing errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Browse operation failed.
    #[error("Failed to browse node '{node_id}': {message}")]
    BrowseFailed {
        /// The node that failed to browse.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Node not found.
    #[error("Node not found: '{node_id}'")]
    NodeNotFound {
        /// The missing node.
        node_id: String,
    },
}

impl BrowseError {
    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitoring errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Failed to create subscription: {message}")]
    CreateFailed {
        /// Error message.
        message: String,
    },

    /// Monitored item creation failed.
    #[error("Failed to monitor node '{node_id}': {message}")]
    MonitorFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The subscription has already been disposed.
    #[error("Subscription already disposed")]
    AlreadyDisposed,
}

impl SubscriptionError {
    /// Creates a subscription creation failed error.
    pub fn create_failed(message: impl Into<String>) -> Self {
        Self::CreateFailed {
            message: message.into(),
        }
    }

    /// Creates a monitored item creation failed error.
    pub fn monitor_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitorFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid endpoint URL.
    #[error("Invalid endpoint: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Severity level of an error, mapped to tracing levels for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, expected during normal operation.
    Info,

    /// Recoverable issue worth noting.
    Warning,

    /// Operation failed, attention needed.
    Error,

    /// Unrecoverable without intervention.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::DEBUG,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
            Self::Critical => Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
