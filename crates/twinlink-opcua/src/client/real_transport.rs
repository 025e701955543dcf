// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport implementation backed by the `opcua` crate.
//!
//! Enabled with the `real-transport` feature. [`RealConnector`] implements the
//! [`UaConnector`] / [`UaConnection`] / [`UaSession`] triple over the library's
//! synchronous session handle.
//!
//! The library couples connection and session into one handle, so the split
//! teardown of the trait contract maps onto it as: `UaSession::close` is a
//! no-op and `UaConnection::disconnect` releases both.
//!
//! Mapping decisions, in line with the transport contract:
//!
//! - textual attributes (DisplayName, BrowseName, NodeClass, DataType) are
//!   converted to string variants here
//! - service-level status codes go through the error classification boundary
//!   so fatal session faults are recognized by the pool
//! - per-item change callbacks are dispatched from the subscription-level
//!   library callback by node id

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use crate::config::OpcUaConfig;
use crate::error::{ConnectionError, OpcUaError, OpcUaResult};
use crate::types::{NodeClass, NodeId};
use crate::variant::Variant;

use super::transport::{
    BrowseOptions, BrowseReference, DataChangeCallback, MonitorParams, RawDataChange,
    RawReadResult, RawWriteResult, SubscriptionParams, UaConnection, UaConnector, UaSession,
};

type SessionHandle = Arc<OpcUaRwLock<Session>>;
type ChangeRouter = Arc<Mutex<HashMap<String, DataChangeCallback>>>;

// =============================================================================
// RealConnector
// =============================================================================

/// Connector that opens real protocol connections to one endpoint.
pub struct RealConnector {
    config: OpcUaConfig,
}

impl RealConnector {
    /// Creates a connector for the configured endpoint.
    pub fn new(config: OpcUaConfig) -> Self {
        Self { config }
    }

    fn build_client(&self) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(&self.config.application_name)
            .application_uri("urn:twinlink-opcua")
            .trust_server_certs(true)
            .create_sample_keypair(true)
            .session_retry_limit(0)
            .client()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::invalid_endpoint(
                    &self.config.endpoint,
                    "client construction failed",
                ))
            })
    }
}

#[async_trait]
impl UaConnector for RealConnector {
    async fn connect(&self) -> OpcUaResult<Arc<dyn UaConnection>> {
        let endpoint = self.config.endpoint.clone();
        let client = self.build_client()?;

        tracing::info!(endpoint = %endpoint, "connecting");

        // The library connect is blocking; keep it off the async runtime.
        let connect_endpoint = endpoint.clone();
        let session = tokio::task::spawn_blocking(move || -> OpcUaResult<SessionHandle> {
            let mut client = client;
            let endpoints = client
                .get_server_endpoints_from_url(&connect_endpoint)
                .map_err(|status| {
                    OpcUaError::connection(ConnectionError::refused(format!(
                        "{connect_endpoint}: {status:?}"
                    )))
                })?;

            let endpoint_description = endpoints
                .iter()
                .find(|e| e.security_mode == MessageSecurityMode::None)
                .cloned()
                .ok_or_else(|| {
                    OpcUaError::connection(ConnectionError::invalid_endpoint(
                        &connect_endpoint,
                        "no unsecured endpoint offered",
                    ))
                })?;

            client
                .connect_to_endpoint(endpoint_description, IdentityToken::Anonymous)
                .map_err(|status| {
                    OpcUaError::session_failed(format!("endpoint activation failed: {status:?}"))
                })
        })
        .await
        .map_err(|join_error| {
            OpcUaError::connection(ConnectionError::closed(Some(format!(
                "connect task failed: {join_error}"
            ))))
        })??;

        Ok(Arc::new(RealConnection { session, endpoint }))
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

// =============================================================================
// RealConnection
// =============================================================================

/// One live connection; the library handle also carries the session.
pub struct RealConnection {
    session: SessionHandle,
    endpoint: String,
}

#[async_trait]
impl UaConnection for RealConnection {
    async fn create_session(&self) -> OpcUaResult<Arc<dyn UaSession>> {
        // connect_to_endpoint already created and activated the session.
        Ok(Arc::new(RealSession {
            session: Arc::clone(&self.session),
            router: Arc::new(Mutex::new(HashMap::new())),
            next_client_handle: AtomicU32::new(1),
        }))
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        tracing::debug!(endpoint = %self.endpoint, "disconnecting");
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            session.read().disconnect();
        })
        .await
        .map_err(|join_error| {
            OpcUaError::connection(ConnectionError::closed(Some(format!(
                "disconnect task failed: {join_error}"
            ))))
        })?;
        Ok(())
    }
}

// =============================================================================
// RealSession
// =============================================================================

/// Session adapter issuing service calls through the library handle.
pub struct RealSession {
    session: SessionHandle,
    router: ChangeRouter,
    next_client_handle: AtomicU32,
}

impl RealSession {
    fn read_value_id(node_id: &opcua::types::NodeId, attribute: u32) -> ReadValueId {
        ReadValueId {
            node_id: node_id.clone(),
            attribute_id: attribute,
            index_range: opcua::types::UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        }
    }
}

#[async_trait]
impl UaSession for RealSession {
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<RawReadResult> {
        let results = self
            .read_attributes(node_id, &[super::transport::AttributeId::Value])
            .await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| OpcUaError::read_failed(node_id.as_str(), "empty read response"))
    }

    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[super::transport::AttributeId],
    ) -> OpcUaResult<Vec<RawReadResult>> {
        let protocol_id = to_protocol_node_id(node_id)?;
        let reads: Vec<ReadValueId> = attributes
            .iter()
            .map(|attribute| Self::read_value_id(&protocol_id, attribute.protocol_id()))
            .collect();

        let data_values = self
            .session
            .read()
            .read(&reads, TimestampsToReturn::Both, 0.0)
            .map_err(|status| service_fault(status, "read service failed"))?;

        Ok(attributes
            .iter()
            .zip(data_values.iter())
            .map(|(attribute, data_value)| {
                let status = data_value
                    .status
                    .map(status_name)
                    .unwrap_or_else(|| "Good".to_string());
                let value = data_value
                    .value
                    .as_ref()
                    .map(|variant| attribute_to_variant(*attribute, variant))
                    .unwrap_or(Variant::Null);

                RawReadResult {
                    node_id: node_id.clone(),
                    status,
                    value,
                    server_timestamp: data_value.server_timestamp.as_ref().map(to_chrono),
                    source_timestamp: data_value.source_timestamp.as_ref().map(to_chrono),
                }
            })
            .collect())
    }

    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> OpcUaResult<Vec<RawWriteResult>> {
        let mut write_values = Vec::with_capacity(writes.len());
        for (node_id, value) in writes {
            write_values.push(WriteValue {
                node_id: to_protocol_node_id(node_id)?,
                attribute_id: super::transport::AttributeId::Value.protocol_id(),
                index_range: opcua::types::UAString::null(),
                value: opcua::types::DataValue::new_now(to_protocol_variant(value)),
            });
        }

        let statuses = self
            .session
            .read()
            .write(&write_values)
            .map_err(|status| service_fault(status, "write service failed"))?;

        Ok(writes
            .iter()
            .zip(statuses.iter())
            .map(|((node_id, _), status)| RawWriteResult {
                node_id: node_id.clone(),
                status: status_name(*status),
            })
            .collect())
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        options: &BrowseOptions,
    ) -> OpcUaResult<Vec<BrowseReference>> {
        let description = BrowseDescription {
            node_id: to_protocol_node_id(node_id)?,
            browse_direction: match options.direction {
                super::transport::BrowseDirection::Forward => BrowseDirection::Forward,
                super::transport::BrowseDirection::Inverse => BrowseDirection::Inverse,
                super::transport::BrowseDirection::Both => BrowseDirection::Both,
            },
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: options.include_subtypes,
            node_class_mask: options.node_class_mask,
            result_mask: options.result_mask,
        };

        let results = self
            .session
            .read()
            .browse(&[description])
            .map_err(|status| service_fault(status, "browse service failed"))?
            .ok_or_else(|| OpcUaError::browse_failed(node_id.as_str(), "empty browse response"))?;

        let references = results
            .first()
            .and_then(|result| result.references.clone())
            .unwrap_or_default();

        Ok(references
            .iter()
            .map(|reference| BrowseReference {
                node_id: NodeId::new(reference.node_id.node_id.to_string()),
                display_name: {
                    let text = reference.display_name.text.as_ref().to_string();
                    if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    }
                },
                browse_name: qualified_name_text(&reference.browse_name),
                node_class: node_class_from_mask(reference.node_class as u32),
                type_definition: {
                    let id = reference.type_definition.node_id.to_string();
                    if id.is_empty() {
                        None
                    } else {
                        Some(id)
                    }
                },
            })
            .collect())
    }

    async fn create_subscription(&self, params: &SubscriptionParams) -> OpcUaResult<u32> {
        let router = Arc::clone(&self.router);

        self.session
            .read()
            .create_subscription(
                params.publishing_interval.as_millis() as f64,
                params.lifetime_count,
                params.max_keep_alive_count,
                params.max_notifications_per_publish,
                params.priority,
                params.publishing_enabled,
                opcua::client::prelude::DataChangeCallback::new(move |changed_items| {
                    let router = router.lock().map(|map| {
                        changed_items
                            .iter()
                            .filter_map(|item| {
                                let node_key = item.item_to_monitor().node_id.to_string();
                                map.get(&node_key).cloned().map(|callback| (callback, raw_change(item, node_key)))
                            })
                            .collect::<Vec<_>>()
                    });
                    if let Ok(deliveries) = router {
                        for (callback, change) in deliveries {
                            callback(change);
                        }
                    }
                }),
            )
            .map_err(|status| service_fault(status, "subscription creation failed"))
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        self.session
            .read()
            .delete_subscription(subscription_id)
            .map_err(|status| service_fault(status, "subscription deletion failed"))?;
        Ok(())
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        params: &MonitorParams,
        on_change: DataChangeCallback,
    ) -> OpcUaResult<u32> {
        let protocol_id = to_protocol_node_id(&params.node_id)?;
        let node_key = protocol_id.to_string();

        if let Ok(mut map) = self.router.lock() {
            map.insert(node_key, on_change);
        }

        let request = MonitoredItemCreateRequest {
            item_to_monitor: Self::read_value_id(
                &protocol_id,
                super::transport::AttributeId::Value.protocol_id(),
            ),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                sampling_interval: params.sampling_interval.as_millis() as f64,
                filter: ExtensionObject::null(),
                queue_size: params.queue_size,
                discard_oldest: params.discard_oldest,
                client_handle: self.next_client_handle.fetch_add(1, Ordering::Relaxed),
            },
        };

        let results = self
            .session
            .read()
            .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[request])
            .map_err(|status| service_fault(status, "monitored item creation failed"))?;

        let result = results.first().ok_or_else(|| {
            OpcUaError::subscription(crate::error::SubscriptionError::monitor_failed(
                params.node_id.as_str(),
                "empty monitored item response",
            ))
        })?;

        if result.status_code.is_good() {
            Ok(result.monitored_item_id)
        } else {
            Err(OpcUaError::subscription(
                crate::error::SubscriptionError::monitor_failed(
                    params.node_id.as_str(),
                    status_name(result.status_code),
                ),
            ))
        }
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<()> {
        if monitored_item_ids.is_empty() {
            return Ok(());
        }
        self.session
            .read()
            .delete_monitored_items(subscription_id, monitored_item_ids)
            .map_err(|status| service_fault(status, "monitored item deletion failed"))?;
        Ok(())
    }

    async fn close(&self) -> OpcUaResult<()> {
        // The library tears the session down together with the connection.
        Ok(())
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_protocol_node_id(node_id: &NodeId) -> OpcUaResult<opcua::types::NodeId> {
    if node_id.as_str() == NodeId::ROOT_FOLDER {
        return Ok(ObjectId::RootFolder.into());
    }
    opcua::types::NodeId::from_str(node_id.as_str()).map_err(|_| {
        OpcUaError::read_failed(node_id.as_str(), "unparseable node id")
    })
}

/// Renders a service status through the one classification boundary.
fn service_fault(status: StatusCode, context: &str) -> OpcUaError {
    OpcUaError::from_service_fault(&status_name(status), context)
}

fn status_name(status: StatusCode) -> String {
    if status.is_good() {
        "Good".to_string()
    } else {
        format!("{:?}", status)
    }
}

fn to_chrono(timestamp: &opcua::types::DateTime) -> DateTime<Utc> {
    timestamp.as_chrono()
}

fn qualified_name_text(name: &opcua::types::QualifiedName) -> String {
    let text = name.name.as_ref();
    if name.namespace_index == 0 {
        text.to_string()
    } else {
        format!("{}:{text}", name.namespace_index)
    }
}

fn node_class_from_mask(mask: u32) -> NodeClass {
    match mask {
        1 => NodeClass::Object,
        2 => NodeClass::Variable,
        4 => NodeClass::Method,
        8 => NodeClass::ObjectType,
        16 => NodeClass::VariableType,
        32 => NodeClass::ReferenceType,
        64 => NodeClass::DataType,
        128 => NodeClass::View,
        _ => NodeClass::Unknown,
    }
}

fn raw_change(item: &opcua::client::prelude::MonitoredItem, node_key: String) -> RawDataChange {
    let data_value = item.last_value();
    RawDataChange {
        node_id: NodeId::new(node_key),
        value: data_value
            .value
            .as_ref()
            .map(from_protocol_variant)
            .unwrap_or(Variant::Null),
        status: data_value
            .status
            .map(status_name)
            .unwrap_or_else(|| "Good".to_string()),
        source_timestamp: data_value.source_timestamp.as_ref().map(to_chrono),
    }
}

/// Converts a library variant for one of the textual attributes into the
/// string form the transport contract promises; the Value attribute passes
/// through as a plain variant conversion.
fn attribute_to_variant(
    attribute: super::transport::AttributeId,
    variant: &opcua::types::Variant,
) -> Variant {
    use super::transport::AttributeId;
    use opcua::types::Variant as Lib;

    match (attribute, variant) {
        (AttributeId::DisplayName, Lib::LocalizedText(text)) => {
            Variant::String(text.text.as_ref().to_string())
        }
        (AttributeId::BrowseName, Lib::QualifiedName(name)) => {
            Variant::String(qualified_name_text(name))
        }
        (AttributeId::NodeClass, Lib::Int32(mask)) => {
            Variant::String(node_class_from_mask(*mask as u32).name().to_string())
        }
        (AttributeId::DataType, Lib::NodeId(data_type)) => {
            Variant::String(data_type_name(data_type))
        }
        _ => from_protocol_variant(variant),
    }
}

/// Names the builtin data types; everything else keeps its node id string.
fn data_type_name(node_id: &opcua::types::NodeId) -> String {
    if node_id.namespace == 0 {
        if let opcua::types::Identifier::Numeric(id) = node_id.identifier {
            let name = match id {
                1 => Some("Boolean"),
                2 => Some("SByte"),
                3 => Some("Byte"),
                4 => Some("Int16"),
                5 => Some("UInt16"),
                6 => Some("Int32"),
                7 => Some("UInt32"),
                8 => Some("Int64"),
                9 => Some("UInt64"),
                10 => Some("Float"),
                11 => Some("Double"),
                12 => Some("String"),
                13 => Some("DateTime"),
                _ => None,
            };
            if let Some(name) = name {
                return name.to_string();
            }
        }
    }
    node_id.to_string()
}

fn from_protocol_variant(variant: &opcua::types::Variant) -> Variant {
    use opcua::types::Variant as Lib;

    match variant {
        Lib::Empty => Variant::Null,
        Lib::Boolean(v) => Variant::Boolean(*v),
        Lib::SByte(v) => Variant::SByte(*v),
        Lib::Byte(v) => Variant::Byte(*v),
        Lib::Int16(v) => Variant::Int16(*v),
        Lib::UInt16(v) => Variant::UInt16(*v),
        Lib::Int32(v) => Variant::Int32(*v),
        Lib::UInt32(v) => Variant::UInt32(*v),
        Lib::Int64(v) => Variant::Int64(*v),
        Lib::UInt64(v) => Variant::UInt64(*v),
        Lib::Float(v) => Variant::Float(*v),
        Lib::Double(v) => Variant::Double(*v),
        Lib::String(v) => Variant::String(v.as_ref().to_string()),
        Lib::DateTime(v) => Variant::DateTime(v.as_chrono()),
        Lib::Array(array) => from_protocol_array(array),
        other => Variant::String(format!("{other:?}")),
    }
}

fn from_protocol_array(array: &opcua::types::Array) -> Variant {
    use opcua::types::Variant as Lib;
    use opcua::types::VariantTypeId;

    macro_rules! collect_typed {
        ($pattern:path, $constructor:expr) => {{
            let values: Vec<_> = array
                .values
                .iter()
                .filter_map(|v| if let $pattern(x) = v { Some(*x) } else { None })
                .collect();
            if values.len() == array.values.len() {
                return $constructor(values);
            }
        }};
    }

    match array.value_type {
        VariantTypeId::SByte => collect_typed!(Lib::SByte, Variant::SByteArray),
        VariantTypeId::Byte => collect_typed!(Lib::Byte, Variant::ByteArray),
        VariantTypeId::Int16 => collect_typed!(Lib::Int16, Variant::Int16Array),
        VariantTypeId::UInt16 => collect_typed!(Lib::UInt16, Variant::UInt16Array),
        VariantTypeId::Int32 => collect_typed!(Lib::Int32, Variant::Int32Array),
        VariantTypeId::UInt32 => collect_typed!(Lib::UInt32, Variant::UInt32Array),
        VariantTypeId::Int64 => collect_typed!(Lib::Int64, Variant::Int64Array),
        VariantTypeId::UInt64 => collect_typed!(Lib::UInt64, Variant::UInt64Array),
        VariantTypeId::Float => collect_typed!(Lib::Float, Variant::FloatArray),
        VariantTypeId::Double => collect_typed!(Lib::Double, Variant::DoubleArray),
        _ => {}
    }

    Variant::Array(array.values.iter().map(from_protocol_variant).collect())
}

fn to_protocol_variant(value: &Variant) -> opcua::types::Variant {
    use opcua::types::Variant as Lib;
    use opcua::types::VariantTypeId;

    fn array_of(type_id: VariantTypeId, values: Vec<Lib>) -> Lib {
        match opcua::types::Array::new(type_id, values) {
            Ok(array) => Lib::Array(Box::new(array)),
            Err(_) => Lib::Empty,
        }
    }

    match value {
        Variant::Null => Lib::Empty,
        Variant::Boolean(v) => Lib::Boolean(*v),
        Variant::SByte(v) => Lib::SByte(*v),
        Variant::Byte(v) => Lib::Byte(*v),
        Variant::Int16(v) => Lib::Int16(*v),
        Variant::UInt16(v) => Lib::UInt16(*v),
        Variant::Int32(v) => Lib::Int32(*v),
        Variant::UInt32(v) => Lib::UInt32(*v),
        Variant::Int64(v) => Lib::Int64(*v),
        Variant::UInt64(v) => Lib::UInt64(*v),
        Variant::Float(v) => Lib::Float(*v),
        Variant::Double(v) => Lib::Double(*v),
        Variant::String(v) => Lib::String(opcua::types::UAString::from(v.as_str())),
        Variant::DateTime(v) => Lib::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        Variant::SByteArray(values) => array_of(
            VariantTypeId::SByte,
            values.iter().map(|v| Lib::SByte(*v)).collect(),
        ),
        Variant::ByteArray(values) => array_of(
            VariantTypeId::Byte,
            values.iter().map(|v| Lib::Byte(*v)).collect(),
        ),
        Variant::Int16Array(values) => array_of(
            VariantTypeId::Int16,
            values.iter().map(|v| Lib::Int16(*v)).collect(),
        ),
        Variant::UInt16Array(values) => array_of(
            VariantTypeId::UInt16,
            values.iter().map(|v| Lib::UInt16(*v)).collect(),
        ),
        Variant::Int32Array(values) => array_of(
            VariantTypeId::Int32,
            values.iter().map(|v| Lib::Int32(*v)).collect(),
        ),
        Variant::UInt32Array(values) => array_of(
            VariantTypeId::UInt32,
            values.iter().map(|v| Lib::UInt32(*v)).collect(),
        ),
        Variant::Int64Array(values) => array_of(
            VariantTypeId::Int64,
            values.iter().map(|v| Lib::Int64(*v)).collect(),
        ),
        Variant::UInt64Array(values) => array_of(
            VariantTypeId::UInt64,
            values.iter().map(|v| Lib::UInt64(*v)).collect(),
        ),
        Variant::FloatArray(values) => array_of(
            VariantTypeId::Float,
            values.iter().map(|v| Lib::Float(*v)).collect(),
        ),
        Variant::DoubleArray(values) => array_of(
            VariantTypeId::Double,
            values.iter().map(|v| Lib::Double(*v)).collect(),
        ),
        Variant::Array(values) => array_of(
            VariantTypeId::Variant,
            values.iter().map(to_protocol_variant).collect(),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_class_from_mask() {
        assert_eq!(node_class_from_mask(1), NodeClass::Object);
        assert_eq!(node_class_from_mask(2), NodeClass::Variable);
        assert_eq!(node_class_from_mask(0), NodeClass::Unknown);
    }

    #[test]
    fn test_data_type_name_builtin() {
        let double: opcua::types::NodeId = opcua::types::NodeId::new(0, 11u32);
        assert_eq!(data_type_name(&double), "Double");

        let custom = opcua::types::NodeId::new(2, 4711u32);
        assert_eq!(data_type_name(&custom), custom.to_string());
    }

    #[test]
    fn test_variant_round_trip_scalars() {
        for value in [
            Variant::Boolean(true),
            Variant::Int32(-42),
            Variant::Double(3.5),
            Variant::String("pump".to_string()),
        ] {
            let converted = from_protocol_variant(&to_protocol_variant(&value));
            assert_eq!(converted, value);
        }
    }

    #[test]
    fn test_double_array_maps_to_typed_array() {
        let value = Variant::DoubleArray(vec![10.5, -3.2]);
        let converted = from_protocol_variant(&to_protocol_variant(&value));
        assert_eq!(converted, value);
    }
}
