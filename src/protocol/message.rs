//! Messages exchanged with the device controller.
//!
//! Both directions use externally tagged enums encoded as MessagePack with
//! named fields: unit variants travel as their tag string, variants carrying
//! data as a one-entry map `{tag: payload}`. The tag set is closed; inbound
//! envelopes with a tag this client does not know are reported, not dropped
//! silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;

/// Version of the envelope tag set spoken by this client.
pub const PROTOCOL_VERSION: u32 = 1;

/// Log event forwarded by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Integer severity (FATAL=100 … TRACE=600).
    pub level: i32,
    pub time_millis: i64,
    /// Fully formatted message text.
    pub message: String,
    pub logger_name: String,
}

/// One row of a device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    pub id: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub build_id: Option<String>,
    pub is_connected: bool,
}

/// Messages sent FROM the controller TO this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A log event to append to the buffer.
    LogEvent(LogEvent),
    /// Answer to `DeviceListRequest`.
    DeviceListResponse {
        #[serde(rename = "deviceList")]
        device_list: Vec<DeviceData>,
    },
    /// The controller asks the operator for one line of input.
    ConsoleRequest { request: String },
    /// The controller ended a dialog started by `add sink` / `add task`.
    SwitchToNonInteractiveRequest,
}

impl ServerMessage {
    /// Tags of every inbound message this client understands.
    pub const TAGS: [&'static str; 4] = [
        "LogEvent",
        "DeviceListResponse",
        "ConsoleRequest",
        "SwitchToNonInteractiveRequest",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ServerMessage::LogEvent(_) => "LogEvent",
            ServerMessage::DeviceListResponse { .. } => "DeviceListResponse",
            ServerMessage::ConsoleRequest { .. } => "ConsoleRequest",
            ServerMessage::SwitchToNonInteractiveRequest => "SwitchToNonInteractiveRequest",
        }
    }
}

/// Messages sent FROM this client TO the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request the list of known devices.
    DeviceListRequest,
    /// Enter the configuration dialog of one device.
    ConfigDeviceRequest {
        #[serde(rename = "deviceId")]
        device_id: i32,
    },
    /// Leave the configuration dialog.
    EndConfigureDeviceRequest,
    /// Start the server-driven dialog adding a sink.
    AddSinkRequest,
    RemoveSinkRequest { id: i32 },
    /// Start the server-driven dialog adding a task.
    AddTaskRequest,
    RemoveTaskRequest { id: i32 },
    RemoveDeviceRequest,
    /// Assign a new numeric id to the configured device.
    SetIdRequest { id: i32 },
    SetDescriptionRequest { description: String },
    DeviceResetRequest,
    /// Operator answer to a `ConsoleRequest`.
    ConsoleResponse { response: String },
}

impl ClientMessage {
    /// Human readable operation name, used in error messages.
    pub fn operation(&self) -> &'static str {
        match self {
            ClientMessage::DeviceListRequest => "device list request",
            ClientMessage::ConfigDeviceRequest { .. } => "config device request",
            ClientMessage::EndConfigureDeviceRequest => "end configure device request",
            ClientMessage::AddSinkRequest => "add sink request",
            ClientMessage::RemoveSinkRequest { .. } => "remove sink request",
            ClientMessage::AddTaskRequest => "add task request",
            ClientMessage::RemoveTaskRequest { .. } => "remove task request",
            ClientMessage::RemoveDeviceRequest => "remove device request",
            ClientMessage::SetIdRequest { .. } => "set id request",
            ClientMessage::SetDescriptionRequest { .. } => "set description request",
            ClientMessage::DeviceResetRequest => "device reset request",
            ClientMessage::ConsoleResponse { .. } => "console response",
        }
    }
}

/// Result of decoding one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ServerMessage),
    /// A well-formed envelope whose tag is not part of the inbound set.
    Unhandled(String),
}

/// Serializes a message body (without the length prefix).
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(rmp_serde::to_vec_named(message)?)
}

/// Decodes an inbound envelope body.
///
/// The body is first read as a self-describing value so the tag can be
/// inspected before committing to a variant.
pub fn decode(body: &[u8]) -> Result<Inbound, ProtocolError> {
    let value: Value = rmp_serde::from_slice(body)?;
    let tag = envelope_tag(&value).ok_or(ProtocolError::MissingTag)?;
    if !ServerMessage::TAGS.contains(&tag.as_str()) {
        return Ok(Inbound::Unhandled(tag));
    }
    serde_json::from_value::<ServerMessage>(value)
        .map(Inbound::Message)
        .map_err(|source| ProtocolError::Payload { tag, source })
}

fn envelope_tag(value: &Value) -> Option<String> {
    match value {
        Value::String(tag) => Some(tag.clone()),
        Value::Object(map) if map.len() == 1 => map.keys().next().cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn decodes_log_event() {
        let event = ServerMessage::LogEvent(LogEvent {
            level: 400,
            time_millis: 1_700_000_000_000,
            message: "boot complete".to_string(),
            logger_name: "core".to_string(),
        });
        let body = encode(&event).unwrap();
        assert_eq!(decode(&body).unwrap(), Inbound::Message(event));
    }

    #[test]
    fn decodes_unit_and_struct_variants() {
        let release = encode(&ServerMessage::SwitchToNonInteractiveRequest).unwrap();
        assert_eq!(
            decode(&release).unwrap(),
            Inbound::Message(ServerMessage::SwitchToNonInteractiveRequest)
        );

        let list = ServerMessage::DeviceListResponse {
            device_list: vec![DeviceData {
                id: 3,
                description: None,
                build_id: Some("b42".to_string()),
                is_connected: true,
            }],
        };
        let body = encode(&list).unwrap();
        assert_eq!(decode(&body).unwrap(), Inbound::Message(list));
    }

    #[test]
    fn unknown_tags_are_reported_not_rejected() {
        let mut map = BTreeMap::new();
        map.insert("FirmwareUpdateNotice", BTreeMap::from([("version", 7)]));
        let body = rmp_serde::to_vec_named(&map).unwrap();
        assert_eq!(
            decode(&body).unwrap(),
            Inbound::Unhandled("FirmwareUpdateNotice".to_string())
        );

        let body = rmp_serde::to_vec_named("Heartbeat").unwrap();
        assert_eq!(decode(&body).unwrap(), Inbound::Unhandled("Heartbeat".to_string()));
    }

    #[test]
    fn malformed_known_payload_is_an_error() {
        let mut map = BTreeMap::new();
        map.insert("ConsoleRequest", BTreeMap::from([("prompt", 1)]));
        let body = rmp_serde::to_vec_named(&map).unwrap();
        assert!(matches!(
            decode(&body),
            Err(ProtocolError::Payload { ref tag, .. }) if tag == "ConsoleRequest"
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(decode(&[0xc1]).is_err());
        let body = rmp_serde::to_vec_named(&vec![1, 2, 3]).unwrap();
        assert!(matches!(decode(&body), Err(ProtocolError::MissingTag)));
    }

    #[test]
    fn client_messages_use_camel_case_fields() {
        let body = encode(&ClientMessage::ConfigDeviceRequest { device_id: 12 }).unwrap();
        let value: Value = rmp_serde::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"ConfigDeviceRequest": {"deviceId": 12}}));

        let body = encode(&ClientMessage::AddSinkRequest).unwrap();
        let value: Value = rmp_serde::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!("AddSinkRequest"));
    }
}
