use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_revision, Revision, SteveError, SteveResult, WatchKey};

/// Server -> client frame as it arrives on the socket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawServerFrame {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub revision: Option<Value>,
}

/// Decoded server message; one variant per handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Start(WatchKey),
    Error { key: WatchKey, reason: String },
    Stop(WatchKey),
    Create { key: WatchKey, data: Value, revision: Option<Revision> },
    Change { key: WatchKey, data: Value, revision: Option<Revision> },
    Remove { key: WatchKey, data: Value, revision: Option<Revision> },
    Ping,
}

impl ServerMessage {
    pub fn parse(raw: &str) -> SteveResult<ServerMessage> {
        let frame: RawServerFrame = serde_json::from_str(raw)?;
        ServerMessage::from_frame(frame)
    }

    pub fn from_frame(frame: RawServerFrame) -> SteveResult<ServerMessage> {
        let data = frame.data.unwrap_or(Value::Null);
        let resource_type = frame
            .resource_type
            .or_else(|| data.get("type").and_then(|v| v.as_str()).map(|s| s.to_string()))
            .unwrap_or_default();
        let key = WatchKey {
            resource_type,
            namespace: frame.namespace,
            id: frame.id,
            selector: frame.selector,
        };
        let revision = frame.revision.as_ref().and_then(parse_revision);
        let name = frame.name.as_str();
        if name == "ping" {
            return Ok(ServerMessage::Ping);
        }
        // Dotless names are malformed server output; treat them as a change.
        let name = if name.contains('.') { name } else { "resource.change" };
        match name {
            "resource.start" => Ok(ServerMessage::Start(key)),
            "resource.error" => Ok(ServerMessage::Error { key, reason: frame.reason.unwrap_or_default() }),
            "resource.stop" => Ok(ServerMessage::Stop(key)),
            "resource.create" => Ok(ServerMessage::Create { key, data, revision }),
            "resource.change" => Ok(ServerMessage::Change { key, data, revision }),
            "resource.remove" => Ok(ServerMessage::Remove { key, data, revision }),
            other => Err(SteveError::Decode(format!("unknown message name: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Start(_) => "resource.start",
            ServerMessage::Error { .. } => "resource.error",
            ServerMessage::Stop(_) => "resource.stop",
            ServerMessage::Create { .. } => "resource.create",
            ServerMessage::Change { .. } => "resource.change",
            ServerMessage::Remove { .. } => "resource.remove",
            ServerMessage::Ping => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_lifecycle_messages() {
        let m = ServerMessage::parse(r#"{"name":"resource.start","resourceType":"pod","namespace":"ns"}"#).unwrap();
        assert_eq!(
            m,
            ServerMessage::Start(WatchKey { resource_type: "pod".into(), namespace: Some("ns".into()), ..Default::default() })
        );
        let m = ServerMessage::parse(r#"{"name":"resource.error","resourceType":"pod","reason":"too old"}"#).unwrap();
        assert!(matches!(m, ServerMessage::Error { ref reason, .. } if reason == "too old"));
        assert_eq!(ServerMessage::parse(r#"{"name":"ping"}"#).unwrap(), ServerMessage::Ping);
    }

    #[test]
    fn resource_events_carry_data_and_revision() {
        let raw = json!({
            "name": "resource.create",
            "resourceType": "pod",
            "revision": "17",
            "data": { "id": "ns/a", "type": "pod", "metadata": { "name": "a" } }
        });
        match ServerMessage::parse(&raw.to_string()).unwrap() {
            ServerMessage::Create { key, data, revision } => {
                assert_eq!(key.resource_type, "pod");
                assert_eq!(data["id"], "ns/a");
                assert_eq!(revision, Some(17));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dotless_names_fall_back_to_change() {
        let raw = json!({ "name": "bogus", "data": { "id": "x", "type": "node" } });
        match ServerMessage::parse(&raw.to_string()).unwrap() {
            ServerMessage::Change { key, .. } => assert_eq!(key.resource_type, "node"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ServerMessage::parse(r#"{"name":"resource.explode"}"#).is_err());
    }
}
