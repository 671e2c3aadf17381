use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, ErrorCode};

/// Protocol version sent by the stdio and streamable-HTTP transports.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol version pinned by the legacy two-channel SSE transport.
pub const SSE_PROTOCOL_VERSION: &str = "2024-11-05";

/// List of all protocol versions this client can speak, most recent first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &[LATEST_PROTOCOL_VERSION, "2025-03-26", SSE_PROTOCOL_VERSION];

/// JSON-RPC version used by the MCP protocol
pub const JSONRPC_VERSION: &str = "2.0";

/// A unique identifier for a request
///
/// Identifiers issued by this client are always numeric and strictly
/// increasing, but the wire format also allows string ids, so both are
/// accepted on decode. Correlation uses equality only, never ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String representation of the request ID
    String(String),
    /// Numeric representation of the request ID
    Number(i64),
}

/// Base JSON-RPC request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Name of the method to be invoked
    pub method: String,
    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Unique identifier for the request
    pub id: RequestId,
}

/// Base JSON-RPC notification structure
///
/// Same shape as a request but without an id; never awaited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Name of the method to be invoked
    pub method: String,
    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Base JSON-RPC response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// ID of the request this response corresponds to
    pub id: RequestId,
    /// The result of a successful request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error object if the request failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// The error code
    pub code: i32,
    /// A short description of the error
    pub message: String,
    /// Additional information about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any JSON-RPC message that can appear on the wire.
///
/// Variant order matters for untagged deserialization: a Request requires
/// both `id` and `method`, a Response requires `id`, a Notification requires
/// only `method`, so trying them in that order classifies objects by the
/// presence of `id` exactly as the protocol prescribes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A request expecting a correlated response
    Request(Request),
    /// A response carrying a result or an error object
    Response(Response),
    /// A one-way notification, never awaited
    Notification(Notification),
}

impl Message {
    /// The message id, if the message carries one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Response(r) => Some(&r.id),
            Message::Notification(_) => None,
        }
    }

    /// Encode the message as a single JSON document.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    fn jsonrpc(&self) -> &str {
        match self {
            Message::Request(r) => &r.jsonrpc,
            Message::Response(r) => &r.jsonrpc,
            Message::Notification(n) => &n.jsonrpc,
        }
    }
}

/// Decode a wire payload that holds either a single message or a batch array.
///
/// Line-delimited transports hand whole lines here; SSE transports hand the
/// accumulated data of one event. Fails with [`Error::MalformedMessage`] when
/// the payload is not valid JSON, does not deserialize as JSON-RPC, or lacks
/// the `jsonrpc: "2.0"` discriminant.
pub fn decode_payload(payload: &str) -> Result<Vec<Message>, Error> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::MalformedMessage(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut messages = Vec::with_capacity(items.len());
    for item in items {
        let message: Message = serde_json::from_value(item)
            .map_err(|e| Error::MalformedMessage(format!("not a JSON-RPC message: {e}")))?;
        if message.jsonrpc() != JSONRPC_VERSION {
            return Err(Error::MalformedMessage(format!(
                "unsupported jsonrpc version {:?}",
                message.jsonrpc()
            )));
        }
        messages.push(message);
    }
    Ok(messages)
}

/// Decode a payload that must contain exactly one message.
pub fn decode_message(payload: &str) -> Result<Message, Error> {
    let mut messages = decode_payload(payload)?;
    if messages.len() != 1 {
        return Err(Error::MalformedMessage(format!(
            "expected a single message, got {}",
            messages.len()
        )));
    }
    Ok(messages.remove(0))
}

impl Request {
    /// Creates a new Request with the given method, params and id.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl Notification {
    /// Creates a new Notification with the given method and params.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl Response {
    /// Creates a new successful Response.
    pub fn success(id: RequestId, result: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error: None,
        }
    }

    /// Creates a new error Response.
    pub fn error(id: RequestId, error: ResponseError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// True when this response carries an error object and no result.
    pub fn is_error(&self) -> bool {
        self.error.is_some() && self.result.is_none()
    }

    /// Consume the response, mapping a JSON-RPC error object to
    /// [`Error::Protocol`] and an absent result to an internal error.
    pub fn into_result(self) -> Result<Value, Error> {
        if let Some(error) = self.error {
            return Err(Error::Protocol {
                code: ErrorCode::from(error.code),
                message: error.message,
                data: error.data,
            });
        }
        self.result
            .ok_or_else(|| Error::protocol(ErrorCode::InternalError, "response missing result"))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_creation() {
        let id = RequestId::Number(1);
        let params = Some(json!({"key": "value"}));
        let request = Request::new("tools/list", params.clone(), id.clone());

        assert_eq!(request.jsonrpc, JSONRPC_VERSION);
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.params, params);
        assert_eq!(request.id, id);
    }

    #[test]
    fn test_encode_request() {
        let request = Request::new("initialize", Some(json!({})), RequestId::Number(1));
        let encoded = Message::Request(request).encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 1);
        assert_eq!(value["method"], "initialize");
    }

    #[test]
    fn test_decode_classifies_by_id_and_method() {
        let msgs = decode_payload(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#).unwrap();
        assert!(matches!(&msgs[0], Message::Request(r) if r.id == RequestId::Number(7)));

        let msgs = decode_payload(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#).unwrap();
        assert!(matches!(&msgs[0], Message::Response(r) if !r.is_error()));

        let msgs =
            decode_payload(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#).unwrap();
        assert!(
            matches!(&msgs[0], Message::Notification(n) if n.method == "notifications/progress")
        );
    }

    #[test]
    fn test_decode_error_response() {
        let msgs = decode_payload(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"bad params"}}"#,
        )
        .unwrap();
        match &msgs[0] {
            Message::Response(r) => {
                assert!(r.is_error());
                let err = r.clone().into_result().unwrap_err();
                assert!(matches!(
                    err,
                    Error::Protocol {
                        code: ErrorCode::InvalidParams,
                        ..
                    }
                ));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_batch() {
        let line = r#"[{"jsonrpc":"2.0","id":1,"result":{}},{"jsonrpc":"2.0","method":"notifications/x"}]"#;
        let msgs = decode_payload(line).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(&msgs[0], Message::Response(_)));
        assert!(matches!(&msgs[1], Message::Notification(_)));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode_payload("not json"),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_jsonrpc() {
        assert!(matches!(
            decode_payload(r#"{"id":1,"method":"x"}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            decode_payload(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_message_rejects_batch() {
        let line = r#"[{"jsonrpc":"2.0","id":1,"result":{}},{"jsonrpc":"2.0","id":2,"result":{}}]"#;
        assert!(matches!(
            decode_message(line),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_request_id_display_and_equality() {
        assert_eq!(RequestId::Number(42).to_string(), "42");
        assert_eq!(RequestId::String("abc".into()).to_string(), "abc");
        assert_ne!(RequestId::Number(1), RequestId::String("1".into()));
    }

    #[test]
    fn test_protocol_versions() {
        assert!(SUPPORTED_PROTOCOL_VERSIONS.contains(&LATEST_PROTOCOL_VERSION));
        assert!(SUPPORTED_PROTOCOL_VERSIONS.contains(&SSE_PROTOCOL_VERSION));
        assert_eq!(JSONRPC_VERSION, "2.0");
    }
}
