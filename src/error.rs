use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error codes used by the MCP protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received (-32700)
    ParseError,
    /// The JSON sent is not a valid request object (-32600)
    InvalidRequest,
    /// The method does not exist or is not available (-32601)
    MethodNotFound,
    /// Invalid method parameters (-32602)
    InvalidParams,
    /// Internal JSON-RPC error (-32603)
    InternalError,
    /// The server has not completed initialization (-32002)
    ServerNotInitialized,
    /// Unknown error code (-32001)
    UnknownErrorCode,
    /// The request failed on the server (-32000)
    RequestFailed,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerNotInitialized => -32002,
            ErrorCode::UnknownErrorCode => -32001,
            ErrorCode::RequestFailed => -32000,
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32002 => ErrorCode::ServerNotInitialized,
            -32000 => ErrorCode::RequestFailed,
            _ => ErrorCode::UnknownErrorCode,
        }
    }
}

/// Errors surfaced by the client and transport layers.
///
/// Transport failures (`Timeout`, `TransportClosed`, `UnexpectedResponse`,
/// `SessionMismatch`, ...) and protocol-level errors (`Protocol`) are kept as
/// distinct variants and never conflated. Tool-level failures are *not*
/// errors at this layer: a Response whose `result.isError` is true still
/// decodes successfully and is reported through
/// [`CallToolResult::is_error`](crate::types::CallToolResult).
#[derive(Debug, Error)]
pub enum Error {
    /// No matching response arrived before the caller's deadline
    #[error("timed out waiting for response")]
    Timeout,
    /// The underlying stream or channel ended while a reply was outstanding
    #[error("transport closed")]
    TransportClosed,
    /// The server replied with something the protocol does not allow here
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// The server-assigned session id changed mid-lifetime
    #[error("session id changed: expected {expected}, got {actual}")]
    SessionMismatch { expected: String, actual: String },
    /// Payload is not valid JSON-RPC (bad JSON or missing `jsonrpc` field)
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// Non-success HTTP status from the server
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },
    /// A JSON-RPC error object carried in a Response
    #[error("protocol error ({code:?}): {message}")]
    Protocol {
        code: ErrorCode,
        message: String,
        data: Option<Value>,
    },
    /// A tool call or notification was issued before the handshake completed
    #[error("client is not initialized")]
    NotInitialized,
    /// `initialize` was called from a state other than Uninitialized
    #[error("client is already initialized or initializing")]
    AlreadyInitialized,
    /// Transport-level failure that does not fit a more specific variant
    #[error("transport error: {0}")]
    Transport(String),
    /// Serialization/deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a protocol error with the given code and message.
    pub fn protocol(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Protocol {
            code,
            message: message.into(),
            data: None,
        }
    }
}
