//! # mcp-harness
//!
//! A multi-transport MCP client layer for protocol-conformance and
//! performance testing of knowledge-graph MCP servers. The same high-level
//! call logic (`initialize`, `tools/list`, `tools/call`) runs unmodified
//! over three wire shapes:
//!
//! - newline-delimited JSON-RPC over a stdio-style line channel,
//! - Streamable HTTP, where a POST's reply is a single JSON document or an
//!   SSE stream,
//! - the legacy two-channel SSE transport (persistent GET event stream plus
//!   a per-message POST side-channel).
//!
//! Responses are correlated to requests by id, so out-of-order and batched
//! arrivals resolve the right caller; session ids are validated to stay
//! constant for the client's lifetime; the handshake state machine gates
//! tool calls until initialization completes.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_harness::client::Client;
//! use mcp_harness::transport::HttpStreamableTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpStreamableTransport::new("http://localhost:8080/")?;
//!     let client = Client::new(Arc::new(transport));
//!
//!     client.initialize().await?;
//!     client.send_initialized().await?;
//!
//!     let tools = client.tools_list().await?;
//!     println!("server offers {} tools", tools.tools.len());
//!     Ok(())
//! }
//! ```

/// Client module drives the handshake and high-level tool operations
pub mod client;
/// Request/response correlation and notification queueing
pub mod correlation;
/// Error types and handling for the harness
pub mod error;
/// JSON-RPC message types and wire codec
pub mod protocol;
/// Session-id tracking for the HTTP-based transports
pub mod session;
/// Incremental Server-Sent Events frame parser
pub mod sse;
/// Transport layer implementations (stdio, streamable HTTP, legacy SSE)
pub mod transport;
/// MCP payload types for the consumed method surface
pub mod types;

// Re-export commonly used types for convenience
pub use client::{Client, ClientState};
pub use error::{Error, ErrorCode};
pub use protocol::{
    Message, Notification, Request, RequestId, Response, JSONRPC_VERSION, LATEST_PROTOCOL_VERSION,
    SSE_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use transport::{HttpStreamableTransport, SseTransport, StdioTransport, Transport};
pub use types::*;
