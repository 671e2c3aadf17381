use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Client or server implementation information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation
    pub name: String,
    /// Version of the implementation
    pub version: String,
}

/// Client capabilities advertised during the handshake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities that the client supports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Server capabilities returned by `initialize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Present if the server supports sending log messages to the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    /// Present if the server offers any tools to call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Present if the server offers any resources to read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// `initialize` response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server settled on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    /// What the server can do
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Implementation>,
}

/// A tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub schema: Value,
}

/// `tools/list` response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Content item inside a tool-call result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: Option<String>,
    },
}

/// `tools/call` response payload.
///
/// `is_error` signals a tool-level failure: the call reached the server and
/// executed, but the tool's own logic failed. That is independent of a
/// protocol-level error Response, and callers must check both layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Ordered sequence of typed content items
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// True when the tool itself failed
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// First text content item, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            ToolContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Parse the first text content item as an embedded JSON document,
    /// which is how the knowledge-graph server returns its logical payload.
    pub fn text_json(&self) -> Result<Value, Error> {
        let text = self.text().ok_or_else(|| {
            Error::UnexpectedResponse("no text content in tool result".to_string())
        })?;
        Ok(serde_json::from_str(text)?)
    }
}
