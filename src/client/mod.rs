//! High-level MCP client operations.
//!
//! The client drives the `uninitialized → initializing → initialized`
//! handshake and exposes the tool surface (`tools/list`, `tools/call`)
//! written once against the [`Transport`] trait, so identical call logic
//! runs unmodified over stdio, streamable HTTP and legacy SSE.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::Error;
use crate::protocol::{Notification, Request, LATEST_PROTOCOL_VERSION};
use crate::transport::{Transport, DEFAULT_REQUEST_TIMEOUT};
use crate::types::{CallToolResult, ClientCapabilities, Implementation, InitializeResult, ListToolsResult};

/// Handshake state of one client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Initializing,
    Initialized,
}

pub struct Client {
    transport: Arc<dyn Transport>,
    info: Implementation,
    capabilities: ClientCapabilities,
    protocol_version: String,
    request_timeout: Duration,
    state: Mutex<ClientState>,
    server: RwLock<Option<InitializeResult>>,
}

impl Client {
    /// Create a client over the given transport with default identity,
    /// protocol version and request timeout.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ClientCapabilities::default(),
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: Mutex::new(ClientState::Uninitialized),
            server: RwLock::new(None),
        }
    }

    /// Override the protocol version offered during the handshake; the
    /// legacy SSE transport pins an older one.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Override the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Current handshake state.
    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// The server's `initialize` result, once the handshake has completed.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.server.read().expect("server lock poisoned").clone()
    }

    /// Perform the `initialize` handshake.
    ///
    /// Only valid while uninitialized. On an error response or transport
    /// failure the client returns to `Uninitialized` and the failure is
    /// surfaced; nothing is queued or retried.
    pub async fn initialize(&self) -> Result<InitializeResult, Error> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state != ClientState::Uninitialized {
                return Err(Error::AlreadyInitialized);
            }
            *state = ClientState::Initializing;
        }

        match self.do_initialize().await {
            Ok(result) => {
                *self.server.write().expect("server lock poisoned") = Some(result.clone());
                *self.state.lock().expect("state lock poisoned") = ClientState::Initialized;
                Ok(result)
            }
            Err(e) => {
                *self.state.lock().expect("state lock poisoned") = ClientState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn do_initialize(&self) -> Result<InitializeResult, Error> {
        let params = json!({
            "protocolVersion": self.protocol_version,
            "clientInfo": self.info,
            "capabilities": self.capabilities,
        });
        debug!(version = %self.protocol_version, "initializing client");
        let value = self.request("initialize", Some(params)).await?;
        let result: InitializeResult = serde_json::from_value(value)?;
        if let Some(server_version) = result.protocol_version.as_deref() {
            if server_version != self.protocol_version {
                warn!(
                    offered = %self.protocol_version,
                    negotiated = %server_version,
                    "server settled on a different protocol version"
                );
            }
        }
        Ok(result)
    }

    /// Send the one-way `notifications/initialized` notification that
    /// completes the handshake. Only valid once initialized.
    pub async fn send_initialized(&self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.transport
            .send_notification(Notification::new(
                "notifications/initialized",
                Some(json!({})),
            ))
            .await
    }

    /// List the tools the server offers.
    pub async fn tools_list(&self) -> Result<ListToolsResult, Error> {
        self.ensure_initialized()?;
        let value = self.request("tools/list", Some(json!({}))).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Invoke a server-side tool by name.
    ///
    /// A returned `Ok` only means the protocol exchange succeeded; callers
    /// must still check [`CallToolResult::is_error`] for tool-level failure.
    pub async fn tools_call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, Error> {
        self.ensure_initialized()?;
        let mut params = json!({ "name": name });
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        let value = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Drain server notifications received so far, in arrival order.
    pub fn take_notifications(&self) -> Vec<Notification> {
        self.transport.take_notifications()
    }

    /// Close the underlying transport.
    pub async fn close(&self) -> Result<(), Error> {
        self.transport.close().await
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.state() != ClientState::Initialized {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        let id = self.transport.next_id();
        let request = Request::new(method, params, id);
        let response = self
            .transport
            .send_request(request, self.request_timeout)
            .await?;
        response.into_result()
    }
}
