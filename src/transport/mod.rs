//! Transport layer implementations.
//!
//! Three wire shapes hide behind one trait: newline-delimited JSON over a
//! stdio-style line channel, Streamable HTTP POST exchanges, and the legacy
//! two-channel SSE transport. High-level operations are written once against
//! [`Transport`]; each implementation handles its own framing, correlation
//! and session bookkeeping.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::protocol::{Notification, Request, RequestId, Response};

pub mod http;
pub mod sse;
pub mod stdio;

pub use http::HttpStreamableTransport;
pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Default deadline for a single request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability set shared by all transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Allocate the next request id for this transport instance.
    ///
    /// Ids are strictly increasing and never reused within the instance's
    /// lifetime.
    fn next_id(&self) -> RequestId;

    /// Deliver a request and return the correlated response.
    ///
    /// Blocks (cooperatively) until a response with the request's id arrives
    /// or the deadline elapses, in which case it fails with
    /// [`Error::Timeout`] and the request is not retried.
    async fn send_request(&self, request: Request, timeout: Duration) -> Result<Response, Error>;

    /// Deliver a one-way notification; no reply is awaited.
    async fn send_notification(&self, notification: Notification) -> Result<(), Error>;

    /// Drain notifications received so far, in arrival order.
    fn take_notifications(&self) -> Vec<Notification>;

    /// Close the transport and release its resources.
    async fn close(&self) -> Result<(), Error>;
}
