//! Legacy two-channel SSE transport (2024-11-05 flavor).
//!
//! Construction opens a persistent GET whose event stream is the sole source
//! of replies; the first `endpoint` event supplies the relative path used
//! for all outgoing POSTs, each of which is a short-lived connection
//! acknowledged at the HTTP level only. The RPC result arrives later as a
//! data event on the GET stream and is matched by id.
//!
//! Precondition: under concurrent calls sharing the one GET stream,
//! correctness rests entirely on server-side id uniqueness; the POST
//! acknowledgement carries no correlation guarantee of its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header;
use tracing::{debug, warn};
use url::Url;

use crate::correlation::Correlator;
use crate::error::Error;
use crate::protocol::{decode_payload, Message, Notification, Request, RequestId, Response};
use crate::sse::SseParser;
use crate::transport::Transport;

pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Url,
    correlator: Arc<Correlator>,
    reader: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    /// Open the persistent GET stream and wait for the server's `endpoint`
    /// event before returning a usable transport.
    pub async fn connect(base_url: &str) -> Result<Self, Error> {
        let base = Url::parse(base_url).map_err(|e| Error::Transport(format!("invalid url: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;

        let response = client
            .get(base.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("sse get failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http { status, message });
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if content_type != "text/event-stream" {
            return Err(Error::UnexpectedResponse(format!(
                "sse get returned content type {content_type:?}"
            )));
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut parser = SseParser::new();

        // the endpoint event must come before anything else is usable
        let endpoint = wait_for_endpoint(&mut stream, &mut parser).await?;
        let endpoint = base
            .join(&endpoint)
            .map_err(|e| Error::Transport(format!("invalid endpoint path {endpoint:?}: {e}")))?;
        debug!(endpoint = %endpoint, "sse endpoint established");

        let correlator = Arc::new(Correlator::new());
        let reader = tokio::spawn(read_loop(stream, parser, correlator.clone()));

        Ok(Self {
            client,
            endpoint,
            correlator,
            reader,
        })
    }

    /// POST one message to the endpoint path on a short-lived connection.
    /// Only an HTTP-level acknowledgement is expected, never the RPC result.
    async fn post(&self, message: &Message) -> Result<(), Error> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(message.encode()?)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("sse post failed: {e}")))?;
        let status = response.status().as_u16();
        // drain so the connection can be reused or closed cleanly
        let _ = response.bytes().await;
        if !matches!(status, 200 | 202 | 204) {
            return Err(Error::Http {
                status,
                message: "unexpected acknowledgement for sse post".to_string(),
            });
        }
        Ok(())
    }
}

async fn wait_for_endpoint<S, E>(stream: &mut S, parser: &mut SseParser) -> Result<String, Error>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Transport(format!("sse read failed: {e}")))?;
        for event in parser.feed(&chunk) {
            if event.event.as_deref() == Some("endpoint") {
                let path = event.data.trim().to_string();
                if path.is_empty() {
                    return Err(Error::UnexpectedResponse(
                        "endpoint event carried no path".to_string(),
                    ));
                }
                return Ok(path);
            }
            debug!(event = ?event.event, "ignoring pre-endpoint event");
        }
    }
    Err(Error::TransportClosed)
}

/// Sole reader of the long-lived GET stream after the endpoint is known.
async fn read_loop<S, E>(mut stream: S, mut parser: SseParser, correlator: Arc<Correlator>)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "sse stream read failed");
                break;
            }
        };
        for event in parser.feed(&chunk) {
            if event.event.as_deref() == Some("endpoint") {
                // the endpoint is immutable once observed
                warn!("ignoring duplicate endpoint event");
                continue;
            }
            if event.data.is_empty() {
                continue;
            }
            match decode_payload(&event.data) {
                Ok(messages) => {
                    for message in messages {
                        correlator.dispatch(message);
                    }
                }
                Err(e) => warn!(error = %e, "skipping undecodable sse event"),
            }
        }
    }
    correlator.fail_all();
}

#[async_trait]
impl Transport for SseTransport {
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.correlator.next_id())
    }

    async fn send_request(&self, request: Request, timeout: Duration) -> Result<Response, Error> {
        let id = request.id.clone();
        // register before the POST: the reply on the GET stream can race
        // the acknowledgement
        let rx = self.correlator.register(id.clone());
        if let Err(e) = self.post(&Message::Request(request)).await {
            self.correlator.deregister(&id);
            return Err(e);
        }
        self.correlator.await_response(&id, rx, timeout).await
    }

    async fn send_notification(&self, notification: Notification) -> Result<(), Error> {
        self.post(&Message::Notification(notification)).await
    }

    fn take_notifications(&self) -> Vec<Notification> {
        self.correlator.take_notifications()
    }

    async fn close(&self) -> Result<(), Error> {
        self.reader.abort();
        self.correlator.fail_all();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
