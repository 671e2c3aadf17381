//! Streamable HTTP transport.
//!
//! Every message is its own POST exchange: the request body is one encoded
//! JSON-RPC message and the reply is either a single JSON document or an SSE
//! stream that is read until it yields the awaited id. There is no shared
//! inbound stream, so calls are independent; the only state shared across
//! them is the session tracker's single validated id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header;
use tracing::{debug, warn};
use url::Url;

use crate::correlation::Correlator;
use crate::error::Error;
use crate::protocol::{
    decode_payload, Message, Notification, Request, RequestId, Response, LATEST_PROTOCOL_VERSION,
};
use crate::session::{SessionTracker, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use crate::transport::Transport;

const ACCEPT_TYPES: &str = "application/json, text/event-stream";

pub struct HttpStreamableTransport {
    client: reqwest::Client,
    url: Url,
    session: SessionTracker,
    correlator: Arc<Correlator>,
}

impl HttpStreamableTransport {
    /// Creates a transport posting to the given endpoint URL.
    pub fn new(url: &str) -> Result<Self, Error> {
        Self::with_protocol_version(url, LATEST_PROTOCOL_VERSION)
    }

    /// Creates a transport advertising a specific protocol version.
    pub fn with_protocol_version(url: &str, protocol_version: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::Transport(format!("invalid url: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url,
            session: SessionTracker::new(protocol_version),
            correlator: Arc::new(Correlator::new()),
        })
    }

    /// POST one message and run the common response-header checks: the
    /// session id is observed before anything else so a mismatch is fatal
    /// even on an otherwise failed exchange.
    async fn post(&self, message: &Message) -> Result<reqwest::Response, Error> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, ACCEPT_TYPES)
            .header(PROTOCOL_VERSION_HEADER, self.session.protocol_version());
        if let Some(session_id) = self.session.current() {
            request = request.header(SESSION_ID_HEADER, session_id);
        }

        let response = request
            .body(message.encode()?)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("http post failed: {e}")))?;

        self.session.observe(
            response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        )?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http { status, message });
        }
        Ok(response)
    }

    /// Scan messages decoded from a response body: the one matching `id` is
    /// returned, everything else goes through the correlator (notifications
    /// are queued, stray responses dropped).
    fn sift(&self, messages: Vec<Message>, id: &RequestId) -> Option<Response> {
        let mut matched = None;
        for message in messages {
            match message {
                Message::Response(response) if &response.id == id && matched.is_none() => {
                    matched = Some(response);
                }
                other => self.correlator.dispatch(other),
            }
        }
        matched
    }

    async fn exchange(&self, request: Request) -> Result<Response, Error> {
        let id = request.id.clone();
        let response = self.post(&Message::Request(request)).await?;
        self.read_reply(response, &id).await
    }

    /// Recover the awaited response from a successful POST exchange: a JSON
    /// body is decoded whole, an SSE body is read until it yields the id.
    async fn read_reply(
        &self,
        response: reqwest::Response,
        id: &RequestId,
    ) -> Result<Response, Error> {
        let status = response.status().as_u16();
        if status == 202 || status == 204 {
            return Err(Error::UnexpectedResponse(format!(
                "status {status} with no body while awaiting response id {id}"
            )));
        }

        match content_type(&response).as_str() {
            "application/json" => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| Error::Transport(format!("failed to read body: {e}")))?;
                let messages = decode_payload(&body)?;
                self.sift(messages, id).ok_or_else(|| {
                    Error::UnexpectedResponse(format!("body did not contain response id {id}"))
                })
            }
            "text/event-stream" => {
                let mut stream = Box::pin(response.bytes_stream());
                let mut parser = crate::sse::SseParser::new();
                while let Some(chunk) = stream.next().await {
                    let chunk =
                        chunk.map_err(|e| Error::Transport(format!("sse read failed: {e}")))?;
                    for event in parser.feed(&chunk) {
                        if event.data.is_empty() {
                            continue;
                        }
                        let messages = match decode_payload(&event.data) {
                            Ok(messages) => messages,
                            Err(e) => {
                                warn!(error = %e, "skipping undecodable sse event");
                                continue;
                            }
                        };
                        if let Some(matched) = self.sift(messages, id) {
                            // dropping the stream closes the connection
                            return Ok(matched);
                        }
                    }
                }
                debug!(%id, "sse response stream ended without awaited id");
                Err(Error::TransportClosed)
            }
            other => Err(Error::UnexpectedResponse(format!(
                "unsupported content type {other:?}"
            ))),
        }
    }
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
impl Transport for HttpStreamableTransport {
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.correlator.next_id())
    }

    async fn send_request(&self, request: Request, timeout: Duration) -> Result<Response, Error> {
        match tokio::time::timeout(timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn send_notification(&self, notification: Notification) -> Result<(), Error> {
        let response = self.post(&Message::Notification(notification)).await?;
        // 202/204 or any success acknowledges a notification; drain the body
        let _ = response.bytes().await;
        Ok(())
    }

    fn take_notifications(&self) -> Vec<Notification> {
        self.correlator.take_notifications()
    }

    async fn close(&self) -> Result<(), Error> {
        // connections are per-call; nothing persistent to tear down
        Ok(())
    }
}
