//! Line-delimited stdio transport.
//!
//! Speaks newline-delimited JSON-RPC over a pair of line channels, the way a
//! child server process's stdin/stdout are wired up by the caller. Process
//! lifecycle is deliberately out of scope: the caller spawns the server and
//! hands this transport the channels.
//!
//! One background task owns the inbound channel and is the sole reader; each
//! line may decode to a single message or a batched array, and every decoded
//! message is dispatched through the correlator, so concurrent callers with
//! distinct pending ids are resolved regardless of arrival order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::correlation::Correlator;
use crate::error::Error;
use crate::protocol::{decode_payload, Message, Notification, Request, RequestId, Response};
use crate::transport::Transport;

pub struct StdioTransport {
    correlator: Arc<Correlator>,
    write_connection: mpsc::Sender<String>,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    /// Creates a new stdio transport over the given line channels.
    ///
    /// `read` carries one line per receive (a message or a batch array);
    /// `write` accepts one encoded message per send, the channel owner is
    /// expected to append the trailing newline when writing to the process.
    pub fn new(read: mpsc::Receiver<String>, write: mpsc::Sender<String>) -> Self {
        let correlator = Arc::new(Correlator::new());
        let reader = tokio::spawn(read_loop(read, correlator.clone()));
        Self {
            correlator,
            write_connection: write,
            reader,
        }
    }

    async fn write_message(&self, message: Message) -> Result<(), Error> {
        let line = message.encode()?;
        self.write_connection
            .send(line)
            .await
            .map_err(|_| Error::TransportClosed)
    }
}

/// Sole reader of the inbound channel; ends when the channel closes and
/// fails any still-pending waits so callers observe `TransportClosed`.
async fn read_loop(mut read: mpsc::Receiver<String>, correlator: Arc<Correlator>) {
    while let Some(line) = read.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match decode_payload(&line) {
            Ok(messages) => {
                for message in messages {
                    correlator.dispatch(message);
                }
            }
            Err(e) => warn!(error = %e, "discarding undecodable line"),
        }
    }
    correlator.fail_all();
}

#[async_trait]
impl Transport for StdioTransport {
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.correlator.next_id())
    }

    async fn send_request(&self, request: Request, timeout: Duration) -> Result<Response, Error> {
        let id = request.id.clone();
        // register before writing so a fast reply cannot be missed
        let rx = self.correlator.register(id.clone());
        if let Err(e) = self.write_message(Message::Request(request)).await {
            self.correlator.deregister(&id);
            return Err(e);
        }
        self.correlator.await_response(&id, rx, timeout).await
    }

    async fn send_notification(&self, notification: Notification) -> Result<(), Error> {
        self.write_message(Message::Notification(notification))
            .await
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

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
