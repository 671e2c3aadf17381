//! Request/response correlation.
//!
//! Every transport owns one [`Correlator`]: it issues the instance's request
//! ids, holds the pending waits keyed by id, and demultiplexes inbound
//! messages that may arrive out of order or batched. Responses resolve the
//! matching pending wait; notifications are queued in arrival order for
//! later inspection; responses with no pending wait are orphans and are
//! dropped with a debug log.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::Error;
use crate::protocol::{Message, Notification, RequestId, Response};

#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Response>>>,
    notifications: Mutex<VecDeque<Notification>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            notifications: Mutex::new(VecDeque::new()),
        }
    }

    /// Issue the next request id: strictly increasing from 1, never reused
    /// within this instance's lifetime.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a pending wait for the given id before the request is sent,
    /// so a reply racing the send cannot be missed.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        if pending.insert(id.clone(), tx).is_some() {
            warn!(%id, "replaced pending wait with duplicate id");
        }
        rx
    }

    /// Drop the pending wait for an id, if still present.
    pub fn deregister(&self, id: &RequestId) {
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .remove(id);
    }

    /// Route one inbound message.
    pub fn dispatch(&self, message: Message) {
        match message {
            Message::Response(response) => {
                let sender = self
                    .pending
                    .lock()
                    .expect("pending lock poisoned")
                    .remove(&response.id);
                match sender {
                    Some(tx) => {
                        // receiver may have timed out between lookup and send
                        if let Err(orphan) = tx.send(response) {
                            debug!(id = %orphan.id, "dropping response for abandoned wait");
                        }
                    }
                    None => debug!(id = %response.id, "dropping orphan response"),
                }
            }
            Message::Notification(notification) => {
                self.notifications
                    .lock()
                    .expect("notification lock poisoned")
                    .push_back(notification);
            }
            Message::Request(request) => {
                // server-to-client requests are outside this harness's contract
                warn!(method = %request.method, "ignoring server-initiated request");
            }
        }
    }

    /// Await the response for a previously registered wait.
    ///
    /// On timeout the wait is removed, so a late reply becomes an orphan; a
    /// dropped sender (reader task ended) surfaces as `TransportClosed`.
    pub async fn await_response(
        &self,
        id: &RequestId,
        rx: oneshot::Receiver<Response>,
        timeout: Duration,
    ) -> Result<Response, Error> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::TransportClosed),
            Err(_) => {
                self.deregister(id);
                Err(Error::Timeout)
            }
        }
    }

    /// Drain queued notifications in arrival order.
    pub fn take_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("notification lock poisoned")
            .drain(..)
            .collect()
    }

    /// Fail every pending wait; called when the inbound stream closes.
    /// Dropping the senders makes each waiter observe `TransportClosed`.
    pub fn fail_all(&self) {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        if !pending.is_empty() {
            debug!(count = pending.len(), "failing pending waits on close");
        }
        pending.clear();
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(id: i64) -> Response {
        Response::success(RequestId::Number(id), Some(json!({ "id": id })))
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let correlator = Correlator::new();
        let ids: Vec<i64> = (0..100).map(|_| correlator.next_id()).collect();
        assert_eq!(ids[0], 1);
        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let correlator = Correlator::new();
        let waits: Vec<_> = (1..=3)
            .map(|n| {
                let id = RequestId::Number(n);
                (id.clone(), correlator.register(id))
            })
            .collect();

        // replies arrive 3, 1, 2
        for n in [3, 1, 2] {
            correlator.dispatch(Message::Response(response(n)));
        }

        for (id, rx) in waits {
            let resolved = correlator
                .await_response(&id, rx, Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(resolved.id, id);
        }
    }

    #[tokio::test]
    async fn test_notifications_queued_in_order() {
        let correlator = Correlator::new();
        correlator.dispatch(Message::Notification(Notification::new("notifications/a", None)));
        correlator.dispatch(Message::Notification(Notification::new("notifications/b", None)));

        let drained = correlator.take_notifications();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].method, "notifications/a");
        assert_eq!(drained[1].method, "notifications/b");
        assert!(correlator.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_wait() {
        let correlator = Correlator::new();
        let id = RequestId::Number(1);
        let rx = correlator.register(id.clone());

        let started = std::time::Instant::now();
        let err = correlator
            .await_response(&id, rx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(correlator.pending_len(), 0);

        // a late reply is now an orphan, silently dropped
        correlator.dispatch(Message::Response(response(1)));
        assert!(correlator.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_fail_all_surfaces_transport_closed() {
        let correlator = Correlator::new();
        let id = RequestId::Number(1);
        let rx = correlator.register(id.clone());
        correlator.fail_all();

        let err = correlator
            .await_response(&id, rx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    #[tokio::test]
    async fn test_orphan_response_is_dropped() {
        let correlator = Correlator::new();
        // no wait registered; must not panic or queue anything
        correlator.dispatch(Message::Response(response(9)));
        assert!(correlator.take_notifications().is_empty());
    }
}
