//! Session identifier tracking for the HTTP-based transports.
//!
//! The server assigns an opaque session id in the `Mcp-Session-Id` response
//! header. It is recorded on first sight and must stay constant for the
//! lifetime of the client instance; a later differing value is a protocol
//! integrity violation and is never silently resolved.

use std::sync::Mutex;

use tracing::debug;

use crate::error::Error;

/// Wire name of the session id header.
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Wire name of the protocol version header.
pub const PROTOCOL_VERSION_HEADER: &str = "Mcp-Protocol-Version";

#[derive(Debug)]
pub struct SessionTracker {
    id: Mutex<Option<String>>,
    protocol_version: String,
}

impl SessionTracker {
    /// Create a tracker with no recorded session and a fixed protocol version.
    pub fn new(protocol_version: impl Into<String>) -> Self {
        Self {
            id: Mutex::new(None),
            protocol_version: protocol_version.into(),
        }
    }

    /// Record or validate a session id from a response header.
    ///
    /// Absent or empty values are ignored; the first non-empty value is
    /// recorded; any subsequent differing value fails with
    /// [`Error::SessionMismatch`].
    pub fn observe(&self, header: Option<&str>) -> Result<(), Error> {
        let Some(value) = header.filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let mut id = self.id.lock().expect("session lock poisoned");
        match id.as_deref() {
            None => {
                debug!(session_id = value, "recorded server session id");
                *id = Some(value.to_string());
                Ok(())
            }
            Some(existing) if existing == value => Ok(()),
            Some(existing) => Err(Error::SessionMismatch {
                expected: existing.to_string(),
                actual: value.to_string(),
            }),
        }
    }

    /// The recorded session id, absent until the first reply carries one.
    pub fn current(&self) -> Option<String> {
        self.id.lock().expect("session lock poisoned").clone()
    }

    /// The protocol version advertised in every outgoing request.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absent_before_first_observation() {
        let tracker = SessionTracker::new("2025-06-18");
        assert_eq!(tracker.current(), None);
        tracker.observe(None).unwrap();
        tracker.observe(Some("")).unwrap();
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_recorded_once_and_stable() {
        let tracker = SessionTracker::new("2025-06-18");
        tracker.observe(Some("sess-1")).unwrap();
        assert_eq!(tracker.current().as_deref(), Some("sess-1"));
        tracker.observe(Some("sess-1")).unwrap();
        tracker.observe(None).unwrap();
        assert_eq!(tracker.current().as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_mismatch_is_fatal() {
        let tracker = SessionTracker::new("2025-06-18");
        tracker.observe(Some("A")).unwrap();
        let err = tracker.observe(Some("B")).unwrap_err();
        match err {
            Error::SessionMismatch { expected, actual } => {
                assert_eq!(expected, "A");
                assert_eq!(actual, "B");
            }
            other => panic!("expected SessionMismatch, got {:?}", other),
        }
        // original value is kept
        assert_eq!(tracker.current().as_deref(), Some("A"));
    }
}
