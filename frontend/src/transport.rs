//! Request/response and push primitives the dashboard runs on.
//!
//! Implementations own the wire: the HTTP client in the binary, a scripted
//! fake in tests. Everything here runs on one thread, so futures carry no
//! `Send` bound.

use serde_json::Value;
use shared::{ActionOutcome, SseFrame};

use crate::dataflow::Relay;
use crate::error::{DashboardError, TransportError};

/// Wrapper fields a collection endpoint may put its list under.
const LIST_WRAPPERS: [&str; 2] = ["items", "executions"];

#[allow(async_fn_in_trait)]
pub trait Transport: 'static {
    async fn fetch_json(&self, path: &str) -> Result<Value, TransportError>;

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError>;

    async fn delete(&self, path: &str) -> Result<Value, TransportError>;

    /// Open the shared push channel. Every decoded frame goes into
    /// `frame_received_relay`; the transport reconnects on its own and stops
    /// once the relay reports the receiving side closed.
    fn subscribe_push(&self, frame_received_relay: Relay<SseFrame>);

    /// GET a possibly-partial snapshot.
    async fn fetch_collection(&self, path: &str) -> Result<Vec<Value>, DashboardError> {
        let payload = self.fetch_json(path).await?;
        collection_records(path, payload)
    }

    async fn submit_action(&self, path: &str, body: Value) -> Result<ActionOutcome, DashboardError> {
        let payload = self.post_json(path, body).await?;
        if payload.is_null() {
            return Ok(ActionOutcome::default());
        }
        serde_json::from_value(payload).map_err(|e| DashboardError::malformed(path, e))
    }
}

/// Accept a bare array or an object wrapping one.
pub fn collection_records(origin: &str, payload: Value) -> Result<Vec<Value>, DashboardError> {
    match payload {
        Value::Array(records) => Ok(records),
        Value::Object(mut wrapper) => LIST_WRAPPERS
            .iter()
            .find_map(|field| match wrapper.remove(*field) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| DashboardError::malformed(origin, "expected a JSON array")),
        _ => Err(DashboardError::malformed(origin, "expected a JSON array")),
    }
}
