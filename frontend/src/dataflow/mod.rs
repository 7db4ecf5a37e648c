//! Channel primitives used to move events between independent sources.

pub mod relay;

pub use relay::{Relay, RelayError, relay};
