//! Single-source event relay over an unbounded channel.
//!
//! The transport owns the sending half and the [`EventBus`](crate::event_bus::EventBus)
//! pump owns the receiving half, so push frames cross from the connection's
//! callback world into the dashboard's turn-based world without shared state.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// How often [`Relay::closed`] looks at the receiving side.
pub const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Type-safe event relay.
///
/// Relays follow the `{source}_{event}_relay` naming pattern, e.g.
/// `frame_received_relay` for frames handed over by the push transport.
///
/// ```rust,ignore
/// let (frame_received_relay, mut frame_stream) = relay::<SseFrame>();
/// transport.subscribe_push(frame_received_relay);
///
/// while let Some(frame) = frame_stream.next().await {
///     bus.dispatch_frame(&frame);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: UnboundedSender<T>,
    #[cfg(debug_assertions)]
    emit_location: Arc<OnceLock<&'static std::panic::Location<'static>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// The receiving side has been dropped (bus disconnected).
    ChannelClosed,
    /// Relay send called from multiple locations (debug builds only)
    #[cfg(debug_assertions)]
    MultipleEmitters {
        previous: &'static std::panic::Location<'static>,
        current: &'static std::panic::Location<'static>,
    },
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (
            Relay {
                sender,
                #[cfg(debug_assertions)]
                emit_location: Arc::new(OnceLock::new()),
            },
            receiver,
        )
    }

    #[cfg(debug_assertions)]
    #[track_caller]
    fn check_single_source(&self) -> Result<(), RelayError> {
        let caller = std::panic::Location::caller();
        match self.emit_location.set(caller) {
            Ok(()) => Ok(()),
            Err(previous) if previous == caller => Ok(()),
            Err(previous) => Err(RelayError::MultipleEmitters {
                previous,
                current: caller,
            }),
        }
    }

    /// Send, silently dropping the value if nobody is listening anymore.
    #[track_caller]
    pub fn send(&self, value: T) {
        #[cfg(debug_assertions)]
        if let Err(e) = self.check_single_source() {
            panic!("{:?}", e);
        }

        let _ = self.sender.unbounded_send(value);
    }

    /// Send and report whether the receiving side is still alive.
    ///
    /// Push transports use this to stop reading the connection once the bus
    /// has disconnected.
    #[track_caller]
    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        #[cfg(debug_assertions)]
        self.check_single_source()?;

        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the receiving side is gone, so a reader blocked on an
    /// idle connection can be raced against it.
    pub async fn closed(&self) {
        while !self.is_closed() {
            tokio::time::sleep(CLOSE_CHECK_INTERVAL).await;
        }
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A disconnected relay; everything sent into it is discarded.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Relay::new()
}
