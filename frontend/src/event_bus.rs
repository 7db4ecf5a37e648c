//! Single shared multiplexer over the push channel.
//!
//! One bus is created by the composition root and handed to every view.
//! Views subscribe per event kind; the bus owns the one transport connection
//! and fans decoded frames out to handlers in registration order.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use futures::StreamExt;
use log::{debug, error, warn};
use shared::{EventKind, PushEvent, SseFrame};
use tokio::task::JoinHandle;

use crate::dataflow::relay;
use crate::transport::Transport;

type Handler = Box<dyn FnMut(&PushEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Subscription {
    token: SubscriptionToken,
    kind: EventKind,
    handler: Rc<RefCell<Handler>>,
}

#[derive(Default)]
struct BusInner {
    subscriptions: Vec<Subscription>,
    next_token: u64,
    pump: Option<JoinHandle<()>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl FnMut(&PushEvent) + 'static,
    ) -> SubscriptionToken {
        let mut inner = self.inner.borrow_mut();
        inner.next_token += 1;
        let token = SubscriptionToken(inner.next_token);
        inner.subscriptions.push(Subscription {
            token,
            kind,
            handler: Rc::new(RefCell::new(Box::new(handler))),
        });
        token
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.token != token);
        inner.subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscriptions.len()
    }

    fn is_subscribed(&self, token: SubscriptionToken) -> bool {
        self.inner
            .borrow()
            .subscriptions
            .iter()
            .any(|s| s.token == token)
    }

    /// Deliver one event to every handler of its kind.
    ///
    /// Handlers may subscribe, unsubscribe or publish while running. A
    /// panicking handler is logged and skipped; the rest still run.
    pub fn publish(&self, event: &PushEvent) {
        let kind = event.kind();
        let handlers: Vec<(SubscriptionToken, Rc<RefCell<Handler>>)> = self
            .inner
            .borrow()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.token, s.handler.clone()))
            .collect();

        for (token, handler) in handlers {
            // Unsubscribed by an earlier handler of this same dispatch
            if !self.is_subscribed(token) {
                continue;
            }
            let Ok(mut handler) = handler.try_borrow_mut() else {
                warn!("Skipping re-entrant {} dispatch into a running handler", kind);
                continue;
            };
            if catch_unwind(AssertUnwindSafe(|| (*handler)(event))).is_err() {
                error!("{} handler panicked; event dropped for this handler", kind);
            }
        }
    }

    /// Decode a raw frame and publish it. Unknown names are ignored and
    /// undecodable payloads never reach a handler.
    pub fn dispatch_frame(&self, frame: &SseFrame) {
        let Some(kind) = EventKind::from_name(&frame.event) else {
            debug!("Ignoring push frame with unknown event '{}'", frame.event);
            return;
        };
        match PushEvent::decode(kind, &frame.data) {
            Ok(event) => self.publish(&event),
            Err(e) => warn!("Dropping malformed {} frame: {}", kind, e),
        }
    }

    /// Open the shared push connection. Only the first call connects; later
    /// calls return false. Must run inside a `tokio::task::LocalSet`.
    pub fn connect<T: Transport>(&self, transport: &T) -> bool {
        if self.is_connected() {
            return false;
        }

        let (frame_received_relay, mut frame_stream) = relay::<SseFrame>();
        transport.subscribe_push(frame_received_relay);

        let bus: Weak<RefCell<BusInner>> = Rc::downgrade(&self.inner);
        let pump = tokio::task::spawn_local(async move {
            while let Some(frame) = frame_stream.next().await {
                let Some(inner) = bus.upgrade() else {
                    break;
                };
                EventBus { inner }.dispatch_frame(&frame);
            }
            debug!("Push pump stopped");
        });
        self.inner.borrow_mut().pump = Some(pump);
        true
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .borrow()
            .pump
            .as_ref()
            .is_some_and(|pump| !pump.is_finished())
    }

    /// Stop the pump. Dropping its receiver closes the relay, which tells the
    /// transport to stop reading.
    pub fn disconnect(&self) {
        let pump = self.inner.borrow_mut().pump.take();
        if let Some(pump) = pump {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, settle};
    use shared::{AUTOMATION_RUN_EVENT, LAUNCHER_STATE_EVENT};
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn recorder(bus: &EventBus, kind: EventKind, label: &'static str, log: &Rc<RefCell<Vec<String>>>) {
        let log = log.clone();
        bus.subscribe(kind, move |event| {
            log.borrow_mut()
                .push(format!("{}:{}", label, event.entity_key().unwrap_or_default()));
        });
    }

    fn run_frame(machine: &str, status: &str) -> SseFrame {
        SseFrame::new(
            AUTOMATION_RUN_EVENT,
            format!(r#"{{"machine_name":"{}","status":"{}","job_type":"start"}}"#, machine, status),
        )
    }

    #[test]
    fn handlers_run_in_registration_order_per_kind() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&bus, EventKind::AutomationRun, "first", &log);
        recorder(&bus, EventKind::LauncherState, "state", &log);
        recorder(&bus, EventKind::AutomationRun, "second", &log);

        bus.dispatch_frame(&run_frame("LE-01", "running"));

        assert_eq!(*log.borrow(), vec!["first:LE-01", "second:LE-01"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_others() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe(EventKind::AutomationRun, |_| panic!("handler bug"));
        recorder(&bus, EventKind::AutomationRun, "after", &log);

        bus.dispatch_frame(&run_frame("LE-01", "queued"));
        bus.dispatch_frame(&run_frame("LE-02", "queued"));

        assert_eq!(*log.borrow(), vec!["after:LE-01", "after:LE-02"]);
    }

    #[test]
    fn malformed_and_unknown_frames_reach_no_handler() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&bus, EventKind::LauncherState, "state", &log);

        bus.dispatch_frame(&SseFrame::new(LAUNCHER_STATE_EVENT, "{not json"));
        bus.dispatch_frame(&SseFrame::new("heartbeat", "{}"));

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let token = bus.subscribe(EventKind::AutomationRun, move |_| {
            log_clone.borrow_mut().push("hit".to_string());
        });

        bus.dispatch_frame(&run_frame("a", "running"));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        bus.dispatch_frame(&run_frame("a", "running"));

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_a_later_handler() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let later: Rc<RefCell<Option<SubscriptionToken>>> = Rc::new(RefCell::new(None));

        let bus_clone = bus.clone();
        let later_clone = later.clone();
        bus.subscribe(EventKind::AutomationRun, move |_| {
            if let Some(token) = later_clone.borrow_mut().take() {
                bus_clone.unsubscribe(token);
            }
        });
        let log_clone = log.clone();
        *later.borrow_mut() = Some(bus.subscribe(EventKind::AutomationRun, move |_| {
            log_clone.borrow_mut().push("later".to_string());
        }));

        bus.dispatch_frame(&run_frame("a", "running"));
        assert!(log.borrow().is_empty());
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_pumps_frames() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new();
                let bus = EventBus::new();
                let log = Rc::new(RefCell::new(Vec::new()));
                recorder(&bus, EventKind::AutomationRun, "run", &log);

                assert!(bus.connect(&transport));
                assert!(!bus.connect(&transport));
                assert_eq!(transport.push_connections(), 1);

                transport.push(run_frame("LE-07", "running"));
                settle().await;
                assert_eq!(*log.borrow(), vec!["run:LE-07"]);

                bus.disconnect();
                settle().await;
                assert!(!bus.is_connected());
                assert!(transport.push_closed());
            })
            .await;
    }
}
