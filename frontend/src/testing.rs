//! Scripted transport, recording sinks and end-to-end view scenarios.

use std::cell::RefCell;
use std::collections::HashMap;

use futures::channel::oneshot;
use serde_json::{Value, json};
use shared::SseFrame;

use crate::dataflow::Relay;
use crate::error::TransportError;
use crate::execution_output::{ExecutionDetail, OutputSink};
use crate::transport::Transport;

type Reply = Result<Value, TransportError>;

#[derive(Default)]
struct FakeState {
    get_replies: HashMap<String, Reply>,
    post_replies: HashMap<String, Reply>,
    delete_replies: HashMap<String, Reply>,
    deferred_posts: HashMap<String, oneshot::Receiver<Reply>>,
    gets: Vec<String>,
    posts: Vec<(String, Value)>,
    deletes: Vec<String>,
    push_relays: Vec<Relay<SseFrame>>,
}

/// In-memory transport. Unknown GET paths answer 404, unknown POST paths
/// answer `{}`.
#[derive(Default)]
pub struct FakeTransport {
    state: RefCell<FakeState>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_get(&self, path: &str, payload: Value) {
        self.state
            .borrow_mut()
            .get_replies
            .insert(path.to_string(), Ok(payload));
    }

    pub fn fail_get(&self, path: &str, error: TransportError) {
        self.state
            .borrow_mut()
            .get_replies
            .insert(path.to_string(), Err(error));
    }

    pub fn respond_post(&self, path: &str, payload: Value) {
        self.state
            .borrow_mut()
            .post_replies
            .insert(path.to_string(), Ok(payload));
    }

    pub fn fail_post(&self, path: &str, error: TransportError) {
        self.state
            .borrow_mut()
            .post_replies
            .insert(path.to_string(), Err(error));
    }

    pub fn respond_delete(&self, path: &str, payload: Value) {
        self.state
            .borrow_mut()
            .delete_replies
            .insert(path.to_string(), Ok(payload));
    }

    /// The next POST to `path` waits until the returned sender resolves it.
    pub fn defer_post(&self, path: &str) -> oneshot::Sender<Reply> {
        let (sender, receiver) = oneshot::channel();
        self.state
            .borrow_mut()
            .deferred_posts
            .insert(path.to_string(), receiver);
        sender
    }

    pub fn gets(&self) -> Vec<String> {
        self.state.borrow().gets.clone()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.state.borrow().posts.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.borrow().deletes.clone()
    }

    pub fn push(&self, frame: SseFrame) {
        for relay in &self.state.borrow().push_relays {
            relay.send(frame.clone());
        }
    }

    pub fn push_event(&self, event: &str, payload: Value) {
        self.push(SseFrame::new(event, payload.to_string()));
    }

    pub fn push_connections(&self) -> usize {
        self.state.borrow().push_relays.len()
    }

    pub fn push_closed(&self) -> bool {
        let state = self.state.borrow();
        !state.push_relays.is_empty() && state.push_relays.iter().all(Relay::is_closed)
    }
}

impl Transport for FakeTransport {
    async fn fetch_json(&self, path: &str) -> Result<Value, TransportError> {
        let mut state = self.state.borrow_mut();
        state.gets.push(path.to_string());
        state
            .get_replies
            .get(path)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Status {
                    status: 404,
                    message: "Not Found".into(),
                })
            })
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        let deferred = {
            let mut state = self.state.borrow_mut();
            state.posts.push((path.to_string(), body));
            state.deferred_posts.remove(path)
        };
        if let Some(receiver) = deferred {
            return receiver.await.unwrap_or(Err(TransportError::ChannelClosed));
        }
        self.state
            .borrow()
            .post_replies
            .get(path)
            .cloned()
            .unwrap_or_else(|| Ok(json!({})))
    }

    async fn delete(&self, path: &str) -> Result<Value, TransportError> {
        let mut state = self.state.borrow_mut();
        state.deletes.push(path.to_string());
        state
            .delete_replies
            .get(path)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }

    fn subscribe_push(&self, frame_received_relay: Relay<SseFrame>) {
        self.state.borrow_mut().push_relays.push(frame_received_relay);
    }
}

#[derive(Default)]
struct OutputRecording {
    detail: Option<ExecutionDetail>,
    lines: Vec<String>,
    message: Option<String>,
}

#[derive(Default)]
pub struct RecordingOutput {
    recording: RefCell<OutputRecording>,
}

impl RecordingOutput {
    pub fn detail(&self) -> Option<ExecutionDetail> {
        self.recording.borrow().detail.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.recording.borrow().lines.clone()
    }

    pub fn message(&self) -> Option<String> {
        self.recording.borrow().message.clone()
    }
}

impl OutputSink for RecordingOutput {
    fn show_detail(&self, detail: &ExecutionDetail) {
        self.recording.borrow_mut().detail = Some(detail.clone());
    }

    fn append_line(&self, line: &str) {
        self.recording.borrow_mut().lines.push(line.to_string());
    }

    fn replace_output(&self, message: &str) {
        let mut recording = self.recording.borrow_mut();
        recording.lines.clear();
        recording.message = Some(message.to_string()).filter(|m| !m.is_empty());
    }
}

/// Let spawned local tasks (push pump, pending requests) run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection_view::{CollectionSpec, CollectionView, ViewOptions};
    use crate::error::DashboardError;
    use crate::error_display::NotificationVariant;
    use crate::event_bus::EventBus;
    use crate::render::{RecordingSink, RenderFrame};
    use crate::selection::MasterCheckState;
    use crate::view_pipeline::SortKey;
    use shared::{
        AUTOMATION_RUN_EVENT, BulkActionRequest, LAUNCHER_STATE_EVENT, LauncherAction,
        RUNDECK_EXECUTION_EVENT,
    };
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::task::{LocalSet, spawn_local};
    use tokio::time::sleep;

    type LauncherView = CollectionView<FakeTransport, RecordingSink>;

    fn numbered(count: usize) -> Value {
        Value::Array(
            (1..=count)
                .map(|n| json!({"machine_name": format!("LE-{:02}", n), "online": n % 2 == 0}))
                .collect(),
        )
    }

    fn named(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|name| json!({"machine_name": name, "online": true, "properties": {"site": "lab"}}))
                .collect(),
        )
    }

    async fn mount_launchers(
        transport: &Rc<FakeTransport>,
        snapshot: Value,
    ) -> (LauncherView, RecordingSink, EventBus) {
        transport.respond_get("/api/launchers", snapshot);
        let sink = RecordingSink::new();
        let bus = EventBus::new();
        let view = CollectionView::new(
            CollectionSpec::launchers(),
            transport.clone(),
            sink.clone(),
            ViewOptions::default(),
        );
        view.mount(&bus).await.unwrap();
        (view, sink, bus)
    }

    fn frame(sink: &RecordingSink) -> RenderFrame {
        sink.last_frame().unwrap()
    }

    fn run_event(machine: &str, status: &str, job_type: &str) -> Value {
        json!({"machine_name": machine, "status": status, "job_type": job_type})
    }

    #[tokio::test]
    async fn paginates_twenty_five_launchers() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, numbered(25)).await;

                let first = frame(&sink);
                assert_eq!(first.range.to_string(), "1-10 of 25");
                assert_eq!(first.rows.len(), 10);
                assert_eq!(first.rows[0].key, "LE-01");
                assert_eq!(first.rows[9].key, "LE-10");
                assert!(!first.can_prev);

                view.set_page(2);
                let last = frame(&sink);
                assert_eq!(last.range.to_string(), "21-25 of 25");
                assert_eq!(last.rows.len(), 5);
                assert!(!last.can_next);

                view.set_page(9);
                assert_eq!(frame(&sink).view.page_index, 2);
            })
            .await;
    }

    #[tokio::test]
    async fn selection_survives_filtering() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["alpha", "beta"])).await;

                assert!(view.toggle_selected("alpha"));
                view.set_filter("bet");
                let filtered = frame(&sink);
                assert_eq!(filtered.keys(), vec!["beta"]);
                assert_eq!(filtered.selection.label, "1 launcher selected");
                assert_eq!(filtered.selection.master, MasterCheckState::Unchecked);

                view.set_filter("");
                assert!(frame(&sink).row("alpha").unwrap().selected);
            })
            .await;
    }

    #[tokio::test]
    async fn master_toggle_only_touches_current_page() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, numbered(15)).await;

                view.toggle_master();
                assert_eq!(frame(&sink).selection.master, MasterCheckState::Checked);
                assert_eq!(frame(&sink).selection.count, 10);

                view.next_page();
                let second = frame(&sink);
                assert_eq!(second.selection.master, MasterCheckState::Unchecked);
                assert_eq!(second.selection.label, "10 launchers selected");

                view.toggle_selected("LE-11");
                assert_eq!(frame(&sink).selection.master, MasterCheckState::Indeterminate);
                view.toggle_master();
                assert_eq!(frame(&sink).selection.count, 15);

                view.prev_page();
                view.toggle_master();
                assert_eq!(frame(&sink).selection.count, 5);
            })
            .await;
    }

    #[tokio::test]
    async fn sort_intents_toggle_direction_and_reset_page() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, numbered(12)).await;
                view.set_page(1);

                view.set_sort(SortKey::Name);
                let desc = frame(&sink);
                assert_eq!(desc.view.page_index, 0);
                assert_eq!(desc.rows[0].key, "LE-12");

                view.set_sort(SortKey::Status);
                // online (even numbers) rank above offline; ascending puts offline first
                assert_eq!(frame(&sink).rows[0].key, "LE-01");
            })
            .await;
    }

    #[tokio::test]
    async fn terminal_push_clears_busy_before_request_resolves() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a", "b"])).await;
                let gate = transport.defer_post("/api/launchers/a/start");

                let pending = spawn_local({
                    let view = view.clone();
                    async move { view.submit_action("a", LauncherAction::Start).await }
                });
                settle().await;
                assert_eq!(frame(&sink).row("a").unwrap().busy.as_deref(), Some("start"));

                transport.push_event(AUTOMATION_RUN_EVENT, run_event("a", "succeeded", "start"));
                settle().await;
                assert_eq!(frame(&sink).row("a").unwrap().busy, None);

                assert!(gate.send(Ok(json!({"automationRunId": 42}))).is_ok());
                let outcome = pending.await.unwrap().unwrap();
                assert_eq!(outcome.automation_run_id, Some(42));
                assert_eq!(frame(&sink).row("a").unwrap().busy, None);
                assert_eq!(
                    sink.last_toast().unwrap().message,
                    "Start job queued for a (Run #42)"
                );
            })
            .await;
    }

    #[tokio::test]
    async fn in_flight_push_keeps_busy_after_request_resolves() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;
                let gate = transport.defer_post("/api/launchers/a/stop");

                let pending = spawn_local({
                    let view = view.clone();
                    async move { view.submit_action("a", LauncherAction::Stop).await }
                });
                settle().await;
                transport.push_event(AUTOMATION_RUN_EVENT, run_event("a", "running", "stop"));
                settle().await;

                assert!(gate.send(Ok(json!({}))).is_ok());
                pending.await.unwrap().unwrap();
                assert_eq!(frame(&sink).row("a").unwrap().busy.as_deref(), Some("stop"));

                transport.push_event(AUTOMATION_RUN_EVENT, run_event("a", "failed", "stop"));
                settle().await;
                assert_eq!(frame(&sink).row("a").unwrap().busy, None);
            })
            .await;
    }

    #[tokio::test]
    async fn failed_action_rolls_back_busy_and_notifies() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;
                transport.fail_post(
                    "/api/launchers/a/start",
                    TransportError::Status {
                        status: 409,
                        message: "Launcher a is offline".into(),
                    },
                );

                let error = view.submit_action("a", LauncherAction::Start).await.unwrap_err();

                assert!(matches!(error, DashboardError::ActionFailure { .. }));
                assert_eq!(frame(&sink).row("a").unwrap().busy, None);
                let toast = sink.last_toast().unwrap();
                assert_eq!(toast.variant, NotificationVariant::Error);
                assert_eq!(toast.message, "Launcher a is offline");
            })
            .await;
    }

    #[tokio::test]
    async fn busy_row_refuses_a_second_submission() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, _sink, _bus) = mount_launchers(&transport, named(&["a"])).await;
                transport.push_event(AUTOMATION_RUN_EVENT, run_event("a", "queued", "commission"));
                settle().await;

                let error = view.submit_action("a", LauncherAction::Start).await.unwrap_err();

                assert_eq!(
                    error,
                    DashboardError::Busy {
                        key: "a".into(),
                        tag: "commission".into()
                    }
                );
                assert!(transport.posts().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn bulk_action_skips_busy_and_missing_keys() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a", "b", "c"])).await;
                transport.respond_post(
                    "/api/launchers/bulk/stop",
                    json!({
                        "queued": [{"machine_name": "a", "automationRunId": 1}, {"machine_name": "c", "automationRunId": 2}],
                        "skipped": []
                    }),
                );
                for key in ["a", "b", "c", "ghost"] {
                    view.toggle_selected(key);
                }
                transport.push_event(AUTOMATION_RUN_EVENT, run_event("b", "running", "start"));
                settle().await;

                let outcome = view.submit_bulk(LauncherAction::Stop).await.unwrap();

                let (path, body) = transport.posts().remove(0);
                assert_eq!(path, "/api/launchers/bulk/stop");
                let request: BulkActionRequest = serde_json::from_value(body).unwrap();
                assert_eq!(request.machine_names, vec!["a", "c"]);
                assert_eq!(outcome.skipped_keys(), vec!["b"]);
                assert_eq!(
                    sink.last_toast().unwrap().message,
                    "Stop queued for 2 launcher(s) (1 skipped)"
                );
                let after = frame(&sink);
                assert_eq!(after.row("a").unwrap().busy, None);
                assert_eq!(after.row("b").unwrap().busy.as_deref(), Some("start"));
            })
            .await;
    }

    #[tokio::test]
    async fn bulk_action_with_nothing_selected_sends_nothing() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;

                let error = view.submit_bulk(LauncherAction::Start).await.unwrap_err();

                assert_eq!(error, DashboardError::NothingSelected);
                assert!(transport.posts().is_empty());
                assert_eq!(
                    sink.last_toast().unwrap().message,
                    "Select at least one launcher first."
                );
            })
            .await;
    }

    #[tokio::test]
    async fn delete_removes_entity_and_selection() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a", "b"])).await;
                view.toggle_selected("a");

                view.delete("a").await.unwrap();

                assert_eq!(transport.deletes(), vec!["/api/launchers/a"]);
                let after = frame(&sink);
                assert_eq!(after.keys(), vec!["b"]);
                assert_eq!(after.selection.count, 0);
                assert_eq!(sink.last_toast().unwrap().message, "Launcher a deleted.");

                // a later snapshot still carrying the key brings it back
                view.refresh_soft().await.unwrap();
                assert_eq!(frame(&sink).keys(), vec!["a", "b"]);
                assert!(!frame(&sink).row("a").unwrap().selected);
            })
            .await;
    }

    #[tokio::test]
    async fn launcher_state_patches_known_entities_only() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (_view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;
                let renders = sink.frame_count();

                transport.push_event(LAUNCHER_STATE_EVENT, json!({"machineName": "ghost", "online": false}));
                transport.push_event(LAUNCHER_STATE_EVENT, json!({"machine_name": "a", "online": false, "state": "stopped"}));
                transport.push_event(LAUNCHER_STATE_EVENT, "not an object".into());
                settle().await;

                assert_eq!(sink.frame_count(), renders + 1);
                let row = frame(&sink).row("a").cloned().unwrap();
                assert_eq!(row.entity.bool_field("online"), Some(false));
                assert_eq!(row.entity.property("state"), Some(&json!("stopped")));
                assert_eq!(row.entity.property("site"), Some(&json!("lab")));
                assert_eq!(frame(&sink).rows.len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn poll_refresh_keeps_page_and_selection() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, numbered(15)).await;
                view.set_page(1);
                view.toggle_selected("LE-12");

                transport.respond_get("/api/launchers", numbered(16));
                sleep(Duration::from_secs(16)).await;

                let after = frame(&sink);
                assert_eq!(transport.gets().len(), 2);
                assert_eq!(after.view.page_index, 1);
                assert_eq!(after.range.to_string(), "11-16 of 16");
                assert!(after.row("LE-12").unwrap().selected);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initial_load_is_reported_and_healed_by_polling() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                transport.fail_get("/api/launchers", TransportError::Network("connection refused".into()));
                let sink = RecordingSink::new();
                let view = CollectionView::new(
                    CollectionSpec::launchers(),
                    transport.clone(),
                    sink.clone(),
                    ViewOptions::default(),
                );

                assert!(view.mount(&EventBus::new()).await.is_err());
                assert!(view.is_mounted());
                assert_eq!(sink.last_toast().unwrap().title, "Failed to load launchers");

                transport.respond_get("/api/launchers", named(&["a"]));
                sleep(Duration::from_secs(16)).await;
                assert_eq!(frame(&sink).keys(), vec!["a"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn detached_sink_stops_polling() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (_view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;

                sink.detach();
                sleep(Duration::from_secs(60)).await;

                assert_eq!(transport.gets().len(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn malformed_snapshot_leaves_state_untouched() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, named(&["a"])).await;
                transport.respond_get("/api/launchers", json!({"detail": "oops"}));

                let error = view.refresh_soft().await.unwrap_err();

                assert!(matches!(error, DashboardError::MalformedPayload { .. }));
                assert_eq!(frame(&sink).keys(), vec!["a"]);
            })
            .await;
    }

    #[tokio::test]
    async fn teardown_ignores_late_events_and_resolutions() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, bus) = mount_launchers(&transport, named(&["a"])).await;
                let gate = transport.defer_post("/api/launchers/a/start");
                let pending = spawn_local({
                    let view = view.clone();
                    async move { view.submit_action("a", LauncherAction::Start).await }
                });
                settle().await;

                view.teardown();
                let renders = sink.frame_count();
                let toasts = sink.toasts().len();
                assert_eq!(bus.subscriber_count(), 0);

                transport.push_event(AUTOMATION_RUN_EVENT, run_event("a", "succeeded", "start"));
                assert!(gate.send(Ok(json!({}))).is_ok());
                assert!(pending.await.unwrap().is_ok());
                settle().await;

                assert_eq!(sink.frame_count(), renders);
                assert_eq!(sink.toasts().len(), toasts);
                assert_eq!(
                    view.submit_action("a", LauncherAction::Start).await.unwrap_err(),
                    DashboardError::Detached
                );
            })
            .await;
    }

    #[tokio::test]
    async fn groups_scope_the_view() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                let (view, sink, _bus) = mount_launchers(&transport, numbered(5)).await;
                transport.respond_get("/api/groups", json!([{"id": 1, "name": "Lab", "member_count": 2}]));
                transport.respond_get(
                    "/api/groups/1",
                    json!({
                        "group": {"id": 1, "name": "Lab"},
                        "members": [{"machine_name": "LE-02"}, {"machine_name": "LE-03"}]
                    }),
                );
                transport.respond_post("/api/groups/1/start", json!({"queued": ["LE-02", "LE-03"], "skipped": []}));

                assert_eq!(
                    view.run_group_action(LauncherAction::Start).await.unwrap_err(),
                    DashboardError::NoGroupSelected
                );

                view.load_groups().await.unwrap();
                view.select_group("1").await.unwrap();
                let scoped = frame(&sink);
                assert_eq!(scoped.keys(), vec!["LE-02", "LE-03"]);
                assert_eq!(scoped.active_group.as_ref().map(|g| g.name.as_str()), Some("Lab"));
                assert_eq!(scoped.groups.len(), 1);

                view.run_group_action(LauncherAction::Start).await.unwrap();
                assert_eq!(sink.last_toast().unwrap().message, "Start queued for 2 launcher(s)");

                view.show_all();
                assert_eq!(frame(&sink).rows.len(), 5);
            })
            .await;
    }

    #[tokio::test]
    async fn executions_prepend_pushed_runs_and_patch_known_ones() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(FakeTransport::new());
                transport.respond_get(
                    "/api/rundeck/executions?limit=150&offset=0",
                    json!({"executions": [
                        {"id": 3, "status": "running", "job": {"id": "j", "name": "Start"}},
                        {"id": 2, "status": "succeeded"},
                        {"id": 1, "status": "failed"}
                    ]}),
                );
                let sink = RecordingSink::new();
                let bus = EventBus::new();
                let view = CollectionView::new(
                    CollectionSpec::executions(150, 3),
                    transport.clone(),
                    sink.clone(),
                    ViewOptions::default(),
                );
                view.mount(&bus).await.unwrap();

                transport.push_event(
                    RUNDECK_EXECUTION_EVENT,
                    json!({"executionId": 4, "status": "running", "job": {"name": "Deploy"}, "machine_name": "LE-01"}),
                );
                transport.push_event(
                    RUNDECK_EXECUTION_EVENT,
                    json!({"executionId": 3, "status": "succeeded", "dateEnded": "2024-05-01T10:00:00Z"}),
                );
                settle().await;

                let after = frame(&sink);
                assert_eq!(after.keys(), vec!["4", "3", "2"]);
                let patched = &after.row("3").unwrap().entity;
                assert_eq!(patched.str_field("status"), Some("succeeded"));
                assert_eq!(patched.field("job"), Some(&json!({"id": "j", "name": "Start"})));
                assert_eq!(patched.field("dateEnded"), Some(&json!({"date": "2024-05-01T10:00:00Z"})));
                assert_eq!(after.row("4").unwrap().entity.str_field("machine_name"), Some("LE-01"));

                assert!(matches!(
                    view.delete("4").await,
                    Err(DashboardError::ActionFailure { .. })
                ));
            })
            .await;
    }
}
