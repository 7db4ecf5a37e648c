//! One mounted dashboard view: the state it owns and the intents it accepts.
//!
//! A `CollectionView` composes the live collection, busy map, selection and
//! view state behind one `RefCell`. Every mutation ends in `rerender`, which
//! runs the view pipeline and hands the frame to the sink. Network calls are
//! the only suspension points and no borrow is held across them.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, warn};
use serde_json::{Map, Value, json};
use shared::{
    ActionOutcome, ActionTarget, AppConfig, AutomationRunEvent, BulkActionRequest, EventKind,
    ExecutionEvent, GroupDetail, GroupSummary, LauncherAction, LauncherStateEvent, PushEvent,
    encode_path_segment,
};

use crate::busy::BusyTracker;
use crate::error::DashboardError;
use crate::error_display::Toast;
use crate::event_bus::{EventBus, SubscriptionToken};
use crate::live_collection::{
    CollectionShape, Entity, InsertionPolicy, LiveCollection, PROPERTIES_FIELD,
};
use crate::polling::{DEFAULT_REFRESH_EVERY, PollingHandle, PollingScheduler};
use crate::render::{RenderFrame, RenderSink, RowView, SelectionSummary};
use crate::selection::SelectionTracker;
use crate::transport::Transport;
use crate::view_pipeline::{
    ActivityRule, DEFAULT_PAGE_SIZE, DerivedPage, PageRange, RowSchema, SortDir, SortKey,
    ViewState, derive,
};

pub const LAUNCHERS_PATH: &str = "/api/launchers";
pub const GROUPS_PATH: &str = "/api/groups";
pub const EXECUTIONS_PATH: &str = "/api/rundeck/executions";

const DEFAULT_JOB_TAG: &str = "job";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Launchers,
    Executions,
}

/// Static description of one view's collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub kind: CollectionKind,
    pub singular: &'static str,
    pub plural: &'static str,
    pub path: String,
    pub shape: CollectionShape,
    pub schema: RowSchema,
    pub default_sort: SortKey,
    pub events: Vec<EventKind>,
    /// Base path for row, bulk and delete requests. `None` means read-only.
    pub actions_path: Option<&'static str>,
}

impl CollectionSpec {
    pub fn launchers() -> Self {
        Self {
            kind: CollectionKind::Launchers,
            singular: "launcher",
            plural: "launchers",
            path: LAUNCHERS_PATH.to_string(),
            shape: CollectionShape {
                key_fields: vec!["machine_name"],
                merged_maps: vec![PROPERTIES_FIELD],
                insertion: InsertionPolicy::Append,
            },
            schema: RowSchema {
                name_fields: vec!["machine_name"],
                activity: ActivityRule::BoolField("online"),
            },
            default_sort: SortKey::Name,
            events: vec![EventKind::AutomationRun, EventKind::LauncherState],
            actions_path: Some(LAUNCHERS_PATH),
        }
    }

    /// Newest first, capped at `cap` entries.
    pub fn executions(limit: usize, cap: usize) -> Self {
        Self {
            kind: CollectionKind::Executions,
            singular: "execution",
            plural: "executions",
            path: format!("{}?limit={}&offset=0", EXECUTIONS_PATH, limit),
            shape: CollectionShape {
                key_fields: vec!["id", "executionId", "execution_id"],
                merged_maps: vec![PROPERTIES_FIELD, "job"],
                insertion: InsertionPolicy::PrependCapped(cap.max(1)),
            },
            schema: RowSchema {
                name_fields: vec!["job.name", "jobName", "job_name"],
                activity: ActivityRule::InFlightStatus("status"),
            },
            default_sort: SortKey::Insertion,
            events: vec![EventKind::RundeckExecution],
            actions_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    pub page_size: usize,
    pub refresh_every: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_every: DEFAULT_REFRESH_EVERY,
        }
    }
}

impl ViewOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.view.page_size.max(1),
            refresh_every: match config.refresh.every_ms {
                0 => DEFAULT_REFRESH_EVERY,
                ms => Duration::from_millis(ms),
            },
        }
    }
}

/// Everything one view owns. Dropped with the view.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub collection: LiveCollection,
    pub busy: BusyTracker,
    pub selection: SelectionTracker,
    pub view: ViewState,
    pub group_scope: Option<HashSet<String>>,
    pub active_group: Option<GroupSummary>,
    pub groups: Vec<GroupSummary>,
}

impl DashboardState {
    pub fn new(shape: CollectionShape, view: ViewState) -> Self {
        Self {
            collection: LiveCollection::new(shape),
            busy: BusyTracker::new(),
            selection: SelectionTracker::new(),
            view,
            group_scope: None,
            active_group: None,
            groups: Vec::new(),
        }
    }

    /// Confirmed delete: collection, selection and busy map in one step.
    pub fn remove_entity(&mut self, key: &str) -> Option<Entity> {
        self.selection.remove(key);
        self.busy.clear(key);
        self.collection.remove(key)
    }

    pub fn derive<'a>(&'a self, schema: &RowSchema) -> DerivedPage<'a> {
        derive(
            &self.collection,
            &self.view,
            self.group_scope.as_ref(),
            schema,
            &self.busy,
        )
    }

    /// Selected keys that still name a known entity, in key order.
    pub fn selected_existing(&self) -> Vec<String> {
        self.selection
            .keys()
            .filter(|key| self.collection.contains(key))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Default)]
struct Lifecycle {
    mounted: bool,
    torn_down: bool,
    bus: Option<EventBus>,
    tokens: Vec<SubscriptionToken>,
    polling: Option<PollingHandle>,
}

struct ViewCore<T: Transport, S: RenderSink> {
    spec: CollectionSpec,
    options: ViewOptions,
    transport: Rc<T>,
    sink: S,
    state: RefCell<DashboardState>,
    lifecycle: RefCell<Lifecycle>,
}

pub struct CollectionView<T: Transport, S: RenderSink> {
    core: Rc<ViewCore<T, S>>,
}

impl<T: Transport, S: RenderSink> Clone for CollectionView<T, S> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Transport, S: RenderSink> CollectionView<T, S> {
    pub fn new(spec: CollectionSpec, transport: Rc<T>, sink: S, options: ViewOptions) -> Self {
        let view = ViewState {
            sort_key: spec.default_sort,
            page_size: options.page_size.max(1),
            ..ViewState::default()
        };
        let state = DashboardState::new(spec.shape.clone(), view);
        Self {
            core: Rc::new(ViewCore {
                spec,
                options,
                transport,
                sink,
                state: RefCell::new(state),
                lifecycle: RefCell::new(Lifecycle::default()),
            }),
        }
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.core.spec
    }

    pub fn sink(&self) -> &S {
        &self.core.sink
    }

    pub fn state(&self) -> Ref<'_, DashboardState> {
        self.core.state.borrow()
    }

    pub fn is_mounted(&self) -> bool {
        let lifecycle = self.core.lifecycle.borrow();
        lifecycle.mounted && !lifecycle.torn_down
    }

    fn is_torn_down(&self) -> bool {
        self.core.lifecycle.borrow().torn_down
    }

    fn downgrade(&self) -> Weak<ViewCore<T, S>> {
        Rc::downgrade(&self.core)
    }

    // ===== LIFECYCLE =====

    /// Subscribe to push events, run the initial load, then start polling.
    ///
    /// A failed initial load is reported to the sink and returned, but the
    /// view stays mounted so the next poll or push can fill it in. Must run
    /// inside a `tokio::task::LocalSet`.
    pub async fn mount(&self, bus: &EventBus) -> Result<(), DashboardError> {
        {
            let lifecycle = self.core.lifecycle.borrow();
            if lifecycle.torn_down {
                return Err(DashboardError::Detached);
            }
            if lifecycle.mounted {
                return Ok(());
            }
        }

        let tokens: Vec<SubscriptionToken> = self
            .core
            .spec
            .events
            .iter()
            .map(|kind| {
                let view = self.downgrade();
                bus.subscribe(*kind, move |event| {
                    if let Some(core) = view.upgrade() {
                        CollectionView { core }.handle_push(event);
                    }
                })
            })
            .collect();
        bus.connect(self.core.transport.as_ref());

        {
            let mut lifecycle = self.core.lifecycle.borrow_mut();
            lifecycle.mounted = true;
            lifecycle.bus = Some(bus.clone());
            lifecycle.tokens = tokens;
        }
        self.rerender();

        let loaded = self.load().await;
        if let Err(e) = &loaded {
            error!("Failed to load {}: {}", self.core.spec.plural, e);
            self.core
                .sink
                .notify(&Toast::from_error(format!("Failed to load {}", self.core.spec.plural), e));
        }

        if !self.is_torn_down() {
            let polling = self.start_polling();
            self.core.lifecycle.borrow_mut().polling = Some(polling);
        }
        loaded
    }

    fn start_polling(&self) -> PollingHandle {
        let attached_view = self.downgrade();
        let tick_view = self.downgrade();
        PollingScheduler::new(self.core.options.refresh_every).start(
            move || {
                attached_view.upgrade().is_some_and(|core| {
                    core.sink.is_attached() && !core.lifecycle.borrow().torn_down
                })
            },
            move || {
                let view = tick_view.clone();
                async move {
                    match view.upgrade() {
                        Some(core) => CollectionView { core }.refresh_soft().await,
                        None => Err(DashboardError::Detached),
                    }
                }
            },
        )
    }

    /// Initial load: replaces the collection with the snapshot.
    pub async fn load(&self) -> Result<(), DashboardError> {
        let records = self
            .core
            .transport
            .fetch_collection(&self.core.spec.path)
            .await?;
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }

        let report = self.core.state.borrow_mut().collection.replace_all(records);
        info!(
            "Loaded {} {} ({} skipped)",
            report.inserted, self.core.spec.plural, report.skipped
        );
        self.rerender();
        Ok(())
    }

    /// Poll refresh: merges without touching page or selection.
    pub async fn refresh_soft(&self) -> Result<(), DashboardError> {
        let records = self
            .core
            .transport
            .fetch_collection(&self.core.spec.path)
            .await?;
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }

        let report = self.core.state.borrow_mut().collection.merge(records);
        debug!(
            "Refreshed {}: {} new, {} updated",
            self.core.spec.plural, report.inserted, report.updated
        );
        self.rerender();
        Ok(())
    }

    /// Unsubscribe, stop polling and ignore any request still in flight.
    pub fn teardown(&self) {
        let (bus, tokens, polling) = {
            let mut lifecycle = self.core.lifecycle.borrow_mut();
            lifecycle.torn_down = true;
            lifecycle.mounted = false;
            (
                lifecycle.bus.take(),
                std::mem::take(&mut lifecycle.tokens),
                lifecycle.polling.take(),
            )
        };
        if let Some(bus) = bus {
            for token in tokens {
                bus.unsubscribe(token);
            }
        }
        if let Some(mut polling) = polling {
            polling.cancel();
        }
        debug!("{} view torn down", self.core.spec.plural);
    }

    // ===== RENDERING =====

    /// Run the pipeline, store the clamped page index and build a frame.
    pub fn current_frame(&self) -> RenderFrame {
        let mut state = self.core.state.borrow_mut();
        let spec = &self.core.spec;

        let (rows, page_index, page_count, total, master) = {
            let page = state.derive(&spec.schema);
            let keys = page.keys();
            let master = state.selection.master_state(&keys);
            let rows: Vec<RowView> = page
                .rows
                .iter()
                .map(|entity| RowView {
                    key: entity.key().to_string(),
                    entity: (*entity).clone(),
                    busy: state.busy.is_busy(entity.key()).map(str::to_string),
                    selected: state.selection.is_selected(entity.key()),
                })
                .collect();
            (rows, page.page_index, page.page_count, page.total, master)
        };
        state.view.page_index = page_index;

        RenderFrame {
            rows,
            view: state.view.clone(),
            selection: SelectionSummary::new(
                state.selection.count(),
                master,
                spec.singular,
                spec.plural,
            ),
            range: PageRange::new(page_index, state.view.page_size, total),
            page_count,
            can_prev: page_index > 0,
            can_next: page_index + 1 < page_count,
            active_group: state.active_group.clone(),
            groups: state.groups.clone(),
        }
    }

    fn rerender(&self) {
        let frame = self.current_frame();
        if self.is_mounted() {
            self.core.sink.render_page(&frame);
        }
    }

    fn notify(&self, toast: Toast) {
        if self.is_mounted() {
            self.core.sink.notify(&toast);
        }
    }

    // ===== VIEW INTENTS =====

    pub fn set_filter(&self, query: &str) {
        {
            let mut state = self.core.state.borrow_mut();
            state.view.filter_query = query.to_string();
            state.view.page_index = 0;
        }
        self.rerender();
    }

    /// Same key flips direction; a new key starts ascending.
    pub fn set_sort(&self, key: SortKey) {
        {
            let mut state = self.core.state.borrow_mut();
            if state.view.sort_key == key {
                state.view.sort_dir = state.view.sort_dir.toggled();
            } else {
                state.view.sort_key = key;
                state.view.sort_dir = SortDir::Asc;
            }
            state.view.page_index = 0;
        }
        self.rerender();
    }

    pub fn set_page(&self, page_index: usize) {
        self.core.state.borrow_mut().view.page_index = page_index;
        self.rerender();
    }

    pub fn next_page(&self) {
        let next = self.core.state.borrow().view.page_index + 1;
        self.set_page(next);
    }

    pub fn prev_page(&self) {
        let prev = self.core.state.borrow().view.page_index.saturating_sub(1);
        self.set_page(prev);
    }

    pub fn set_page_size(&self, page_size: usize) {
        {
            let mut state = self.core.state.borrow_mut();
            state.view.page_size = page_size.max(1);
            state.view.page_index = 0;
        }
        self.rerender();
    }

    pub fn toggle_selected(&self, key: &str) -> bool {
        let selected = self.core.state.borrow_mut().selection.toggle(key);
        self.rerender();
        selected
    }

    /// Master checkbox: applies to the rows of the current page only.
    pub fn toggle_master(&self) {
        let frame = self.current_frame();
        self.core
            .state
            .borrow_mut()
            .selection
            .toggle_page(&frame.keys());
        self.rerender();
    }

    pub fn clear_selection(&self) {
        self.core.state.borrow_mut().selection.clear();
        self.rerender();
    }

    // ===== PUSH EVENTS =====

    /// Apply one push event. Unknown keys are skew, not errors.
    pub fn handle_push(&self, event: &PushEvent) {
        if !self.is_mounted() {
            return;
        }
        let changed = match (self.core.spec.kind, event) {
            (CollectionKind::Launchers, PushEvent::AutomationRun(run)) => self.apply_run(run),
            (CollectionKind::Launchers, PushEvent::LauncherState(state)) => {
                self.apply_launcher_state(state)
            }
            (CollectionKind::Executions, PushEvent::RundeckExecution(execution)) => {
                self.apply_execution(execution)
            }
            _ => false,
        };
        if changed {
            self.rerender();
        }
    }

    fn apply_run(&self, run: &AutomationRunEvent) -> bool {
        let Some(key) = run.machine_name.as_deref().filter(|name| !name.is_empty()) else {
            return false;
        };
        let status = run.status.as_deref().unwrap_or_default();
        let tag = run.job_type.as_deref().unwrap_or(DEFAULT_JOB_TAG);

        let mut state = self.core.state.borrow_mut();
        let mut changed = state.busy.apply_run_status(key, status, tag);
        if let Some(online) = run.online {
            let mut patch = Map::new();
            patch.insert("online".into(), Value::Bool(online));
            changed |= state.collection.apply_patch(key, patch);
        }
        changed
    }

    fn apply_launcher_state(&self, event: &LauncherStateEvent) -> bool {
        let Some(key) = event.machine_name() else {
            return false;
        };
        let mut patch = Map::new();
        if let Some(online) = event.online {
            patch.insert("online".into(), Value::Bool(online));
        }
        if let Some(lifecycle) = event.state.as_deref().filter(|s| !s.is_empty()) {
            patch.insert(PROPERTIES_FIELD.into(), json!({ "state": lifecycle }));
        }
        if patch.is_empty() {
            return false;
        }
        self.core.state.borrow_mut().collection.apply_patch(key, patch)
    }

    fn apply_execution(&self, event: &ExecutionEvent) -> bool {
        let Some(key) = event.execution_key() else {
            return false;
        };
        let mut state = self.core.state.borrow_mut();

        if !state.collection.contains(&key) {
            let record = synthesize_execution(event, &key);
            let report = state.collection.merge(vec![record]);
            if report.evicted > 0 {
                debug!("Execution cap reached, dropped {} oldest", report.evicted);
            }
            return report.inserted > 0;
        }

        let mut patch = Map::new();
        if let Some(status) = event.status.as_deref().filter(|s| !s.is_empty()) {
            patch.insert("status".into(), json!(status));
        }
        if let Some(started) = &event.date_started {
            patch.insert("dateStarted".into(), json!({ "date": started }));
        }
        if let Some(ended) = &event.date_ended {
            patch.insert("dateEnded".into(), json!({ "date": ended }));
        }
        if let Some(name) = event.job.as_ref().and_then(|job| job.name.as_deref()) {
            patch.insert("job".into(), json!({ "name": name }));
        }
        if let Some(machine) = event.machine_name.as_deref().filter(|m| !m.is_empty()) {
            patch.insert("machine_name".into(), json!(machine));
        }
        !patch.is_empty() && state.collection.apply_patch(&key, patch)
    }

    // ===== ACTIONS =====

    fn actions_path(&self) -> Result<&'static str, DashboardError> {
        self.core
            .spec
            .actions_path
            .ok_or_else(|| DashboardError::ActionFailure {
                action: "action".into(),
                target: self.core.spec.plural.into(),
                message: format!("{} are read-only", self.core.spec.plural),
            })
    }

    /// Row action for one entity. Refused while the key is busy.
    pub async fn submit_action(
        &self,
        key: &str,
        action: LauncherAction,
    ) -> Result<ActionOutcome, DashboardError> {
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }
        let base = self.actions_path()?;

        let ticket = {
            let mut state = self.core.state.borrow_mut();
            if let Some(tag) = state.busy.is_busy(key) {
                return Err(DashboardError::Busy {
                    key: key.to_string(),
                    tag: tag.to_string(),
                });
            }
            state.busy.mark(key, action.as_str())
        };
        self.rerender();

        let path = format!("{}/{}/{}", base, encode_path_segment(key), action.as_str());
        let result = self.core.transport.submit_action(&path, json!({})).await;
        if self.is_torn_down() {
            debug!("Ignoring {} result for {}: view torn down", action.as_str(), key);
            return result;
        }

        self.core.state.borrow_mut().busy.clear_if_current(key, ticket);
        let result = result.map_err(|e| action_failure(action, key, e));
        match &result {
            Ok(outcome) => {
                let run = outcome
                    .automation_run_id
                    .map(|id| format!(" (Run #{})", id))
                    .unwrap_or_default();
                self.notify(Toast::info(format!(
                    "{} job queued for {}{}",
                    action.label(),
                    key,
                    run
                )));
            }
            Err(e) => {
                warn!("{}", e);
                self.notify(Toast::from_error(format!("{} failed", action.label()), e));
            }
        }
        self.rerender();
        result
    }

    /// Bulk action over the selected entities that still exist. Busy keys are
    /// skipped locally and reported back as skipped.
    pub async fn submit_bulk(&self, action: LauncherAction) -> Result<ActionOutcome, DashboardError> {
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }
        let base = self.actions_path()?;

        let (targets, busy_skipped, tickets) = {
            let mut state = self.core.state.borrow_mut();
            let selected = state.selected_existing();
            if selected.is_empty() {
                drop(state);
                self.notify(Toast::error(format!(
                    "Select at least one {} first.",
                    self.core.spec.singular
                )));
                return Err(DashboardError::NothingSelected);
            }

            let mut targets = Vec::new();
            let mut busy_skipped = Vec::new();
            for key in selected {
                match state.busy.is_busy(&key) {
                    Some(tag) => busy_skipped.push(ActionTarget::Detailed {
                        machine_name: key.clone(),
                        automation_run_id: None,
                        reason: Some(format!("busy with {}", tag)),
                    }),
                    None => targets.push(key),
                }
            }
            let tickets: Vec<_> = targets
                .iter()
                .map(|key| (key.clone(), state.busy.mark(key, action.as_str())))
                .collect();
            (targets, busy_skipped, tickets)
        };

        if targets.is_empty() {
            let first = busy_skipped.first().map(|t| t.key().to_string()).unwrap_or_default();
            self.notify(Toast::error(format!(
                "All selected {} are busy.",
                self.core.spec.plural
            )));
            return Err(DashboardError::Busy {
                key: first,
                tag: action.as_str().to_string(),
            });
        }
        self.rerender();

        let path = format!("{}/bulk/{}", base, action.as_str());
        let body = json!(BulkActionRequest {
            machine_names: targets.clone(),
        });
        let result = self.core.transport.submit_action(&path, body).await;
        if self.is_torn_down() {
            return result;
        }

        {
            let mut state = self.core.state.borrow_mut();
            for (key, ticket) in tickets {
                state.busy.clear_if_current(&key, ticket);
            }
        }

        let target = format!("{} {}", targets.len(), self.core.spec.plural);
        let result = result
            .map(|mut outcome| {
                outcome.skipped.extend(busy_skipped);
                outcome
            })
            .map_err(|e| action_failure(action, &target, e));
        self.report_batch(action, &result);
        self.rerender();
        result
    }

    /// Action over every member of the active group.
    pub async fn run_group_action(
        &self,
        action: LauncherAction,
    ) -> Result<ActionOutcome, DashboardError> {
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }
        let group = self.core.state.borrow().active_group.clone();
        let Some(group_id) = group.as_ref().and_then(GroupSummary::key) else {
            self.notify(Toast::error("Select a group first."));
            return Err(DashboardError::NoGroupSelected);
        };

        let path = format!(
            "{}/{}/{}",
            GROUPS_PATH,
            encode_path_segment(&group_id),
            action.as_str()
        );
        let result = self.core.transport.submit_action(&path, json!({})).await;
        if self.is_torn_down() {
            return result;
        }
        let target = group.map(|g| g.name).unwrap_or(group_id);
        let result = result.map_err(|e| action_failure(action, &target, e));
        self.report_batch(action, &result);
        result
    }

    fn report_batch(&self, action: LauncherAction, result: &Result<ActionOutcome, DashboardError>) {
        match result {
            Ok(outcome) => {
                let skipped = if outcome.skipped.is_empty() {
                    String::new()
                } else {
                    format!(" ({} skipped)", outcome.skipped.len())
                };
                self.notify(Toast::info(format!(
                    "{} queued for {} {}(s){}",
                    action.label(),
                    outcome.queued.len(),
                    self.core.spec.singular,
                    skipped
                )));
            }
            Err(e) => {
                warn!("{}", e);
                self.notify(Toast::from_error(format!("{} failed", action.label()), e));
            }
        }
    }

    /// Delete one entity on the backend, then drop it locally.
    pub async fn delete(&self, key: &str) -> Result<(), DashboardError> {
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }
        let base = self.actions_path()?;

        let path = format!("{}/{}", base, encode_path_segment(key));
        let result = self.core.transport.delete(&path).await;
        if self.is_torn_down() {
            return result.map(|_| ()).map_err(DashboardError::from);
        }

        match result {
            Ok(_) => {
                self.core.state.borrow_mut().remove_entity(key);
                info!("Deleted {} {}", self.core.spec.singular, key);
                self.notify(Toast::info(format!(
                    "{} {} deleted.",
                    capitalize(self.core.spec.singular),
                    key
                )));
                self.rerender();
                Ok(())
            }
            Err(e) => {
                let e = DashboardError::ActionFailure {
                    action: "delete".into(),
                    target: key.to_string(),
                    message: e.to_string(),
                };
                self.notify(Toast::from_error("Delete failed", &e));
                Err(e)
            }
        }
    }

    // ===== GROUPS =====

    pub async fn load_groups(&self) -> Result<(), DashboardError> {
        let payload = self.core.transport.fetch_json(GROUPS_PATH).await?;
        let groups: Vec<GroupSummary> = match payload {
            Value::Array(_) => serde_json::from_value(payload)
                .map_err(|e| DashboardError::malformed(GROUPS_PATH, e))?,
            _ => Vec::new(),
        };
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }
        self.core.state.borrow_mut().groups = groups;
        self.rerender();
        Ok(())
    }

    /// Scope the view to one group's members.
    pub async fn select_group(&self, group_id: &str) -> Result<(), DashboardError> {
        let path = format!("{}/{}", GROUPS_PATH, encode_path_segment(group_id));
        let detail = async {
            let payload = self.core.transport.fetch_json(&path).await?;
            serde_json::from_value::<GroupDetail>(payload)
                .map_err(|e| DashboardError::malformed(&path, e))
        }
        .await;

        let detail = match detail {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Failed to load group {}: {}", group_id, e);
                self.notify(Toast::from_error("Failed to load group", &e));
                return Err(e);
            }
        };
        if self.is_torn_down() {
            return Err(DashboardError::Detached);
        }

        {
            let mut state = self.core.state.borrow_mut();
            state.group_scope = Some(detail.member_keys().into_iter().collect());
            state.active_group = Some(detail.group);
            state.view.page_index = 0;
        }
        self.rerender();
        Ok(())
    }

    pub fn show_all(&self) {
        {
            let mut state = self.core.state.borrow_mut();
            state.group_scope = None;
            state.active_group = None;
            state.view.page_index = 0;
        }
        self.rerender();
    }
}

fn action_failure(action: LauncherAction, target: &str, error: DashboardError) -> DashboardError {
    match error {
        DashboardError::Transport(transport) => DashboardError::ActionFailure {
            action: action.as_str().to_string(),
            target: target.to_string(),
            message: transport.to_string(),
        },
        other => other,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Record for an execution first seen on the push channel.
fn synthesize_execution(event: &ExecutionEvent, key: &str) -> Value {
    let id = event
        .execution_id
        .clone()
        .or_else(|| event.id.clone())
        .unwrap_or_else(|| Value::String(key.to_string()));
    let started = event
        .date_started
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    let ended = event
        .date_ended
        .as_ref()
        .map(|date| json!({ "date": date }))
        .unwrap_or(Value::Null);

    json!({
        "id": id,
        "status": event.status.as_deref().filter(|s| !s.is_empty()).unwrap_or("running"),
        "dateStarted": { "date": started },
        "dateEnded": ended,
        "job": { "name": event.job_name().unwrap_or_default() },
        "machine_name": event.machine_name.as_deref().filter(|m| !m.is_empty()).unwrap_or("-"),
        "user": event.user.clone().unwrap_or_default(),
        "project": event.project.clone().unwrap_or_default(),
    })
}
