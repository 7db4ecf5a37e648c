//! The rendering seam: one frame per pipeline run, plus notifications.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use shared::GroupSummary;

use crate::error_display::Toast;
use crate::live_collection::Entity;
use crate::selection::MasterCheckState;
use crate::view_pipeline::{PageRange, ViewState};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RowView {
    pub key: String,
    pub entity: Entity,
    /// Operation tag while the row's actions are disabled.
    pub busy: Option<String>,
    pub selected: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SelectionSummary {
    pub count: usize,
    pub master: MasterCheckState,
    pub label: String,
}

impl SelectionSummary {
    pub fn new(count: usize, master: MasterCheckState, singular: &str, plural: &str) -> Self {
        let noun = if count == 1 { singular } else { plural };
        Self {
            count,
            master,
            label: format!("{} {} selected", count, noun),
        }
    }
}

/// Everything a sink needs to draw the current page.
/// Serializes as the `--json` output of the CLI.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub rows: Vec<RowView>,
    /// View state after clamping.
    pub view: ViewState,
    pub selection: SelectionSummary,
    pub range: PageRange,
    pub page_count: usize,
    pub can_prev: bool,
    pub can_next: bool,
    pub active_group: Option<GroupSummary>,
    pub groups: Vec<GroupSummary>,
}

impl RenderFrame {
    pub fn row(&self, key: &str) -> Option<&RowView> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.key.as_str()).collect()
    }
}

pub trait RenderSink: 'static {
    fn render_page(&self, frame: &RenderFrame);

    fn notify(&self, toast: &Toast);

    /// Whether the view's root is still part of the active UI. Polling
    /// checks this at every tick.
    fn is_attached(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct Recording {
    frames: Vec<RenderFrame>,
    toasts: Vec<Toast>,
    detached: bool,
}

/// Sink that keeps every call for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recording: Rc<RefCell<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> usize {
        self.recording.borrow().frames.len()
    }

    pub fn last_frame(&self) -> Option<RenderFrame> {
        self.recording.borrow().frames.last().cloned()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.recording.borrow().toasts.clone()
    }

    pub fn last_toast(&self) -> Option<Toast> {
        self.recording.borrow().toasts.last().cloned()
    }

    pub fn detach(&self) {
        self.recording.borrow_mut().detached = true;
    }
}

impl RenderSink for RecordingSink {
    fn render_page(&self, frame: &RenderFrame) {
        self.recording.borrow_mut().frames.push(frame.clone());
    }

    fn notify(&self, toast: &Toast) {
        self.recording.borrow_mut().toasts.push(toast.clone());
    }

    fn is_attached(&self) -> bool {
        !self.recording.borrow().detached
    }
}
