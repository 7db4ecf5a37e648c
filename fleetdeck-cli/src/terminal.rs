//! Plain-text and JSON-lines rendering for the terminal.

use std::cell::Cell;
use std::fmt::Write;
use std::str::FromStr;

use frontend::execution_output::{ExecutionDetail, OutputSink};
use frontend::{NotificationVariant, RenderFrame, RenderSink, RowView, Toast};
use log::error;
use serde::Serialize;
use shared::{LauncherAction, StatusTone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    Launchers,
    Executions,
}

pub struct TerminalSink {
    layout: RowLayout,
    json: bool,
    muted: Cell<bool>,
}

impl TerminalSink {
    pub fn new(layout: RowLayout, json: bool) -> Self {
        Self {
            layout,
            json,
            muted: Cell::new(false),
        }
    }

    /// Muted sinks drop frames but still show notifications.
    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize output: {}", e),
        }
    }
}

impl RenderSink for TerminalSink {
    fn render_page(&self, frame: &RenderFrame) {
        if self.muted.get() {
            return;
        }
        if self.json {
            self.print_json(frame);
        } else {
            print!("{}", format_frame(frame, self.layout));
        }
    }

    fn notify(&self, toast: &Toast) {
        if self.json {
            self.print_json(toast);
        } else {
            eprintln!("{}", format_toast(toast));
        }
    }
}

impl OutputSink for TerminalSink {
    fn show_detail(&self, detail: &ExecutionDetail) {
        if self.json {
            self.print_json(detail);
            return;
        }
        println!("Execution #{} {}", detail.id, detail.job_name);
        println!("  machine: {}  status: {}  user: {}", detail.machine, detail.status, detail.user);
        println!("  started: {}  ended: {}", or_dash(&detail.started), or_dash(&detail.ended));
        println!();
    }

    fn append_line(&self, line: &str) {
        println!("{}", line);
    }

    fn replace_output(&self, message: &str) {
        if !message.is_empty() {
            eprintln!("{}", message);
        }
    }
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() { "-" } else { text }
}

pub fn format_toast(toast: &Toast) -> String {
    match toast.variant {
        NotificationVariant::Error => format!("[error] {}: {}", toast.title, toast.message),
        NotificationVariant::Info => format!("[info] {}", toast.message),
    }
}

pub fn format_frame(frame: &RenderFrame, layout: RowLayout) -> String {
    let mut out = String::new();
    if let Some(group) = &frame.active_group {
        let _ = writeln!(out, "Group: {}", group.name);
    }
    if frame.rows.is_empty() {
        let _ = writeln!(out, "  (nothing to show)");
    }
    for row in &frame.rows {
        let _ = writeln!(out, "{}", format_row(row, layout));
    }
    let _ = writeln!(
        out,
        "{}  page {}/{}  |  {}",
        frame.range,
        frame.view.page_index + 1,
        frame.page_count,
        frame.selection.label
    );
    out
}

fn format_row(row: &RowView, layout: RowLayout) -> String {
    let check = if row.selected { "[x]" } else { "[ ]" };
    match layout {
        RowLayout::Launchers => {
            let status = match row.busy.as_deref() {
                Some(tag) => LauncherAction::from_str(tag)
                    .map(|action| format!("{}...", action.progress_label()))
                    .unwrap_or_else(|_| format!("busy ({})", tag)),
                None => match row.entity.bool_field("online") {
                    Some(true) => "online".to_string(),
                    Some(false) => "offline".to_string(),
                    None => "unknown".to_string(),
                },
            };
            let state = row
                .entity
                .property("state")
                .and_then(|value| value.as_str())
                .unwrap_or("-");
            format!("{} {:<24} {:<18} {}", check, row.key, status, state)
        }
        RowLayout::Executions => {
            let entity = &row.entity;
            let status = entity.str_field("status").unwrap_or("-");
            let marker = match StatusTone::classify(status) {
                StatusTone::Running => "~",
                StatusTone::Succeeded => "+",
                StatusTone::Failed => "!",
                StatusTone::Other => " ",
            };
            let job = entity
                .field("job")
                .and_then(|job| job.get("name"))
                .and_then(|name| name.as_str())
                .unwrap_or("-");
            let started = frontend::execution_output::format_date(entity.field("dateStarted"));
            format!(
                "{} #{:<8} {} {:<10} {:<24} {:<16} {}",
                check,
                row.key,
                marker,
                status,
                job,
                entity.str_field("machine_name").unwrap_or("-"),
                or_dash(&started)
            )
        }
    }
}
