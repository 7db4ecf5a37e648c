//! Execution detail and incremental log output for one execution.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use shared::{ExecutionOutputChunk, encode_path_segment};

use crate::collection_view::EXECUTIONS_PATH;
use crate::transport::Transport;

pub const DEFAULT_OUTPUT_POLL: Duration = Duration::from_millis(1500);

/// Older backends expose the singular route.
const LEGACY_EXECUTION_PATH: &str = "/api/rundeck/execution";

const MACHINE_OPTION: &str = "machineName";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDetail {
    pub id: String,
    pub job_name: String,
    pub machine: String,
    pub status: String,
    pub user: String,
    pub started: String,
    pub ended: String,
    pub argstring: String,
}

impl ExecutionDetail {
    pub fn from_value(id: &str, exec: &Value) -> Self {
        let text = |name: &str| exec.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
        let argstring = text("argstring");

        let machine = exec
            .get("options")
            .and_then(|options| options.get(MACHINE_OPTION))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| parse_option(&argstring, MACHINE_OPTION))
            .unwrap_or_else(|| "-".to_string());

        let job_name = match exec.get("job") {
            Some(Value::String(name)) => name.clone(),
            Some(job) => job
                .get("name")
                .and_then(shared::scalar_key)
                .or_else(|| job.get("id").and_then(shared::scalar_key))
                .unwrap_or_default(),
            None => String::new(),
        };

        Self {
            id: id.to_string(),
            job_name,
            machine,
            status: text("status"),
            user: text("user"),
            started: format_date(exec.get("dateStarted").or_else(|| exec.get("date-started"))),
            ended: format_date(exec.get("dateEnded").or_else(|| exec.get("date-ended"))),
            argstring,
        }
    }
}

/// Dates arrive either as a string or as `{ "date": "..." }`.
pub fn format_date(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(date)) => date.clone(),
        Some(Value::Object(map)) => map
            .get("date")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// `-name value` or `-name=value` inside a job argstring, case-insensitive.
pub fn parse_option(argstring: &str, name: &str) -> Option<String> {
    let flag = format!("-{}", name);
    let mut tokens = argstring.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case(&flag) {
            return tokens.next().map(str::to_string);
        }
        if let Some((head, value)) = token.split_once('=') {
            if head.eq_ignore_ascii_case(&flag) && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub trait OutputSink {
    fn show_detail(&self, detail: &ExecutionDetail);

    fn append_line(&self, line: &str);

    /// Replace everything shown so far with a status message.
    fn replace_output(&self, message: &str);
}

/// Shared stop switch for a running follower.
#[derive(Debug, Clone, Default)]
pub struct OutputCancel(Rc<Cell<bool>>);

impl OutputCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowEnd {
    Completed,
    Cancelled,
    /// Following stopped; the message was shown to the sink.
    Unavailable(String),
}

/// Load the execution's detail, then poll its output until it completes,
/// the route disappears, or `cancel` is set.
pub async fn follow_output<T: Transport, O: OutputSink>(
    transport: &T,
    sink: &O,
    execution_id: &str,
    every: Duration,
    cancel: &OutputCancel,
) -> FollowEnd {
    let id = encode_path_segment(execution_id);
    let detail_paths = [
        format!("{}/{}", EXECUTIONS_PATH, id),
        format!("{}/{}", LEGACY_EXECUTION_PATH, id),
    ];
    let Some(exec) = fetch_with_fallback(transport, &detail_paths).await else {
        return unavailable(sink, "Output unavailable (execution detail endpoint not found).");
    };
    sink.show_detail(&ExecutionDetail::from_value(execution_id, &exec));
    sink.replace_output("");

    let mut offset = 0;
    let mut lastmod = 0;
    loop {
        if cancel.is_cancelled() {
            return FollowEnd::Cancelled;
        }

        let query = format!("output?offset={}&lastmod={}", offset, lastmod);
        let output_paths = [
            format!("{}/{}/{}", EXECUTIONS_PATH, id, query),
            format!("{}/{}/{}", LEGACY_EXECUTION_PATH, id, query),
        ];
        let Some(payload) = fetch_with_fallback(transport, &output_paths).await else {
            return unavailable(sink, "Output unavailable (LM-API output route not found).");
        };
        if cancel.is_cancelled() {
            return FollowEnd::Cancelled;
        }
        if !payload.get("entries").is_some_and(Value::is_array) {
            return unavailable(
                sink,
                "Output response format unexpected (entries is not an array).",
            );
        }
        let chunk: ExecutionOutputChunk = match serde_json::from_value(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Undecodable output chunk for execution {}: {}", execution_id, e);
                return unavailable(sink, "Output response format unexpected.");
            }
        };

        for line in chunk.entries.iter().filter_map(|entry| entry.log.as_deref()) {
            if !line.is_empty() {
                sink.append_line(line);
            }
        }
        offset = chunk.offset.unwrap_or(offset);
        lastmod = chunk.lastmod.unwrap_or(lastmod);

        if chunk.completed {
            debug!("Execution {} output complete", execution_id);
            return FollowEnd::Completed;
        }
        tokio::time::sleep(every).await;
    }
}

fn unavailable<O: OutputSink>(sink: &O, message: &str) -> FollowEnd {
    sink.replace_output(message);
    FollowEnd::Unavailable(message.to_string())
}

/// A missing route shows up as a 404, as the transport's empty-list stand-in
/// for one, or as FastAPI's `{"detail": "Not Found"}` body.
fn is_missing(payload: &Value) -> bool {
    match payload {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.get("detail").and_then(Value::as_str) == Some("Not Found"),
        _ => false,
    }
}

async fn fetch_with_fallback<T: Transport>(transport: &T, paths: &[String]) -> Option<Value> {
    for path in paths {
        match transport.fetch_json(path).await {
            Ok(payload) if is_missing(&payload) => continue,
            Ok(payload) => return Some(payload),
            Err(e) if e.status() == Some(404) => continue,
            Err(e) => {
                warn!("Request to {} failed: {}", path, e);
                return None;
            }
        }
    }
    None
}
