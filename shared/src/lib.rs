use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod sse;

pub use sse::{SseDecoder, SseFrame};

// ===== PUSH EVENT TYPES =====

pub const AUTOMATION_RUN_EVENT: &str = "automation_run";
pub const LAUNCHER_STATE_EVENT: &str = "launcher_state";
pub const RUNDECK_EXECUTION_EVENT: &str = "rundeck_execution";

/// Named event classes carried on the shared push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AutomationRun,
    LauncherState,
    RundeckExecution,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::AutomationRun,
        EventKind::LauncherState,
        EventKind::RundeckExecution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AutomationRun => AUTOMATION_RUN_EVENT,
            EventKind::LauncherState => LAUNCHER_STATE_EVENT,
            EventKind::RundeckExecution => RUNDECK_EXECUTION_EVENT,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AutomationRunEvent {
    pub machine_name: Option<String>,
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub online: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LauncherStateEvent {
    pub machine_name: Option<String>,
    #[serde(rename = "machineName")]
    pub machine_name_camel: Option<String>,
    pub online: Option<bool>,
    pub state: Option<String>,
}

impl LauncherStateEvent {
    pub fn machine_name(&self) -> Option<&str> {
        self.machine_name
            .as_deref()
            .or(self.machine_name_camel.as_deref())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JobRef {
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExecutionEvent {
    #[serde(rename = "executionId")]
    pub execution_id: Option<Value>,
    pub id: Option<Value>,
    pub status: Option<String>,
    #[serde(rename = "dateStarted")]
    pub date_started: Option<String>,
    #[serde(rename = "dateEnded")]
    pub date_ended: Option<String>,
    pub job: Option<JobRef>,
    pub job_name: Option<String>,
    pub machine_name: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
}

impl ExecutionEvent {
    /// `executionId` wins over `id`; numeric ids are stringified.
    pub fn execution_key(&self) -> Option<String> {
        self.execution_id
            .as_ref()
            .and_then(scalar_key)
            .or_else(|| self.id.as_ref().and_then(scalar_key))
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job
            .as_ref()
            .and_then(|job| job.name.as_deref())
            .or(self.job_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

/// A decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    AutomationRun(AutomationRunEvent),
    LauncherState(LauncherStateEvent),
    RundeckExecution(ExecutionEvent),
}

impl PushEvent {
    pub fn decode(kind: EventKind, data: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::AutomationRun => PushEvent::AutomationRun(serde_json::from_str(data)?),
            EventKind::LauncherState => PushEvent::LauncherState(serde_json::from_str(data)?),
            EventKind::RundeckExecution => {
                PushEvent::RundeckExecution(serde_json::from_str(data)?)
            }
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::AutomationRun(_) => EventKind::AutomationRun,
            PushEvent::LauncherState(_) => EventKind::LauncherState,
            PushEvent::RundeckExecution(_) => EventKind::RundeckExecution,
        }
    }

    pub fn entity_key(&self) -> Option<String> {
        match self {
            PushEvent::AutomationRun(event) => event
                .machine_name
                .clone()
                .filter(|name| !name.is_empty()),
            PushEvent::LauncherState(event) => event.machine_name().map(str::to_string),
            PushEvent::RundeckExecution(event) => event.execution_key(),
        }
    }
}

// ===== RUN STATUS =====

/// `queued` and `running` are the only non-terminal run states.
pub fn is_in_flight_status(status: &str) -> bool {
    matches!(status, "queued" | "running")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Running,
    Succeeded,
    Failed,
    Other,
}

impl StatusTone {
    pub fn classify(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "running" | "queued" | "scheduled" => StatusTone::Running,
            "succeeded" | "success" => StatusTone::Succeeded,
            "failed" | "failure" | "aborted" | "cancelled" | "timedout" => StatusTone::Failed,
            _ => StatusTone::Other,
        }
    }
}

// ===== ACTIONS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LauncherAction {
    Commission,
    Decommission,
    Start,
    Stop,
}

impl LauncherAction {
    pub const ALL: [LauncherAction; 4] = [
        LauncherAction::Commission,
        LauncherAction::Decommission,
        LauncherAction::Start,
        LauncherAction::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LauncherAction::Commission => "commission",
            LauncherAction::Decommission => "decommission",
            LauncherAction::Start => "start",
            LauncherAction::Stop => "stop",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LauncherAction::Commission => "Commission",
            LauncherAction::Decommission => "Decommission",
            LauncherAction::Start => "Start",
            LauncherAction::Stop => "Stop",
        }
    }

    pub fn progress_label(&self) -> &'static str {
        match self {
            LauncherAction::Commission => "Commissioning",
            LauncherAction::Decommission => "Decommissioning",
            LauncherAction::Start => "Starting",
            LauncherAction::Stop => "Stopping",
        }
    }
}

impl std::str::FromStr for LauncherAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("Unsupported action '{}'", value))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BulkActionRequest {
    pub machine_names: Vec<String>,
}

/// One entry of an action outcome list. The backend sends either a bare key
/// or an object describing the key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ActionTarget {
    Key(String),
    Detailed {
        machine_name: String,
        #[serde(rename = "automationRunId", default)]
        automation_run_id: Option<i64>,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ActionTarget {
    pub fn key(&self) -> &str {
        match self {
            ActionTarget::Key(key) => key,
            ActionTarget::Detailed { machine_name, .. } => machine_name,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    #[serde(default)]
    pub queued: Vec<ActionTarget>,
    #[serde(default)]
    pub skipped: Vec<ActionTarget>,
    #[serde(rename = "automationRunId", default)]
    pub automation_run_id: Option<i64>,
}

impl ActionOutcome {
    pub fn queued_keys(&self) -> Vec<String> {
        self.queued.iter().map(|t| t.key().to_string()).collect()
    }

    pub fn skipped_keys(&self) -> Vec<String> {
        self.skipped.iter().map(|t| t.key().to_string()).collect()
    }
}

// ===== GROUPS =====

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub member_count: Option<u64>,
}

impl GroupSummary {
    pub fn key(&self) -> Option<String> {
        scalar_key(&self.id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GroupDetail {
    pub group: GroupSummary,
    #[serde(default)]
    pub members: Vec<Value>,
}

impl GroupDetail {
    pub fn member_keys(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(|member| member.get("machine_name").and_then(scalar_key))
            .collect()
    }
}

// ===== EXECUTION OUTPUT =====

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OutputEntry {
    #[serde(default)]
    pub log: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutputChunk {
    pub entries: Vec<OutputEntry>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub lastmod: Option<u64>,
    #[serde(default)]
    pub completed: bool,
}

// ===== CONFIG TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub refresh: RefreshSection,
    pub view: ViewSection,
    pub executions: ExecutionsSection,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppSection {
    pub version: String,
}

impl AppSection {
    /// Current configuration format version
    pub const CURRENT_VERSION: &'static str = "1.0.0";

    pub fn is_supported_version(&self) -> bool {
        matches!(self.version.as_str(), "1.0.0")
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub base_url: String,
    pub events_path: String,
    pub request_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            events_path: "/api/events".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RefreshSection {
    pub every_ms: u64,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self { every_ms: 15_000 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ViewSection {
    pub page_size: usize,
}

impl Default for ViewSection {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionsSection {
    pub limit: usize,
    pub cap: usize,
    pub output_poll_ms: u64,
}

impl Default for ExecutionsSection {
    fn default() -> Self {
        Self {
            limit: 150,
            cap: 200,
            output_poll_ms: 1_500,
        }
    }
}

// ===== UTILITY FUNCTIONS =====

/// Stringify a scalar identifier. Empty strings and non-scalars have no key.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Percent-encode a path segment (RFC 3986 unreserved characters pass through).
pub fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
