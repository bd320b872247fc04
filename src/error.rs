//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - FLOW-000-019: Configuration errors (fatal, never retried)
//! - FLOW-020-029: Coercion errors
//! - FLOW-030-039: Transport errors (retried)
//! - FLOW-040-049: Application-level failures (HTTP status >= 400)
//! - FLOW-050: Cancellation (not a failure, see `RunOutcome`)
//! - FLOW-060-069: Binding/template errors
//! - FLOW-070-079: Graph compilation errors
//! - FLOW-080-089: Cancellation store errors
//! - FLOW-090-099: IO / parse errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum FlowError {
    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (000-019)
    // ═══════════════════════════════════════════
    #[error("[FLOW-001] Node '{node}' is missing required config key '{key}'")]
    MissingConfig { node: String, key: String },

    #[error("[FLOW-002] Node '{node}' has invalid config key '{key}': {reason}")]
    InvalidConfig {
        node: String,
        key: String,
        reason: String,
    },

    #[error("[FLOW-003] Unknown body type '{body_type}'")]
    UnknownBodyType { body_type: String },

    #[error("[FLOW-004] Output schema contract violated: {reason}")]
    SchemaContract { reason: String },

    #[error("[FLOW-005] Configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("[FLOW-006] No executor available for node '{node}' of kind {kind}")]
    ExecutorUnavailable { node: String, kind: String },

    // ═══════════════════════════════════════════
    // COERCION ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[FLOW-020] Cannot coerce {value} to {target}")]
    Coercion { value: String, target: String },

    #[error("[FLOW-021] Type '{data_type}' is not supported here")]
    UnsupportedType { data_type: String },

    #[error("[FLOW-022] Invalid request input: {reason}")]
    InvalidInput { reason: String },

    // ═══════════════════════════════════════════
    // TRANSPORT ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[FLOW-030] HTTP transport failed: {reason}")]
    Transport { reason: String },

    #[error("[FLOW-031] Failed to download file '{url}': {reason}")]
    FileDownload { url: String, reason: String },

    #[error("[FLOW-032] Request body too large: total size {total} exceeds {limit} bytes")]
    BodyTooLarge { total: u64, limit: u64 },

    #[error("[FLOW-033] Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // ═══════════════════════════════════════════
    // APPLICATION FAILURES (040-049)
    // ═══════════════════════════════════════════
    #[error(
        "[FLOW-040] Request {url} failed, response status code={status}, headers={headers}, body={body}"
    )]
    HttpStatus {
        url: String,
        status: u16,
        headers: String,
        body: String,
    },

    #[error("[FLOW-041] Database operation failed: {reason}")]
    Database { reason: String },

    // ═══════════════════════════════════════════
    // CANCELLATION (050)
    // ═══════════════════════════════════════════
    #[error("[FLOW-050] Execution {execution_id} was cancelled")]
    Cancelled { execution_id: i64 },

    // ═══════════════════════════════════════════
    // BINDING / TEMPLATE ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[FLOW-060] Invalid block_output_ variable: {placeholder}")]
    InvalidPlaceholder { placeholder: String },

    #[error("[FLOW-061] Upstream node '{from_node}' has not produced output for '{node}'")]
    UpstreamNotReady { node: String, from_node: String },

    #[error("[FLOW-062] Cannot take operand '{key}' from input")]
    MissingOperand { key: String },

    #[error("[FLOW-063] Cannot write field at '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    // ═══════════════════════════════════════════
    // GRAPH ERRORS (070-079)
    // ═══════════════════════════════════════════
    #[error("[FLOW-070] Duplicate node key '{key}'")]
    DuplicateNode { key: String },

    #[error("[FLOW-071] Node '{node}' references unknown node '{from_node}'")]
    UnknownNode { node: String, from_node: String },

    #[error("[FLOW-072] Cycle detected among nodes: {nodes}")]
    CycleDetected { nodes: String },

    #[error("[FLOW-073] Sub-workflow {workflow_id}@{version} is not registered")]
    SubWorkflowNotFound { workflow_id: i64, version: String },

    // ═══════════════════════════════════════════
    // STORE ERRORS (080-089)
    // ═══════════════════════════════════════════
    #[error("[FLOW-080] Cancel signal store error: {reason}")]
    SignalStore { reason: String },

    // ═══════════════════════════════════════════
    // IO / PARSE ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[FLOW-090] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[FLOW-091] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("[FLOW-092] YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Get the error code (e.g., "FLOW-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "FLOW-001",
            Self::InvalidConfig { .. } => "FLOW-002",
            Self::UnknownBodyType { .. } => "FLOW-003",
            Self::SchemaContract { .. } => "FLOW-004",
            Self::ConfigError { .. } => "FLOW-005",
            Self::ExecutorUnavailable { .. } => "FLOW-006",
            Self::Coercion { .. } => "FLOW-020",
            Self::UnsupportedType { .. } => "FLOW-021",
            Self::InvalidInput { .. } => "FLOW-022",
            Self::Transport { .. } => "FLOW-030",
            Self::FileDownload { .. } => "FLOW-031",
            Self::BodyTooLarge { .. } => "FLOW-032",
            Self::InvalidUrl { .. } => "FLOW-033",
            Self::HttpStatus { .. } => "FLOW-040",
            Self::Database { .. } => "FLOW-041",
            Self::Cancelled { .. } => "FLOW-050",
            Self::InvalidPlaceholder { .. } => "FLOW-060",
            Self::UpstreamNotReady { .. } => "FLOW-061",
            Self::MissingOperand { .. } => "FLOW-062",
            Self::InvalidFieldPath { .. } => "FLOW-063",
            Self::DuplicateNode { .. } => "FLOW-070",
            Self::UnknownNode { .. } => "FLOW-071",
            Self::CycleDetected { .. } => "FLOW-072",
            Self::SubWorkflowNotFound { .. } => "FLOW-073",
            Self::SignalStore { .. } => "FLOW-080",
            Self::Io(_) => "FLOW-090",
            Self::Json(_) => "FLOW-091",
            Self::Yaml(_) => "FLOW-092",
        }
    }

    /// Only transport-level failures are worth another attempt.
    /// A completed exchange with an error status is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Cancellation is an outcome, not a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Configuration errors are fatal to the node and never retried
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConfig { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownBodyType { .. }
                | Self::SchemaContract { .. }
                | Self::ConfigError { .. }
                | Self::ExecutorUnavailable { .. }
        )
    }
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::MissingConfig { .. } => {
                Some("Add the key to the node's configs block before compiling")
            }
            FlowError::InvalidConfig { .. } => Some("Check the value type of the config key"),
            FlowError::UnknownBodyType { .. } => Some(
                "Use one of EMPTY, JSON, RAW_TEXT, FORM_DATA, FORM_URLENCODED, BINARY",
            ),
            FlowError::SchemaContract { .. } => {
                Some("Declare outputList as an array of objects with element properties")
            }
            FlowError::ConfigError { .. } => Some("Check the engine config file and FLOWCORE_* env vars"),
            FlowError::ExecutorUnavailable { .. } => {
                Some("Register the collaborator this node kind needs on the Runner")
            }
            FlowError::Coercion { .. } => Some("Ensure the value matches the declared field type"),
            FlowError::UnsupportedType { .. } => {
                Some("Object fields cannot be coerced, declare their properties instead")
            }
            FlowError::InvalidInput { .. } => Some("Check the node's input bindings"),
            FlowError::Transport { .. } => Some("Check network connectivity or raise retry_times"),
            FlowError::FileDownload { .. } => Some("Check the file URL is reachable and returns 200"),
            FlowError::BodyTooLarge { .. } => Some("Upload fewer or smaller files (20 MiB total)"),
            FlowError::InvalidUrl { .. } => Some("Check the rendered URL template"),
            FlowError::HttpStatus { .. } => Some("Inspect the response body for the server's reason"),
            FlowError::Database { .. } => Some("Check the table exists and the fields are valid"),
            FlowError::Cancelled { .. } => None,
            FlowError::InvalidPlaceholder { .. } => {
                Some("Use {{block_output_<node>.<field>}} with a field after the dot")
            }
            FlowError::UpstreamNotReady { .. } => {
                Some("Ensure the upstream node runs before this one")
            }
            FlowError::MissingOperand { .. } => {
                Some("Bind a right-hand value for every clause that needs one")
            }
            FlowError::InvalidFieldPath { .. } => {
                Some("Two bindings write to overlapping paths, check the field paths")
            }
            FlowError::DuplicateNode { .. } => Some("Use unique node keys"),
            FlowError::UnknownNode { .. } => Some("Verify the referenced node key exists"),
            FlowError::CycleDetected { .. } => Some("Remove the circular dependency between nodes"),
            FlowError::SubWorkflowNotFound { .. } => {
                Some("Register the sub-workflow on the Runner before running")
            }
            FlowError::SignalStore { .. } => Some("Check the cancel signal store is reachable"),
            FlowError::Io(_) => Some("Check file path and permissions"),
            FlowError::Json(_) => Some("Check JSON syntax"),
            FlowError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}
