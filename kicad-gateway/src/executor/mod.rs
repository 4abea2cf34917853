//! Execution engine
//!
//! Runs one KiScript snippet per request against a fresh namespace bound to
//! the request's session lease. The interpreter is single-threaded, so the
//! whole run (namespace, evaluation, teardown) happens on one dedicated
//! thread while the async caller waits. That thread gets its own large
//! stack, so the call depth limit holds whatever runtime the engine is
//! embedded in.

use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use kiscript::runtime::OutputRecord;
use kiscript::{run_script, FaultReport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bridge::build_namespace;
use crate::config::ExecutionConfig;
use crate::reporter::truncate_text;
use crate::session::{SessionError, SessionGateway};

/// Stack reserved for each script thread, sized for the interpreter at
/// [`MAX_CALL_DEPTH_CEILING`](crate::config::MAX_CALL_DEPTH_CEILING).
pub const SCRIPT_STACK_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub description: Option<String>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Outcome of one execution, ready for the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub description: Option<String>,
    pub stdout_text: String,
    /// Text written with `warn()`.
    pub warnings: String,
    /// `repr()` of the trailing expression, already truncated.
    pub return_value_repr: Option<String>,
    pub error: Option<FaultReport>,
    pub records: Vec<OutputRecord>,
    /// Commits the script left open, dropped when the request ended.
    pub abandoned_commits: Vec<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

pub struct ExecutionEngine {
    gateway: Arc<SessionGateway>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(gateway: Arc<SessionGateway>, config: ExecutionConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run `request` against the current document.
    ///
    /// Fails only when the session is unavailable, in which case nothing
    /// ran. Every fault raised by the snippet comes back as an error-typed
    /// `ExecutionResult`.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResult, SessionError> {
        match &request.description {
            Some(description) => info!("Executing snippet: {}", description),
            None => info!("Executing snippet ({} bytes)", request.code.len()),
        }
        let started = Instant::now();

        let lease = self.gateway.acquire().await?;
        let budget = self.config.budget();
        let code = request.code;

        let (sender, receiver) = tokio::sync::oneshot::channel();
        let spawned = thread::Builder::new()
            .name("kiscript".to_string())
            .stack_size(SCRIPT_STACK_BYTES)
            .spawn(move || {
                let lease = Rc::new(lease);
                let namespace = build_namespace(&lease);
                let outcome = run_script(&code, namespace, &budget);
                let abandoned = lease.finish();
                // The caller may have gone away; the run is complete either way.
                let _ = sender.send((outcome, abandoned));
            });
        let joined = match spawned {
            Ok(_) => receiver
                .await
                .map_err(|_| "the script thread exited without a result".to_string()),
            Err(e) => Err(format!("could not start the script thread: {e}")),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (outcome, abandoned) = match joined {
            Ok(done) => done,
            Err(reason) => {
                warn!("Execution worker failed: {}", reason);
                return Ok(ExecutionResult {
                    status: ExecutionStatus::Error,
                    description: request.description,
                    stdout_text: String::new(),
                    warnings: String::new(),
                    return_value_repr: None,
                    error: Some(FaultReport {
                        kind: "InternalError".to_string(),
                        message: format!("execution worker failed: {reason}"),
                        traceback: String::new(),
                    }),
                    records: Vec::new(),
                    abandoned_commits: Vec::new(),
                    duration_ms,
                });
            }
        };

        let (status, return_value_repr, error) = match outcome.result {
            Ok(value) => (
                ExecutionStatus::Success,
                value.map(|repr| truncate_text(&repr, self.config.max_return_chars)),
                None,
            ),
            Err(fault) => {
                debug!("Snippet raised {}: {}", fault.kind, fault.message);
                (ExecutionStatus::Error, None, Some(fault))
            }
        };
        info!("Execution finished: {:?} in {} ms", status, duration_ms);

        Ok(ExecutionResult {
            status,
            description: request.description,
            stdout_text: outcome.output.stdout_text(),
            warnings: outcome.output.stderr_text(),
            return_value_repr,
            error,
            records: outcome.output.into_records(),
            abandoned_commits: abandoned.into_iter().map(|t| t.0).collect(),
            duration_ms,
        })
    }
}
