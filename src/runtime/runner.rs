//! Workflow Runner - sequential execution of a compiled workflow
//!
//! Per node, in topological order:
//! 1. checkpoint (cancellation flag + token)
//! 2. resolve inputs from the `DataStore`
//! 3. invoke the node's executor
//! 4. store the output, or the default output when the node ignores errors
//!
//! Cancellation surfaces as `RunOutcome::Cancelled`, never as an error.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::ast::NodeKind;
use crate::binding::resolve_inputs;
use crate::config::HttpSettings;
use crate::dag::{CompiledNode, CompiledWorkflow, NodeConfig};
use crate::error::{FlowError, Result};
use crate::event::EventKind;
use crate::nodes::database::{DatabaseNode, DatabaseOperator};
use crate::nodes::http::{HttpRequester, HttpTransport};
use crate::nodes::{NodeExecutor, Passthrough};
use crate::signal::CancelWatcher;
use crate::store::{DataStore, NodeResult};

use super::context::ExecutionContext;

/// Key wrapping a non-object sub-workflow result
pub const SUB_WORKFLOW_OUTPUT: &str = "output";

/// How a run ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Output of the exit node (or the last node)
    Completed { output: Value },
    Cancelled {
        execution_id: i64,
        at_node: Option<Arc<str>>,
    },
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Completed { output } => Some(output),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Collaborators shared by a runner and its sub-workflow runners
#[derive(Clone, Default)]
struct Services {
    transport: Option<Arc<dyn HttpTransport>>,
    database: Option<Arc<dyn DatabaseOperator>>,
    http: HttpSettings,
    sub_workflows: FxHashMap<(i64, String), Arc<CompiledWorkflow>>,
}

/// Where and why execution stopped early
struct Halt {
    node: Option<Arc<str>>,
    error: FlowError,
}

/// Runs one compiled workflow
pub struct Runner {
    workflow: Arc<CompiledWorkflow>,
    datastore: DataStore,
    services: Arc<Services>,
}

impl Runner {
    pub fn new(workflow: CompiledWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            datastore: DataStore::new(),
            services: Arc::new(Services::default()),
        }
    }

    fn services_mut(&mut self) -> &mut Services {
        Arc::make_mut(&mut self.services)
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.services_mut().transport = Some(transport);
        self
    }

    pub fn with_database(mut self, database: Arc<dyn DatabaseOperator>) -> Self {
        self.services_mut().database = Some(database);
        self
    }

    pub fn with_http_settings(mut self, settings: HttpSettings) -> Self {
        self.services_mut().http = settings;
        self
    }

    /// Register the workflow a `sub_workflow` node with this identity runs
    pub fn with_sub_workflow(
        mut self,
        workflow_id: i64,
        version: impl Into<String>,
        workflow: CompiledWorkflow,
    ) -> Self {
        self.services_mut()
            .sub_workflows
            .insert((workflow_id, version.into()), Arc::new(workflow));
        self
    }

    pub fn workflow(&self) -> &CompiledWorkflow {
        &self.workflow
    }

    /// Outputs written so far
    pub fn datastore(&self) -> &DataStore {
        &self.datastore
    }

    fn child(&self, workflow: Arc<CompiledWorkflow>) -> Self {
        Self {
            workflow,
            datastore: DataStore::new(),
            services: Arc::clone(&self.services),
        }
    }

    /// Main execution loop
    ///
    /// `input` becomes the entry node's output.
    #[instrument(skip(self, ctx, input), fields(execution_id = ctx.execution_id(), nodes = self.workflow.len()))]
    pub async fn run(&self, ctx: &ExecutionContext, input: Map<String, Value>) -> Result<RunOutcome> {
        let start = Instant::now();
        let _watcher =
            CancelWatcher::spawn(Arc::clone(ctx.signals()), ctx.execution_id(), ctx.token().clone())
                .await?;

        info!(mode = %ctx.mode(), "starting workflow execution");
        ctx.event_log().emit(EventKind::WorkflowStarted {
            execution_id: ctx.execution_id(),
            node_count: self.workflow.len(),
            mode: ctx.mode().to_string(),
        });

        match self.execute(ctx, input).await {
            Ok(output) => {
                let total_duration_ms = start.elapsed().as_millis() as u64;
                info!(total_duration_ms, "workflow completed");
                ctx.event_log().emit(EventKind::WorkflowCompleted {
                    final_output: Arc::new(output.clone()),
                    total_duration_ms,
                });
                Ok(RunOutcome::Completed { output })
            }
            Err(Halt { node, error }) if error.is_cancelled() => {
                info!(at_node = ?node, "workflow cancelled");
                ctx.event_log().emit(EventKind::WorkflowCancelled {
                    execution_id: ctx.execution_id(),
                    at_node: node.clone(),
                });
                Ok(RunOutcome::Cancelled {
                    execution_id: ctx.execution_id(),
                    at_node: node,
                })
            }
            Err(Halt { node, error }) => {
                ctx.event_log().emit(EventKind::WorkflowFailed {
                    error: error.to_string(),
                    failed_node: node,
                });
                Err(error)
            }
        }
    }

    /// Every node in order; the final output on success
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        input: Map<String, Value>,
    ) -> std::result::Result<Value, Halt> {
        let mut input = Some(input);

        for node in self.workflow.iter() {
            let halt = |error| Halt {
                node: Some(Arc::clone(&node.key)),
                error,
            };
            ctx.checkpoint().await.map_err(halt)?;

            let node_input = if node.schema.kind == NodeKind::Entry {
                Ok(input.take().unwrap_or_default())
            } else {
                resolve_inputs(&node.schema, &self.datastore)
            };
            self.execute_node(ctx, node, node_input).await.map_err(halt)?;
        }

        let output = self
            .workflow
            .exit()
            .and_then(|key| self.datastore.get_output(key))
            .map(|output| Value::clone(&output))
            .unwrap_or(Value::Null);
        Ok(output)
    }

    /// Run one node and store its result
    ///
    /// Failures of a node that ignores exceptions store its default output.
    async fn execute_node(
        &self,
        ctx: &ExecutionContext,
        node: &CompiledNode,
        input: Result<Map<String, Value>>,
    ) -> Result<()> {
        let start = Instant::now();

        let result = match input {
            Ok(input) => {
                ctx.event_log().emit(EventKind::NodeStarted {
                    node: Arc::clone(&node.key),
                    kind: node.schema.kind.to_string(),
                    inputs: Value::Object(input.clone()),
                });
                match self.executor(node) {
                    Ok(executor) => executor.invoke(ctx, input).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        let duration = start.elapsed();

        match result {
            Ok(output) => {
                let stored = NodeResult::success(output, duration);
                debug!(node = %node.key, duration_ms = duration.as_millis() as u64, "node completed");
                ctx.event_log().emit(EventKind::NodeCompleted {
                    node: Arc::clone(&node.key),
                    output: Arc::clone(&stored.output),
                    duration_ms: duration.as_millis() as u64,
                });
                self.datastore.insert(Arc::clone(&node.key), stored);
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                ctx.event_log().emit(EventKind::CancelObserved {
                    node: Arc::clone(&node.key),
                    execution_id: ctx.execution_id(),
                });
                Err(e)
            }
            Err(e) if node.schema.exception_policy.ignore_exception => {
                let default_output = node
                    .schema
                    .exception_policy
                    .default_output
                    .clone()
                    .unwrap_or_default();
                warn!(node = %node.key, error = %e, "node failed, using default output");
                ctx.event_log().emit(EventKind::NodeFallback {
                    node: Arc::clone(&node.key),
                    error: e.to_string(),
                    default_output: Value::Object(default_output.clone()),
                });
                self.datastore.insert(
                    Arc::clone(&node.key),
                    NodeResult::fallback(default_output, e.to_string(), duration),
                );
                Ok(())
            }
            Err(e) => {
                warn!(node = %node.key, error = %e, "node failed");
                ctx.event_log().emit(EventKind::NodeFailed {
                    node: Arc::clone(&node.key),
                    error: e.to_string(),
                    duration_ms: duration.as_millis() as u64,
                });
                Err(e)
            }
        }
    }

    /// Executor for `node`, built from its decoded config
    fn executor(&self, node: &CompiledNode) -> Result<Box<dyn NodeExecutor>> {
        let unavailable = || FlowError::ExecutorUnavailable {
            node: node.key.to_string(),
            kind: node.schema.kind.to_string(),
        };

        Ok(match &node.config {
            NodeConfig::Entry | NodeConfig::Exit => Box::new(Passthrough),
            NodeConfig::Http(config) => {
                let transport = self.services.transport.clone().ok_or_else(unavailable)?;
                Box::new(HttpRequester::new(
                    Arc::clone(&node.key),
                    config.clone(),
                    transport,
                    self.services.http.clone(),
                ))
            }
            NodeConfig::Database(config) => {
                let database = self.services.database.clone().ok_or_else(unavailable)?;
                Box::new(DatabaseNode::new(Arc::clone(&node.key), config.clone(), database))
            }
            NodeConfig::SubWorkflow {
                workflow_id,
                version,
            } => {
                let workflow = self
                    .services
                    .sub_workflows
                    .get(&(*workflow_id, version.clone()))
                    .ok_or_else(|| FlowError::SubWorkflowNotFound {
                        workflow_id: *workflow_id,
                        version: version.clone(),
                    })?;
                Box::new(SubWorkflow {
                    runner: self.child(Arc::clone(workflow)),
                })
            }
        })
    }
}

/// Runs a nested workflow under the parent's context
struct SubWorkflow {
    runner: Runner,
}

#[async_trait]
impl NodeExecutor for SubWorkflow {
    async fn invoke(&self, ctx: &ExecutionContext, input: Map<String, Value>) -> Result<Map<String, Value>> {
        match self.runner.execute(ctx, input).await {
            Ok(Value::Object(output)) => Ok(output),
            Ok(other) => {
                let mut output = Map::new();
                output.insert(SUB_WORKFLOW_OUTPUT.to_string(), other);
                Ok(output)
            }
            Err(Halt { error, .. }) => Err(error),
        }
    }
}
