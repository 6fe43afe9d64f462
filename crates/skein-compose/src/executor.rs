//! Layered plan executor
//!
//! Runs a [`CompiledPlan`] layer by layer: every node in a layer is spawned
//! as its own task, and a layer finishes when all of its tasks have joined.
//! Data moves between layers through an output table keyed by node id; the
//! compiler has already proven that each node's sources live in strictly
//! earlier layers, so inputs can be assembled before a layer starts.
//!
//! Failure is fail-fast: the first node error cancels the run token, which
//! preempts every sibling still in flight, and that first error is what the
//! caller sees.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::compile::CompiledPlan;
use crate::error::{ComposeError, Result};
use crate::events::{EventSink, NullEventSink, RunEvent};
use crate::graph::{NodeId, END, START};
use crate::mapping;
use crate::node::RunContext;
use crate::stream::OutputStream;

/// Buffered chunks between the run worker and an [`OutputStream`]
const CHUNK_BUFFER: usize = 32;

/// Per-run settings
///
/// The defaults run without events, without a deadline, and with a token
/// nobody else can fire.
pub struct RunOptions {
    /// Receiver for run progress events
    pub event_sink: Arc<dyn EventSink>,
    /// Upper bound on wall-clock run time
    pub deadline: Option<Duration>,
    /// External cancellation; the run observes a child of this token
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self {
            event_sink: Arc::new(NullEventSink),
            deadline: None,
            cancellation: None,
        }
    }

    /// Set the event sink for this run
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Set a wall-clock deadline for this run
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tie this run to an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes a compiled plan
///
/// A runner is a thin, cloneable handle over an immutable plan. Clones share
/// the plan, and any number of runs may be in flight at once; nothing about a
/// run mutates the plan.
#[derive(Clone)]
pub struct Runner {
    plan: Arc<CompiledPlan>,
}

impl Runner {
    pub fn new(plan: CompiledPlan) -> Self {
        Self {
            plan: Arc::new(plan),
        }
    }

    /// The plan this runner executes
    pub fn plan(&self) -> &CompiledPlan {
        &self.plan
    }

    /// Run the plan once and return the workflow output
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with(input, RunOptions::default()).await
    }

    /// Run the plan once with explicit options
    ///
    /// The input is shape-checked against the workflow input type before the
    /// run starts; a rejected input produces no events.
    pub async fn invoke_with(&self, input: Value, options: RunOptions) -> Result<Value> {
        let run = Run::new(self.plan.clone(), &options);
        run.check_input(&input)?;

        run.emit_run_started();
        let outcome = match options.deadline {
            Some(limit) => match tokio::time::timeout(limit, run.run_to_end(input)).await {
                Ok(result) => result,
                Err(_) => {
                    run.token.cancel();
                    Err(ComposeError::DeadlineExceeded)
                }
            },
            None => run.run_to_end(input).await,
        };

        match &outcome {
            Ok(_) => run.emit_run_completed(),
            Err(e) => run.emit_run_failed(e),
        }
        outcome
    }

    /// Run the plan and deliver its output incrementally
    pub fn stream(&self, input: Value) -> OutputStream {
        self.stream_with(input, RunOptions::default())
    }

    /// Run the plan with explicit options, delivering output incrementally
    ///
    /// When the plan ends in a streaming node wired straight into the output,
    /// its chunks are forwarded as they are produced. Any other plan runs to
    /// completion and delivers the whole output as a single chunk. Errors,
    /// including a rejected input, arrive in-band as the final frame.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream_with(&self, input: Value, options: RunOptions) -> OutputStream {
        let run = Run::new(self.plan.clone(), &options);
        let deadline = options.deadline;
        let token = run.token.clone();
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);

        let worker = tokio::spawn(async move {
            if let Err(e) = run.check_input(&input) {
                let _ = tx.send(Err(e)).await;
                return;
            }

            run.emit_run_started();
            let body = run.stream_to_end(input, &tx);
            let outcome = match deadline {
                Some(limit) => match tokio::time::timeout(limit, body).await {
                    Ok(result) => result,
                    Err(_) => {
                        run.token.cancel();
                        Err(ComposeError::DeadlineExceeded)
                    }
                },
                None => body.await,
            };

            match outcome {
                Ok(()) => run.emit_run_completed(),
                Err(e) => {
                    run.emit_run_failed(&e);
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        OutputStream::new(rx, worker, token)
    }
}

/// State for one run of a plan
struct Run {
    plan: Arc<CompiledPlan>,
    run_id: Uuid,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
}

impl Run {
    fn new(plan: Arc<CompiledPlan>, options: &RunOptions) -> Self {
        let token = match &options.cancellation {
            Some(external) => external.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            plan,
            run_id: Uuid::new_v4(),
            sink: options.event_sink.clone(),
            token,
        }
    }

    fn check_input(&self, input: &Value) -> Result<()> {
        if !self.plan.input_type().matches(input) {
            return Err(ComposeError::InvalidInput(format!(
                "workflow input does not match declared type {}",
                self.plan.input_type()
            )));
        }
        Ok(())
    }

    /// Run every layer, then assemble the workflow output
    async fn run_to_end(&self, input: Value) -> Result<Value> {
        log::debug!(
            "run {}: starting with {} layers",
            self.run_id,
            self.plan.layers().len()
        );

        let mut outputs = HashMap::new();
        outputs.insert(START.to_string(), input);

        for layer in self.plan.layers() {
            if self.token.is_cancelled() {
                return Err(ComposeError::Cancelled);
            }
            self.run_layer(layer, &mut outputs).await?;
        }

        mapping::assemble_input(END, self.plan.assignments_for(END), &outputs)
    }

    /// Run the plan for a streaming consumer, sending chunks through `tx`
    ///
    /// With a stream feed in place, every layer before the feed runs
    /// normally, then the feed node's chunks are forwarded one by one.
    /// Without one, the run completes first and the output goes out as a
    /// single chunk.
    async fn stream_to_end(&self, input: Value, tx: &mpsc::Sender<Result<Value>>) -> Result<()> {
        let Some(feed) = self.plan.stream_feed().map(str::to_string) else {
            let output = self.run_to_end(input).await?;
            self.emit_output_chunk(&output);
            let _ = tx.send(Ok(output)).await;
            return Ok(());
        };

        let mut outputs = HashMap::new();
        outputs.insert(START.to_string(), input);

        let layers = self.plan.layers();
        for layer in &layers[..layers.len() - 1] {
            if self.token.is_cancelled() {
                return Err(ComposeError::Cancelled);
            }
            self.run_layer(layer, &mut outputs).await?;
        }

        let node = self
            .plan
            .node(&feed)
            .cloned()
            .ok_or_else(|| ComposeError::node_failure(&feed, "node missing from plan"))?;
        let input = mapping::assemble_input(&feed, self.plan.assignments_for(&feed), &outputs)?;

        self.emit_node_started(&feed);
        let ctx = RunContext {
            run_id: self.run_id,
            cancellation: self.token.clone(),
        };
        let mut chunks = node
            .stream(&ctx, input)
            .await
            .map_err(|e| self.node_error(&feed, e))?;

        loop {
            let next = tokio::select! {
                _ = self.token.cancelled() => {
                    let e = ComposeError::Cancelled;
                    self.emit_node_failed(&feed, &e);
                    return Err(e);
                }
                next = chunks.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let value = chunk.map_err(|e| {
                let e = self.node_error(&feed, e);
                self.emit_node_failed(&feed, &e);
                e
            })?;
            self.emit_output_chunk(&value);
            if tx.send(Ok(value)).await.is_err() {
                // Consumer went away; nothing left to produce for.
                return Err(ComposeError::Cancelled);
            }
        }

        self.emit_node_completed(&feed, None);
        Ok(())
    }

    /// Run one layer to completion
    ///
    /// Nodes are spawned in layer order and their outputs recorded as they
    /// join. On the first failure the run token fires, siblings wind down as
    /// cancelled, and the failure is returned once the layer has drained.
    async fn run_layer(
        &self,
        layer: &[NodeId],
        outputs: &mut HashMap<String, Value>,
    ) -> Result<()> {
        let mut tasks = JoinSet::new();
        let mut task_names: HashMap<tokio::task::Id, NodeId> = HashMap::new();

        for id in layer {
            let node = self
                .plan
                .node(id)
                .cloned()
                .ok_or_else(|| ComposeError::node_failure(id, "node missing from plan"))?;
            let input = mapping::assemble_input(id, self.plan.assignments_for(id), outputs)?;

            self.emit_node_started(id);
            let ctx = RunContext {
                run_id: self.run_id,
                cancellation: self.token.clone(),
            };
            let node_id = id.clone();
            let handle = tasks.spawn(async move {
                let result = tokio::select! {
                    _ = ctx.cancellation.cancelled() => Err(ComposeError::Cancelled),
                    result = node.invoke(&ctx, input) => result,
                };
                let result = result.map_err(|e| match e {
                    ComposeError::Cancelled => ComposeError::Cancelled,
                    other => ComposeError::node_failure(&node_id, other),
                });
                (node_id, result)
            });
            task_names.insert(handle.id(), id.clone());
        }

        let mut first_err: Option<ComposeError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(value))) => {
                    self.emit_node_completed(&id, Some(&value));
                    outputs.insert(id, value);
                }
                Ok((id, Err(e))) => {
                    self.emit_node_failed(&id, &e);
                    if first_err.is_none() {
                        self.token.cancel();
                        first_err = Some(e);
                    }
                }
                Err(join_err) => {
                    let id = task_names
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string());
                    let e = if join_err.is_panic() {
                        ComposeError::node_failure(&id, "panicked")
                    } else {
                        ComposeError::Cancelled
                    };
                    self.emit_node_failed(&id, &e);
                    if first_err.is_none() {
                        self.token.cancel();
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Attach node identity to a body error, leaving cancellation alone
    fn node_error(&self, id: &str, e: ComposeError) -> ComposeError {
        match e {
            ComposeError::Cancelled => ComposeError::Cancelled,
            other => ComposeError::node_failure(id, other),
        }
    }

    // -----------------------------------------------------------------------
    // Event emission helpers
    // -----------------------------------------------------------------------

    fn emit_run_started(&self) {
        let _ = self.sink.send(RunEvent::RunStarted {
            run_id: self.run_id.to_string(),
        });
    }

    fn emit_run_completed(&self) {
        let _ = self.sink.send(RunEvent::RunCompleted {
            run_id: self.run_id.to_string(),
        });
    }

    fn emit_run_failed(&self, error: &ComposeError) {
        let _ = self.sink.send(RunEvent::RunFailed {
            run_id: self.run_id.to_string(),
            error: error.to_string(),
        });
    }

    fn emit_node_started(&self, node_id: &str) {
        let _ = self.sink.send(RunEvent::NodeStarted {
            run_id: self.run_id.to_string(),
            node_id: node_id.to_string(),
        });
    }

    fn emit_node_completed(&self, node_id: &str, output: Option<&Value>) {
        let _ = self.sink.send(RunEvent::NodeCompleted {
            run_id: self.run_id.to_string(),
            node_id: node_id.to_string(),
            output: output.cloned(),
        });
    }

    fn emit_node_failed(&self, node_id: &str, error: &ComposeError) {
        let _ = self.sink.send(RunEvent::NodeFailed {
            run_id: self.run_id.to_string(),
            node_id: node_id.to_string(),
            error: error.to_string(),
        });
    }

    fn emit_output_chunk(&self, value: &Value) {
        let _ = self.sink.send(RunEvent::OutputChunk {
            run_id: self.run_id.to_string(),
            value: value.clone(),
        });
    }
}
