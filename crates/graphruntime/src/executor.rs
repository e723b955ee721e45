use crate::dag::DependencyGraph;
use crate::options::RunOptions;
use crate::result::{RunAggregator, RunResult};
use crate::runner::NodeRunner;
use futures::stream::{FuturesUnordered, StreamExt};
use graphcore::{GraphError, Node, RunContext, RunEmitter, Value};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use uuid::Uuid;

/// Executes a node set level by level with bounded parallelism
pub struct GraphExecutor {
    options: RunOptions,
}

impl GraphExecutor {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Validate, plan and run `nodes`.
    ///
    /// Validation errors are returned before any node starts. Node failures
    /// are reported in the result, never as an `Err`.
    pub async fn execute(&self, nodes: Vec<Node>, base: &RunContext) -> Result<RunResult, GraphError> {
        let graph = DependencyGraph::build(&nodes)?;
        graph.check_acyclic()?;
        let levels = graph.levels()?;

        let run_id = base
            .run_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ctx = base.fork_run(run_id.clone());
        let emitter = match &self.options.events {
            Some(bus) => bus.emitter(run_id.clone()),
            None => RunEmitter::disabled(run_id.clone()),
        };
        let start_time = Instant::now();

        tracing::debug!(run_id = %run_id, nodes = nodes.len(), levels = levels.len(), "starting graph run");
        emitter.run_started(nodes.len(), levels.len());

        let mut by_name: HashMap<String, Node> = nodes
            .into_iter()
            .map(|node| (node.name().to_string(), node))
            .collect();
        let mut aggregator = RunAggregator::default();
        let mut halted = false;

        for (depth, level) in levels.iter().enumerate() {
            let mut pending = VecDeque::with_capacity(level.len());

            for name in level {
                let Some(node) = by_name.remove(name) else {
                    continue;
                };
                let blocked_by: Vec<String> = node
                    .dependencies()
                    .iter()
                    .filter(|dep| !aggregator.is_succeeded(dep))
                    .cloned()
                    .collect();

                if halted || !blocked_by.is_empty() {
                    self.skip(&ctx, &emitter, &mut aggregator, name, blocked_by);
                } else {
                    pending.push_back(node);
                }
            }

            if pending.is_empty() {
                continue;
            }

            tracing::debug!(run_id = %run_id, depth, nodes = pending.len(), "running level");
            self.run_level(pending, &ctx, &emitter, &mut aggregator).await;

            if aggregator.has_failures() && !self.options.settings.allow_partial_success {
                if !halted {
                    tracing::debug!(run_id = %run_id, depth, "failure in level, abandoning later levels");
                }
                halted = true;
            }
        }

        let outputs = ctx.outputs().snapshot().await;
        let elapsed = start_time.elapsed();
        let (succeeded, failed, skipped) = aggregator.counts();
        emitter.run_completed(succeeded, failed, skipped, elapsed.as_millis() as u64);
        tracing::info!(
            "Graph run {} finished in {}ms: {} succeeded, {} failed, {} skipped",
            run_id,
            elapsed.as_millis(),
            succeeded,
            failed,
            skipped
        );

        Ok(aggregator.finish(run_id, outputs, levels, elapsed))
    }

    /// Run every node of one level, keeping at most `concurrency` in flight.
    /// A freed slot is refilled as soon as any node settles.
    async fn run_level(
        &self,
        mut pending: VecDeque<Node>,
        ctx: &RunContext,
        emitter: &RunEmitter,
        aggregator: &mut RunAggregator,
    ) {
        let limit = self.options.concurrency_limit(pending.len());
        let mut running = FuturesUnordered::new();

        loop {
            while running.len() < limit {
                let Some(node) = pending.pop_front() else {
                    break;
                };
                let name = node.name().to_string();
                let runner = NodeRunner::new(
                    node,
                    ctx.clone(),
                    &self.options.settings,
                    self.options.hooks.clone(),
                    emitter.clone(),
                );
                running.push(async move { (name, runner.run().await) });
            }

            match running.next().await {
                Some((name, outcome)) => aggregator.record(name, outcome),
                None => break,
            }
        }
    }

    fn skip(
        &self,
        ctx: &RunContext,
        emitter: &RunEmitter,
        aggregator: &mut RunAggregator,
        name: &str,
        blocked_by: Vec<String>,
    ) {
        ctx.logger().info(
            &format!("SKIP {}", name),
            Some(&json!({ "run_id": ctx.run_id(), "blocked_by": blocked_by })),
        );
        emitter.node_skipped(name, blocked_by);
        aggregator.skip(name);
    }
}

/// Run a node set to completion and report every node's fate
pub async fn run_graph(
    nodes: Vec<Node>,
    base: &RunContext,
    options: RunOptions,
) -> Result<RunResult, GraphError> {
    GraphExecutor::new(options).execute(nodes, base).await
}

/// Like [`run_graph`] but yields only the outputs, failing if any node failed
pub async fn run_graph_outputs(
    nodes: Vec<Node>,
    base: &RunContext,
    options: RunOptions,
) -> Result<HashMap<String, Value>, GraphError> {
    let result = run_graph(nodes, base, options).await?;
    if result.failed.is_empty() {
        Ok(result.into_outputs())
    } else {
        Err(GraphError::RunFailed {
            failed: result.failed,
        })
    }
}
