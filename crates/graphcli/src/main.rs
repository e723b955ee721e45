// crates/graphcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graphcore::{
    CheckpointStore, GraphSpec, JsonFileCheckpoint, NodeSpec, RetryPolicy, RunContext, RunEvent,
    TracingLogger,
};
use graphruntime::{load_nodes, topological_groups, GraphRuntime, RunHooks, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graph")]
#[command(about = "Dependency-aware graph runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph definition file
    Run {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Checkpoint file used to resume an interrupted run
        #[arg(short, long)]
        checkpoint: Option<PathBuf>,

        /// Max nodes in flight per level
        #[arg(long)]
        concurrency: Option<usize>,

        /// Keep running independent branches after a failure
        #[arg(long)]
        partial: bool,

        /// Correlation id for logs and events
        #[arg(long)]
        run_id: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file and print its levels
    Validate {
        /// Path to graph JSON file
        file: PathBuf,
    },

    /// List available work kinds
    Kinds,

    /// Drop checkpoint entries
    Reset {
        /// Checkpoint file
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Only forget this node
        #[arg(short, long)]
        node: Option<String>,
    },

    /// Create a new example graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            checkpoint,
            concurrency,
            partial,
            run_id,
            verbose,
        } => {
            init_logging(verbose);
            run_graph_file(file, checkpoint, concurrency, partial, run_id).await?;
        }

        Commands::Validate { file } => {
            validate_graph(file)?;
        }

        Commands::Kinds => {
            list_kinds();
        }

        Commands::Reset { checkpoint, node } => {
            reset_checkpoint(checkpoint, node).await?;
        }

        Commands::Init { output } => {
            create_example_graph(output)?;
        }
    }

    Ok(())
}

fn load_spec(file: &Path) -> Result<GraphSpec> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", file.display()))
}

async fn run_graph_file(
    file: PathBuf,
    checkpoint: Option<PathBuf>,
    concurrency: Option<usize>,
    partial: bool,
    run_id: Option<String>,
) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let mut spec = load_spec(&file)?;
    if concurrency.is_some() {
        spec.settings.concurrency = concurrency;
    }
    if partial {
        spec.settings.allow_partial_success = true;
    }

    println!("📋 Graph: {}", spec.name);
    println!("   Nodes: {}", spec.nodes.len());
    println!();

    let runtime = GraphRuntime::with_registry(
        Arc::new(graphnodes::standard_registry()),
        RuntimeConfig::default(),
    );

    let mut ctx = RunContext::new(Arc::new(TracingLogger));
    if let Some(path) = &checkpoint {
        println!("💾 Checkpoint: {}", path.display());
        ctx = ctx.with_checkpoint(Arc::new(JsonFileCheckpoint::new(path)));
    }
    if let Some(run_id) = run_id {
        ctx = ctx.with_run_id(run_id);
    }

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RunEvent::RunStarted { node_count, level_count, .. } => {
                    println!("▶️  Run started: {} nodes in {} levels", node_count, level_count);
                }
                RunEvent::NodeStarted { node, .. } => {
                    println!("  ⚡ Starting node: {}", node);
                }
                RunEvent::NodeRetrying { node, attempt, delay_ms, error, .. } => {
                    println!("  🔁 Node {} retry #{} in {}ms ({})", node, attempt, delay_ms, error);
                }
                RunEvent::NodeSucceeded { node, source, duration_ms, .. } => {
                    println!("  ✅ Node {} completed in {}ms [{}]", node, duration_ms, source.as_str());
                }
                RunEvent::NodeFailed { node, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node, error);
                }
                RunEvent::NodeSkipped { node, blocked_by, .. } => {
                    if blocked_by.is_empty() {
                        println!("  ⏭️  Node {} skipped", node);
                    } else {
                        println!("  ⏭️  Node {} skipped (blocked by {})", node, blocked_by.join(", "));
                    }
                }
                RunEvent::RunCompleted { duration_ms, .. } => {
                    println!("✨ Run finished in {}ms", duration_ms);
                    break;
                }
            }
        }
    });

    let result = runtime.run_spec(&spec, &ctx, RunHooks::default()).await?;
    let _ = event_task.await;

    println!();
    println!("📊 Run Summary:");
    println!("   Run ID: {}", result.run_id);
    println!("   Succeeded: {}/{}", result.succeeded.len(), result.total_nodes());

    if !result.failed.is_empty() {
        println!();
        println!("💥 Failed:");
        for (node, reason) in &result.failed {
            println!("   {}: {}", node, reason);
        }
    }

    if !result.skipped.is_empty() {
        println!();
        println!("⏭️  Skipped: {}", result.skipped.iter().cloned().collect::<Vec<_>>().join(", "));
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        let mut names: Vec<_> = result.outputs.keys().collect();
        names.sort();
        for name in names {
            println!("   {}: {}", name, result.outputs[name]);
        }
    }

    if !result.failed.is_empty() {
        bail!("{} node(s) failed", result.failed.len());
    }

    Ok(())
}

fn validate_graph(file: PathBuf) -> Result<()> {
    println!("🔍 Validating graph: {}", file.display());

    let spec = load_spec(&file)?;
    let registry = graphnodes::standard_registry();
    let nodes = load_nodes(&spec, &registry)?;
    let levels = topological_groups(&nodes)?;

    println!("✅ Graph is valid:");
    println!("   Name: {}", spec.name);
    println!("   Nodes: {}", spec.nodes.len());
    println!("   Levels:");
    for (depth, level) in levels.iter().enumerate() {
        println!("     {}: {}", depth, level.join(", "));
    }

    Ok(())
}

fn list_kinds() {
    println!("📦 Available Work Kinds:");
    println!();

    let registry = graphnodes::standard_registry();

    for kind in registry.list_kinds() {
        if let Some(info) = registry.info(&kind) {
            println!("  • {} ({})", kind, info.category);
            println!("    {}", info.description);
            for field in &info.config {
                let marker = if field.required { " (required)" } else { "" };
                println!("      - {}{}: {}", field.name, marker, field.description);
            }
        } else {
            println!("  • {}", kind);
        }
    }
}

async fn reset_checkpoint(path: PathBuf, node: Option<String>) -> Result<()> {
    let store = JsonFileCheckpoint::new(&path);
    store.clear(node.as_deref()).await?;

    match node {
        Some(node) => println!("🧹 Cleared checkpoint for {} in {}", node, path.display()),
        None => println!("🧹 Cleared all checkpoints in {}", path.display()),
    }
    Ok(())
}

fn create_example_graph(output: PathBuf) -> Result<()> {
    let mut spec = GraphSpec::new("Example Graph");
    spec.description = Some("Two independent roots feeding a merge, then a report".to_string());
    spec.settings.concurrency = Some(2);

    let mut fetch = NodeSpec::new("fetch", "fault.flaky")
        .with_config("failures", 1)
        .with_timeout(2_000);
    fetch.retry = Some(RetryPolicy::new(2, 200).exponential());
    fetch.use_checkpoint = true;

    spec.add_node(fetch)
        .add_node(NodeSpec::new("prepare", "time.delay").with_config("delay_ms", 300))
        .add_node(
            NodeSpec::new("merge", "transform.collect")
                .depends_on("fetch")
                .depends_on("prepare"),
        )
        .add_node(
            NodeSpec::new("report", "debug.echo")
                .with_config("message", "graph finished")
                .depends_on("merge"),
        );

    let json = serde_json::to_string_pretty(&spec)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  graph run --file {} --checkpoint graph.checkpoint.json", output.display());

    Ok(())
}
