// crates/graphruntime/tests/executor_test.rs

use graphcore::{GraphError, Logger, MemoryCheckpoint, Node, NodeError, RunContext, Value};
use graphruntime::{run_graph, run_graph_outputs, NodeStatus, RunOptions};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Logger that keeps every line for assertions
#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<(String, String)>>,
}

impl RecordingLogger {
    fn messages(&self, level: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str, _meta: Option<&Value>) {
        self.lines.lock().unwrap().push(("info".into(), message.to_string()));
    }

    fn error(&self, message: &str, _meta: Option<&Value>) {
        self.lines.lock().unwrap().push(("error".into(), message.to_string()));
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn ok_node(name: &str) -> Node {
    let label = name.to_string();
    Node::from_fn(name, move |_ctx| {
        let label = label.clone();
        async move { Ok(json!(label)) }
    })
}

fn failing_node(name: &str) -> Node {
    Node::from_fn(name, |_ctx| async { Err(NodeError::work("permanent failure")) })
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Node that appends "start:<name>" / "end:<name>" to a shared journal
fn journaled(name: &str, journal: Arc<Mutex<Vec<String>>>, work_ms: u64) -> Node {
    let label = name.to_string();
    Node::from_fn(name, move |_ctx| {
        let journal = Arc::clone(&journal);
        let label = label.clone();
        async move {
            journal.lock().unwrap().push(format!("start:{}", label));
            sleep(Duration::from_millis(work_ms)).await;
            journal.lock().unwrap().push(format!("end:{}", label));
            Ok(json!(label))
        }
    })
}

fn position(journal: &[String], entry: &str) -> usize {
    journal
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("missing journal entry {}", entry))
}

#[tokio::test]
async fn test_diamond_respects_dependencies() {
    init_tracing();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let nodes = vec![
        journaled("A", journal.clone(), 20),
        journaled("B", journal.clone(), 10),
        journaled("C", journal.clone(), 5).depends_on(["A", "B"]),
        journaled("D", journal.clone(), 5).depends_on(["C"]),
    ];

    let result = run_graph(nodes, &RunContext::default(), RunOptions::new().with_concurrency(2))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.levels, vec![vec!["A", "B"], vec!["C"], vec!["D"]]);
    assert_eq!(result.succeeded, names(&["A", "B", "C", "D"]));

    let journal = journal.lock().unwrap().clone();
    let c_start = position(&journal, "start:C");
    assert!(position(&journal, "end:A") < c_start);
    assert!(position(&journal, "end:B") < c_start);
    assert!(position(&journal, "end:C") < position(&journal, "start:D"));
    // A and B overlap under concurrency 2
    assert!(position(&journal, "start:B") < position(&journal, "end:A"));
}

#[tokio::test]
async fn test_concurrency_bound_is_never_exceeded() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let nodes: Vec<Node> = (0..8)
        .map(|i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            Node::from_fn(format!("n{}", i), move |_ctx| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(25)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(null))
                }
            })
        })
        .collect();

    let result = run_graph(nodes, &RunContext::default(), RunOptions::new().with_concurrency(3))
        .await
        .unwrap();

    assert_eq!(result.succeeded.len(), 8);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {}", peak);
    assert!(peak >= 2, "nodes never overlapped");
}

#[tokio::test]
async fn test_unbounded_level_runs_all_nodes_at_once() {
    // Every node waits for all six to arrive; this only finishes if the
    // whole level is in flight together.
    let barrier = Arc::new(tokio::sync::Barrier::new(6));
    let nodes: Vec<Node> = (0..6)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            Node::from_fn(format!("n{}", i), move |_ctx| {
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    Ok(json!(i))
                }
            })
        })
        .collect();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run_graph(nodes, &RunContext::default(), RunOptions::new()),
    )
    .await
    .expect("level did not run concurrently")
    .unwrap();

    assert_eq!(result.succeeded.len(), 6);
}

#[tokio::test]
async fn test_exponential_backoff_delays() {
    let stamps = Arc::new(Mutex::new(Vec::<Instant>::new()));
    let recorder = Arc::clone(&stamps);

    let node = Node::from_fn("flaky", move |_ctx| {
        let stamps = Arc::clone(&recorder);
        async move {
            let attempt = {
                let mut stamps = stamps.lock().unwrap();
                stamps.push(Instant::now());
                stamps.len() - 1
            };
            if attempt < 2 {
                Err(NodeError::work(format!("attempt {} failed", attempt)))
            } else {
                Ok(json!({ "attempt": attempt }))
            }
        }
    })
    .with_retries(2)
    .with_retry_delay(100)
    .with_exponential_backoff(true);

    let result = run_graph(vec![node], &RunContext::default(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(result.status("flaky"), Some(NodeStatus::Succeeded));
    assert_eq!(result.attempts["flaky"], 3);

    let stamps = stamps.lock().unwrap().clone();
    assert_eq!(stamps.len(), 3);
    let first_gap = stamps[1] - stamps[0];
    let second_gap = stamps[2] - stamps[1];
    assert!(first_gap >= Duration::from_millis(100), "first gap {:?}", first_gap);
    assert!(first_gap < Duration::from_millis(190), "first gap {:?}", first_gap);
    assert!(second_gap >= Duration::from_millis(200), "second gap {:?}", second_gap);
    assert!(second_gap < Duration::from_millis(350), "second gap {:?}", second_gap);
}

#[tokio::test]
async fn test_default_retries_come_from_options() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let node = Node::from_fn("always-fails", move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(NodeError::work("nope")) }
    });

    let result = run_graph(
        vec![node],
        &RunContext::default(),
        RunOptions::new().with_default_retries(3).with_default_retry_delay(1),
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(result.failed["always-fails"], NodeError::work("nope"));
}

#[tokio::test]
async fn test_timeout_stops_waiting_but_not_the_work() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    let node = Node::from_fn("slow", move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            sleep(Duration::from_millis(300)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(json!("late"))
        }
    })
    .with_timeout(50);

    let started = Instant::now();
    let result = run_graph(vec![node], &RunContext::default(), RunOptions::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(result.failed["slow"], NodeError::Timeout { timeout_ms: 50 });
    assert!(result.failed["slow"].is_timeout());
    assert!(result.output("slow").is_none());

    // The abandoned attempt keeps running to completion
    sleep(Duration::from_millis(400)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_timeout_signals_cancellation_token() {
    let observed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&observed);

    let node = Node::from_fn("cooperative", move |ctx| {
        let flag = Arc::clone(&flag);
        async move {
            ctx.cancellation().cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Err(NodeError::Cancelled)
        }
    });

    let result = run_graph(vec![node], &RunContext::default(), RunOptions::new().with_timeout(30))
        .await
        .unwrap();

    assert!(result.failed["cooperative"].is_timeout());
    sleep(Duration::from_millis(50)).await;
    assert!(observed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_validation_failures_run_nothing() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = |name: &str| {
        let counter = Arc::clone(&calls);
        Node::from_fn(name, move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!(null)) }
        })
    };

    let cyclic = vec![
        counted("root"),
        counted("a").depends_on(["b"]),
        counted("b").depends_on(["a"]),
    ];
    let err = run_graph(cyclic, &RunContext::default(), RunOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));

    let self_ref = vec![counted("loop").depends_on(["loop"])];
    let err = run_graph(self_ref, &RunContext::default(), RunOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { ref node } if node == "loop"));

    let dangling = vec![counted("root"), counted("leaf").depends_on(["missing"])];
    let err = run_graph(dangling, &RunContext::default(), RunOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownDependency { .. }));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A fails; B depends on A; C depends on X, an unrelated root in A's level.
fn failure_scenario(c_started: Arc<AtomicBool>) -> Vec<Node> {
    vec![
        failing_node("A"),
        ok_node("X"),
        ok_node("B").depends_on(["A"]),
        Node::from_fn("C", move |_ctx| {
            let started = Arc::clone(&c_started);
            async move {
                started.store(true, Ordering::SeqCst);
                Ok(json!("C"))
            }
        })
        .depends_on(["X"]),
        ok_node("E").depends_on(["B"]),
    ]
}

#[tokio::test]
async fn test_failure_abandons_later_levels_by_default() {
    let c_started = Arc::new(AtomicBool::new(false));
    let result = run_graph(
        failure_scenario(c_started.clone()),
        &RunContext::default(),
        RunOptions::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.failed.keys().cloned().collect::<BTreeSet<_>>(), names(&["A"]));
    assert_eq!(result.succeeded, names(&["X"]));
    assert_eq!(result.skipped, names(&["B", "C", "E"]));
    assert_eq!(result.total_nodes(), 5);
    assert!(!c_started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failure_does_not_stop_its_own_level() {
    // C shares A's level, so it still runs; only B waits on A
    let nodes = vec![failing_node("A"), ok_node("B").depends_on(["A"]), ok_node("C")];

    let result = run_graph(nodes, &RunContext::default(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(result.levels, vec![vec!["A", "C"], vec!["B"]]);
    assert_eq!(result.failed.keys().cloned().collect::<BTreeSet<_>>(), names(&["A"]));
    assert_eq!(result.succeeded, names(&["C"]));
    assert_eq!(result.skipped, names(&["B"]));
    assert_eq!(result.output("C"), Some(&json!("C")));
}

#[tokio::test]
async fn test_partial_success_only_skips_dependents() {
    let c_started = Arc::new(AtomicBool::new(false));
    let result = run_graph(
        failure_scenario(c_started.clone()),
        &RunContext::default(),
        RunOptions::new().allow_partial_success(true),
    )
    .await
    .unwrap();

    assert_eq!(result.failed.keys().cloned().collect::<BTreeSet<_>>(), names(&["A"]));
    assert_eq!(result.succeeded, names(&["X", "C"]));
    // E is skipped transitively through B
    assert_eq!(result.skipped, names(&["B", "E"]));
    assert!(c_started.load(Ordering::SeqCst));
    assert_eq!(result.output("C"), Some(&json!("C")));
}

#[tokio::test]
async fn test_checkpoint_short_circuits_second_run() {
    let store = Arc::new(MemoryCheckpoint::new());
    let calls = Arc::new(AtomicU32::new(0));

    let build = |calls: Arc<AtomicU32>| {
        vec![Node::from_fn("fetch", move |_ctx| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!({ "call": n })) }
        })
        .with_checkpoint(true)]
    };

    let ctx = RunContext::default().with_checkpoint(store.clone());
    let first = run_graph(build(calls.clone()), &ctx, RunOptions::new()).await.unwrap();
    let second = run_graph(build(calls.clone()), &ctx, RunOptions::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.output("fetch"), Some(&json!({ "call": 0 })));
    assert_eq!(second.output("fetch"), Some(&json!({ "call": 0 })));
    assert_eq!(second.attempts["fetch"], 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_fallback_success_counts_as_succeeded() {
    let nodes = vec![
        failing_node("render")
            .with_retries(1)
            .with_retry_delay(5)
            .with_fallback(|_ctx, err| async move {
                Ok(json!({ "placeholder": true, "after": err.to_string() }))
            }),
        Node::from_fn("publish", |ctx| async move {
            let rendered: serde_json::Map<String, Value> = ctx.output_as("render").await?;
            Ok::<_, NodeError>(json!(rendered.contains_key("placeholder")))
        })
        .depends_on(["render"]),
    ];

    let result = run_graph(nodes, &RunContext::default(), RunOptions::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.attempts["render"], 2);
    assert_eq!(result.output("publish"), Some(&json!(true)));
}

#[tokio::test]
async fn test_compensation_failure_is_logged_not_escalated() {
    let logger = Arc::new(RecordingLogger::default());
    let ctx = RunContext::new(logger.clone());

    let nodes = vec![
        failing_node("deploy").with_compensation(|_ctx, _reason| async {
            Err(NodeError::CompensationFailed("rollback unavailable".into()))
        }),
        ok_node("notify"),
    ];

    let result = run_graph(nodes, &ctx, RunOptions::new()).await.unwrap();

    assert_eq!(result.failed["deploy"], NodeError::work("permanent failure"));
    assert_eq!(result.succeeded, names(&["notify"]));

    let errors = logger.messages("error");
    assert!(errors.contains(&"COMPENSATE_FAIL deploy".to_string()));
    assert!(errors.contains(&"FAIL deploy".to_string()));
}

#[tokio::test]
async fn test_lifecycle_logging_and_hooks() {
    let logger = Arc::new(RecordingLogger::default());
    let ctx = RunContext::new(logger.clone()).with_run_id("run-42");

    let started = Arc::new(Mutex::new(Vec::new()));
    let succeeded = Arc::new(Mutex::new(Vec::new()));
    let failed = Arc::new(Mutex::new(Vec::new()));
    let (s, ok, ko) = (started.clone(), succeeded.clone(), failed.clone());

    let options = RunOptions::new()
        .allow_partial_success(true)
        .on_node_start(move |name| s.lock().unwrap().push(name.to_string()))
        .on_node_success(move |name, _value, _elapsed| ok.lock().unwrap().push(name.to_string()))
        .on_node_failure(move |name, _err| ko.lock().unwrap().push(name.to_string()));

    let nodes = vec![
        ok_node("a"),
        failing_node("b"),
        ok_node("c").depends_on(["b"]),
    ];
    let result = run_graph(nodes, &ctx, options).await.unwrap();

    assert_eq!(result.run_id, "run-42");

    let mut started = started.lock().unwrap().clone();
    started.sort();
    assert_eq!(started, vec!["a", "b"]);
    assert_eq!(*succeeded.lock().unwrap(), vec!["a"]);
    assert_eq!(*failed.lock().unwrap(), vec!["b"]);

    let info = logger.messages("info");
    assert!(info.contains(&"START a".to_string()));
    assert!(info.contains(&"DONE a".to_string()));
    assert!(info.contains(&"SKIP c".to_string()));
    assert!(logger.messages("error").contains(&"FAIL b".to_string()));
}

#[tokio::test]
async fn test_outputs_only_variant() {
    let outputs = run_graph_outputs(
        vec![ok_node("a"), ok_node("b").depends_on(["a"])],
        &RunContext::default(),
        RunOptions::new(),
    )
    .await
    .unwrap();
    assert_eq!(outputs["b"], json!("b"));

    let err = run_graph_outputs(
        vec![ok_node("a"), failing_node("b")],
        &RunContext::default(),
        RunOptions::new(),
    )
    .await
    .unwrap_err();
    match err {
        GraphError::RunFailed { failed } => {
            assert_eq!(failed.keys().cloned().collect::<Vec<_>>(), vec!["b"]);
        }
        other => panic!("expected RunFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_partitions() {
    let build = || {
        vec![
            ok_node("a"),
            failing_node("b"),
            ok_node("c").depends_on(["a"]),
            ok_node("d").depends_on(["b", "c"]),
            ok_node("e").depends_on(["c"]),
        ]
    };
    let options = RunOptions::new().allow_partial_success(true).with_concurrency(2);

    let first = run_graph(build(), &RunContext::default(), options.clone()).await.unwrap();
    let second = run_graph(build(), &RunContext::default(), options).await.unwrap();

    assert_eq!(first.succeeded, second.succeeded);
    assert_eq!(first.skipped, second.skipped);
    assert_eq!(first.failed, second.failed);
    assert_eq!(first.succeeded, names(&["a", "c", "e"]));
    assert_eq!(first.skipped, names(&["d"]));
    assert_ne!(first.run_id, second.run_id);
}
