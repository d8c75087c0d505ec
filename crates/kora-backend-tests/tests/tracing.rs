use std::sync::Arc;

use kora::backend::{BackendId, BackendSet};
use kora::compiler::{create_executor, CompilerOptions, ExecutorKind};
use kora::exec::ExecutorMap;
use kora_backend_ref_cpu::CpuBackend;
use kora_backend_tests::graphs;
use kora_backend_tests::f32_bytes;

fn trace_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("kora-trace-{}-{tag}.json", std::process::id()))
}

fn run_with_trace(executor_kind: ExecutorKind, tag: &str) -> serde_json::Value {
    let mut backends = BackendSet::new();
    backends.register(Arc::new(CpuBackend::new()));
    let cpu = BackendId::new("cpu");
    let executor_map = Arc::new(ExecutorMap::new());
    let path = trace_path(tag);
    let options = CompilerOptions {
        executor: executor_kind,
        trace_filepath: Some(path.clone()),
        ..Default::default()
    };

    let mut executor = create_executor(
        graphs::dynamic_chain_graph(&cpu),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();
    executor
        .set_input(0, &f32_bytes(&[1.0, -2.0, 3.0, -4.0]))
        .unwrap();
    executor.run().unwrap();

    let contents = std::fs::read_to_string(&path).expect("trace file written");
    let _ = std::fs::remove_file(&path);
    serde_json::from_str(&contents).expect("trace file is valid json")
}

#[test]
fn trace_file_holds_a_begin_end_pair_per_operation() {
    let trace = run_with_trace(ExecutorKind::Linear, "linear");
    let events = trace.as_array().expect("trace is a json array");

    let begins: Vec<_> = events
        .iter()
        .filter(|event| event["ph"] == "B")
        .collect();
    let ends: Vec<_> = events
        .iter()
        .filter(|event| event["ph"] == "E")
        .collect();
    // Two operations in the chain: relu and neg.
    assert_eq!(begins.len(), 2);
    assert_eq!(ends.len(), 2);

    for event in events {
        assert_eq!(event["args"]["backend"], "cpu");
        assert!(event["ts"].as_u64().is_some());
        assert!(event["name"].as_str().is_some());
    }
}

#[test]
fn dataflow_runs_emit_traces_too() {
    let trace = run_with_trace(ExecutorKind::Dataflow, "dataflow");
    let events = trace.as_array().expect("trace is a json array");
    assert_eq!(events.len(), 4);
}
