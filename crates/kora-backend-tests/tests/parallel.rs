use std::num::NonZeroUsize;
use std::sync::Arc;

use kora::backend::{BackendId, BackendSet};
use kora::compiler::{create_executor, CompilerOptions, ExecutorKind};
use kora::exec::ExecutorMap;
use kora_backend_ref_cpu::CpuBackend;
use kora_backend_tests::graphs;
use kora_backend_tests::{f32_bytes, f32_from_bytes, Phase, RecordingObserver};

fn parallel_options() -> CompilerOptions {
    CompilerOptions {
        executor: ExecutorKind::Parallel,
        parallel_workers: NonZeroUsize::new(2),
        ..Default::default()
    }
}

fn two_backend_set() -> (BackendSet, BackendId, BackendId) {
    let mut backends = BackendSet::new();
    backends.register(Arc::new(CpuBackend::new()));
    backends.register(Arc::new(CpuBackend::named("acc")));
    (backends, BackendId::new("cpu"), BackendId::new("acc"))
}

#[test]
fn parallel_diamond_computes_correctly() {
    let (backends, cpu, acc) = two_backend_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = parallel_options();

    let mut executor = create_executor(
        graphs::diamond_graph(&cpu, &acc),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();

    executor
        .set_input(0, &f32_bytes(&[1.0, -2.0, 3.0, -4.0]))
        .unwrap();
    executor.run().unwrap();
    let output = f32_from_bytes(&executor.get_output(0).unwrap());
    assert_eq!(output, vec![1.0, 0.0, 3.0, 0.0, -1.0, 2.0, -3.0, 4.0]);
}

#[test]
fn join_waits_for_both_branches() {
    let (backends, cpu, acc) = two_backend_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = parallel_options();

    let mut executor = create_executor(
        graphs::diamond_graph(&cpu, &acc),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();
    let observer = RecordingObserver::new();
    executor.add_observer(Box::new(observer.clone()));

    executor
        .set_input(0, &f32_bytes(&[1.0, -2.0, 3.0, -4.0]))
        .unwrap();
    executor.run().unwrap();

    let events = observer.events();
    let concat_begin = events
        .iter()
        .find(|event| event.op_name == "concat" && event.phase == Phase::Begin)
        .map(|event| event.at)
        .expect("concat ran");
    for span in observer.spans() {
        let (op_index, _, end) = span;
        let name = events
            .iter()
            .find(|event| event.op_index == op_index)
            .map(|event| event.op_name)
            .unwrap();
        if name != "concat" {
            assert!(end <= concat_begin, "concat began before {name} ended");
        }
    }
}

#[test]
fn every_operation_gets_one_begin_end_pair() {
    let (backends, cpu, acc) = two_backend_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = parallel_options();

    let mut executor = create_executor(
        graphs::diamond_graph(&cpu, &acc),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();
    let observer = RecordingObserver::new();
    executor.add_observer(Box::new(observer.clone()));

    executor
        .set_input(0, &f32_bytes(&[1.0, -2.0, 3.0, -4.0]))
        .unwrap();
    executor.run().unwrap();

    let events = observer.events();
    let spans = observer.spans();
    assert_eq!(spans.len(), 3);
    for (op_index, begin, end) in spans {
        assert!(begin <= end, "operation {op_index} ended before it began");
        let begins = events
            .iter()
            .filter(|event| event.op_index == op_index && event.phase == Phase::Begin)
            .count();
        let ends = events
            .iter()
            .filter(|event| event.op_index == op_index && event.phase == Phase::End)
            .count();
        assert_eq!((begins, ends), (1, 1));
    }
}

#[test]
fn repeated_parallel_runs_agree_with_linear() {
    let (backends, cpu, acc) = two_backend_set();
    let executor_map = Arc::new(ExecutorMap::new());

    let mut linear = create_executor(
        graphs::diamond_graph(&cpu, &acc),
        &CompilerOptions::default(),
        &executor_map,
        &backends,
    )
    .unwrap();
    let mut parallel = create_executor(
        graphs::diamond_graph(&cpu, &acc),
        &parallel_options(),
        &executor_map,
        &backends,
    )
    .unwrap();

    for round in 0..4u64 {
        let input = f32_bytes(&kora_backend_tests::seeded_values(4, round));
        linear.set_input(0, &input).unwrap();
        linear.run().unwrap();
        parallel.set_input(0, &input).unwrap();
        parallel.run().unwrap();
        assert_eq!(
            linear.get_output(0).unwrap(),
            parallel.get_output(0).unwrap()
        );
    }
}
