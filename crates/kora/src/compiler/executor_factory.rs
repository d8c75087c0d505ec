//! Turns a lowered, backend-assigned graph into an executable schedule.
//!
//! Construction order matters: partial graphs first, then IO tensors, then
//! every backend's native tensors, then migrant wiring, and only then kernel
//! generation, because kernel generators capture tensor objects by identity.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::backend::builtin::BuiltinContext;
use crate::backend::{BackendContexts, BackendId, BackendSet, TensorRegistries};
use crate::backend::builtin::{IoTensor, CONFIG_ID};
use crate::compiler::liveness::{self, DeallocMap};
use crate::compiler::partition::create_backend_contexts;
use crate::compiler::{linear, CompilerOptions, ExecutorKind, LoweredGraph};
use crate::env;
use crate::error::{CompileError, CompileResult};
use crate::exec::base::ExecutorBase;
use crate::exec::dataflow::DataflowExecutor;
use crate::exec::exec_time::ExecTime;
use crate::exec::parallel::ParallelExecutor;
use crate::exec::{
    CodeEntry, CodeMap, DeallocFunction, Executor, ExecutorMap, JobMeta, LinearExecutor,
    ProfileObserver, TracingObserver,
};
use crate::ir::Layout;

/// Builds one executor for the lowered graph under the given options.
///
/// The graph is transferred into the executor and held until destruction.
/// Construction failures are fatal: no partial executor is returned. The
/// shared `executor_map` lets control-flow kernels dispatch into nested
/// subgraphs compiled earlier.
pub fn create_executor(
    lowered_graph: LoweredGraph,
    options: &CompilerOptions,
    executor_map: &Arc<ExecutorMap>,
    backends: &BackendSet,
) -> CompileResult<Box<dyn Executor>> {
    match options.executor {
        ExecutorKind::Linear => create_linear_executor(lowered_graph, options, executor_map, backends),
        ExecutorKind::Dataflow => {
            create_dataflow_executor(lowered_graph, options, executor_map, backends, false)
        }
        ExecutorKind::Parallel => {
            create_dataflow_executor(lowered_graph, options, executor_map, backends, true)
        }
    }
}

fn create_linear_executor(
    lowered_graph: LoweredGraph,
    options: &CompilerOptions,
    executor_map: &Arc<ExecutorMap>,
    backends: &BackendSet,
) -> CompileResult<Box<dyn Executor>> {
    lowered_graph.validate()?;
    let mut contexts = create_backend_contexts(&lowered_graph, backends, true)?;
    let tensor_regs = TensorRegistries::new(&contexts);

    init_io_tensors(&lowered_graph, &tensor_regs)?;

    let order = linear::linearize(&lowered_graph);
    linear::dump(&lowered_graph, &order);

    for context in contexts.values_mut() {
        context.gen_tensors()?;
    }
    prepare_migrant_tensors(&lowered_graph, &contexts, &tensor_regs)?;
    prepare_builtin_backend(&tensor_regs, executor_map, &mut contexts);

    let dealloc_map =
        liveness::plan_deallocations(lowered_graph.graph(), &order, &tensor_regs)?;

    let code_map = generate_kernels(
        &lowered_graph,
        backends,
        &mut contexts,
        options,
        Some(dealloc_map),
    )?;

    let base = ExecutorBase::new(lowered_graph, contexts, tensor_regs, options.tracing_ctx)?;
    let mut executor = LinearExecutor::new(base, code_map, order);

    if let Some(path) = &options.trace_filepath {
        executor.add_observer(Box::new(TracingObserver::new(path.clone())));
    }

    Ok(Box::new(executor))
}

fn create_dataflow_executor(
    lowered_graph: LoweredGraph,
    options: &CompilerOptions,
    executor_map: &Arc<ExecutorMap>,
    backends: &BackendSet,
    parallel: bool,
) -> CompileResult<Box<dyn Executor>> {
    lowered_graph.validate()?;
    let mut contexts = create_backend_contexts(&lowered_graph, backends, false)?;
    let tensor_regs = TensorRegistries::new(&contexts);

    init_io_tensors(&lowered_graph, &tensor_regs)?;

    for context in contexts.values_mut() {
        context.gen_tensors()?;
    }
    prepare_migrant_tensors(&lowered_graph, &contexts, &tensor_regs)?;
    prepare_builtin_backend(&tensor_regs, executor_map, &mut contexts);

    let code_map = generate_kernels(&lowered_graph, backends, &mut contexts, options, None)?;

    let base = ExecutorBase::new(lowered_graph, contexts, tensor_regs, options.tracing_ctx)?;

    let mut executor: Box<dyn Executor> = if parallel {
        let workers = worker_count(options);
        Box::new(ParallelExecutor::new(base, code_map, workers))
    } else {
        let mut executor = DataflowExecutor::new(base, code_map);
        if options.he_profiling_mode {
            let exec_time = Arc::new(ExecTime::new());
            executor.add_observer(Box::new(ProfileObserver::new(exec_time)));
        }
        Box::new(executor)
    };

    if let Some(path) = &options.trace_filepath {
        executor.add_observer(Box::new(TracingObserver::new(path.clone())));
    }

    Ok(executor)
}

fn worker_count(options: &CompilerOptions) -> NonZeroUsize {
    options
        .parallel_workers
        .or_else(env::worker_count_override)
        .or_else(|| std::thread::available_parallelism().ok())
        .unwrap_or_else(|| NonZeroUsize::new(1).expect("1 is non-zero"))
}

/// Installs one boundary tensor per graph input and output into the builtin
/// backend's registry.
///
/// The layout follows the operand's chosen def factor; NHWC is only the
/// fallback for operands the lowering left without one.
pub fn init_io_tensors(
    lowered_graph: &LoweredGraph,
    tensor_regs: &TensorRegistries,
) -> CompileResult<()> {
    let builtin = tensor_regs.builtin()?;
    for index in lowered_graph.graph().io_indices() {
        let operand = lowered_graph
            .graph()
            .operand(index)
            .ok_or_else(|| CompileError::config(format!("graph io operand {index} is missing")))?;
        let layout = lowered_graph
            .operand_lower_info(index)
            .and_then(|info| info.only_factor().ok())
            .map(|factor| factor.layout)
            .unwrap_or(Layout::Nhwc);
        let tensor = Arc::new(IoTensor::new(operand.info().clone(), layout));
        builtin.set_native_io_tensor(index, tensor)?;
    }
    Ok(())
}

/// Registers portable tensors owned by one backend as read-only migrants in
/// every other backend that consumes them.
///
/// Runs after all `gen_tensors` calls and before any `gen_kernels` call.
/// Non-portable tensors are left alone: the lowering stage bridges those
/// with explicit permute operations.
pub fn prepare_migrant_tensors(
    lowered_graph: &LoweredGraph,
    contexts: &BackendContexts,
    tensor_regs: &TensorRegistries,
) -> CompileResult<()> {
    for (op_index, operation) in lowered_graph.graph().operations().iter() {
        let backend = &lowered_graph
            .operation_lower_info(op_index)
            .ok_or_else(|| {
                CompileError::config(format!("operation {op_index} has no backend assigned"))
            })?
            .backend;
        let registry = contexts
            .get(backend)
            .ok_or_else(|| {
                CompileError::config(format!("no context for backend '{backend}'"))
            })?
            .tensor_registry();
        for index in operation.io_operands() {
            if registry.get(index).is_some() {
                continue;
            }
            let tensor = tensor_regs.get(index).ok_or_else(|| {
                CompileError::tensor(format!(
                    "operand {index} of operation {op_index} resolves to no tensor in any registry"
                ))
            })?;
            if tensor.is_portable() {
                registry.set_migrant_tensor(index, tensor)?;
            }
        }
    }

    // Every operation must now resolve each of its operands in its own
    // backend's registry.
    for (op_index, operation) in lowered_graph.graph().operations().iter() {
        let backend = &lowered_graph
            .operation_lower_info(op_index)
            .ok_or_else(|| {
                CompileError::config(format!("operation {op_index} has no backend assigned"))
            })?
            .backend;
        let registry = contexts
            .get(backend)
            .ok_or_else(|| {
                CompileError::config(format!("no context for backend '{backend}'"))
            })?
            .tensor_registry();
        for index in operation.io_operands() {
            if registry.get(index).is_none() {
                return Err(CompileError::config(format!(
                    "operand {index} of operation {op_index} is unreachable from backend \
                     '{backend}' after migrant wiring"
                )));
            }
        }
    }
    Ok(())
}

/// Hands the builtin kernel generator the runtime objects its control-flow
/// kernels need: the union registry view and a non-owning handle to the
/// executor map.
fn prepare_builtin_backend(
    tensor_regs: &TensorRegistries,
    executor_map: &Arc<ExecutorMap>,
    contexts: &mut BackendContexts,
) {
    for context in contexts.values_mut() {
        if let Some(builtin) = context.as_any_mut().downcast_mut::<BuiltinContext>() {
            builtin.set_tensor_registries(tensor_regs.clone());
            builtin.set_executor_map(Arc::downgrade(executor_map));
        }
    }
}

/// Non-builtin backends in map order, builtin last: the builtin backend owns
/// the permute kernels that bridge backends and must see every other
/// backend's finalized tensors.
fn ordered_backend_ids(contexts: &BackendContexts) -> Vec<BackendId> {
    let mut ordered: Vec<BackendId> = contexts
        .keys()
        .filter(|id| id.as_str() != CONFIG_ID)
        .cloned()
        .collect();
    ordered.extend(contexts.keys().filter(|id| id.as_str() == CONFIG_ID).cloned());
    ordered
}

fn generate_kernels(
    lowered_graph: &LoweredGraph,
    backends: &BackendSet,
    contexts: &mut BackendContexts,
    options: &CompilerOptions,
    mut dealloc_map: Option<DeallocMap>,
) -> CompileResult<CodeMap> {
    let mut code_map = CodeMap::new();
    for backend_id in ordered_backend_ids(contexts) {
        let context = contexts
            .get_mut(&backend_id)
            .expect("context listed but missing");
        let expected: Vec<_> = context.data().op_order.clone();
        let codes = context.gen_kernels()?;

        let mut covered = BTreeSet::new();
        for (op_index, mut fn_seq) in codes {
            if fn_seq.is_empty() {
                return Err(CompileError::kernel_gen(format!(
                    "backend '{backend_id}' returned an empty sequence for operation {op_index}"
                )));
            }
            covered.insert(op_index);

            if options.he_profiling_mode {
                let backend = backends.get(&backend_id).ok_or_else(|| {
                    CompileError::config(format!("backend '{backend_id}' is not registered"))
                })?;
                fn_seq.wrap_sync(backend.config());
            }
            if let Some(dealloc_map) = dealloc_map.as_mut() {
                if let Some(dealloc_list) = dealloc_map.remove(&op_index) {
                    if !dealloc_list.is_empty() {
                        fn_seq.append(Box::new(DeallocFunction::new(dealloc_list)));
                    }
                }
            }

            let op_name = lowered_graph
                .graph()
                .operation(op_index)
                .map(|operation| operation.kind().name())
                .unwrap_or("?");
            let meta = JobMeta {
                op_index,
                op_name,
                backend: backend_id.clone(),
            };
            if code_map.insert(op_index, CodeEntry { meta, fn_seq }).is_some() {
                return Err(CompileError::kernel_gen(format!(
                    "operation {op_index} received code from more than one backend"
                )));
            }
        }

        for op_index in expected {
            if !covered.contains(&op_index) {
                return Err(CompileError::kernel_gen(format!(
                    "backend '{backend_id}' returned no kernel for operation {op_index}"
                )));
            }
        }
    }
    Ok(code_map)
}
