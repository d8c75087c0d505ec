use std::env;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

static KORA_DUMP_GRAPHS: OnceLock<bool> = OnceLock::new();
static KORA_WORKERS: OnceLock<Option<NonZeroUsize>> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// Whether partial graphs and linearized schedules are dumped to stderr.
pub(crate) fn dump_graphs_enabled() -> bool {
    *KORA_DUMP_GRAPHS.get_or_init(|| match env::var("KORA_DUMP_GRAPHS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// Worker-count override for the parallel executor.
pub(crate) fn worker_count_override() -> Option<NonZeroUsize> {
    *KORA_WORKERS.get_or_init(|| {
        env::var("KORA_WORKERS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(NonZeroUsize::new)
    })
}
