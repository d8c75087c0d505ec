use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::BackendId;

/// Smoothing factor for the running average; newer measurements dominate.
const ALPHA: f64 = 0.5;

/// Measured execution times keyed by backend identity and operation kind.
///
/// Fed by `ProfileObserver` during profiling runs; a scheduler can later
/// consult the averages when assigning operations to backends.
pub struct ExecTime {
    times: Mutex<HashMap<(BackendId, &'static str), Duration>>,
}

impl ExecTime {
    pub fn new() -> Self {
        Self {
            times: Mutex::new(HashMap::new()),
        }
    }

    /// Folds one measurement into the exponential moving average.
    pub fn update(&self, backend: BackendId, op_name: &'static str, measured: Duration) {
        let mut times = self.times.lock().expect("exec time table poisoned");
        times
            .entry((backend, op_name))
            .and_modify(|average| {
                let blended = average.as_secs_f64() * (1.0 - ALPHA) + measured.as_secs_f64() * ALPHA;
                *average = Duration::from_secs_f64(blended);
            })
            .or_insert(measured);
    }

    pub fn average(&self, backend: &BackendId, op_name: &str) -> Option<Duration> {
        let times = self.times.lock().expect("exec time table poisoned");
        times
            .iter()
            .find(|((id, name), _)| id == backend && *name == op_name)
            .map(|(_, duration)| *duration)
    }
}

impl Default for ExecTime {
    fn default() -> Self {
        Self::new()
    }
}
