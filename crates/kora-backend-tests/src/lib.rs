pub mod delay;
pub mod graphs;
pub mod observers;

pub use delay::DelaySyncBackend;
pub use observers::{Phase, RecordedEvent, RecordingObserver};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Little-endian byte image of an f32 slice, as fed to `Executor::set_input`.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deterministic pseudo-random inputs in [-10, 10).
pub fn seeded_values(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

/// Decodes `Executor::get_output` bytes back into f32 values.
pub fn f32_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
