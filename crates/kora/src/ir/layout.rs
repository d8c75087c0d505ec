use std::fmt;

/// Memory layout of a rank-4 feature-map tensor.
///
/// Rank-0..3 tensors are layout-agnostic; the layout is still recorded so
/// permutation kernels can decide whether a conversion is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Nhwc,
    Nchw,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::Nhwc => "NHWC",
            Layout::Nchw => "NCHW",
        };
        write!(f, "{name}")
    }
}
