pub mod control_flow;
pub mod permute;

pub use control_flow::{IfKernel, WhileKernel};
pub use permute::PermuteKernel;
