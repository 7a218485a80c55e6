//! The Compute Fabric component: processing elements, the systolic array
//! they form, and the fabric that drives `MATMUL` against them.

mod fabric;
mod pe;
mod systolic;

pub use fabric::{ComputeFabric, ComputeMode, MatMulDescriptor};
pub use pe::ProcessingElement;
pub use systolic::{total_cycles, SystolicArray, DEFAULT_COLS, DEFAULT_ROWS};
