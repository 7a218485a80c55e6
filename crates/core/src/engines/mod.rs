//! Hardware component state machines: DMA engines, Block Movers, Streamers,
//! and the Compute Fabric.
//!
//! Each engine exposes the same shape — `enqueue`/`start_*`, `update(cycle,
//! ..)`, `is_busy()`, `reset()` — but there is no shared trait object; the
//! executor knows each engine's kind statically and dispatches by tag, not
//! vtable.

/// Block Mover: L3 <-> L2 2-D block moves with optional transform.
pub mod block_mover;
/// Compute Fabric: the systolic array and `BASIC_MATMUL` fallback.
pub mod compute;
/// DMA Engine: external-memory-class <-> L3 transfers.
pub mod dma;
/// Streamer: L2 <-> L1 row/column streams with staggering.
pub mod streamer;

pub use block_mover::{BlockMover, BlockTransfer};
pub use compute::{ComputeFabric, ComputeMode, MatMulDescriptor};
pub use dma::{DmaEngine, Transfer};
pub use streamer::{StreamJob, StreamKind, Streamer};
