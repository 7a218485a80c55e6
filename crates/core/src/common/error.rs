//! Error kinds for the simulator core.
//!
//! Configuration errors (decoder overlap, bad config) surface at the API call
//! site and never enter the run loop. Runtime errors raised inside a `step`
//! move the executor to `ExecutionState::Error`; they are not retried.

use crate::common::kinds::MemoryKind;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type KpuResult<T> = Result<T, KpuError>;

/// All error kinds the simulator core can raise.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KpuError {
    /// A new address region overlaps one already registered with the decoder.
    #[error("region base={base:#x} size={size:#x} overlaps an existing region")]
    OverlapError {
        /// Base address of the region that failed to register.
        base: u64,
        /// Size in bytes of the region that failed to register.
        size: u64,
    },

    /// An address did not decode to any registered region.
    #[error("address {0:#x} is not mapped to any region")]
    UnmappedAddress(u64),

    /// A transfer's `[addr, addr+size)` range crosses a region boundary.
    #[error("range addr={addr:#x} size={size:#x} crosses a region boundary")]
    RangeError {
        /// Start address of the offending range.
        addr: u64,
        /// Size in bytes of the offending range.
        size: u64,
    },

    /// An offset plus size exceeds a resource's capacity.
    #[error("offset {offset:#x} + size {size} exceeds capacity {capacity}")]
    OutOfRange {
        /// Offset within the resource.
        offset: u64,
        /// Size in bytes of the attempted access.
        size: u64,
        /// Capacity in bytes of the resource.
        capacity: u64,
    },

    /// An engine was asked to route a transfer between kinds it cannot reach.
    #[error("unsupported route: {src} -> {dst}")]
    RoutingError {
        /// Source memory kind.
        src: MemoryKind,
        /// Destination memory kind.
        dst: MemoryKind,
    },

    /// `start_matmul`/`enqueue_stream` (when bounded) called on a busy engine.
    #[error("engine is busy")]
    Busy,

    /// A program failed static validation.
    #[error("program failed validation: {0}")]
    InvalidProgram(String),

    /// `run(max_cycles)` exceeded its budget without completing.
    #[error("execution did not complete within {0} cycles")]
    Timeout(u64),

    /// An engine fault propagated up through the executor.
    #[error("engine fault: {0}")]
    EngineFault(Box<KpuError>),
}

impl KpuError {
    /// Maps an error to a distinct nonzero process exit code, for CLI use.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            KpuError::OverlapError { .. } => 2,
            KpuError::UnmappedAddress(_) => 3,
            KpuError::RangeError { .. } => 4,
            KpuError::OutOfRange { .. } => 5,
            KpuError::RoutingError { .. } => 6,
            KpuError::Busy => 7,
            KpuError::InvalidProgram(_) => 8,
            KpuError::Timeout(_) => 9,
            KpuError::EngineFault(_) => 10,
        }
    }
}
