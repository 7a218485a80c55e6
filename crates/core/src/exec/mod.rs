//! Cycle-driven concurrent executor: the program counter, pending-instruction
//! bookkeeping, per-cycle engine advancement, statistics, and tracing.

mod executor;
mod stats;
mod trace;

pub use executor::{ConcurrentExecutor, ExecutionState, HardwareContext};
pub use stats::Statistics;
pub use trace::{TraceEntry, TraceEventType, TraceLogger, TraceStatus};
