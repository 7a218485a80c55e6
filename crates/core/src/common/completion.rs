//! Completion records: a value an engine returns from `update` instead of
//! invoking a callback when a transaction retires.

use super::{Cycle, InstructionId};

/// Describes one transaction's retirement.
///
/// An engine's `update` returns this instead of invoking a closure; the
/// executor consults it to remove the instruction id from the relevant
/// pending set and to fold `bytes`/`end_cycle` into its statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Instruction id that retired, if the transaction was issued by the
    /// executor (engine-internal bookkeeping transfers have none).
    pub instruction_id: Option<InstructionId>,
    /// Bytes moved or computed over by the transaction.
    pub bytes: u64,
    /// Cycle at which the transaction retired.
    pub end_cycle: Cycle,
}

impl Completion {
    /// Creates a new completion record.
    #[must_use]
    pub fn new(instruction_id: Option<InstructionId>, bytes: u64, end_cycle: Cycle) -> Self {
        Self {
            instruction_id,
            bytes,
            end_cycle,
        }
    }
}
