//! Execution statistics accumulated across one `run`.

/// Cumulative counters the executor folds completion records into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Cycles the executor has advanced.
    pub total_cycles: u64,
    /// Instructions retired.
    pub instructions_executed: u64,
    /// DMA transfers retired.
    pub dma_operations: u64,
    /// Block Mover transfers retired.
    pub block_mover_operations: u64,
    /// Streamer streams retired.
    pub streamer_operations: u64,
    /// Matmuls retired.
    pub compute_operations: u64,
    /// Barriers retired.
    pub barriers_hit: u64,
    /// Bytes moved by DMA engines (external-memory-class <-> L3).
    pub external_bytes_transferred: u64,
    /// Bytes moved by Block Movers (L3 <-> L2).
    pub l3_bytes_transferred: u64,
    /// Bytes moved by Streamers (L2 <-> L1).
    pub l2_bytes_transferred: u64,
}

impl Statistics {
    /// Returns a zeroed statistics block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
