//! Per-transaction trace records emitted as components advance.
//!
//! Each simulator instance owns its own logger rather than routing through a
//! process-global singleton, and every entry is additionally forwarded
//! through `tracing` so a host application's subscriber sees it without
//! needing to hold onto a `TraceLogger` handle.

use crate::common::{Cycle, EngineKind, TransactionId};

/// Lifecycle phase a trace entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceEventType {
    /// A transfer/stream/matmul was accepted into an engine's queue.
    Issued,
    /// A transfer/stream/matmul retired.
    Completed,
    /// A barrier retired.
    Barrier,
}

/// Outcome recorded alongside a trace event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceStatus {
    /// The event completed normally.
    Ok,
    /// The event failed; the executor will transition to `Error`.
    Failed,
}

/// One trace record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    /// Cycle the event occurred on.
    pub cycle: Cycle,
    /// Engine kind the event concerns.
    pub component_kind: EngineKind,
    /// Engine instance index.
    pub component_id: usize,
    /// Transaction id correlating issue/completion pairs.
    pub transaction_id: TransactionId,
    /// Event lifecycle phase.
    pub event_type: TraceEventType,
    /// Outcome.
    pub status: TraceStatus,
    /// Bytes moved or computed over, if applicable.
    pub size: u64,
}

/// Per-simulator trace sink: retains entries in memory and forwards them to
/// `tracing` as they are recorded.
#[derive(Debug, Default)]
pub struct TraceLogger {
    entries: Vec<TraceEntry>,
}

impl TraceLogger {
    /// Creates an empty trace logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one trace entry, logging it at `trace` level.
    pub fn record(&mut self, entry: TraceEntry) {
        tracing::trace!(
            cycle = entry.cycle,
            component = ?entry.component_kind,
            id = entry.component_id,
            txn = entry.transaction_id,
            event = ?entry.event_type,
            status = ?entry.status,
            size = entry.size,
            "trace event"
        );
        self.entries.push(entry);
    }

    /// All entries recorded so far, in recording order.
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Clears all recorded entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_in_order() {
        let mut logger = TraceLogger::new();
        logger.record(TraceEntry {
            cycle: 0,
            component_kind: EngineKind::Dma,
            component_id: 0,
            transaction_id: 1,
            event_type: TraceEventType::Issued,
            status: TraceStatus::Ok,
            size: 16,
        });
        logger.record(TraceEntry {
            cycle: 3,
            component_kind: EngineKind::Dma,
            component_id: 0,
            transaction_id: 1,
            event_type: TraceEventType::Completed,
            status: TraceStatus::Ok,
            size: 16,
        });
        assert_eq!(logger.entries().len(), 2);
        assert_eq!(logger.entries()[1].cycle, 3);
    }
}
