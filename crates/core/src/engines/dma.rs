//! DMA Engine: moves bytes between external-memory-class regions and L3
//! tiles, multi-cycle with bandwidth-modeled timing.

use crate::common::{Completion, Cycle, InstructionId, KpuError, KpuResult, MemoryKind, Size};
use crate::memory::MemoryResources;

/// One transfer request accepted by a DMA engine.
#[derive(Clone, Copy, Debug)]
pub struct Transfer {
    /// Instruction id this transfer was issued for, if any.
    pub instruction_id: Option<InstructionId>,
    /// Source memory kind.
    pub src_kind: MemoryKind,
    /// Source resource id.
    pub src_id: usize,
    /// Source offset within the resource.
    pub src_addr: crate::common::Address,
    /// Destination memory kind.
    pub dst_kind: MemoryKind,
    /// Destination resource id.
    pub dst_id: usize,
    /// Destination offset within the resource.
    pub dst_addr: crate::common::Address,
    /// Transfer size in bytes.
    pub size: Size,
}

impl Transfer {
    fn is_valid_route(&self) -> bool {
        matches!(
            (self.src_kind, self.dst_kind),
            (MemoryKind::HostMemory, MemoryKind::External)
                | (MemoryKind::External, MemoryKind::HostMemory)
                | (MemoryKind::External, MemoryKind::L3Tile)
                | (MemoryKind::L3Tile, MemoryKind::External)
                | (MemoryKind::HostMemory, MemoryKind::L3Tile)
                | (MemoryKind::L3Tile, MemoryKind::HostMemory)
        )
    }
}

#[derive(Debug)]
struct ActiveTransfer {
    transfer: Transfer,
    cycles_remaining: u64,
}

/// One DMA engine instance.
#[derive(Debug)]
pub struct DmaEngine {
    id: usize,
    clock_ghz: f64,
    bandwidth_gbps: f64,
    queue: Vec<Transfer>,
    active: Option<ActiveTransfer>,
}

impl DmaEngine {
    /// Creates a new, idle DMA engine.
    #[must_use]
    pub fn new(id: usize, clock_ghz: f64, bandwidth_gbps: f64) -> Self {
        Self {
            id,
            clock_ghz,
            bandwidth_gbps,
            queue: Vec::new(),
            active: None,
        }
    }

    /// The engine index.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the engine has an active transfer or queued work.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.queue.is_empty()
    }

    /// Bytes moved per cycle at this engine's configured bandwidth and clock.
    #[must_use]
    pub fn bytes_per_cycle(&self) -> f64 {
        self.bandwidth_gbps / self.clock_ghz
    }

    /// Enqueues a transfer, validating its route.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError` if `(src_kind, dst_kind)` is not one of
    /// `HOST_MEMORY <-> EXTERNAL`, `EXTERNAL <-> L3_TILE`, or
    /// `HOST_MEMORY <-> L3_TILE`.
    pub fn enqueue(&mut self, transfer: Transfer) -> KpuResult<()> {
        if !transfer.is_valid_route() {
            return Err(KpuError::RoutingError {
                src: transfer.src_kind,
                dst: transfer.dst_kind,
            });
        }
        self.queue.push(transfer);
        if self.active.is_none() {
            self.activate_next();
        }
        Ok(())
    }

    fn activate_next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let transfer = self.queue.remove(0);
        let cost = transfer_cycles(transfer.size, self.bytes_per_cycle());
        self.active = Some(ActiveTransfer {
            transfer,
            cycles_remaining: cost,
        });
    }

    /// Advances the engine by one cycle.
    ///
    /// # Errors
    ///
    /// Propagates any `OutOfRange` from the underlying memory copy.
    pub fn update(&mut self, current_cycle: Cycle, memories: &mut MemoryResources<'_>) -> KpuResult<Option<Completion>> {
        let Some(active) = &mut self.active else {
            return Ok(None);
        };
        if active.cycles_remaining > 0 {
            active.cycles_remaining -= 1;
            return Ok(None);
        }

        let transfer = active.transfer;
        memories.copy(
            transfer.src_kind,
            transfer.src_id,
            transfer.src_addr,
            transfer.dst_kind,
            transfer.dst_id,
            transfer.dst_addr,
            transfer.size,
        )?;
        self.active = None;
        self.activate_next();
        Ok(Some(Completion::new(transfer.instruction_id, transfer.size, current_cycle)))
    }

    /// Drops all queued and active work without producing completions.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
    }
}

fn transfer_cycles(size: Size, bytes_per_cycle: f64) -> u64 {
    if size == 0 {
        return 1;
    }
    (size as f64 / bytes_per_cycle).ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Address;
    use crate::memory::{ExternalMemoryBank, L1Buffer, L2Bank, L3Tile, PageBuffer};

    fn resources<'a>(
        host: &'a mut [ExternalMemoryBank],
        external: &'a mut [ExternalMemoryBank],
        l3: &'a mut [L3Tile],
    ) -> MemoryResources<'a> {
        MemoryResources {
            host,
            external,
            l3,
            l2: &mut [] as &mut [L2Bank],
            l1: &mut [] as &mut [L1Buffer],
            page: &mut [] as &mut [PageBuffer],
        }
    }

    #[test]
    fn transfer_retires_after_bandwidth_modeled_cycles() {
        let mut engine = DmaEngine::new(0, 1.0, 4.0);
        let mut host = vec![ExternalMemoryBank::new(4096)];
        let mut external = vec![ExternalMemoryBank::new(4096)];
        let mut l3 = vec![L3Tile::new(4096)];
        host[0].write(Address::new(0), &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        engine
            .enqueue(Transfer {
                instruction_id: Some(1),
                src_kind: MemoryKind::HostMemory,
                src_id: 0,
                src_addr: Address::new(0),
                dst_kind: MemoryKind::L3Tile,
                dst_id: 0,
                dst_addr: Address::new(0),
                size: 8,
            })
            .unwrap();

        let mut completion = None;
        for cycle in 0..10 {
            let mut res = resources(&mut host, &mut external, &mut l3);
            if let Some(c) = engine.update(cycle, &mut res).unwrap() {
                completion = Some((cycle, c));
                break;
            }
        }
        let (cycle, c) = completion.expect("transfer should complete");
        assert_eq!(cycle, 2);
        assert_eq!(c.bytes, 8);
        let mut readback = [0u8; 8];
        l3[0].read(Address::new(0), &mut readback).unwrap();
        assert_eq!(readback, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rejects_unreachable_route() {
        let mut engine = DmaEngine::new(0, 1.0, 4.0);
        let err = engine.enqueue(Transfer {
            instruction_id: None,
            src_kind: MemoryKind::L2Bank,
            src_id: 0,
            src_addr: Address::new(0),
            dst_kind: MemoryKind::L1Buffer,
            dst_id: 0,
            dst_addr: Address::new(0),
            size: 4,
        });
        assert!(matches!(err, Err(KpuError::RoutingError { .. })));
    }

    #[test]
    fn zero_byte_transfer_costs_one_cycle() {
        assert_eq!(transfer_cycles(0, 4.0), 1);
    }
}
