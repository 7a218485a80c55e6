//! Block Mover: moves 2-D blocks between L3 and L2 with an optional
//! in-flight transform.
//!
//! Follows the DMA Engine's queue/active-transfer/bandwidth-cost pattern,
//! generalized to 2-D blocks and the three transforms
//! `IDENTITY`/`TRANSPOSE`/`PAD`.

use crate::common::{Address, Completion, Cycle, InstructionId, KpuResult};
use crate::isa::Transform;
use crate::memory::{L2Bank, L3Tile};

/// One block-move request accepted by a Block Mover.
#[derive(Clone, Copy, Debug)]
pub struct BlockTransfer {
    /// Instruction id this transfer was issued for, if any.
    pub instruction_id: Option<InstructionId>,
    /// Source L3 tile index.
    pub src_l3_tile: usize,
    /// Source offset within the L3 tile.
    pub src_offset: Address,
    /// Destination L2 bank index.
    pub dst_l2_bank: usize,
    /// Destination offset within the L2 bank.
    pub dst_offset: Address,
    /// Source block row count.
    pub rows: u32,
    /// Source block column count.
    pub cols: u32,
    /// Element size in bytes.
    pub element_size: u32,
    /// In-flight transform applied while streaming into the destination.
    pub transform: Transform,
}

impl BlockTransfer {
    fn dst_rows(&self) -> u32 {
        match self.transform {
            Transform::Identity => self.rows,
            Transform::Transpose => self.cols,
            Transform::Pad { dst_rows, .. } => dst_rows,
        }
    }

    fn dst_cols(&self) -> u32 {
        match self.transform {
            Transform::Identity => self.cols,
            Transform::Transpose => self.rows,
            Transform::Pad { dst_cols, .. } => dst_cols,
        }
    }
}

#[derive(Debug)]
struct ActiveTransfer {
    transfer: BlockTransfer,
    cycles_remaining: u64,
}

/// One Block Mover instance.
#[derive(Debug)]
pub struct BlockMover {
    id: usize,
    bytes_per_cycle: f64,
    queue: Vec<BlockTransfer>,
    active: Option<ActiveTransfer>,
}

impl BlockMover {
    /// Creates a new, idle Block Mover.
    #[must_use]
    pub fn new(id: usize, bytes_per_cycle: f64) -> Self {
        Self {
            id,
            bytes_per_cycle,
            queue: Vec::new(),
            active: None,
        }
    }

    /// The engine index.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the mover has an active transfer or queued work.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.queue.is_empty()
    }

    /// Enqueues a block transfer.
    pub fn enqueue(&mut self, transfer: BlockTransfer) {
        self.queue.push(transfer);
        if self.active.is_none() {
            self.activate_next();
        }
    }

    fn activate_next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let transfer = self.queue.remove(0);
        let cost = block_cycles(transfer.rows, transfer.cols, transfer.element_size, self.bytes_per_cycle);
        self.active = Some(ActiveTransfer {
            transfer,
            cycles_remaining: cost,
        });
    }

    /// Advances the mover by one cycle.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `src_l3_tile`/`dst_l2_bank` is out of bounds
    /// or the transform's access pattern overflows either resource.
    pub fn update(&mut self, current_cycle: Cycle, l3: &mut [L3Tile], l2: &mut [L2Bank]) -> KpuResult<Option<Completion>> {
        let Some(active) = &mut self.active else {
            return Ok(None);
        };
        if active.cycles_remaining > 0 {
            active.cycles_remaining -= 1;
            return Ok(None);
        }

        let transfer = active.transfer;
        apply_transform(&transfer, l3, l2)?;
        self.active = None;
        self.activate_next();
        let bytes = u64::from(transfer.dst_rows()) * u64::from(transfer.dst_cols()) * u64::from(transfer.element_size);
        Ok(Some(Completion::new(transfer.instruction_id, bytes, current_cycle)))
    }

    /// Drops all queued and active work without producing completions.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
    }
}

fn block_cycles(rows: u32, cols: u32, element_size: u32, bytes_per_cycle: f64) -> u64 {
    let row_bytes = f64::from(cols) * f64::from(element_size);
    let per_row = (row_bytes / bytes_per_cycle).max(1.0);
    ((f64::from(rows) * per_row).ceil() as u64).max(1)
}

fn apply_transform(transfer: &BlockTransfer, l3: &mut [L3Tile], l2: &mut [L2Bank]) -> KpuResult<()> {
    get(l3, transfer.src_l3_tile)?;
    let elem = transfer.element_size as u64;

    if let Transform::Pad { .. } = transfer.transform {
        let dst_bytes = u64::from(transfer.dst_rows()) * u64::from(transfer.dst_cols()) * elem;
        let zeros = vec![0u8; dst_bytes as usize];
        get_mut(l2, transfer.dst_l2_bank)?.write(transfer.dst_offset, &zeros)?;
    }

    let mut staging = vec![0u8; elem as usize];
    for i in 0..transfer.rows as u64 {
        for j in 0..transfer.cols as u64 {
            let src_off = transfer.src_offset + (i * u64::from(transfer.cols) + j) * elem;
            get(l3, transfer.src_l3_tile)?.read(src_off, &mut staging)?;

            let (dst_row, dst_col) = match transfer.transform {
                Transform::Identity | Transform::Pad { .. } => (i, j),
                Transform::Transpose => (j, i),
            };
            let dst_width = u64::from(transfer.dst_cols());
            let dst_off = transfer.dst_offset + (dst_row * dst_width + dst_col) * elem;
            get_mut(l2, transfer.dst_l2_bank)?.write(dst_off, &staging)?;
        }
    }
    Ok(())
}

fn get(l3: &[L3Tile], id: usize) -> KpuResult<&L3Tile> {
    l3.get(id).ok_or(crate::common::KpuError::OutOfRange {
        offset: id as u64,
        size: 1,
        capacity: l3.len() as u64,
    })
}

fn get_mut(l2: &mut [L2Bank], id: usize) -> KpuResult<&mut L2Bank> {
    let len = l2.len() as u64;
    l2.get_mut(id).ok_or(crate::common::KpuError::OutOfRange {
        offset: id as u64,
        size: 1,
        capacity: len,
    })
}
