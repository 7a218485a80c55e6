//! Compute Fabric: one compute tile, wrapping either a systolic array or the
//! `BASIC_MATMUL` functional fallback.

use crate::common::{Address, Completion, Cycle, InstructionId, KpuError, KpuResult};
use crate::memory::L1Buffer;

use super::systolic::{self, SystolicArray};

/// Which implementation a Compute Fabric dispatches `MATMUL` to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeMode {
    /// Triple-loop direct multiply, computed in one shot. A correctness
    /// fallback, not a performance model: its cycle cost is a coarse
    /// estimate, not a cycle-accurate wavefront simulation.
    BasicMatmul,
    /// Output-stationary systolic array (default).
    SystolicArray,
}

/// One in-flight `MATMUL`'s operands and destination.
#[derive(Clone, Copy, Debug)]
pub struct MatMulDescriptor {
    /// Instruction id this matmul was issued for.
    pub instruction_id: Option<InstructionId>,
    /// Which L1 buffer holds A, B, and C.
    pub l1_buffer_id: usize,
    /// Address of A within the L1 buffer.
    pub a_addr: Address,
    /// Address of B within the L1 buffer.
    pub b_addr: Address,
    /// Address of C within the L1 buffer.
    pub c_addr: Address,
    /// Output row count.
    pub m: u32,
    /// Output column count.
    pub n: u32,
    /// Reduction dimension.
    pub k: u32,
}

#[derive(Debug)]
struct ActiveOp {
    desc: MatMulDescriptor,
    ticks_done: u64,
    total_ticks: u64,
}

/// A Compute Fabric: the array plus in-flight matmul bookkeeping.
#[derive(Debug)]
pub struct ComputeFabric {
    tile_id: usize,
    mode: ComputeMode,
    array: SystolicArray,
    op: Option<ActiveOp>,
}

impl ComputeFabric {
    /// Creates a new, idle Compute Fabric.
    #[must_use]
    pub fn new(tile_id: usize, mode: ComputeMode, rows: usize, cols: usize) -> Self {
        Self {
            tile_id,
            mode,
            array: SystolicArray::new(rows, cols),
            op: None,
        }
    }

    /// The compute tile index this fabric represents.
    #[must_use]
    pub fn tile_id(&self) -> usize {
        self.tile_id
    }

    /// Whether a matmul is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.op.is_some()
    }

    /// Drops any in-flight operation and zeroes the array.
    pub fn reset(&mut self) {
        self.op = None;
        self.array.reset();
    }

    /// Starts a new matmul.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if a matmul is already in flight, or `InvalidProgram`
    /// if the tile shape exceeds the array for systolic mode (`m > rows` or
    /// `n > cols`).
    pub fn start_matmul(&mut self, desc: MatMulDescriptor, _start_cycle: Cycle) -> KpuResult<()> {
        if self.is_busy() {
            return Err(KpuError::Busy);
        }
        if self.mode == ComputeMode::SystolicArray
            && (desc.m as usize > self.array.rows() || desc.n as usize > self.array.cols())
        {
            return Err(KpuError::InvalidProgram(format!(
                "matmul tile {}x{} exceeds systolic array {}x{}",
                desc.m,
                desc.n,
                self.array.rows(),
                self.array.cols()
            )));
        }
        self.array.reset();
        let total_ticks = match self.mode {
            ComputeMode::SystolicArray => systolic::total_cycles(desc.m, desc.n, desc.k),
            ComputeMode::BasicMatmul => basic_matmul_cycles(desc.m, desc.n, desc.k, self.array.total_pes() as u64),
        };
        self.op = Some(ActiveOp {
            desc,
            ticks_done: 0,
            total_ticks,
        });
        Ok(())
    }

    /// Advances the in-flight matmul by one cycle.
    ///
    /// Returns `Some(Completion)` the cycle the matmul finishes evacuating
    /// `C` back to the L1 buffer.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if an L1 buffer access would overflow its
    /// capacity.
    pub fn update(&mut self, current_cycle: Cycle, l1_buffers: &mut [L1Buffer]) -> KpuResult<Option<Completion>> {
        let Some(op) = &mut self.op else {
            return Ok(None);
        };
        let buffer = l1_buffers.get_mut(op.desc.l1_buffer_id).ok_or(KpuError::OutOfRange {
            offset: op.desc.l1_buffer_id as u64,
            size: 1,
            capacity: l1_buffers.len() as u64,
        })?;

        match self.mode {
            ComputeMode::SystolicArray => {
                let t = op.ticks_done;
                let desc = op.desc;
                for i in 0..desc.m as u64 {
                    let kk = t as i64 - i as i64;
                    if kk >= 0 && (kk as u64) < u64::from(desc.k) {
                        let value = read_f32_element(buffer, desc.a_addr, i, kk as u64, desc.k)?;
                        self.array.inject_a(i as usize, f64::from(value));
                    }
                }
                for j in 0..desc.n as u64 {
                    let kk = t as i64 - j as i64;
                    if kk >= 0 && (kk as u64) < u64::from(desc.k) {
                        let value = read_f32_element(buffer, desc.b_addr, kk as u64, j, desc.n)?;
                        self.array.inject_b(j as usize, f64::from(value));
                    }
                }
                self.array.advance();
            }
            ComputeMode::BasicMatmul => {
                if op.ticks_done == 0 {
                    execute_basic_matmul(&mut self.array, buffer, &op.desc)?;
                }
            }
        }

        op.ticks_done += 1;
        if op.ticks_done < op.total_ticks {
            return Ok(None);
        }

        let desc = op.desc;
        if self.mode == ComputeMode::SystolicArray {
            evacuate(&self.array, buffer, &desc)?;
        }
        self.op = None;
        let bytes = u64::from(desc.m) * u64::from(desc.n) * 4;
        Ok(Some(Completion::new(desc.instruction_id, bytes, current_cycle)))
    }
}

fn basic_matmul_cycles(m: u32, n: u32, k: u32, total_pes: u64) -> u64 {
    let work = u64::from(m) * u64::from(n) * u64::from(k);
    work.div_ceil(total_pes.max(1)).max(1)
}

fn execute_basic_matmul(array: &mut SystolicArray, buffer: &mut L1Buffer, desc: &MatMulDescriptor) -> KpuResult<()> {
    for i in 0..desc.m as u64 {
        for j in 0..desc.n as u64 {
            let mut acc = 0.0f64;
            for kk in 0..desc.k as u64 {
                let a = read_f32_element(buffer, desc.a_addr, i, kk, desc.k)?;
                let b = read_f32_element(buffer, desc.b_addr, kk, j, desc.n)?;
                acc += f64::from(a) * f64::from(b);
            }
            write_f32_element(buffer, desc.c_addr, i, j, desc.n, acc as f32)?;
        }
    }
    let _ = array;
    Ok(())
}

fn evacuate(array: &SystolicArray, buffer: &mut L1Buffer, desc: &MatMulDescriptor) -> KpuResult<()> {
    for i in 0..desc.m as usize {
        for j in 0..desc.n as usize {
            let value = array.accumulator(i, j) as f32;
            write_f32_element(buffer, desc.c_addr, i as u64, j as u64, desc.n, value)?;
        }
    }
    Ok(())
}

fn read_f32_element(buffer: &L1Buffer, base: Address, row: u64, col: u64, width: u32) -> KpuResult<f32> {
    let offset = base + (row * u64::from(width) + col) * 4;
    let mut bytes = [0u8; 4];
    buffer.read(offset, &mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

fn write_f32_element(buffer: &mut L1Buffer, base: Address, row: u64, col: u64, width: u32, value: f32) -> KpuResult<()> {
    let offset = base + (row * u64::from(width) + col) * 4;
    buffer.write(offset, &value.to_le_bytes())
}
