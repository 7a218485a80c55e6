//! Top-level `Simulator` facade: direct hardware-level access to every
//! engine and memory, bypassing the Data Movement ISA program loader. This
//! is the surface the CLI and kernel-level tools drive.

use crate::common::{Address, Cycle, InstructionId, KpuError, KpuResult};
use crate::config::Config;
use crate::engines::{BlockTransfer, ComputeFabric, MatMulDescriptor, StreamJob, StreamKind};
use crate::exec::{ConcurrentExecutor, HardwareContext};
use crate::isa::{StreamGeometry, Transform};

/// Direct hardware-level simulator: every memory and engine, driven one
/// cycle at a time without a loaded program.
pub struct Simulator {
    executor: ConcurrentExecutor,
    next_id: InstructionId,
}

impl Simulator {
    /// Builds a simulator sized per `config`, with every engine idle.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            executor: ConcurrentExecutor::new(HardwareContext::new(config)),
            next_id: 0,
        }
    }

    fn next_instruction_id(&mut self) -> InstructionId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Writes `data` into external memory bank `bank` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `bank` is out of bounds or the write
    /// overflows the bank's capacity.
    pub fn write_memory_bank(&mut self, bank: usize, offset: Address, data: &[u8]) -> KpuResult<()> {
        get_mut(&mut self.executor.hardware_mut().external, bank)?.write(offset, data)
    }

    /// Reads `dst.len()` bytes from external memory bank `bank` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `bank` is out of bounds or the read
    /// overflows the bank's capacity.
    pub fn read_memory_bank(&self, bank: usize, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        get(&self.executor.hardware().external, bank)?.read(offset, dst)
    }

    /// Writes `data` into L3 tile `tile` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `tile` is out of bounds or the write
    /// overflows the tile's capacity.
    pub fn write_l3_tile(&mut self, tile: usize, offset: Address, data: &[u8]) -> KpuResult<()> {
        get_mut(&mut self.executor.hardware_mut().l3, tile)?.write(offset, data)
    }

    /// Reads `dst.len()` bytes from L3 tile `tile` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `tile` is out of bounds or the read
    /// overflows the tile's capacity.
    pub fn read_l3_tile(&self, tile: usize, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        get(&self.executor.hardware().l3, tile)?.read(offset, dst)
    }

    /// Writes `data` into L2 bank `bank` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `bank` is out of bounds or the write
    /// overflows the bank's capacity.
    pub fn write_l2_bank(&mut self, bank: usize, offset: Address, data: &[u8]) -> KpuResult<()> {
        get_mut(&mut self.executor.hardware_mut().l2, bank)?.write(offset, data)
    }

    /// Reads `dst.len()` bytes from L2 bank `bank` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `bank` is out of bounds or the read
    /// overflows the bank's capacity.
    pub fn read_l2_bank(&self, bank: usize, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        get(&self.executor.hardware().l2, bank)?.read(offset, dst)
    }

    /// Writes `data` into L1 buffer `buffer` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `buffer` is out of bounds or the write
    /// overflows the buffer's capacity.
    pub fn write_l1_buffer(&mut self, buffer: usize, offset: Address, data: &[u8]) -> KpuResult<()> {
        get_mut(&mut self.executor.hardware_mut().l1, buffer)?.write(offset, data)
    }

    /// Reads `dst.len()` bytes from L1 buffer `buffer` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `buffer` is out of bounds or the read
    /// overflows the buffer's capacity.
    pub fn read_l1_buffer(&self, buffer: usize, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        get(&self.executor.hardware().l1, buffer)?.read(offset, dst)
    }

    /// Enqueues a block transfer on Block Mover `mover`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `mover` is out of bounds.
    #[allow(clippy::too_many_arguments)]
    pub fn start_block_transfer(
        &mut self,
        mover: usize,
        src_l3_tile: usize,
        src_offset: Address,
        dst_l2_bank: usize,
        dst_offset: Address,
        rows: u32,
        cols: u32,
        element_size: u32,
        transform: Transform,
    ) -> KpuResult<InstructionId> {
        let id = self.next_instruction_id();
        get_mut(&mut self.executor.hardware_mut().block_mover, mover)?.enqueue(BlockTransfer {
            instruction_id: Some(id),
            src_l3_tile,
            src_offset,
            dst_l2_bank,
            dst_offset,
            rows,
            cols,
            element_size,
            transform,
        });
        Ok(id)
    }

    /// Enqueues a row stream (A operand, L2 -> L1) on Streamer `streamer`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `streamer` is out of bounds.
    pub fn start_row_stream(&mut self, streamer: usize, src_l2_bank: usize, dst_l1_buffer: usize, geometry: StreamGeometry) -> KpuResult<InstructionId> {
        self.start_stream(streamer, StreamKind::Row, src_l2_bank, dst_l1_buffer, geometry)
    }

    /// Enqueues a column stream (B operand, L2 -> L1) on Streamer `streamer`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `streamer` is out of bounds.
    pub fn start_column_stream(&mut self, streamer: usize, src_l2_bank: usize, dst_l1_buffer: usize, geometry: StreamGeometry) -> KpuResult<InstructionId> {
        self.start_stream(streamer, StreamKind::Col, src_l2_bank, dst_l1_buffer, geometry)
    }

    /// Enqueues a C-evacuation stream (L1 -> L2) on Streamer `streamer`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `streamer` is out of bounds.
    pub fn start_out_stream(&mut self, streamer: usize, src_l1_buffer: usize, dst_l2_bank: usize, geometry: StreamGeometry) -> KpuResult<InstructionId> {
        self.start_stream(streamer, StreamKind::Out, src_l1_buffer, dst_l2_bank, geometry)
    }

    fn start_stream(&mut self, streamer: usize, kind: StreamKind, src_id: usize, dst_id: usize, geometry: StreamGeometry) -> KpuResult<InstructionId> {
        let id = self.next_instruction_id();
        get_mut(&mut self.executor.hardware_mut().streamer, streamer)?.enqueue(StreamJob {
            instruction_id: Some(id),
            kind,
            src_id,
            dst_id,
            geometry,
        });
        Ok(id)
    }

    /// Starts a matmul on Compute Fabric `tile`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `tile` is out of bounds, `Busy` if the tile
    /// is already computing, or `InvalidProgram` if the tile shape exceeds
    /// the array in systolic mode.
    #[allow(clippy::too_many_arguments)]
    pub fn start_matmul(
        &mut self,
        tile: usize,
        l1_buffer_id: usize,
        a_addr: Address,
        b_addr: Address,
        c_addr: Address,
        m: u32,
        n: u32,
        k: u32,
    ) -> KpuResult<InstructionId> {
        let id = self.next_instruction_id();
        let current_cycle = self.executor.current_cycle();
        let fabric: &mut ComputeFabric = get_mut(&mut self.executor.hardware_mut().compute, tile)?;
        fabric.start_matmul(
            MatMulDescriptor {
                instruction_id: Some(id),
                l1_buffer_id,
                a_addr,
                b_addr,
                c_addr,
                m,
                n,
                k,
            },
            current_cycle,
        )?;
        Ok(id)
    }

    /// Advances every engine by one cycle, in fixed order (DMA, Block
    /// Mover, Streamer, Compute).
    ///
    /// # Errors
    ///
    /// Propagates the first engine fault encountered.
    pub fn step(&mut self) -> KpuResult<()> {
        self.executor.step_hardware_only()
    }

    /// Steps until no engine has queued or active work, or `max_cycles` is
    /// reached (when nonzero). Returns `true` if idle was reached.
    ///
    /// # Errors
    ///
    /// Propagates the first engine fault encountered.
    pub fn run_until_idle(&mut self, max_cycles: Cycle) -> KpuResult<bool> {
        loop {
            if !self.executor.hardware().any_engine_busy() {
                return Ok(true);
            }
            if max_cycles != 0 && self.executor.current_cycle() >= max_cycles {
                return Ok(false);
            }
            self.step()?;
        }
    }

    /// The current simulated cycle.
    #[must_use]
    pub fn get_current_cycle(&self) -> Cycle {
        self.executor.current_cycle()
    }

    /// Prints each engine's busy/idle status to stdout, one line per
    /// instance, for interactive inspection.
    pub fn print_component_status(&self) {
        let hw = self.executor.hardware();
        for engine in &hw.dma {
            println!("dma[{}]: {}", engine.id(), if engine.is_busy() { "busy" } else { "idle" });
        }
        for mover in &hw.block_mover {
            println!("block_mover[{}]: {}", mover.id(), if mover.is_busy() { "busy" } else { "idle" });
        }
        for streamer in &hw.streamer {
            println!("streamer[{}]: {}", streamer.id(), if streamer.is_busy() { "busy" } else { "idle" });
        }
        for fabric in &hw.compute {
            println!("compute[{}]: {}", fabric.tile_id(), if fabric.is_busy() { "busy" } else { "idle" });
        }
        println!("cycle: {}", self.executor.current_cycle());
    }

    /// Direct, read-only access to every memory and engine.
    #[must_use]
    pub fn hardware(&self) -> &HardwareContext {
        self.executor.hardware()
    }

    /// Direct access to every engine and memory outside of the program-
    /// interpreting executor (used by the CLI's disassembly and config
    /// inspection tools).
    pub fn hardware_mut(&mut self) -> &mut HardwareContext {
        self.executor.hardware_mut()
    }
}

fn get<T>(slice: &[T], id: usize) -> KpuResult<&T> {
    slice.get(id).ok_or(KpuError::OutOfRange {
        offset: id as u64,
        size: 1,
        capacity: slice.len() as u64,
    })
}

fn get_mut<T>(slice: &mut [T], id: usize) -> KpuResult<&mut T> {
    let len = slice.len() as u64;
    slice.get_mut(id).ok_or(KpuError::OutOfRange { offset: id as u64, size: 1, capacity: len })
}
