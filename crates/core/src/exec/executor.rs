//! The concurrent executor: owns every memory and engine, interprets a
//! loaded program one cycle at a time, and tracks completion.

use std::collections::HashSet;

use crate::common::{Address, Completion, Cycle, EngineKind, EngineMask, InstructionId, KpuError, KpuResult, MemoryKind};
use crate::config::Config;
use crate::engines::{BlockMover, BlockTransfer, ComputeFabric, ComputeMode, DmaEngine, MatMulDescriptor, StreamJob, StreamKind, Streamer, Transfer};
use crate::isa::{DMProgram, Operation};
use crate::memory::{AddressDecoder, ExternalMemoryBank, L1Buffer, L2Bank, L3Tile, MemoryResources, PageBuffer};

use super::stats::Statistics;
use super::trace::{TraceEntry, TraceEventType, TraceLogger, TraceStatus};

/// Execution state, mirroring the program's progress through `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionState {
    /// No program loaded yet.
    Idle,
    /// Executing instructions.
    Running,
    /// Blocked on pending hardware completion.
    Waiting,
    /// Program finished: `pc` exhausted and every pending set empty.
    Completed,
    /// An engine fault occurred; execution is frozen for inspection.
    Error,
}

/// Every memory and engine the executor owns, plus the decoder and trace
/// sink that route and record their activity.
///
/// Engines hold no owning references into this struct; at each `update`
/// they are lent mutable borrows of just the memory collections they touch.
#[derive(Debug)]
pub struct HardwareContext {
    /// Host-side DDR banks.
    pub host: Vec<ExternalMemoryBank>,
    /// KPU external memory banks.
    pub external: Vec<ExternalMemoryBank>,
    /// L3 cache tiles.
    pub l3: Vec<L3Tile>,
    /// L2 cache banks.
    pub l2: Vec<L2Bank>,
    /// L1 streaming buffers.
    pub l1: Vec<L1Buffer>,
    /// Memory controller page buffers.
    pub page: Vec<PageBuffer>,
    /// DMA engine instances.
    pub dma: Vec<DmaEngine>,
    /// Block Mover instances.
    pub block_mover: Vec<BlockMover>,
    /// Streamer instances.
    pub streamer: Vec<Streamer>,
    /// Compute Fabric instances.
    pub compute: Vec<ComputeFabric>,
    /// The unified address decoder.
    pub decoder: AddressDecoder,
}

impl HardwareContext {
    /// Builds a hardware context sized per `config`, with every engine
    /// idle and the decoder empty (callers register address regions
    /// separately, since base addresses are a deployment choice).
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let bank_bytes = config.memory.bank_capacity_mb * 1024 * 1024;
        let l3_bytes = config.memory.l3_tile_capacity_kb * 1024;
        let l2_bytes = config.memory.l2_bank_capacity_kb * 1024;
        let l1_bytes = config.memory.l1_buffer_capacity_kb * 1024;
        let bytes_per_cycle = config.memory.bandwidth_gbps;

        let mode = if config.compute.use_systolic_array_mode {
            ComputeMode::SystolicArray
        } else {
            ComputeMode::BasicMatmul
        };

        Self {
            host: vec![ExternalMemoryBank::new(bank_bytes); config.memory.bank_count],
            external: vec![ExternalMemoryBank::new(bank_bytes); config.memory.bank_count],
            l3: vec![L3Tile::new(l3_bytes); config.memory.l3_tile_count],
            l2: vec![L2Bank::new(l2_bytes); config.memory.l2_bank_count],
            l1: vec![L1Buffer::new(l1_bytes); config.memory.l1_buffer_count],
            page: vec![PageBuffer::new(l1_bytes); 1],
            dma: (0..config.engines.dma_engine_count).map(|id| DmaEngine::new(id, 1.0, bytes_per_cycle)).collect(),
            block_mover: (0..config.engines.block_mover_count)
                .map(|id| BlockMover::new(id, bytes_per_cycle))
                .collect(),
            streamer: (0..config.engines.streamer_count).map(Streamer::new).collect(),
            compute: (0..config.compute.compute_tile_count)
                .map(|id| ComputeFabric::new(id, mode, config.compute.processor_array_rows, config.compute.processor_array_cols))
                .collect(),
            decoder: AddressDecoder::new(),
        }
    }

    /// Resets every engine and clears all storage, leaving the decoder's
    /// registered regions intact.
    pub fn reset(&mut self) {
        for bank in &mut self.host {
            *bank = ExternalMemoryBank::new(bank.capacity());
        }
        for bank in &mut self.external {
            *bank = ExternalMemoryBank::new(bank.capacity());
        }
        for tile in &mut self.l3 {
            *tile = L3Tile::new(tile.capacity());
        }
        for bank in &mut self.l2 {
            *bank = L2Bank::new(bank.capacity());
        }
        for buf in &mut self.l1 {
            *buf = L1Buffer::new(buf.capacity());
        }
        for engine in &mut self.dma {
            engine.reset();
        }
        for mover in &mut self.block_mover {
            mover.reset();
        }
        for streamer in &mut self.streamer {
            streamer.reset();
        }
        for fabric in &mut self.compute {
            fabric.reset();
        }
    }

    /// Whether any engine has queued or active work.
    #[must_use]
    pub fn any_engine_busy(&self) -> bool {
        self.dma.iter().any(DmaEngine::is_busy)
            || self.block_mover.iter().any(BlockMover::is_busy)
            || self.streamer.iter().any(Streamer::is_busy)
            || self.compute.iter().any(ComputeFabric::is_busy)
    }
}

/// Pending-instruction bookkeeping, one set per engine kind.
///
/// Tracks all four `EngineKind`s rather than just DMA/Block Mover/Streamer,
/// since `MATMUL` issue/retirement needs the same bookkeeping as any other
/// engine kind and a `BARRIER(COMPUTE)` must be able to observe it.
#[derive(Debug, Default)]
struct PendingSets {
    dma: HashSet<InstructionId>,
    block_mover: HashSet<InstructionId>,
    streamer: HashSet<InstructionId>,
    compute: HashSet<InstructionId>,
}

impl PendingSets {
    fn set_mut(&mut self, kind: EngineKind) -> &mut HashSet<InstructionId> {
        match kind {
            EngineKind::Dma => &mut self.dma,
            EngineKind::BlockMover => &mut self.block_mover,
            EngineKind::Streamer => &mut self.streamer,
            EngineKind::Compute => &mut self.compute,
        }
    }

    fn set(&self, kind: EngineKind) -> &HashSet<InstructionId> {
        match kind {
            EngineKind::Dma => &self.dma,
            EngineKind::BlockMover => &self.block_mover,
            EngineKind::Streamer => &self.streamer,
            EngineKind::Compute => &self.compute,
        }
    }

    fn is_empty_for_mask(&self, mask: EngineMask) -> bool {
        EngineKind::ALL.iter().all(|&kind| !mask.contains(kind) || self.set(kind).is_empty())
    }

    fn contains_anywhere(&self, id: InstructionId) -> bool {
        EngineKind::ALL.iter().any(|&kind| self.set(kind).contains(&id))
    }

    fn all_empty(&self) -> bool {
        self.dma.is_empty() && self.block_mover.is_empty() && self.streamer.is_empty() && self.compute.is_empty()
    }
}

/// Round-robin issue cursors, one per engine kind.
#[derive(Debug, Default)]
struct IssueCursors {
    dma: usize,
    block_mover: usize,
    streamer: usize,
}

impl IssueCursors {
    fn next(cursor: &mut usize, len: usize) -> KpuResult<usize> {
        if len == 0 {
            return Err(KpuError::InvalidProgram("no engine of the required kind is configured".into()));
        }
        let idx = *cursor % len;
        *cursor = cursor.wrapping_add(1);
        Ok(idx)
    }
}

/// Interprets a loaded `DMProgram` one cycle at a time against a
/// `HardwareContext`.
pub struct ConcurrentExecutor {
    hw: HardwareContext,
    trace: TraceLogger,
    program: Option<DMProgram>,
    state: ExecutionState,
    pc: usize,
    current_cycle: Cycle,
    pending: PendingSets,
    cursors: IssueCursors,
    stats: Statistics,
    last_error: Option<KpuError>,
}

impl ConcurrentExecutor {
    /// Creates a new executor over `hw`, with no program loaded.
    #[must_use]
    pub fn new(hw: HardwareContext) -> Self {
        Self {
            hw,
            trace: TraceLogger::new(),
            program: None,
            state: ExecutionState::Idle,
            pc: 0,
            current_cycle: 0,
            pending: PendingSets::default(),
            cursors: IssueCursors::default(),
            stats: Statistics::default(),
            last_error: None,
        }
    }

    /// The hardware context, for direct memory access outside of program execution.
    pub fn hardware_mut(&mut self) -> &mut HardwareContext {
        &mut self.hw
    }

    /// The hardware context, read-only.
    #[must_use]
    pub fn hardware(&self) -> &HardwareContext {
        &self.hw
    }

    /// Loads a program for execution, resetting per-run state.
    pub fn load_program(&mut self, program: DMProgram) {
        self.program = Some(program);
        self.state = ExecutionState::Running;
        self.pc = 0;
        self.current_cycle = 0;
        self.pending = PendingSets::default();
        self.cursors = IssueCursors::default();
        self.stats = Statistics::default();
        self.last_error = None;
    }

    /// Current execution state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Current simulated cycle.
    #[must_use]
    pub fn current_cycle(&self) -> Cycle {
        self.current_cycle
    }

    /// Current program counter.
    #[must_use]
    pub fn program_counter(&self) -> usize {
        self.pc
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Recorded trace entries.
    #[must_use]
    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.entries()
    }

    /// The engine fault that moved execution to `ExecutionState::Error`, if
    /// any. Cleared by `load_program`/`reset`.
    #[must_use]
    pub fn last_error(&self) -> Option<&KpuError> {
        self.last_error.as_ref()
    }

    /// Executes one cycle: issues every currently-issuable instruction,
    /// then advances every engine by one cycle in fixed order (DMA, Block
    /// Mover, Streamer, Compute).
    ///
    /// Returns `true` if execution is still `Running` or `Waiting`
    /// afterward, `false` if it reached `Completed` or `Error`.
    ///
    /// # Errors
    ///
    /// Propagates the first engine fault encountered; the executor's state
    /// becomes `Error` and pending sets are left untouched for inspection.
    pub fn step(&mut self) -> KpuResult<bool> {
        if matches!(self.state, ExecutionState::Completed | ExecutionState::Error) {
            return Ok(false);
        }

        let fully_drained = match self.issue_ready_instructions() {
            Ok(drained) => drained,
            Err(err) => {
                self.state = ExecutionState::Error;
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        if let Err(err) = self.advance_engines() {
            self.state = ExecutionState::Error;
            self.last_error = Some(err.clone());
            return Err(err);
        }

        self.current_cycle += 1;
        self.stats.total_cycles = self.current_cycle;

        let program_len = self.program.as_ref().map_or(0, DMProgram::len);
        self.state = if self.pc == program_len && self.pending.all_empty() {
            ExecutionState::Completed
        } else if fully_drained {
            ExecutionState::Running
        } else {
            ExecutionState::Waiting
        };

        Ok(!matches!(self.state, ExecutionState::Completed | ExecutionState::Error))
    }

    /// Advances every engine by one cycle without interpreting a program:
    /// the direct hardware-level driver used by the `Simulator` facade.
    ///
    /// # Errors
    ///
    /// Propagates the first engine fault encountered.
    pub fn step_hardware_only(&mut self) -> KpuResult<()> {
        self.advance_engines()?;
        self.current_cycle += 1;
        self.stats.total_cycles = self.current_cycle;
        Ok(())
    }

    /// Runs `step` until `Completed`, `Error`, or `current_cycle >=
    /// max_cycles` (when `max_cycles` is nonzero).
    ///
    /// # Errors
    ///
    /// Propagates any engine fault from `step`.
    pub fn run(&mut self, max_cycles: Cycle) -> KpuResult<bool> {
        loop {
            if matches!(self.state, ExecutionState::Completed) {
                return Ok(true);
            }
            if max_cycles != 0 && self.current_cycle >= max_cycles {
                return Ok(false);
            }
            if !self.step()? {
                return Ok(matches!(self.state, ExecutionState::Completed));
            }
        }
    }

    /// Drops all in-flight work, rewinds the program counter and cycle, and
    /// returns every engine to idle.
    pub fn reset(&mut self) {
        self.hw.reset();
        self.pc = 0;
        self.current_cycle = 0;
        self.pending = PendingSets::default();
        self.cursors = IssueCursors::default();
        self.stats = Statistics::default();
        self.trace.clear();
        self.state = ExecutionState::Idle;
    }

    /// Issues every instruction starting at `pc` that is currently
    /// issuable. Returns `true` if the loop exhausted the program (`pc`
    /// reached the end), `false` if it stopped on a not-yet-issuable
    /// instruction.
    fn issue_ready_instructions(&mut self) -> KpuResult<bool> {
        let Some(program) = &self.program else {
            return Ok(true);
        };
        let len = program.len();

        while self.pc < len {
            let instr = program.instructions[self.pc].clone();
            if !self.is_issuable(&instr.op) {
                return Ok(false);
            }
            let is_nop = matches!(instr.op, Operation::Nop);
            self.issue(instr.id, &instr.op)?;
            self.pc += 1;
            if is_nop {
                // NOP advances exactly one cycle; stop issuing so the
                // executor's cycle tick applies before the next instruction.
                return Ok(self.pc >= len);
            }
        }
        Ok(true)
    }

    fn is_issuable(&self, op: &Operation) -> bool {
        match op {
            Operation::Barrier { mask } => self.pending.is_empty_for_mask(*mask),
            Operation::WaitId { target } => !self.pending.contains_anywhere(*target),
            Operation::DmaLoad { .. } | Operation::DmaStore { .. } => !self.hw.dma.is_empty(),
            Operation::BmMove { .. } => !self.hw.block_mover.is_empty(),
            Operation::StrRow { .. } | Operation::StrCol { .. } | Operation::StrOut { .. } => !self.hw.streamer.is_empty(),
            Operation::Matmul { .. } | Operation::Nop => true,
        }
    }

    fn issue(&mut self, id: InstructionId, op: &Operation) -> KpuResult<()> {
        match op {
            Operation::DmaLoad {
                src_base, dst_l3_tile, dst_offset, size, ..
            } => self.issue_dma_load(id, *src_base, *dst_l3_tile, *dst_offset, *size),
            Operation::DmaStore {
                src_l3_tile, src_offset, dst_base, size, ..
            } => self.issue_dma_store(id, *src_l3_tile, *src_offset, *dst_base, *size),
            Operation::BmMove {
                src_l3_tile,
                src_offset,
                dst_l2_bank,
                dst_offset,
                rows,
                cols,
                element_size,
                transform,
            } => self.issue_block_move(id, *src_l3_tile, *src_offset, *dst_l2_bank, *dst_offset, *rows, *cols, *element_size, *transform),
            Operation::StrRow { src_l2_bank, dst_l1_buffer, geometry } => {
                self.issue_stream(id, StreamKind::Row, *src_l2_bank, *dst_l1_buffer, *geometry)
            }
            Operation::StrCol { src_l2_bank, dst_l1_buffer, geometry } => {
                self.issue_stream(id, StreamKind::Col, *src_l2_bank, *dst_l1_buffer, *geometry)
            }
            Operation::StrOut { src_l1_buffer, dst_l2_bank, geometry } => {
                self.issue_stream(id, StreamKind::Out, *src_l1_buffer, *dst_l2_bank, *geometry)
            }
            Operation::Matmul {
                compute_tile,
                l1_buffer_id,
                a_addr,
                b_addr,
                c_addr,
                m,
                n,
                k,
            } => self.issue_matmul(id, *compute_tile, *l1_buffer_id, *a_addr, *b_addr, *c_addr, *m, *n, *k),
            Operation::Barrier { .. } => {
                self.stats.barriers_hit += 1;
                Ok(())
            }
            Operation::WaitId { .. } | Operation::Nop => Ok(()),
        }
    }

    fn issue_dma_load(&mut self, id: InstructionId, src_base: Address, dst_l3_tile: usize, dst_offset: Address, size: u64) -> KpuResult<()> {
        let routing = self.hw.decoder.decode(src_base)?;
        let idx = IssueCursors::next(&mut self.cursors.dma, self.hw.dma.len())?;
        self.hw.dma[idx].enqueue(Transfer {
            instruction_id: Some(id),
            src_kind: routing.kind,
            src_id: routing.id,
            src_addr: routing.offset,
            dst_kind: MemoryKind::L3Tile,
            dst_id: dst_l3_tile,
            dst_addr: dst_offset,
            size,
        })?;
        self.pending.dma.insert(id);
        Ok(())
    }

    fn issue_dma_store(&mut self, id: InstructionId, src_l3_tile: usize, src_offset: Address, dst_base: Address, size: u64) -> KpuResult<()> {
        let routing = self.hw.decoder.decode(dst_base)?;
        let idx = IssueCursors::next(&mut self.cursors.dma, self.hw.dma.len())?;
        self.hw.dma[idx].enqueue(Transfer {
            instruction_id: Some(id),
            src_kind: MemoryKind::L3Tile,
            src_id: src_l3_tile,
            src_addr: src_offset,
            dst_kind: routing.kind,
            dst_id: routing.id,
            dst_addr: routing.offset,
            size,
        })?;
        self.pending.dma.insert(id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn issue_block_move(
        &mut self,
        id: InstructionId,
        src_l3_tile: usize,
        src_offset: Address,
        dst_l2_bank: usize,
        dst_offset: Address,
        rows: u32,
        cols: u32,
        element_size: u32,
        transform: crate::isa::Transform,
    ) -> KpuResult<()> {
        let idx = IssueCursors::next(&mut self.cursors.block_mover, self.hw.block_mover.len())?;
        self.hw.block_mover[idx].enqueue(BlockTransfer {
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
        self.pending.block_mover.insert(id);
        Ok(())
    }

    fn issue_stream(&mut self, id: InstructionId, kind: StreamKind, src_id: usize, dst_id: usize, geometry: crate::isa::StreamGeometry) -> KpuResult<()> {
        let idx = IssueCursors::next(&mut self.cursors.streamer, self.hw.streamer.len())?;
        self.hw.streamer[idx].enqueue(StreamJob {
            instruction_id: Some(id),
            kind,
            src_id,
            dst_id,
            geometry,
        });
        self.pending.streamer.insert(id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn issue_matmul(
        &mut self,
        id: InstructionId,
        compute_tile: usize,
        l1_buffer_id: usize,
        a_addr: Address,
        b_addr: Address,
        c_addr: Address,
        m: u32,
        n: u32,
        k: u32,
    ) -> KpuResult<()> {
        let fabric = self.hw.compute.get_mut(compute_tile).ok_or(KpuError::OutOfRange {
            offset: compute_tile as u64,
            size: 1,
            capacity: self.hw.compute.len() as u64,
        })?;
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
            self.current_cycle,
        )?;
        self.pending.compute.insert(id);
        Ok(())
    }

    fn advance_engines(&mut self) -> KpuResult<()> {
        let cycle = self.current_cycle;

        for i in 0..self.hw.dma.len() {
            let HardwareContext {
                dma, host, external, l3, l2, l1, page, ..
            } = &mut self.hw;
            let mut memories = MemoryResources {
                host,
                external,
                l3,
                l2,
                l1,
                page,
            };
            let completion = dma[i].update(cycle, &mut memories)?;
            self.retire(EngineKind::Dma, i, completion, |s, bytes| {
                s.dma_operations += 1;
                s.external_bytes_transferred += bytes;
            });
        }

        for i in 0..self.hw.block_mover.len() {
            let completion = self.hw.block_mover[i].update(cycle, &mut self.hw.l3, &mut self.hw.l2)?;
            self.retire(EngineKind::BlockMover, i, completion, |s, bytes| {
                s.block_mover_operations += 1;
                s.l3_bytes_transferred += bytes;
            });
        }

        for i in 0..self.hw.streamer.len() {
            let completion = self.hw.streamer[i].update(cycle, &mut self.hw.l2, &mut self.hw.l1)?;
            self.retire(EngineKind::Streamer, i, completion, |s, bytes| {
                s.streamer_operations += 1;
                s.l2_bytes_transferred += bytes;
            });
        }

        for i in 0..self.hw.compute.len() {
            let completion = self.hw.compute[i].update(cycle, &mut self.hw.l1)?;
            self.retire(EngineKind::Compute, i, completion, |s, _bytes| {
                s.compute_operations += 1;
            });
        }

        Ok(())
    }

    fn retire(&mut self, kind: EngineKind, engine_id: usize, completion: Option<Completion>, fold: impl FnOnce(&mut Statistics, u64)) {
        let Some(completion) = completion else {
            return;
        };
        if let Some(id) = completion.instruction_id {
            self.pending.set_mut(kind).remove(&id);
            self.stats.instructions_executed += 1;
        }
        fold(&mut self.stats, completion.bytes);
        self.trace.record(TraceEntry {
            cycle: completion.end_cycle,
            component_kind: kind,
            component_id: engine_id,
            transaction_id: u64::from(completion.instruction_id.unwrap_or(0)),
            event_type: TraceEventType::Completed,
            status: TraceStatus::Ok,
            size: completion.bytes,
        });
    }
}
