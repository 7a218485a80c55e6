//! The Data Movement ISA instruction set.

use serde::{Deserialize, Serialize};

use crate::common::{Address, EngineMask, InstructionId, Size};

/// Which operand matrix (A, B, or C) an instruction's tile coordinate refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixId {
    /// Left operand matrix.
    A,
    /// Right operand matrix.
    B,
    /// Output matrix.
    C,
}

/// Tile-space coordinate `(tile_row, tile_col)` within a matrix's tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCoord {
    /// Tile row index.
    pub row: u32,
    /// Tile column index.
    pub col: u32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// In-flight transform applied by a `BM_MOVE` as it streams a block into its
/// destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// Byte-copy rows unchanged.
    Identity,
    /// Destination element `[j][i] <- source[i][j]`.
    Transpose,
    /// Destination dimensions are >= source; out-of-range cells are zeroed.
    Pad {
        /// Destination row count.
        dst_rows: u32,
        /// Destination column count.
        dst_cols: u32,
    },
}

/// Geometry shared by `STR_ROW`, `STR_COL`, and `STR_OUT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamGeometry {
    /// Base address of the L2-side operand within its bank.
    pub l2_addr: Address,
    /// Base address of the L1-side operand within its buffer.
    pub l1_addr: Address,
    /// Matrix tile height in elements.
    pub height: u32,
    /// Matrix tile width in elements.
    pub width: u32,
    /// Element size in bytes.
    pub element_size: u32,
    /// Systolic array dimension the stream feeds (rows for `STR_ROW`,
    /// columns for `STR_COL`).
    pub fabric_size: u32,
}

/// One Data Movement ISA operation. Each variant's fields are exactly the
/// operands the opcode takes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Copy one tile from external memory into an L3 tile.
    DmaLoad {
        /// Which matrix the tile belongs to.
        matrix: MatrixId,
        /// Tile coordinate within that matrix's tile grid.
        tile: TileCoord,
        /// Source address in external memory.
        src_base: Address,
        /// Destination L3 tile index.
        dst_l3_tile: usize,
        /// Destination offset within the L3 tile.
        dst_offset: Address,
        /// Size of the tile in bytes.
        size: Size,
    },
    /// Copy one tile from L3 back to external memory.
    DmaStore {
        /// Which matrix the tile belongs to.
        matrix: MatrixId,
        /// Tile coordinate within that matrix's tile grid.
        tile: TileCoord,
        /// Source L3 tile index.
        src_l3_tile: usize,
        /// Source offset within the L3 tile.
        src_offset: Address,
        /// Destination address in external memory.
        dst_base: Address,
        /// Size of the tile in bytes.
        size: Size,
    },
    /// L3 -> L2 (or L2 -> L3) block move with an optional transform.
    BmMove {
        /// Source L3 tile index.
        src_l3_tile: usize,
        /// Source offset within the L3 tile.
        src_offset: Address,
        /// Destination L2 bank index.
        dst_l2_bank: usize,
        /// Destination offset within the L2 bank.
        dst_offset: Address,
        /// Block row count.
        rows: u32,
        /// Block column count.
        cols: u32,
        /// Element size in bytes.
        element_size: u32,
        /// In-flight transform to apply.
        transform: Transform,
    },
    /// Row-stream an A tile from L2 into L1 with staggering.
    StrRow {
        /// Source L2 bank index.
        src_l2_bank: usize,
        /// Destination L1 buffer index.
        dst_l1_buffer: usize,
        /// Stream geometry.
        geometry: StreamGeometry,
    },
    /// Column-stream a B tile from L2 into L1 with staggering.
    StrCol {
        /// Source L2 bank index.
        src_l2_bank: usize,
        /// Destination L1 buffer index.
        dst_l1_buffer: usize,
        /// Stream geometry.
        geometry: StreamGeometry,
    },
    /// Evacuate a C tile from L1 back to L2.
    StrOut {
        /// Source L1 buffer index.
        src_l1_buffer: usize,
        /// Destination L2 bank index.
        dst_l2_bank: usize,
        /// Stream geometry.
        geometry: StreamGeometry,
    },
    /// Fire a systolic (or basic) matmul on a compute tile.
    Matmul {
        /// Compute tile (Compute Fabric instance) index.
        compute_tile: usize,
        /// L1 buffer holding A, B, and C operands.
        l1_buffer_id: usize,
        /// Address of A within the L1 buffer.
        a_addr: Address,
        /// Address of B within the L1 buffer.
        b_addr: Address,
        /// Address of C within the L1 buffer.
        c_addr: Address,
        /// Output row count.
        m: u32,
        /// Output column count.
        n: u32,
        /// Reduction dimension.
        k: u32,
    },
    /// Wait for all prior instructions on the masked engine kinds to retire.
    Barrier {
        /// Engine kinds the barrier waits on.
        mask: EngineMask,
    },
    /// Wait for a specific prior instruction id to retire.
    WaitId {
        /// The instruction id to wait for.
        target: InstructionId,
    },
    /// Advance one cycle without side effects.
    Nop,
}

impl Operation {
    /// Short opcode name, as printed by the disassembler and used in trace
    /// entries.
    #[must_use]
    pub fn opcode_name(&self) -> &'static str {
        match self {
            Operation::DmaLoad { .. } => "DMA_LOAD",
            Operation::DmaStore { .. } => "DMA_STORE",
            Operation::BmMove { .. } => "BM_MOVE",
            Operation::StrRow { .. } => "STR_ROW",
            Operation::StrCol { .. } => "STR_COL",
            Operation::StrOut { .. } => "STR_OUT",
            Operation::Matmul { .. } => "MATMUL",
            Operation::Barrier { .. } => "BARRIER",
            Operation::WaitId { .. } => "WAIT_ID",
            Operation::Nop => "NOP",
        }
    }
}

/// One instruction in a `DMProgram`: a monotone id plus an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DMInstruction {
    /// Identifier, unique and strictly increasing within the owning program.
    pub id: InstructionId,
    /// The operation this instruction performs.
    pub op: Operation,
}

impl DMInstruction {
    /// Creates a new instruction.
    #[must_use]
    pub fn new(id: InstructionId, op: Operation) -> Self {
        Self { id, op }
    }
}
