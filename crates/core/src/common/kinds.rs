//! Routing and scheduling tags: `MemoryKind` and `EngineKind`.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Memory hierarchy resource kind, as decoded from a physical address.
///
/// `HostMemory` and `External` are both DMA-reachable; `L3Tile` is reachable
/// by DMA and by the Block Mover; `L2Bank` and `L1Buffer` are reachable only
/// by the Block Mover and Streamer respectively; `PageBuffer` is a memory
/// controller scratch area not targeted by any engine's enqueue API directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Host-side DDR, the CPU-visible side of a DMA transfer.
    HostMemory,
    /// KPU external memory bank (GDDR6/HBM-class, technology-agnostic).
    External,
    /// L3 cache tile.
    L3Tile,
    /// L2 cache bank.
    L2Bank,
    /// L1 streaming buffer, fed by a Streamer, consumed by the Compute Fabric.
    L1Buffer,
    /// Memory controller page buffer (row/column coalescing scratch area).
    PageBuffer,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryKind::HostMemory => "HOST_MEMORY",
            MemoryKind::External => "EXTERNAL",
            MemoryKind::L3Tile => "L3_TILE",
            MemoryKind::L2Bank => "L2_BANK",
            MemoryKind::L1Buffer => "L1",
            MemoryKind::PageBuffer => "PAGE_BUFFER",
        };
        f.write_str(s)
    }
}

/// Engine kind, used to key the executor's pending-instruction sets and to
/// build `BARRIER` masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// DMA engine (external memory ↔ L3).
    Dma,
    /// Block Mover (L3 ↔ L2, with optional transform).
    BlockMover,
    /// Streamer (L2 ↔ L1, systolic-timed).
    Streamer,
    /// Compute Fabric (systolic array / basic matmul).
    Compute,
}

impl EngineKind {
    /// All four engine kinds, in the executor's fixed update order.
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Dma,
        EngineKind::BlockMover,
        EngineKind::Streamer,
        EngineKind::Compute,
    ];
}

/// Bitmask of `EngineKind`s, used by the `BARRIER` instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMask(u8);

impl EngineMask {
    /// Mask selecting only DMA engines.
    pub const DMA: EngineMask = EngineMask(1 << 0);
    /// Mask selecting only Block Movers.
    pub const BLOCK_MOVER: EngineMask = EngineMask(1 << 1);
    /// Mask selecting only Streamers.
    pub const STREAMER: EngineMask = EngineMask(1 << 2);
    /// Mask selecting only Compute Fabrics.
    pub const COMPUTE: EngineMask = EngineMask(1 << 3);
    /// Mask selecting every engine kind.
    pub const ALL: EngineMask = EngineMask(0b1111);
    /// Empty mask.
    pub const NONE: EngineMask = EngineMask(0);

    /// Returns whether the mask selects `kind`.
    #[must_use]
    pub fn contains(self, kind: EngineKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    /// Returns whether the mask selects no engine kind at all.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn bit(kind: EngineKind) -> u8 {
        match kind {
            EngineKind::Dma => Self::DMA.0,
            EngineKind::BlockMover => Self::BLOCK_MOVER.0,
            EngineKind::Streamer => Self::STREAMER.0,
            EngineKind::Compute => Self::COMPUTE.0,
        }
    }

    /// Returns the raw bitmask value, for wire encoding.
    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Builds a mask from a raw bitmask value.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        EngineMask(bits & Self::ALL.0)
    }
}

impl From<EngineKind> for EngineMask {
    fn from(kind: EngineKind) -> Self {
        EngineMask(EngineMask::bit(kind))
    }
}

impl BitOr for EngineMask {
    type Output = EngineMask;
    fn bitor(self, rhs: EngineMask) -> EngineMask {
        EngineMask(self.0 | rhs.0)
    }
}
