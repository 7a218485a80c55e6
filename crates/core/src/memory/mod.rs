//! Unified address space: the address decoder and the storage primitives it
//! routes to.
//!
//! 1. **Decoder:** Maps a physical `Address` to `(kind, id, offset)` using
//!    disjoint, sorted regions.
//! 2. **Buffer:** A bounds-checked byte array shared by every storage
//!    primitive, differing only in capacity and which engines may reach it.
//! 3. **Banks:** Thin per-purpose wrappers (`ExternalMemoryBank`, `L3Tile`,
//!    `L2Bank`, `L1Buffer`, `PageBuffer`) around `MemoryBuffer`.
//! 4. **Resources:** A borrowed view bundling every storage collection,
//!    handed to an engine for the duration of one `update()` call.

/// Storage wrapper types: external memory bank, L3 tile, L2 bank, L1 buffer, page buffer.
pub mod banks;
/// Bounds-checked byte buffer shared by all storage primitives.
pub mod buffer;
/// The address decoder: disjoint sorted regions, routing, and the memory map printer.
pub mod decoder;

pub use banks::{ExternalMemoryBank, L1Buffer, L2Bank, L3Tile, PageBuffer};
pub use buffer::MemoryBuffer;
pub use decoder::{AddressDecoder, Region, RoutingInfo};

use crate::common::{Address, KpuError, KpuResult, MemoryKind};

/// Borrowed view of every storage collection, passed to an engine's `update`.
///
/// Engines hold no owning references to memory; the simulator/executor owns
/// all storage in stable, index-addressed `Vec`s and lends them out through
/// this struct for the duration of one call.
pub struct MemoryResources<'a> {
    /// Host-side DDR banks.
    pub host: &'a mut [ExternalMemoryBank],
    /// KPU external memory banks.
    pub external: &'a mut [ExternalMemoryBank],
    /// L3 cache tiles.
    pub l3: &'a mut [L3Tile],
    /// L2 cache banks.
    pub l2: &'a mut [L2Bank],
    /// L1 streaming buffers.
    pub l1: &'a mut [L1Buffer],
    /// Memory controller page buffers.
    pub page: &'a mut [PageBuffer],
}

impl MemoryResources<'_> {
    /// Reads `dst.len()` bytes from `(kind, id, offset)` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `id` is out of bounds or the read would
    /// overflow the resource's capacity.
    pub fn read(&self, kind: MemoryKind, id: usize, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        match kind {
            MemoryKind::HostMemory => Self::get(&self.host, id)?.read(offset, dst),
            MemoryKind::External => Self::get(&self.external, id)?.read(offset, dst),
            MemoryKind::L3Tile => Self::get(&self.l3, id)?.read(offset, dst),
            MemoryKind::L2Bank => Self::get(&self.l2, id)?.read(offset, dst),
            MemoryKind::L1Buffer => Self::get(&self.l1, id)?.read(offset, dst),
            MemoryKind::PageBuffer => Self::get(&self.page, id)?.read(offset, dst),
        }
    }

    /// Writes `src` into `(kind, id, offset)`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `id` is out of bounds or the write would
    /// overflow the resource's capacity.
    pub fn write(&mut self, kind: MemoryKind, id: usize, offset: Address, src: &[u8]) -> KpuResult<()> {
        match kind {
            MemoryKind::HostMemory => Self::get_mut(&mut self.host, id)?.write(offset, src),
            MemoryKind::External => Self::get_mut(&mut self.external, id)?.write(offset, src),
            MemoryKind::L3Tile => Self::get_mut(&mut self.l3, id)?.write(offset, src),
            MemoryKind::L2Bank => Self::get_mut(&mut self.l2, id)?.write(offset, src),
            MemoryKind::L1Buffer => Self::get_mut(&mut self.l1, id)?.write(offset, src),
            MemoryKind::PageBuffer => Self::get_mut(&mut self.page, id)?.write(offset, src),
        }
    }

    /// Copies `size` bytes from `(src_kind, src_id, src_offset)` to
    /// `(dst_kind, dst_id, dst_offset)`, via a staging buffer (the resources
    /// may alias the same collection, so a direct split-borrow isn't always
    /// possible).
    ///
    /// # Errors
    ///
    /// Propagates any `OutOfRange` from the underlying read or write.
    #[allow(clippy::too_many_arguments)]
    pub fn copy(
        &mut self,
        src_kind: MemoryKind,
        src_id: usize,
        src_offset: Address,
        dst_kind: MemoryKind,
        dst_id: usize,
        dst_offset: Address,
        size: u64,
    ) -> KpuResult<()> {
        let mut staging = vec![0u8; size as usize];
        self.read(src_kind, src_id, src_offset, &mut staging)?;
        self.write(dst_kind, dst_id, dst_offset, &staging)
    }

    fn get<T>(slice: &&mut [T], id: usize) -> KpuResult<&T> {
        slice.get(id).ok_or(KpuError::OutOfRange {
            offset: id as u64,
            size: 1,
            capacity: slice.len() as u64,
        })
    }

    fn get_mut<T>(slice: &mut &mut [T], id: usize) -> KpuResult<&mut T> {
        let len = slice.len() as u64;
        slice.get_mut(id).ok_or(KpuError::OutOfRange {
            offset: id as u64,
            size: 1,
            capacity: len,
        })
    }
}
