//! Per-purpose storage wrappers, each a thin named handle around a
//! [`MemoryBuffer`](super::buffer::MemoryBuffer).
//!
//! The wrapper types exist so that `MemoryResources` can hold separate,
//! independently indexed collections per `MemoryKind` rather than one
//! untyped `Vec<MemoryBuffer>` that callers could index with the wrong
//! kind's id.

use crate::common::{Address, KpuResult};

use super::buffer::MemoryBuffer;

macro_rules! memory_wrapper {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug)]
        pub struct $name {
            buffer: MemoryBuffer,
        }

        impl $name {
            /// Creates a zero-initialized wrapper of `capacity` bytes.
            #[must_use]
            pub fn new(capacity: u64) -> Self {
                Self {
                    buffer: MemoryBuffer::new(capacity),
                }
            }

            /// Capacity in bytes.
            #[must_use]
            pub fn capacity(&self) -> u64 {
                self.buffer.capacity()
            }

            /// Reads `dst.len()` bytes starting at `offset`.
            ///
            /// # Errors
            ///
            /// Returns `OutOfRange` if the read would exceed `capacity()`.
            pub fn read(&self, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
                self.buffer.read(offset, dst)
            }

            /// Writes `src` starting at `offset`.
            ///
            /// # Errors
            ///
            /// Returns `OutOfRange` if the write would exceed `capacity()`.
            pub fn write(&mut self, offset: Address, src: &[u8]) -> KpuResult<()> {
                self.buffer.write(offset, src)
            }

            /// Returns a read-only view of the whole wrapper.
            #[must_use]
            pub fn as_slice(&self) -> &[u8] {
                self.buffer.as_slice()
            }
        }
    };
}

memory_wrapper!(
    ExternalMemoryBank,
    "KPU external memory bank (or host DDR bank, same storage shape)."
);
memory_wrapper!(L3Tile, "L3 cache tile, the DMA-reachable / Block-Mover-reachable tier.");
memory_wrapper!(L2Bank, "L2 cache bank, the Block-Mover-reachable / Streamer-reachable tier.");
memory_wrapper!(L1Buffer, "L1 streaming buffer, fed by a Streamer and consumed by the Compute Fabric.");
memory_wrapper!(PageBuffer, "Memory controller page buffer used for row/column coalescing.");
