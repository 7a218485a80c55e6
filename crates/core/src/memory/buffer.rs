//! Bounds-checked byte buffer shared by every storage primitive.

use crate::common::{Address, KpuError, KpuResult};

/// A fixed-capacity byte array with offset/size bounds checking.
///
/// Every storage primitive (`ExternalMemoryBank`, `L3Tile`, `L2Bank`,
/// `L1Buffer`, `PageBuffer`) wraps one of these; they differ only in
/// capacity and in which engines are permitted to reach them.
#[derive(Clone, Debug)]
pub struct MemoryBuffer {
    bytes: Vec<u8>,
}

impl MemoryBuffer {
    /// Creates a zero-initialized buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            bytes: vec![0u8; capacity as usize],
        }
    }

    /// Capacity of the buffer in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reads `dst.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `offset + dst.len()` exceeds `capacity()`.
    pub fn read(&self, offset: Address, dst: &mut [u8]) -> KpuResult<()> {
        let (start, end) = self.bounds(offset, dst.len() as u64)?;
        dst.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    /// Writes `src` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `offset + src.len()` exceeds `capacity()`.
    pub fn write(&mut self, offset: Address, src: &[u8]) -> KpuResult<()> {
        let (start, end) = self.bounds(offset, src.len() as u64)?;
        self.bytes[start..end].copy_from_slice(src);
        Ok(())
    }

    /// Returns a read-only view of the whole buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn bounds(&self, offset: Address, len: u64) -> KpuResult<(usize, usize)> {
        let capacity = self.capacity();
        let end = offset.val().checked_add(len).ok_or(KpuError::OutOfRange {
            offset: offset.val(),
            size: len,
            capacity,
        })?;
        if end > capacity {
            return Err(KpuError::OutOfRange {
                offset: offset.val(),
                size: len,
                capacity,
            });
        }
        Ok((offset.val() as usize, end as usize))
    }
}
