//! The unified address decoder.
//!
//! Every engine's instruction operands name a plain `Address`; the decoder is
//! the single place that knows which `MemoryKind` instance, and which offset
//! within it, that address actually refers to. Regions are non-overlapping
//! and kept sorted by base address so that decoding is a binary search.

use crate::common::{Address, KpuError, KpuResult, MemoryKind};

/// One registered address range, mapping to one storage primitive instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// First address covered by this region.
    pub base: Address,
    /// Size of the region in bytes.
    pub size: u64,
    /// Which storage primitive kind this region belongs to.
    pub kind: MemoryKind,
    /// Index of the specific instance (e.g. which L3 tile) within its kind.
    pub id: usize,
}

impl Region {
    fn end(self) -> u64 {
        self.base.val() + self.size
    }

    fn contains(self, addr: Address) -> bool {
        addr.val() >= self.base.val() && addr.val() < self.end()
    }

    fn overlaps(self, other: Region) -> bool {
        self.base.val() < other.end() && other.base.val() < self.end()
    }
}

/// Result of decoding an address: which resource it names, and the offset
/// within that resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingInfo {
    /// Storage primitive kind the address falls in.
    pub kind: MemoryKind,
    /// Index of the specific instance within its kind.
    pub id: usize,
    /// Offset of the address relative to the region's base.
    pub offset: Address,
}

/// Maps physical addresses to `(MemoryKind, id, offset)` via a sorted,
/// disjoint list of regions.
#[derive(Clone, Debug, Default)]
pub struct AddressDecoder {
    regions: Vec<Region>,
}

impl AddressDecoder {
    /// Creates an empty decoder with no registered regions.
    #[must_use]
    pub fn new() -> Self {
        Self { regions: Vec::new() }
    }

    /// Registers a new region, keeping `self.regions` sorted by base address.
    ///
    /// # Errors
    ///
    /// Returns `OverlapError` if `[base, base+size)` overlaps any region
    /// already registered.
    pub fn register(&mut self, base: Address, size: u64, kind: MemoryKind, id: usize) -> KpuResult<()> {
        let region = Region { base, size, kind, id };
        if self.regions.iter().any(|r| r.overlaps(region)) {
            return Err(KpuError::OverlapError {
                base: base.val(),
                size,
            });
        }
        let pos = self.regions.partition_point(|r| r.base.val() < base.val());
        self.regions.insert(pos, region);
        Ok(())
    }

    /// Decodes a single address to its routing information.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedAddress` if no registered region covers `addr`.
    pub fn decode(&self, addr: Address) -> KpuResult<RoutingInfo> {
        let region = self.find(addr).ok_or(KpuError::UnmappedAddress(addr.val()))?;
        Ok(RoutingInfo {
            kind: region.kind,
            id: region.id,
            offset: Address::new(addr.offset_from(region.base)),
        })
    }

    /// Decodes a `[addr, addr+size)` range, requiring that it stay within a
    /// single region.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedAddress` if `addr` itself is unmapped, or
    /// `RangeError` if the range extends past the region's end.
    pub fn decode_range(&self, addr: Address, size: u64) -> KpuResult<RoutingInfo> {
        let region = self.find(addr).ok_or(KpuError::UnmappedAddress(addr.val()))?;
        if addr.val() + size > region.end() {
            return Err(KpuError::RangeError {
                addr: addr.val(),
                size,
            });
        }
        Ok(RoutingInfo {
            kind: region.kind,
            id: region.id,
            offset: Address::new(addr.offset_from(region.base)),
        })
    }

    /// Returns every registered region, in base-address order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn find(&self, addr: Address) -> Option<Region> {
        let pos = self.regions.partition_point(|r| r.base.val() <= addr.val());
        pos.checked_sub(1)
            .map(|i| self.regions[i])
            .filter(|r| r.contains(addr))
    }
}

impl std::fmt::Display for AddressDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "address map ({} regions):", self.regions.len())?;
        for r in &self.regions {
            writeln!(
                f,
                "  [{:#010x}, {:#010x}) -> {} #{}",
                r.base.val(),
                r.end(),
                r.kind,
                r.id
            )?;
        }
        Ok(())
    }
}
