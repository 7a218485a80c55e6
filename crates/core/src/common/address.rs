//! Physical address type for the unified KPU address space.
//!
//! Unlike a conventional CPU simulator, which distinguishes virtual and
//! physical addresses, the KPU's data movement engines all operate on a
//! single flat physical address space; what distinguishes a byte's home is
//! which `MemoryKind` region it falls in, decided by the address decoder.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A physical address in the KPU's unified address space.
///
/// Wrapping the raw `u64` prevents accidentally mixing an address with a
/// byte count or an instruction id at the type level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// Creates a new address from a raw 64-bit value.
    #[inline(always)]
    #[must_use]
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    #[must_use]
    pub fn val(self) -> u64 {
        self.0
    }

    /// Returns the offset of `self` relative to `base`.
    ///
    /// Saturates to zero if `self` is below `base`; callers that need to
    /// detect that case should compare addresses directly first.
    #[must_use]
    pub fn offset_from(self, base: Self) -> u64 {
        self.0.saturating_sub(base.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Add<u64> for Address {
    type Output = Address;
    fn add(self, rhs: u64) -> Address {
        Address(self.0 + rhs)
    }
}

impl Sub<u64> for Address {
    type Output = Address;
    fn sub(self, rhs: u64) -> Address {
        Address(self.0 - rhs)
    }
}

impl From<u64> for Address {
    fn from(v: u64) -> Self {
        Address(v)
    }
}
