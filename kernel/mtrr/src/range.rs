// Copyright (C) 2019-2020  Pierre Krieger
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Ranges of physical memory, at the various stages of the pipeline.

use crate::caching::CachingType;

use core::fmt;

/// Identifier of whoever requested a caching type for a range.
///
/// This is typically the identifier of a memory area or of a device resource.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Owner of the ranges registered at boot time, such as the physical memory map.
    ///
    /// Contrary to other owners, this one is allowed to hold multiple ranges.
    pub const STATIC: OwnerId = OwnerId(u64::max_value());

    /// Builds an [`OwnerId`] from a raw identifier.
    pub const fn new(id: u64) -> Self {
        OwnerId(id)
    }
}

impl From<u64> for OwnerId {
    fn from(id: u64) -> OwnerId {
        OwnerId(id)
    }
}

impl From<OwnerId> for u64 {
    fn from(owner: OwnerId) -> u64 {
        owner.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == OwnerId::STATIC {
            return f.pad("static");
        }

        if f.width().is_none() {
            return write!(f, "#{}", self.0);
        }

        // Padding applies to the whole `#n`, so it is formatted separately first.
        let mut buffer = StackBuffer {
            bytes: [0; 21],
            len: 0,
        };
        fmt::Write::write_fmt(&mut buffer, format_args!("#{}", self.0))?;
        let text = core::str::from_utf8(&buffer.bytes[..buffer.len]).map_err(|_| fmt::Error)?;
        f.pad(text)
    }
}

/// Enough room for `#` followed by any `u64`.
struct StackBuffer {
    bytes: [u8; 21],
    len: usize,
}

impl fmt::Write for StackBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        self.bytes
            .get_mut(self.len..end)
            .ok_or(fmt::Error)?
            .copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Range requested by an owner. Stored in the [`RangeRegistry`](crate::RangeRegistry).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRange {
    /// Physical address of the first byte.
    pub base: u64,
    /// Number of bytes. Never 0, and `base + size` never overflows.
    pub size: u64,
    /// Requested caching type.
    pub ty: CachingType,
    /// Who requested this range.
    pub owner: OwnerId,
}

impl MemoryRange {
    /// Physical address one byte past the end of the range.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Returns true if the range shares at least one byte with `[base, end)`.
    pub fn intersects(&self, base: u64, end: u64) -> bool {
        self.base < end && base < self.end()
    }
}

/// Outcome of combining all the [`MemoryRange`]s together.
///
/// A list of these is always sorted and non-overlapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EffectiveRange {
    /// Physical address of the first byte.
    pub base: u64,
    /// Number of bytes.
    pub size: u64,
    /// Caching type that applies to the whole range.
    pub ty: CachingType,
}

impl EffectiveRange {
    /// Physical address one byte past the end of the range.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Returns true if `address` is within the range.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// What a single variable range register can describe.
///
/// `size` is always a power of two, and `base` is always a multiple of `size`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HardwareSlot {
    /// Physical address of the first byte.
    pub base: u64,
    /// Number of bytes. Always a power of two.
    pub size: u64,
    /// Caching type of the range.
    pub ty: CachingType,
}

impl HardwareSlot {
    /// Physical address one byte past the end of the range.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Returns true if `address` is within the range.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }

    /// Returns the address mask to put in the `IA32_MTRR_PHYSMASKn` register, without the
    /// valid bit, given the number of bits of physical address supported by the processor.
    pub fn mask(&self, physical_address_bits: u32) -> u64 {
        let address_mask = if physical_address_bits >= 64 {
            u64::max_value()
        } else {
            (1u64 << physical_address_bits) - 1
        };

        !(self.size - 1) & address_mask
    }
}

#[cfg(test)]
mod tests {
    use super::{CachingType, HardwareSlot, MemoryRange, OwnerId};

    #[test]
    fn owner_display() {
        assert_eq!(format!("{}", OwnerId::new(12)), "#12");
        assert_eq!(format!("{:<6}|", OwnerId::new(12)), "#12   |");
        assert_eq!(format!("{:>6}|", OwnerId::new(12)), "   #12|");
        assert_eq!(format!("{:<8}|", OwnerId::STATIC), "static  |");
        assert_eq!(
            format!("{:4}", OwnerId::new(u64::max_value() - 1)),
            "#18446744073709551614"
        );
        assert_eq!(format!("{:?}", OwnerId::STATIC), "static");
    }

    #[test]
    fn intersection() {
        let range = MemoryRange {
            base: 0x1000,
            size: 0x1000,
            ty: CachingType::Uncached,
            owner: OwnerId::new(1),
        };

        assert!(range.intersects(0x1fff, 0x3000));
        assert!(range.intersects(0x0, 0x1001));
        assert!(!range.intersects(0x2000, 0x3000));
        assert!(!range.intersects(0x0, 0x1000));
    }

    #[test]
    fn slot_mask() {
        let slot = HardwareSlot {
            base: 0xe000_0000,
            size: 0x1000_0000,
            ty: CachingType::WriteCombining,
        };
        assert_eq!(slot.mask(36), 0xf_f000_0000);
        assert_eq!(slot.mask(64), 0xffff_ffff_f000_0000);
        assert!(slot.contains(0xefff_ffff));
        assert!(!slot.contains(0xf000_0000));
    }
}
