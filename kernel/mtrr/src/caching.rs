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

//! # Caching
//!
//! There exists six ways a CPU can treat memory, w.r.t. caching:
//!
//! - Strong Uncachable (UC). Memory is not cached. All operations are ordered.
//! - Uncachable (UC-). Used in conjunction with the (Page Attributes Table) PAT, and never
//! produced by this crate.
//! - Write Combining (WC). Memory is not cached. Writes might be reordered and multiple writes
//! might be combined into one.
//! - Write Through (WT). Memory is cached. Writes update the cache entry (if any) and are also
//! propagated to the physical memory and may be combined (as with WC).
//! - Write Protected (WP). Similar to WT, but writes also invalidate the corresponding cache lines
//! on all other processors.
//! - Write Back (WB). Memory is cached. Writes only update the cache entry, and the physical
//! memory is updated only when the cache line is flushed (such as when the cache is full).
//!
//! When multiple requests cover the same address, the strictest one wins. [`CachingType`] is
//! ordered accordingly: a lower value has a higher priority.

use core::fmt;

/// Caching policy of a range of physical memory.
///
/// The ordering of this enum is the priority order: `Uncached < WriteCombining < ... <
/// WriteBack`, and the smallest type wins when ranges overlap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CachingType {
    /// Strong uncachable (UC).
    Uncached,
    /// Write combining (WC).
    WriteCombining,
    /// Write through (WT).
    WriteThrough,
    /// Write protected (WP).
    WriteProtected,
    /// Write back (WB). This is the default type and never needs a register.
    WriteBack,
}

impl CachingType {
    /// All the types, from the highest priority to the lowest.
    pub const ALL: [CachingType; 5] = [
        CachingType::Uncached,
        CachingType::WriteCombining,
        CachingType::WriteThrough,
        CachingType::WriteProtected,
        CachingType::WriteBack,
    ];

    /// Returns true if `self` wins over `other` when both cover the same address.
    pub fn outranks(self, other: CachingType) -> bool {
        self < other
    }

    /// Returns true if adjacent ranges of this type can be merged together by the optimizer,
    /// even if that means marking the memory in between with this type.
    pub fn may_coalesce(self) -> bool {
        matches!(self, CachingType::Uncached | CachingType::WriteThrough)
    }

    /// Value of the type as found in the `IA32_MTRR_PHYSBASEn` registers.
    pub const fn hardware_value(self) -> u8 {
        match self {
            CachingType::Uncached => 0x0,
            CachingType::WriteCombining => 0x1,
            CachingType::WriteThrough => 0x4,
            CachingType::WriteProtected => 0x5,
            CachingType::WriteBack => 0x6,
        }
    }

    /// Inverse of [`CachingType::hardware_value`].
    pub fn from_hardware_value(value: u8) -> Option<CachingType> {
        CachingType::ALL
            .iter()
            .copied()
            .find(|ty| ty.hardware_value() == value)
    }

    /// Two-letter abbreviation, as used in the Intel manuals.
    pub const fn short_name(self) -> &'static str {
        match self {
            CachingType::Uncached => "UC",
            CachingType::WriteCombining => "WC",
            CachingType::WriteThrough => "WT",
            CachingType::WriteProtected => "WP",
            CachingType::WriteBack => "WB",
        }
    }
}

impl fmt::Display for CachingType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
