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

//! Splitting ranges into registers.
//!
//! A register can only describe a range whose size is a power of two and whose base is aligned
//! on that size. Any other range has to be split into multiple registers. For example
//! `[0x1000, 0x7000)` becomes `[0x1000, 0x2000)`, `[0x2000, 0x4000)`, `[0x4000, 0x6000)` and
//! `[0x6000, 0x7000)`.

use crate::{
    caching::CachingType,
    error::OutOfSlots,
    range::{EffectiveRange, HardwareSlot},
};

use alloc::vec::Vec;
use smallvec::SmallVec;

/// Returns the registers needed to exactly cover `[base, base + size)`, after rounding the
/// range outwards to `granularity`.
///
/// Returns an error if more than `remaining` registers would be needed. On success,
/// `remaining` is decreased by the number of registers returned. On failure, it is left
/// untouched.
pub fn encode_range(
    base: u64,
    size: u64,
    ty: CachingType,
    granularity: u64,
    remaining: &mut usize,
) -> Result<SmallVec<[HardwareSlot; 8]>, OutOfSlots> {
    debug_assert!(granularity.is_power_of_two());
    let mask = granularity - 1;

    let end = base.saturating_add(size);
    let end = match end.checked_add(mask) {
        Some(e) => e & !mask,
        None => end & !mask,
    };
    let mut base = base & !mask;
    let mut size = end.saturating_sub(base);

    let mut out = SmallVec::new();
    let mut interval = granularity;

    // At each iteration, `base` and `size` are multiples of `interval`. We cut off one block of
    // `interval` bytes from each side if necessary to make them multiples of `interval * 2`.
    while size != 0 {
        if base & interval != 0 {
            push_slot(&mut out, base, interval, ty, *remaining)?;
            base += interval;
            size -= interval;
        }

        if size & interval != 0 {
            push_slot(&mut out, base + size - interval, interval, ty, *remaining)?;
            size -= interval;
        }

        interval = match interval.checked_mul(2) {
            Some(i) => i,
            None => break,
        };
    }

    debug_assert_eq!(size, 0);
    *remaining -= out.len();
    Ok(out)
}

fn push_slot(
    out: &mut SmallVec<[HardwareSlot; 8]>,
    base: u64,
    size: u64,
    ty: CachingType,
    budget: usize,
) -> Result<(), OutOfSlots> {
    if out.len() >= budget {
        return Err(OutOfSlots);
    }

    out.push(HardwareSlot { base, size, ty });
    Ok(())
}

/// Encodes all the ranges of `ranges` that need a register, in other words all except the
/// write-back ones, into `out`.
///
/// `out` is cleared first. On error, its content is unspecified.
pub fn encode_all_into(
    ranges: &[EffectiveRange],
    granularity: u64,
    capacity: usize,
    out: &mut Vec<HardwareSlot>,
) -> Result<(), OutOfSlots> {
    out.clear();

    let mut remaining = capacity;
    for range in ranges {
        if range.ty == CachingType::WriteBack {
            continue;
        }

        let slots = encode_range(range.base, range.size, range.ty, granularity, &mut remaining)?;
        out.extend(slots);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{encode_all_into, encode_range};
    use crate::{CachingType, EffectiveRange, HardwareSlot, OutOfSlots};

    fn slots(base: u64, size: u64, budget: usize) -> Result<Vec<(u64, u64)>, OutOfSlots> {
        let mut remaining = budget;
        let out = encode_range(base, size, CachingType::Uncached, 0x1000, &mut remaining)?;
        assert_eq!(remaining, budget - out.len());
        Ok(out.iter().map(|s| (s.base, s.size)).collect())
    }

    #[test]
    fn aligned_range() {
        assert_eq!(slots(0x10000, 0x10000, 8), Ok(vec![(0x10000, 0x10000)]));
    }

    #[test]
    fn two_halves() {
        assert_eq!(
            slots(0x1000, 0x2000, 8),
            Ok(vec![(0x1000, 0x1000), (0x2000, 0x1000)])
        );
    }

    #[test]
    fn both_sides() {
        assert_eq!(
            slots(0x1000, 0x6000, 8),
            Ok(vec![
                (0x1000, 0x1000),
                (0x6000, 0x1000),
                (0x2000, 0x2000),
                (0x4000, 0x2000),
            ])
        );
    }

    #[test]
    fn rounded_to_granularity() {
        assert_eq!(slots(0x800, 0x800, 8), Ok(vec![(0x0, 0x1000)]));
        assert_eq!(slots(0xfff, 0x2, 8), Ok(vec![(0x0, 0x2000)]));
    }

    #[test]
    fn budget_exhausted() {
        let mut remaining = 3;
        let result = encode_range(
            0x1000,
            0x6000,
            CachingType::WriteThrough,
            0x1000,
            &mut remaining,
        );
        assert_eq!(result, Err(OutOfSlots));
        assert_eq!(remaining, 3);
    }

    #[test]
    fn write_back_skipped() {
        let ranges = [
            EffectiveRange {
                base: 0,
                size: 0xa0000,
                ty: CachingType::WriteBack,
            },
            EffectiveRange {
                base: 0xa0000,
                size: 0x20000,
                ty: CachingType::WriteCombining,
            },
            EffectiveRange {
                base: 0x100000,
                size: 0x7ff00000,
                ty: CachingType::WriteBack,
            },
        ];

        let mut out = Vec::new();
        assert_eq!(encode_all_into(&ranges, 0x1000, 1, &mut out), Ok(()));
        assert_eq!(
            out,
            vec![HardwareSlot {
                base: 0xa0000,
                size: 0x20000,
                ty: CachingType::WriteCombining,
            }]
        );

        assert_eq!(encode_all_into(&ranges, 0x1000, 0, &mut out), Err(OutOfSlots));
    }
}
