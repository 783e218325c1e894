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

//! Reducing the number of registers needed to describe a list of ranges.
//!
//! A range like `[0x1000, 0x3000)` needs two registers, while `[0x0, 0x4000)` needs only one.
//! When the bytes around a range aren't claimed by a range of a different type, we can extend
//! the range over them. The memory between ranges uses the default type, and is normally either
//! not backed by anything or only accessed through page tables that specify their own type.

use crate::{caching::CachingType, range::EffectiveRange};

use alloc::vec::Vec;

/// Types that the optimizer processes, in order.
const OPTIMIZED_TYPES: [CachingType; 4] = [
    CachingType::Uncached,
    CachingType::WriteThrough,
    CachingType::WriteCombining,
    CachingType::WriteProtected,
];

/// Grows the ranges of `ranges` towards aligned boundaries.
///
/// `ranges` must be sorted and non-overlapping, as returned by
/// [`resolve`](crate::resolve::resolve). It remains so afterwards. Every address covered by an
/// input range is still covered, with the same type, after the call.
///
/// A range never grows past the end of the last range of the list, nor below the end of the
/// range that precedes it. Write-back ranges are never modified, but act as boundaries for the
/// other ranges.
pub fn optimize(ranges: &mut Vec<EffectiveRange>, granularity: u64) {
    for ty in OPTIMIZED_TYPES.iter().copied() {
        optimize_type(ranges, ty, granularity);
    }
}

/// Grows all the ranges of type `ty`.
///
/// If the type [may coalesce](CachingType::may_coalesce), a range can grow over the following
/// ranges of the same type, which are then either removed or cut.
fn optimize_type(ranges: &mut Vec<EffectiveRange>, ty: CachingType, granularity: u64) {
    let coalesce = ty.may_coalesce();

    let mut previous_end = 0;
    let mut read = 0;
    let mut write = 0;

    while read < ranges.len() {
        let range = ranges[read];
        read += 1;

        if range.ty != ty {
            previous_end = range.end();
            ranges[write] = range;
            write += 1;
            continue;
        }

        let next_start = match ranges[read..].iter().find(|r| !coalesce || r.ty != ty) {
            Some(next) => next.base,
            // Only ranges of the same type follow, up to the last one.
            None if coalesce => ranges.last().map_or(range.end(), |r| r.end()),
            None => range.end(),
        }
        .max(range.end());

        let (base, end) = grow(range.base, range.end(), previous_end, next_start, granularity);
        ranges[write] = EffectiveRange {
            base,
            size: end - base,
            ty,
        };
        write += 1;
        previous_end = end;

        // Swallow the ranges we now cover, and cut the one we partially cover.
        while read < ranges.len() {
            let next = ranges[read];
            if next.base >= end {
                break;
            }

            debug_assert_eq!(next.ty, ty);
            if next.end() > end {
                ranges[read] = EffectiveRange {
                    base: end,
                    size: next.end() - end,
                    ty: next.ty,
                };
                break;
            }

            read += 1;
        }
    }

    ranges.truncate(write);
}

/// Extends `[base, end)` to the largest power-of-two alignment that stays within
/// `[lower, upper)`, and returns the new bounds.
///
/// Both sides are extended together as long as possible. Once one side hits its limit, the
/// other one can still keep growing as long as the range crosses the current alignment
/// boundary.
fn grow(mut base: u64, mut end: u64, lower: u64, upper: u64, granularity: u64) -> (u64, u64) {
    let mut interval = match granularity.checked_mul(2) {
        Some(i) => i,
        None => return (base, end),
    };

    loop {
        let mask = interval - 1;

        let mut aligned_base = base & !mask;
        let mut aligned_end = match end.checked_add(mask) {
            Some(e) => e & !mask,
            None => break,
        };

        if aligned_base < lower {
            aligned_base = match aligned_base.checked_add(interval) {
                Some(b) => b,
                None => break,
            };
        }
        if aligned_end > upper {
            aligned_end -= interval;
        }

        if aligned_base >= aligned_end {
            break;
        }

        base = base.min(aligned_base);
        end = end.max(aligned_end);

        interval = match interval.checked_mul(2) {
            Some(i) => i,
            None => break,
        };
    }

    (base, end)
}
