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

//! Turning overlapping requests into a single list of non-overlapping ranges.
//!
//! This is done by sweeping over the start and end addresses of all the requests, in order,
//! while keeping track of the requests that are "open" at the current address. The open request
//! with the strictest type is the *active* one, and its type is what gets written to the
//! output until it either ends or gets outranked by a newly-opened request.

use crate::range::{EffectiveRange, MemoryRange};

use alloc::vec::Vec;

/// Buffers reused between calls to [`resolve_into`].
#[derive(Debug, Default)]
pub struct ResolveScratch {
    points: Vec<Point>,
    open: Vec<usize>,
}

#[derive(Debug, Copy, Clone)]
struct Point {
    address: u64,
    kind: PointKind,
    /// Index within the input ranges.
    range: usize,
}

/// At identical addresses, ends are processed before starts, so that two abutting ranges
/// never count as open at the same time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PointKind {
    End,
    Start,
}

/// Same as [`resolve_into`], but allocates new buffers.
pub fn resolve(ranges: &[MemoryRange]) -> Vec<EffectiveRange> {
    let mut out = Vec::new();
    resolve_into(ranges, &mut ResolveScratch::default(), &mut out);
    out
}

/// Computes the effective caching type of every address covered by `ranges`.
///
/// `out` is cleared, then filled with ranges that are sorted, don't overlap, and cover exactly
/// the same addresses as `ranges`. Each address gets the strictest of the types of the ranges
/// that cover it. Contiguous output ranges always have different types.
pub fn resolve_into(
    ranges: &[MemoryRange],
    scratch: &mut ResolveScratch,
    out: &mut Vec<EffectiveRange>,
) {
    out.clear();

    let points = &mut scratch.points;
    points.clear();
    points.reserve(ranges.len() * 2);
    for (index, range) in ranges.iter().enumerate() {
        points.push(Point {
            address: range.base,
            kind: PointKind::Start,
            range: index,
        });
        points.push(Point {
            address: range.end(),
            kind: PointKind::End,
            range: index,
        });
    }
    points.sort_unstable_by_key(|p| (p.address, p.kind, p.range));

    let open = &mut scratch.open;
    open.clear();

    // Range currently being written to the output, and where it started.
    let mut active: Option<usize> = None;
    let mut active_start = 0;

    for point in points.iter() {
        let terminate = match point.kind {
            PointKind::Start => {
                open.push(point.range);
                active.map_or(false, |a| ranges[point.range].ty.outranks(ranges[a].ty))
            }
            PointKind::End => {
                if let Some(pos) = open.iter().position(|r| *r == point.range) {
                    open.swap_remove(pos);
                }
                active == Some(point.range)
            }
        };

        if terminate {
            if let Some(a) = active.take() {
                push_merged(out, active_start, point.address, &ranges[a]);
            }
        }

        if active.is_some() {
            continue;
        }

        // Find the strictest open range. The index is part of the key so that the outcome
        // doesn't depend on the order of `open`.
        active = open
            .iter()
            .copied()
            .min_by_key(|r| (ranges[*r].ty, *r));
        active_start = point.address;
    }

    debug_assert!(active.is_none());
    debug_assert!(open.is_empty());
}

/// Appends `[base, end)` to `out`, merging it with the last element if they touch and have the
/// same type. Empty fragments are dropped.
fn push_merged(out: &mut Vec<EffectiveRange>, base: u64, end: u64, source: &MemoryRange) {
    if end <= base {
        return;
    }

    if let Some(last) = out.last_mut() {
        if last.ty == source.ty && last.end() == base {
            last.size += end - base;
            return;
        }
    }

    out.push(EffectiveRange {
        base,
        size: end - base,
        ty: source.ty,
    });
}
