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

mod common;

use proptest::prelude::*;
use redshirt_mtrr::{
    commit::{self, CommitScratch, HardwareLimits},
    encode, optimize, resolve, CachingType, Config, EffectiveRange, MemoryRange, OwnerId,
};

const PAGE: u64 = 0x1000;

fn ranges_strategy() -> impl Strategy<Value = Vec<MemoryRange>> {
    prop::collection::vec((0u64..64, 1u64..16, 0usize..5), 0..12).prop_map(|list| {
        list.into_iter()
            .enumerate()
            .map(|(n, (base, size, ty))| MemoryRange {
                base: base * PAGE,
                size: size * PAGE,
                ty: CachingType::ALL[ty],
                owner: OwnerId::new(n as u64),
            })
            .collect()
    })
}

/// Strictest type among the `ranges` that cover `address`.
fn requested_type_at(ranges: &[MemoryRange], address: u64) -> Option<CachingType> {
    ranges
        .iter()
        .filter(|r| r.intersects(address, address + 1))
        .map(|r| r.ty)
        .min()
}

fn effective_type_at(ranges: &[EffectiveRange], address: u64) -> Option<CachingType> {
    let mut covering = ranges.iter().filter(|r| r.contains(address));
    let ty = covering.next().map(|r| r.ty);
    assert!(covering.next().is_none());
    ty
}

fn assert_sorted_disjoint(ranges: &[EffectiveRange]) {
    for range in ranges {
        assert!(range.size > 0);
    }
    for pair in ranges.windows(2) {
        assert!(pair[0].end() <= pair[1].base, "{:?}", pair);
    }
}

proptest! {
    #[test]
    fn resolved_ranges_match_requests(ranges in ranges_strategy()) {
        let effective = resolve::resolve(&ranges);
        assert_sorted_disjoint(&effective);

        for pair in effective.windows(2) {
            prop_assert!(pair[0].end() != pair[1].base || pair[0].ty != pair[1].ty);
        }

        for page in 0..80 {
            let address = page * PAGE;
            prop_assert_eq!(
                effective_type_at(&effective, address),
                requested_type_at(&ranges, address)
            );
        }
    }

    #[test]
    fn optimized_ranges_keep_coverage(ranges in ranges_strategy()) {
        let effective = resolve::resolve(&ranges);
        let mut optimized = effective.clone();
        optimize::optimize(&mut optimized, PAGE);
        assert_sorted_disjoint(&optimized);

        for range in &effective {
            for address in (range.base..range.end()).step_by(PAGE as usize) {
                prop_assert_eq!(effective_type_at(&optimized, address), Some(range.ty));
            }
        }

        let write_back = |list: &[EffectiveRange]| {
            list.iter()
                .filter(|r| r.ty == CachingType::WriteBack)
                .copied()
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(write_back(&optimized[..]), write_back(&effective[..]));

        let requested_end = ranges.iter().map(|r| r.end()).max().unwrap_or(0);
        for range in &optimized {
            prop_assert!(range.end() <= requested_end);
        }
    }

    #[test]
    fn encoded_slots_are_exact(base in 0u64..(1 << 20), size in 1u64..(1 << 12)) {
        let base = base * PAGE;
        let size = size * PAGE;

        let mut remaining = 128;
        let mut slots = encode::encode_range(
            base,
            size,
            CachingType::WriteCombining,
            PAGE,
            &mut remaining,
        )
        .unwrap()
        .into_vec();
        prop_assert!(slots.len() <= 2 * 32);
        prop_assert_eq!(remaining, 128 - slots.len());

        slots.sort_by_key(|s| s.base);
        let mut next = base;
        for slot in &slots {
            prop_assert!(slot.size.is_power_of_two());
            prop_assert_eq!(slot.base % slot.size, 0);
            prop_assert_eq!(slot.base, next);
            next = slot.end();
        }
        prop_assert_eq!(next, base + size);
    }

    #[test]
    fn committed_slots_fit(ranges in ranges_strategy(), capacity in 0usize..8) {
        let (mut sink, committed) = common::RecordingSink::new(capacity);
        let limits = HardwareLimits::query(&sink);
        let config = Config::new();

        let result = commit::commit(
            &ranges,
            &config,
            &limits,
            &mut CommitScratch::default(),
            &mut sink,
        );

        let report = match result {
            Ok(report) => report,
            Err(_) => return Ok(()),
        };
        prop_assert!(report.attempts <= config.max_retries());

        let slots = committed.lock().clone();
        prop_assert_eq!(slots.len(), report.slots);
        prop_assert!(slots.len() <= capacity);

        let requested_end = ranges.iter().map(|r| r.end()).max().unwrap_or(0);
        for slot in &slots {
            prop_assert!(slot.end() <= requested_end, "{:?}", slot);
        }

        for page in 0..96 {
            let address = page * PAGE;
            let applied = common::hardware_type_at(&slots, address);
            match requested_type_at(&ranges, address) {
                Some(CachingType::WriteBack) => prop_assert_eq!(applied, None),
                Some(CachingType::Uncached) if report.is_degraded() => {}
                Some(ty) => prop_assert_eq!(applied, Some(ty)),
                None if address >= requested_end => prop_assert_eq!(applied, None),
                None => {}
            }
        }
    }
}
