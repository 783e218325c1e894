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

//! Computing the registers and handing them to the hardware.
//!
//! The registers available are very limited (usually 8 or 10), and a list of ranges doesn't
//! necessarily fit. When that happens, we start ignoring the smallest uncached ranges, then the
//! next smallest, and so on, until the list fits or there is no uncached range left to ignore.
//! Uncached memory is also marked as such in the page tables, so ignoring an uncached range
//! only costs performance.

use crate::{
    caching::CachingType,
    config::Config,
    encode,
    error::CommitError,
    optimize,
    range::{EffectiveRange, HardwareSlot, MemoryRange},
    resolve::{self, ResolveScratch},
    sink::HardwareRegisterSink,
};

use alloc::vec::Vec;

/// What the hardware can do. Queried once from the [`HardwareRegisterSink`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HardwareLimits {
    /// Number of variable range registers.
    pub capacity: usize,
    /// One past the highest physical address supported by the processor.
    pub address_limit: u64,
}

impl HardwareLimits {
    /// Queries the limits from `sink`.
    pub fn query(sink: &(impl HardwareRegisterSink + ?Sized)) -> Self {
        let bits = sink.physical_address_bits();
        HardwareLimits {
            capacity: sink.capacity(),
            address_limit: if bits >= 64 {
                u64::max_value()
            } else {
                1 << bits
            },
        }
    }
}

/// Buffers reused between calls to [`commit`].
#[derive(Debug, Default)]
pub struct CommitScratch {
    resolve: ResolveScratch,
    effective: Vec<EffectiveRange>,
    slots: Vec<HardwareSlot>,
}

impl CommitScratch {
    /// Registers passed to the hardware by the latest successful [`commit`].
    pub fn slots(&self) -> &[HardwareSlot] {
        &self.slots
    }
}

/// Information about a successful [`commit`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Number of registers in use.
    pub slots: usize,
    /// Number of attempts needed. `1` if nothing had to be ignored.
    pub attempts: u32,
    /// Uncached ranges whose size is inferior or equal to this value have been ignored. `0` if
    /// nothing was ignored.
    pub ignored_uncached_up_to: u64,
}

impl CommitReport {
    /// Returns true if some uncached ranges had to be ignored.
    pub fn is_degraded(&self) -> bool {
        self.ignored_uncached_up_to != 0
    }
}

/// Computes the registers corresponding to `ranges` and passes them to `sink`.
///
/// Nothing is passed to `sink` if an error is returned.
pub fn commit<TSink>(
    ranges: &[MemoryRange],
    config: &Config,
    limits: &HardwareLimits,
    scratch: &mut CommitScratch,
    sink: &mut TSink,
) -> Result<CommitReport, CommitError>
where
    TSink: HardwareRegisterSink + ?Sized,
{
    let mut ignore_threshold = 0;

    for attempt in 1..=config.max_retries() {
        resolve::resolve_into(ranges, &mut scratch.resolve, &mut scratch.effective);

        let shortest_uncached = scratch
            .effective
            .iter()
            .filter(|r| r.ty == CachingType::Uncached && r.size > ignore_threshold)
            .map(|r| r.size)
            .min();
        scratch
            .effective
            .retain(|r| r.ty != CachingType::Uncached || r.size > ignore_threshold);

        optimize::optimize(&mut scratch.effective, config.granularity());

        match encode::encode_all_into(
            &scratch.effective,
            config.granularity(),
            limits.capacity,
            &mut scratch.slots,
        ) {
            Ok(()) => {
                if sink.commit(&scratch.slots).is_err() {
                    log::error!(
                        "hardware refused {} memory type range registers",
                        scratch.slots.len()
                    );
                    return Err(CommitError::Hardware);
                }

                if ignore_threshold != 0 {
                    log::warn!(
                        "ignoring uncached ranges of {:#x} bytes or less to fit in {} registers",
                        ignore_threshold,
                        limits.capacity
                    );
                }
                log::debug!(
                    "committed {} memory type range registers out of {}",
                    scratch.slots.len(),
                    limits.capacity
                );

                return Ok(CommitReport {
                    slots: scratch.slots.len(),
                    attempts: attempt,
                    ignored_uncached_up_to: ignore_threshold,
                });
            }
            Err(_) => {
                log::trace!(
                    "attempt #{}: {} ranges don't fit in {} registers",
                    attempt,
                    scratch.effective.len(),
                    limits.capacity
                );

                match shortest_uncached {
                    Some(size) => {
                        debug_assert!(size > ignore_threshold);
                        ignore_threshold = size;
                    }
                    None => return Err(CommitError::OutOfSlots),
                }
            }
        }
    }

    Err(CommitError::OutOfSlots)
}
