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

//! Storage of the ranges requested by the rest of the kernel.

use crate::{
    caching::CachingType,
    commit::{self, CommitReport, CommitScratch, HardwareLimits},
    config::Config,
    error::{AddError, CommitError, InvalidRangeReason},
    range::{EffectiveRange, HardwareSlot, MemoryRange, OwnerId},
    resolve,
    sink::HardwareRegisterSink,
};

use alloc::vec::Vec;
use core::fmt;
use spinning_top::Spinlock;


/// What to do when a new range overlaps a range of another owner with an incompatible type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail with [`AddError::Conflict`].
    Reject,
    /// Don't add anything, and return the type of the existing range instead. The caller is
    /// expected to use that type for its own mappings.
    AdoptExisting,
}

/// Collection of all the caching types requested by the rest of the kernel.
///
/// Every modification recomputes the list of registers from scratch and passes it to the
/// [`HardwareRegisterSink`]. A modification that can't be committed is reverted.
pub struct RangeRegistry<TSink> {
    config: Config,
    limits: HardwareLimits,
    inner: Spinlock<Inner<TSink>>,
}

struct Inner<TSink> {
    /// Sorted by base address.
    ranges: Vec<MemoryRange>,
    scratch: CommitScratch,
    /// Registers that the sink currently holds.
    committed: Vec<HardwareSlot>,
    last_report: Option<CommitReport>,
    sink: TSink,
}

/// How to revert a modification of [`Inner::ranges`].
enum Undo {
    Nothing,
    Retype { index: usize, previous: CachingType },
    Insert { index: usize },
}

impl<TSink> RangeRegistry<TSink>
where
    TSink: HardwareRegisterSink,
{
    /// Initializes an empty registry. Nothing is committed to the sink until the first
    /// modification.
    pub fn new(sink: TSink, config: Config) -> Self {
        let limits = HardwareLimits::query(&sink);
        log::debug!(
            "{} memory type range registers available, {:#x} bytes of physical memory",
            limits.capacity,
            limits.address_limit
        );

        RangeRegistry {
            config,
            limits,
            inner: Spinlock::new(Inner {
                ranges: Vec::new(),
                scratch: CommitScratch::default(),
                committed: Vec::new(),
                last_report: None,
                sink,
            }),
        }
    }

    /// Requests `[base, base + size)` to use the caching type `ty` on behalf of `owner`.
    ///
    /// If `owner` already has a range with this exact base and size, its type is updated. If it
    /// has a range with a different base or size, an error is returned. [`OwnerId::STATIC`] is
    /// the only owner allowed to have multiple ranges.
    ///
    /// Write-back ranges, and ranges owned by [`OwnerId::STATIC`], can be overridden by the
    /// ranges of other owners. Any other overlap between ranges of different types and
    /// different owners is a conflict, handled according to `policy`. When adopting the
    /// existing type, `Ok(Some(existing_type))` is returned and nothing is added.
    ///
    /// On error, the registry is left exactly as it was before the call.
    ///
    /// # Panic
    ///
    /// Panics in case of conflict if [`Config::with_conflicts_fatal`] has been set.
    pub fn add(
        &self,
        owner: OwnerId,
        base: u64,
        size: u64,
        ty: CachingType,
        policy: ConflictPolicy,
    ) -> Result<Option<CachingType>, AddError> {
        let end = validate(base, size)?;

        let mut inner = self.inner.lock();

        if owner != OwnerId::STATIC
            && inner
                .ranges
                .iter()
                .any(|r| r.owner == owner && (r.base != base || r.size != size))
        {
            log::warn!(
                "{} requested [{:#x}, {:#x}) but already has another range",
                owner,
                base,
                end
            );
            return Err(AddError::InvalidRange(InvalidRangeReason::OwnerHasOtherRange));
        }

        if let Some(existing) = find_conflict(&inner.ranges, owner, base, end, ty) {
            let existing = *existing;
            match policy {
                ConflictPolicy::AdoptExisting => {
                    log::debug!(
                        "{} adopts type {} of {} for [{:#x}, {:#x})",
                        owner,
                        existing.ty,
                        existing.owner,
                        base,
                        end
                    );
                    return Ok(Some(existing.ty));
                }
                ConflictPolicy::Reject => {
                    return Err(self.conflict(owner, base, end, ty, &existing));
                }
            }
        }

        let same_range = inner
            .ranges
            .iter()
            .position(|r| r.owner == owner && r.base == base && r.size == size);
        let undo = match same_range {
            Some(index) if inner.ranges[index].ty == ty => Undo::Nothing,
            Some(index) => {
                let previous = inner.ranges[index].ty;
                inner.ranges[index].ty = ty;
                Undo::Retype { index, previous }
            }
            None => {
                let index = inner.ranges.partition_point(|r| r.base <= base);
                inner.ranges.insert(
                    index,
                    MemoryRange {
                        base,
                        size,
                        ty,
                        owner,
                    },
                );
                Undo::Insert { index }
            }
        };

        match inner.commit(&self.config, &self.limits) {
            Ok(_) => Ok(None),
            Err(err) => {
                log::warn!(
                    "can't set [{:#x}, {:#x}) to {} for {}: {}",
                    base,
                    end,
                    ty,
                    owner,
                    err
                );
                match undo {
                    Undo::Nothing => {}
                    Undo::Retype { index, previous } => inner.ranges[index].ty = previous,
                    Undo::Insert { index } => {
                        inner.ranges.remove(index);
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Adds multiple ranges owned by [`OwnerId::STATIC`] at once, such as the ranges of the
    /// physical memory map found at boot time, and commits once.
    ///
    /// Either all the ranges are added, or none.
    pub fn add_static_ranges(
        &self,
        ranges: impl IntoIterator<Item = (u64, u64, CachingType)>,
    ) -> Result<(), AddError> {
        let mut new_ranges = Vec::new();
        for (base, size, ty) in ranges {
            validate(base, size)?;
            new_ranges.push(MemoryRange {
                base,
                size,
                ty,
                owner: OwnerId::STATIC,
            });
        }

        let mut inner = self.inner.lock();

        for new in &new_ranges {
            if let Some(existing) =
                find_conflict(&inner.ranges, new.owner, new.base, new.end(), new.ty)
            {
                let existing = *existing;
                return Err(self.conflict(new.owner, new.base, new.end(), new.ty, &existing));
            }
        }

        let previous = inner.ranges.clone();
        for new in new_ranges {
            if inner.ranges.iter().any(|r| *r == new) {
                continue;
            }
            let index = inner.ranges.partition_point(|r| r.base <= new.base);
            inner.ranges.insert(index, new);
        }

        match inner.commit(&self.config, &self.limits) {
            Ok(_) => Ok(()),
            Err(err) => {
                log::warn!("can't add static ranges: {}", err);
                inner.ranges = previous;
                Err(err.into())
            }
        }
    }

    /// Removes all the ranges of `owner`.
    ///
    /// Removing ranges can only reduce the number of registers needed. If the commit fails
    /// anyway, the ranges are still removed and the error is logged.
    pub fn remove(&self, owner: OwnerId) {
        let mut inner = self.inner.lock();

        let count_before = inner.ranges.len();
        inner.ranges.retain(|r| r.owner != owner);
        if inner.ranges.len() == count_before {
            log::debug!("no memory type range to remove for {}", owner);
            return;
        }

        if let Err(err) = inner.commit(&self.config, &self.limits) {
            log::error!(
                "failed to update memory type range registers after removing {}: {}",
                owner,
                err
            );
        }
    }

    /// Commits the registry to the hardware again, for example after the sink has been
    /// reset.
    pub fn commit(&self) -> Result<CommitReport, CommitError> {
        self.inner.lock().commit(&self.config, &self.limits)
    }

    fn conflict(
        &self,
        owner: OwnerId,
        base: u64,
        end: u64,
        ty: CachingType,
        existing: &MemoryRange,
    ) -> AddError {
        log::warn!(
            "{} requested [{:#x}, {:#x}) as {}, but [{:#x}, {:#x}) is {} for {}",
            owner,
            base,
            end,
            ty,
            existing.base,
            existing.end(),
            existing.ty,
            existing.owner
        );

        if self.config.conflicts_are_fatal() {
            panic!(
                "memory type conflict between {} and {}",
                owner, existing.owner
            );
        }

        AddError::Conflict {
            existing_owner: existing.owner,
            existing_type: existing.ty,
        }
    }
}

impl<TSink> RangeRegistry<TSink> {
    /// Returns the configuration passed at initialization.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns what was queried from the sink at initialization.
    pub fn limits(&self) -> &HardwareLimits {
        &self.limits
    }

    /// Returns a copy of all the ranges, sorted by base address.
    pub fn ranges(&self) -> Vec<MemoryRange> {
        self.inner.lock().ranges.clone()
    }

    /// Returns the effective caching types of the registry, before any range is ignored or
    /// optimized.
    pub fn effective_ranges(&self) -> Vec<EffectiveRange> {
        resolve::resolve(&self.inner.lock().ranges)
    }

    /// Returns the registers that were passed to the sink by the latest successful commit.
    pub fn committed_slots(&self) -> Vec<HardwareSlot> {
        self.inner.lock().committed.clone()
    }

    /// Returns the report of the latest successful commit, if any.
    pub fn last_commit(&self) -> Option<CommitReport> {
        self.inner.lock().last_report
    }

    /// Prints a table of all the ranges, followed by the registers in use.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let inner = self.inner.lock();

        writeln!(
            out,
            "{:<18} {:<18} {:<18} {:<8} type",
            "base", "end", "size", "owner"
        )?;
        for range in &inner.ranges {
            writeln!(
                out,
                "{:#018x} {:#018x} {:#018x} {:<8} {}",
                range.base,
                range.end(),
                range.size,
                range.owner,
                range.ty
            )?;
        }

        writeln!(
            out,
            "{} of {} registers in use",
            inner.committed.len(),
            self.limits.capacity
        )?;
        if let Some(report) = inner.last_report.filter(|r| r.is_degraded()) {
            writeln!(
                out,
                "uncached ranges of {:#x} bytes or less are ignored",
                report.ignored_uncached_up_to
            )?;
        }
        for (n, slot) in inner.committed.iter().enumerate() {
            writeln!(
                out,
                "  #{}: {:#018x} {:#018x} {}",
                n, slot.base, slot.size, slot.ty
            )?;
        }

        Ok(())
    }
}

impl<TSink> fmt::Debug for RangeRegistry<TSink> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RangeRegistry")
            .field("ranges", &inner.ranges)
            .field("committed", &inner.committed)
            .finish()
    }
}

impl<TSink> Inner<TSink>
where
    TSink: HardwareRegisterSink,
{
    fn commit(
        &mut self,
        config: &Config,
        limits: &HardwareLimits,
    ) -> Result<CommitReport, CommitError> {
        let report = commit::commit(
            &self.ranges,
            config,
            limits,
            &mut self.scratch,
            &mut self.sink,
        )?;

        self.committed.clear();
        self.committed.extend_from_slice(self.scratch.slots());
        self.last_report = Some(report);
        Ok(report)
    }
}

/// Checks the range and returns its end.
fn validate(base: u64, size: u64) -> Result<u64, AddError> {
    if size == 0 {
        return Err(AddError::InvalidRange(InvalidRangeReason::Empty));
    }

    base.checked_add(size)
        .ok_or(AddError::InvalidRange(InvalidRangeReason::Overflow))
}

/// Finds a range that `[base, end)` of type `ty` isn't allowed to overlap.
fn find_conflict(
    ranges: &[MemoryRange],
    owner: OwnerId,
    base: u64,
    end: u64,
    ty: CachingType,
) -> Option<&MemoryRange> {
    if ty == CachingType::WriteBack {
        return None;
    }

    ranges.iter().find(|r| {
        r.owner != owner
            && r.owner != OwnerId::STATIC
            && r.ty != ty
            && r.ty != CachingType::WriteBack
            && r.intersects(base, end)
    })
}
