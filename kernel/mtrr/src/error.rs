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

use crate::{caching::CachingType, range::OwnerId};

/// Error returned by [`RangeRegistry::add`](crate::RangeRegistry::add).
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
pub enum AddError {
    /// The range passed as parameter is invalid. The registry hasn't been touched.
    #[display("invalid range: {_0}")]
    InvalidRange(InvalidRangeReason),
    /// The range overlaps a range of another owner with an incompatible type.
    #[display("range overlaps a {existing_type} range of {existing_owner}")]
    Conflict {
        /// Owner of the range that is in the way.
        existing_owner: OwnerId,
        /// Type of the range that is in the way.
        existing_type: CachingType,
    },
    /// The registry would need more registers than the hardware has.
    #[display("not enough memory type range registers")]
    OutOfSlots,
    /// The hardware refused the list of registers.
    #[display("hardware refused the memory type range registers")]
    Hardware,
}

/// Why a range is invalid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
pub enum InvalidRangeReason {
    /// The size is 0.
    #[display("range is empty")]
    Empty,
    /// `base + size` doesn't fit in the address space.
    #[display("range overflows the address space")]
    Overflow,
    /// The owner already has a range with a different base or size. Only
    /// [`OwnerId::STATIC`] can have more than one range.
    #[display("owner already has a different range")]
    OwnerHasOtherRange,
}

/// Error while committing the registry to the hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CommitError {
    /// Even after ignoring all the uncached ranges we could, the ranges don't fit.
    #[display("not enough memory type range registers")]
    OutOfSlots,
    /// The hardware refused the list of registers.
    #[display("hardware refused the memory type range registers")]
    Hardware,
}

impl From<CommitError> for AddError {
    fn from(err: CommitError) -> AddError {
        match err {
            CommitError::OutOfSlots => AddError::OutOfSlots,
            CommitError::Hardware => AddError::Hardware,
        }
    }
}

/// Not enough registers left to encode a range.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
#[display("out of memory type range registers")]
pub struct OutOfSlots;
