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

//! Memory type range registers (MTRRs) allocation.
//!
//! The CPU needs to know, for each range of physical memory, how memory accesses in that range
//! interact with the cache. See the [`caching`] module for the list of possible policies.
//!
//! The hardware exposes this through a small, fixed number of *variable range registers*. Each
//! register designates a range whose size is a power of two and whose base is aligned on that
//! size. Everywhere no register applies, the default type (write-back) is used.
//!
//! Drivers and the rest of the kernel, on the other hand, want to assign caching attributes to
//! arbitrary byte ranges, at arbitrary times, and these requests can overlap. The
//! [`RangeRegistry`] stores these requests and, after every modification, turns them into a list
//! of registers:
//!
//! - [`resolve`] turns the list of requests into a list of non-overlapping ranges, picking the
//! strictest type where requests overlap.
//! - [`optimize`] grows these ranges towards well-aligned boundaries, so that they can be
//! represented with fewer registers.
//! - [`encode`] splits every range into power-of-two-sized registers.
//! - [`commit`] drives the three steps above and, if the registers don't fit, progressively
//! ignores small uncached ranges until they do.
//!
//! The resulting list is then handed to a [`HardwareRegisterSink`], which is responsible for
//! actually writing the registers on all the processors.
//!
//! > **Note**: Ignoring an uncached range is fine as long as the page tables also mark the
//! >           pages as uncached, which is expected to be the case.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod caching;
pub mod commit;
pub mod encode;
pub mod optimize;
pub mod range;
pub mod resolve;
pub mod sink;

mod config;
mod error;
mod registry;

pub use caching::CachingType;
pub use commit::{CommitReport, HardwareLimits};
pub use config::Config;
pub use error::{AddError, CommitError, InvalidRangeReason, OutOfSlots};
pub use range::{EffectiveRange, HardwareSlot, MemoryRange, OwnerId};
pub use registry::{ConflictPolicy, RangeRegistry};
pub use sink::{HardwareRegisterSink, SinkRejected};
