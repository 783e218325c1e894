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

//! Access to the actual registers.

use crate::range::HardwareSlot;

/// Destination of the registers computed by the [`RangeRegistry`](crate::RangeRegistry).
///
/// Implementations are expected to perform the update on all processors at once, as described
/// in the Intel manuals (disable the caches, flush, write the registers, re-enable). Processors
/// must never run with a mix of an old and a new list.
pub trait HardwareRegisterSink {
    /// Number of variable range registers supported by the processor.
    ///
    /// Only queried once, when the [`RangeRegistry`](crate::RangeRegistry) is created.
    fn capacity(&self) -> usize;

    /// Number of bits of physical address supported by the processor. Defaults to 36.
    ///
    /// Only queried once, when the [`RangeRegistry`](crate::RangeRegistry) is created.
    fn physical_address_bits(&self) -> u32 {
        36
    }

    /// Replaces the content of all the variable range registers. Registers beyond the length of
    /// `slots` must be disabled.
    ///
    /// `slots.len()` is never superior to [`HardwareRegisterSink::capacity`].
    fn commit(&mut self, slots: &[HardwareSlot]) -> Result<(), SinkRejected>;
}

/// Error returned by [`HardwareRegisterSink::commit`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
#[display("hardware refused the register list")]
pub struct SinkRejected;
