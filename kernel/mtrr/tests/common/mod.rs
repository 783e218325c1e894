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

#![allow(dead_code)]

use redshirt_mtrr::{
    CachingType, Config, HardwareRegisterSink, HardwareSlot, RangeRegistry, SinkRejected,
};
use spinning_top::Spinlock;
use std::sync::Arc;

/// Sink that remembers the latest list of registers.
pub struct RecordingSink {
    capacity: usize,
    committed: Arc<Spinlock<Vec<HardwareSlot>>>,
}

impl RecordingSink {
    pub fn new(capacity: usize) -> (Self, Arc<Spinlock<Vec<HardwareSlot>>>) {
        let committed = Arc::new(Spinlock::new(Vec::new()));
        let sink = RecordingSink {
            capacity,
            committed: committed.clone(),
        };
        (sink, committed)
    }
}

impl HardwareRegisterSink for RecordingSink {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn commit(&mut self, slots: &[HardwareSlot]) -> Result<(), SinkRejected> {
        assert!(slots.len() <= self.capacity);
        for slot in slots {
            assert!(slot.size.is_power_of_two());
            assert_eq!(slot.base % slot.size, 0);
        }

        *self.committed.lock() = slots.to_vec();
        Ok(())
    }
}

pub fn registry(
    capacity: usize,
) -> (
    RangeRegistry<RecordingSink>,
    Arc<Spinlock<Vec<HardwareSlot>>>,
) {
    let (sink, committed) = RecordingSink::new(capacity);
    let config = Config::new().with_conflicts_fatal(false);
    (RangeRegistry::new(sink, config), committed)
}

/// Type that the hardware applies to `address` given `slots`, following the rules for
/// overlapping registers. `None` means the default type.
pub fn hardware_type_at(slots: &[HardwareSlot], address: u64) -> Option<CachingType> {
    slots
        .iter()
        .filter(|s| s.contains(address))
        .map(|s| s.ty)
        .min()
}
