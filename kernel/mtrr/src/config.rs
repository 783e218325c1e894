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

/// Tweaks for the [`RangeRegistry`](crate::RangeRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    granularity: u64,
    max_retries: u32,
    conflicts_are_fatal: bool,
}

impl Config {
    /// Returns the default configuration.
    ///
    /// Conflicts are fatal if and only if debug assertions are enabled.
    pub const fn new() -> Self {
        Config {
            granularity: 0x1000,
            max_retries: 100,
            conflicts_are_fatal: cfg!(debug_assertions),
        }
    }

    /// Sets the size of the smallest block a register can describe. Defaults to 4kiB.
    ///
    /// # Panic
    ///
    /// Panics if `granularity` isn't a power of two.
    pub const fn with_granularity(mut self, granularity: u64) -> Self {
        assert!(granularity.is_power_of_two());
        self.granularity = granularity;
        self
    }

    /// Sets the maximum number of times a commit is attempted before giving up. Defaults to 100.
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// If true, a conflict between two ranges panics instead of returning an error. A conflict
    /// always indicates a bug in the caller.
    pub const fn with_conflicts_fatal(mut self, fatal: bool) -> Self {
        self.conflicts_are_fatal = fatal;
        self
    }

    /// Size of the smallest block a register can describe.
    pub const fn granularity(&self) -> u64 {
        self.granularity
    }

    /// Maximum number of commit attempts.
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True if conflicts panic.
    pub const fn conflicts_are_fatal(&self) -> bool {
        self.conflicts_are_fatal
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
