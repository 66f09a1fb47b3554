//! Clock - Version assignment for one structure
//!
//! - Versions are assigned exactly once
//! - Pre-increment semantics: the caller receives the current value, then the
//!   counter advances
//! - One clock per structure, never ambient global state
//!
//! The clock tracks the next version to hand out and, from that, the latest
//! version already issued.

use super::Version;

/// Monotonic version source owned by a structure.
#[derive(Debug, Clone)]
pub struct Clock {
    /// The version the next call to `tick` returns.
    next: u64,
}

impl Clock {
    /// Create a clock whose first issued version is zero.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Create a clock whose first issued version is `first`.
    ///
    /// Used to inject a known starting point in tests.
    pub fn starting_at(first: Version) -> Self {
        Self {
            next: first.value(),
        }
    }

    /// Issue a fresh version and advance.
    pub fn tick(&mut self) -> Version {
        let issued = Version::new(self.next);
        self.next += 1;
        issued
    }

    /// The version the next `tick` will issue, without consuming it.
    pub fn peek(&self) -> Version {
        Version::new(self.next)
    }

    /// The most recently issued version, if any.
    pub fn latest(&self) -> Option<Version> {
        self.next.checked_sub(1).map(Version::new)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
