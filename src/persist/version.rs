//! Version - Totally ordered logical time
//!
//! - Totally orders all mutating operations of one structure
//! - Independent of wall-clock time
//! - No two operations share the same version
//!
//! This is a PURE TYPE with NO behavior beyond construction and access.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A totally ordered, opaque version stamp.
///
/// Every edit recorded in a node log carries the version of the operation
/// that made it. Reads are scoped by version: a read at `v` observes exactly
/// the edits stamped `<= v`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The first version a fresh clock issues.
    pub const ZERO: Version = Version(0);

    /// Creates a version with the given value.
    ///
    /// No Default implementation exists to prevent accidental construction.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
