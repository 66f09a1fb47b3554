//! Visibility - Version-scoped field resolution
//!
//! ## Visibility Rule
//!
//! Given:
//! - a node baseline value `B` for tag `T`
//! - a node log `M₀ … Mₙ` in chronological order
//! - a read version `v`
//!
//! The visible value is:
//! 1. Consider only entries with `M.version ≤ v` and `M.tag = T`
//! 2. From those, select the LAST one in log order
//! 3. If none exists, the value is `B`
//!
//! Entries of equal version are ordered by the log itself: a later write in
//! the same operation wins.

use super::{FieldValue, Modification, Version};

/// Stateless visibility resolver.
pub struct Visibility;

impl Visibility {
    /// Resolve the value of `tag` at version `at`.
    ///
    /// The log is chronological, so traversal stops at the first entry
    /// stamped after `at`.
    pub fn visible<'a, T: PartialEq, V>(
        baseline: &'a FieldValue<V>,
        log: &'a [Modification<T, V>],
        tag: &T,
        at: Version,
    ) -> &'a FieldValue<V> {
        let mut visible = baseline;
        for entry in log {
            if entry.version() > at {
                break;
            }
            if entry.tag() == tag {
                visible = entry.value();
            }
        }
        visible
    }
}
