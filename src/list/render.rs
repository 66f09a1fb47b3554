//! Textual rendering and snapshots
//!
//! A rendering is every element's value followed by `->`, then `END`:
//! `1->2->3->END`. An empty traversal cannot occur because the root always
//! exists.

use std::fmt::{Display, Write};

use serde::Serialize;

use crate::persist::{PersistResult, Version};

/// Separator between consecutive elements.
pub const SEPARATOR: &str = "->";
/// Marker terminating every rendering.
pub const TERMINATOR: &str = "END";

/// Render element values in list order.
pub fn render_values<'a, V, I>(values: I, absent_marker: &str) -> String
where
    V: Display + 'a,
    I: IntoIterator<Item = Option<&'a V>>,
{
    let mut out = String::new();
    for value in values {
        match value {
            // writing into a String cannot fail
            Some(v) => {
                let _ = write!(out, "{}", v);
            }
            None => out.push_str(absent_marker),
        }
        out.push_str(SEPARATOR);
    }
    out.push_str(TERMINATOR);
    out
}

/// The list as seen at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSnapshot<V> {
    /// Version the list was read at.
    pub version: Version,
    /// Element values from the root on; `None` for never-written values.
    pub values: Vec<Option<V>>,
}

impl<V> ListSnapshot<V> {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<V: Display> ListSnapshot<V> {
    pub fn render(&self, absent_marker: &str) -> String {
        render_values(self.values.iter().map(Option::as_ref), absent_marker)
    }
}

impl<V: Serialize> ListSnapshot<V> {
    /// `{"version":N,"values":[...]}`
    pub fn to_json(&self) -> PersistResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
