//! Partially persistent linked list
//!
//! The one client of the versioned node engine: a singly linked list where
//! element 0 is the root node and every further element is reached through
//! the `Next` pointer of its predecessor.
//!
//! ```
//! use timelink::list::{ListConfig, PersistentList};
//!
//! let mut list = PersistentList::with_root(1, ListConfig::default()).unwrap();
//! list.append(2).unwrap();
//! let before = list.latest_version().unwrap();
//! list.modify_at(1, 20).unwrap();
//!
//! assert_eq!(list.render_current().unwrap(), "1->20->END");
//! assert_eq!(list.render_at(before).unwrap(), "1->2->END");
//! ```

mod config;
mod persistent_list;
mod render;

pub use config::{ListConfig, PastEndPolicy};
pub use persistent_list::{ListSchema, ListTag, PersistentList};
pub use render::{render_values, ListSnapshot, SEPARATOR, TERMINATOR};
