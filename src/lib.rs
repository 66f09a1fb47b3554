//! timelink - Partially persistent pointer structures
//!
//! Node copying (Driscoll, Sarnak, Sleator, Tarjan): only the latest version
//! of a structure is mutable, every past version stays queryable, at O(1)
//! amortized extra time and space per update as long as every node has a
//! bounded number of incoming pointers.
//!
//! - `persist` - the versioned node engine
//! - `list` - a singly linked list built on it
//! - `observability` - structured logging and counters

pub mod list;
pub mod observability;
pub mod persist;
