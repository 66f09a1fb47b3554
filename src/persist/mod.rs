//! Versioned node engine
//!
//! Node-copying partial persistence for pointer structures whose nodes have
//! at most `p` incoming pointers per pointer tag. Only the latest version is
//! written; every earlier version stays readable.
//!
//! This module provides:
//! - `Version` - Totally ordered logical time
//! - `Clock` - Per-structure version assignment
//! - `Schema` - Declared data and pointer tags, and `p`
//! - `VersionedNode` - Baseline, bounded log, reverse edges
//! - `Visibility` - The version-scoped read rule
//! - `NodeArena` - Node ownership, the write path and splits
//!
//! The engine knows nothing about the topology of the structure built on
//! it. Clients keep reverse edges consistent through `set_back` for every
//! pointer they write; splits keep them consistent for the rewrites they
//! issue.

mod arena;
mod clock;
mod errors;
mod node;
pub mod schema;
mod version;
mod visibility;

pub use arena::{NodeArena, Replacement, WriteReport};
pub use clock::Clock;
pub use errors::{PersistError, PersistResult};
pub use node::{FieldValue, Modification, NodeId, VersionedNode};
pub use schema::{Schema, TagKind};
pub use version::Version;
pub use visibility::Visibility;
