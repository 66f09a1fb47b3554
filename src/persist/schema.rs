//! Schema - Declared field tags of a versioned node
//!
//! A schema fixes, at compile time:
//! - the data tags (hold opaque values)
//! - the pointer tags (hold non-owning node references)
//! - `p`, the maximum live in-degree of any node through one pointer tag
//!
//! Tags are a closed enum, so a free-form key can never reach the engine. The
//! remaining checks (a tag variant the schema forgot to declare, a data tag
//! used as a pointer) are performed once when an arena is built and on every
//! engine call.

use std::fmt::Debug;
use std::hash::Hash;

use super::errors::{PersistError, PersistResult};

/// Kind of a declared field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Data,
    Pointer,
}

/// Field layout of a node type.
pub trait Schema: 'static {
    /// Field tag enumeration.
    type Tag: Copy + Eq + Hash + Debug + 'static;
    /// Payload stored under data tags.
    type Value: Clone + Debug;

    /// Maximum live incoming references per node and pointer tag (`p`).
    const MAX_IN_DEGREE: usize;
    /// Tags holding opaque values.
    const DATA_TAGS: &'static [Self::Tag];
    /// Tags holding node references.
    const POINTER_TAGS: &'static [Self::Tag];
}

/// Returns the declared kind of `tag`, or `None` if undeclared.
pub fn kind_of<S: Schema>(tag: S::Tag) -> Option<TagKind> {
    if S::DATA_TAGS.contains(&tag) {
        Some(TagKind::Data)
    } else if S::POINTER_TAGS.contains(&tag) {
        Some(TagKind::Pointer)
    } else {
        None
    }
}

/// Human-readable tag name for errors and logs.
pub fn tag_name<T: Debug>(tag: T) -> String {
    format!("{:?}", tag)
}

/// Log capacity of every node: `2p + 1` entries.
pub fn log_capacity<S: Schema>() -> usize {
    2 * S::MAX_IN_DEGREE + 1
}

/// All declared tags, data tags first.
pub fn all_tags<S: Schema>() -> impl Iterator<Item = S::Tag> {
    S::DATA_TAGS.iter().chain(S::POINTER_TAGS.iter()).copied()
}

/// Validate a schema.
///
/// Rejects `p = 0`, an empty tag set, and any tag declared twice.
pub fn validate<S: Schema>() -> PersistResult<()> {
    if S::MAX_IN_DEGREE == 0 {
        return Err(PersistError::schema("in-degree limit must be at least 1"));
    }
    if S::DATA_TAGS.is_empty() && S::POINTER_TAGS.is_empty() {
        return Err(PersistError::schema("schema declares no tags"));
    }

    let tags: Vec<S::Tag> = all_tags::<S>().collect();
    for (i, tag) in tags.iter().enumerate() {
        if tags[i + 1..].contains(tag) {
            return Err(PersistError::schema(format!(
                "tag {} declared more than once",
                tag_name(tag)
            )));
        }
    }
    Ok(())
}

/// Check that `tag` is declared with the expected kind.
pub(crate) fn expect_kind<S: Schema>(tag: S::Tag, expected: TagKind) -> PersistResult<()> {
    match kind_of::<S>(tag) {
        None => Err(PersistError::UnknownField {
            tag: tag_name(tag),
        }),
        Some(kind) if kind == expected => Ok(()),
        Some(_) => Err(match expected {
            TagKind::Pointer => PersistError::InvalidPointerField {
                tag: tag_name(tag),
            },
            TagKind::Data => PersistError::InvalidDataField {
                tag: tag_name(tag),
            },
        }),
    }
}
