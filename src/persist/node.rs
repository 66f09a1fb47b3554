//! VersionedNode - A node with a bounded modification log
//!
//! A node holds:
//! - a baseline value for every declared tag
//! - a chronological log of edits not folded into the baseline
//! - for every pointer tag, the set of nodes currently pointing at it
//!
//! Nodes are never destroyed and never edited retroactively. The only
//! mutations are appending to the log and maintaining reverse sets, which
//! describe the current version only.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::errors::{PersistError, PersistResult};
use super::schema::{self, Schema, TagKind};
use super::{Version, Visibility};

/// Stable handle of a node inside its arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Handle for arena slot `index`. Fails once slots no longer fit `u32`.
    #[inline]
    pub(crate) fn from_index(index: usize) -> PersistResult<Self> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| PersistError::ArenaExhausted {
                limit: u64::from(u32::MAX) + 1,
            })
    }

    /// Arena slot of this node.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw handle value.
    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Value stored under a tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue<V> {
    /// Never written, or explicitly cleared.
    Absent,
    /// Payload of a data tag.
    Data(V),
    /// Reference held by a pointer tag.
    Pointer(NodeId),
}

impl<V> FieldValue<V> {
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Returns the payload of a data value.
    pub fn as_data(&self) -> Option<&V> {
        match self {
            FieldValue::Data(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the target of a pointer value.
    pub fn as_pointer(&self) -> Option<NodeId> {
        match self {
            FieldValue::Pointer(id) => Some(*id),
            _ => None,
        }
    }

    /// Kind of tag this value may be stored under. `None` fits any tag.
    pub fn kind(&self) -> Option<TagKind> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Data(_) => Some(TagKind::Data),
            FieldValue::Pointer(_) => Some(TagKind::Pointer),
        }
    }
}

impl<V> From<Option<NodeId>> for FieldValue<V> {
    fn from(target: Option<NodeId>) -> Self {
        match target {
            Some(id) => FieldValue::Pointer(id),
            None => FieldValue::Absent,
        }
    }
}

/// One logged edit. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification<T, V> {
    version: Version,
    tag: T,
    value: FieldValue<V>,
}

impl<T, V> Modification<T, V> {
    pub fn new(version: Version, tag: T, value: FieldValue<V>) -> Self {
        Self {
            version,
            tag,
            value,
        }
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn tag(&self) -> &T {
        &self.tag
    }

    #[inline]
    pub fn value(&self) -> &FieldValue<V> {
        &self.value
    }
}

/// A partially persistent node.
pub struct VersionedNode<S: Schema> {
    /// Baseline value per declared tag.
    fields: HashMap<S::Tag, FieldValue<S::Value>>,
    /// Edits since the baseline, chronological.
    log: Vec<Modification<S::Tag, S::Value>>,
    /// Current referencers per pointer tag.
    reverse: HashMap<S::Tag, BTreeSet<NodeId>>,
    /// Version at which this node came into existence.
    origin: Version,
    /// Set once a split has copied this node. Replaced nodes are read-only.
    replaced_by: Option<NodeId>,
}

impl<S: Schema> VersionedNode<S> {
    /// Create a node with every tag absent and no referencers.
    pub(crate) fn new(origin: Version) -> Self {
        Self {
            fields: schema::all_tags::<S>()
                .map(|tag| (tag, FieldValue::Absent))
                .collect(),
            log: Vec::new(),
            reverse: S::POINTER_TAGS
                .iter()
                .map(|tag| (*tag, BTreeSet::new()))
                .collect(),
            origin,
            replaced_by: None,
        }
    }

    /// Value of `tag` visible at version `at`.
    pub fn read(&self, tag: S::Tag, at: Version) -> PersistResult<&FieldValue<S::Value>> {
        let baseline = self
            .fields
            .get(&tag)
            .ok_or_else(|| PersistError::UnknownField {
                tag: schema::tag_name(tag),
            })?;
        Ok(Visibility::visible(baseline, &self.log, &tag, at))
    }

    /// Baseline value of `tag`, ignoring the log.
    pub fn baseline(&self, tag: S::Tag) -> Option<&FieldValue<S::Value>> {
        self.fields.get(&tag)
    }

    /// Logged edits, chronological.
    pub fn log(&self) -> &[Modification<S::Tag, S::Value>] {
        &self.log
    }

    #[inline]
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    #[inline]
    pub fn origin(&self) -> Version {
        self.origin
    }

    /// The copy that took over from this node, if it was split.
    #[inline]
    pub fn replaced_by(&self) -> Option<NodeId> {
        self.replaced_by
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.replaced_by.is_none()
    }

    pub(crate) fn mark_replaced(&mut self, successor: NodeId) {
        self.replaced_by = Some(successor);
    }

    /// Current referencers through `tag`, in handle order.
    pub fn reverse(&self, tag: S::Tag) -> PersistResult<&BTreeSet<NodeId>> {
        schema::expect_kind::<S>(tag, TagKind::Pointer)?;
        self.reverse
            .get(&tag)
            .ok_or_else(|| PersistError::InvalidPointerField {
                tag: schema::tag_name(tag),
            })
    }

    /// True while the log can take another entry (`len <= 2p`).
    #[inline]
    pub(crate) fn has_capacity(&self) -> bool {
        self.log.len() < schema::log_capacity::<S>()
    }

    /// Append an edit. Capacity is the caller's concern.
    pub(crate) fn record(&mut self, now: Version, tag: S::Tag, value: FieldValue<S::Value>) {
        self.log.push(Modification::new(now, tag, value));
    }

    /// Build the replacement for this node: baseline and log folded, then
    /// `tag = value` applied directly, reverse sets copied.
    pub(crate) fn folded(&self, now: Version, tag: S::Tag, value: FieldValue<S::Value>) -> Self {
        let mut fields = self.fields.clone();
        for entry in &self.log {
            fields.insert(entry.tag, entry.value.clone());
        }
        fields.insert(tag, value);

        Self {
            fields,
            log: Vec::new(),
            reverse: self.reverse.clone(),
            origin: now,
            replaced_by: None,
        }
    }

    /// Non-absent baseline pointers, one per pointer tag.
    pub(crate) fn baseline_pointers(&self) -> Vec<(S::Tag, NodeId)> {
        S::POINTER_TAGS
            .iter()
            .filter_map(|tag| {
                self.fields
                    .get(tag)
                    .and_then(FieldValue::as_pointer)
                    .map(|target| (*tag, target))
            })
            .collect()
    }

    /// Add `new` to the referencers of `tag`, removing `old` first.
    ///
    /// Fails without mutating if the set would exceed `p`.
    pub(crate) fn set_back(
        &mut self,
        tag: S::Tag,
        new: NodeId,
        old: Option<NodeId>,
    ) -> PersistResult<()> {
        self.check_set_back(tag, new, old)?;
        let set = self.reverse.entry(tag).or_default();
        if let Some(old) = old {
            set.remove(&old);
        }
        set.insert(new);
        Ok(())
    }

    /// Whether `set_back(tag, new, old)` would succeed. Mutates nothing.
    pub(crate) fn check_set_back(
        &self,
        tag: S::Tag,
        new: NodeId,
        old: Option<NodeId>,
    ) -> PersistResult<()> {
        schema::expect_kind::<S>(tag, TagKind::Pointer)?;
        let (len, has_old, has_new) = match self.reverse.get(&tag) {
            Some(set) => (
                set.len(),
                old.is_some_and(|old| old != new && set.contains(&old)),
                set.contains(&new),
            ),
            None => (0, false, false),
        };

        let resulting = len + usize::from(!has_new) - usize::from(has_old);
        if resulting > S::MAX_IN_DEGREE {
            return Err(PersistError::InDegreeExceeded {
                tag: schema::tag_name(tag),
                limit: S::MAX_IN_DEGREE,
            });
        }
        Ok(())
    }

    /// Remove `referencer` from `tag`. Returns whether it was present.
    pub(crate) fn unset_back(&mut self, tag: S::Tag, referencer: NodeId) -> PersistResult<bool> {
        schema::expect_kind::<S>(tag, TagKind::Pointer)?;
        Ok(self
            .reverse
            .get_mut(&tag)
            .is_some_and(|set| set.remove(&referencer)))
    }
}

impl<S: Schema> fmt::Debug for VersionedNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedNode")
            .field("origin", &self.origin)
            .field("fields", &self.fields)
            .field("log", &self.log)
            .field("reverse", &self.reverse)
            .field("replaced_by", &self.replaced_by)
            .finish()
    }
}
