//! NodeArena - Owner of every versioned node of one structure
//!
//! Nodes live in a `Vec` and are referenced by `NodeId` indices. Nothing is
//! ever removed, so handles stay valid for the arena's lifetime and history
//! is retained by construction. Reverse edges are plain handles and own
//! nothing.
//!
//! # Write path
//!
//! A write appends to the node log while the log holds at most `2p` entries.
//! The next write splits the node:
//!
//! 1. Baseline and log are folded into a fresh node, the new edit is applied
//!    to the fresh baseline directly.
//! 2. The fresh node inherits the reverse sets.
//! 3. Every node the fresh node points to swaps the old node for the fresh
//!    one in its reverse set.
//! 4. Every referencer is rewritten, at the same version, to point at the
//!    fresh node. Those rewrites may split in turn.
//!
//! Step 4 is processed as a FIFO worklist. The old node's fields are never
//! touched and stay authoritative for every version before the split; the
//! old node is marked replaced and refuses further writes.
//!
//! # Reverse edges
//!
//! `write` never adds the writer to the reverse set of a pointer's new
//! target. Callers do that with `set_back` BEFORE the pointer write: if the
//! write splits the writer, step 3 then moves the edge to the copy. Calling
//! `set_back` afterwards names a node that may already be replaced.

use std::collections::VecDeque;

use super::errors::{PersistError, PersistResult};
use super::schema::{self, Schema, TagKind};
use super::{FieldValue, NodeId, Version, VersionedNode};
use crate::observability::{EngineMetrics, Event, Logger, Severity};

/// A node replaced by a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    /// Node whose log overflowed. Still valid for earlier versions.
    pub old: NodeId,
    /// Folded copy, live from the split version on.
    pub new: NodeId,
}

/// Outcome of one `write` call, cascades included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    live: NodeId,
    replacements: Vec<Replacement>,
}

impl WriteReport {
    /// The node that carries the edit at the written version.
    #[inline]
    pub fn live(&self) -> NodeId {
        self.live
    }

    /// Splits performed, in order.
    #[inline]
    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    #[inline]
    pub fn did_split(&self) -> bool {
        !self.replacements.is_empty()
    }

    /// Follow replacements starting at `node` to its live successor.
    pub fn resolve(&self, node: NodeId) -> NodeId {
        let mut current = node;
        for replacement in &self.replacements {
            if replacement.old == current {
                current = replacement.new;
            }
        }
        current
    }
}

struct PendingWrite<S: Schema> {
    node: NodeId,
    tag: S::Tag,
    value: FieldValue<S::Value>,
}

/// Arena of versioned nodes sharing one schema.
pub struct NodeArena<S: Schema> {
    nodes: Vec<VersionedNode<S>>,
    metrics: EngineMetrics,
}

impl<S: Schema> NodeArena<S> {
    /// Create an empty arena after validating the schema.
    pub fn new() -> PersistResult<Self> {
        schema::validate::<S>()?;
        Ok(Self {
            nodes: Vec::new(),
            metrics: EngineMetrics::new(),
        })
    }

    /// Allocate a node with every tag absent.
    pub fn alloc(&mut self, origin: Version) -> PersistResult<NodeId> {
        let id = NodeId::from_index(self.nodes.len())?;
        self.nodes.push(VersionedNode::new(origin));
        self.metrics.increment_nodes_allocated();
        Ok(id)
    }

    /// Number of nodes, split copies included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maximum log entries per node (`2p + 1`).
    #[inline]
    pub fn capacity_per_node(&self) -> usize {
        schema::log_capacity::<S>()
    }

    /// Maximum referencers per node and pointer tag (`p`).
    #[inline]
    pub fn in_degree_limit(&self) -> usize {
        S::MAX_IN_DEGREE
    }

    #[inline]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> PersistResult<&VersionedNode<S>> {
        self.nodes
            .get(id.index())
            .ok_or(PersistError::UnknownNode { node: id.value() })
    }

    /// Borrow a node that has not been replaced by a split.
    pub fn live(&self, id: NodeId) -> PersistResult<&VersionedNode<S>> {
        let node = self.node(id)?;
        match node.replaced_by() {
            None => Ok(node),
            Some(successor) => Err(PersistError::SupersededNode {
                node: id.value(),
                successor: successor.value(),
            }),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> PersistResult<&mut VersionedNode<S>> {
        self.nodes
            .get_mut(id.index())
            .ok_or(PersistError::UnknownNode { node: id.value() })
    }

    /// All handles, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).filter_map(|index| NodeId::from_index(index).ok())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value of `tag` on `id` at version `at`.
    pub fn read(
        &self,
        id: NodeId,
        tag: S::Tag,
        at: Version,
    ) -> PersistResult<&FieldValue<S::Value>> {
        self.node(id)?.read(tag, at)
    }

    /// Payload of data tag `tag` at `at`, `None` while absent.
    pub fn read_data(
        &self,
        id: NodeId,
        tag: S::Tag,
        at: Version,
    ) -> PersistResult<Option<&S::Value>> {
        schema::expect_kind::<S>(tag, TagKind::Data)?;
        Ok(self.read(id, tag, at)?.as_data())
    }

    /// Target of pointer tag `tag` at `at`, `None` while absent.
    pub fn read_pointer(
        &self,
        id: NodeId,
        tag: S::Tag,
        at: Version,
    ) -> PersistResult<Option<NodeId>> {
        schema::expect_kind::<S>(tag, TagKind::Pointer)?;
        Ok(self.read(id, tag, at)?.as_pointer())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Record `tag = value` on `id` at version `now`, splitting as needed.
    ///
    /// `id` must be live, and so must a written pointer's target. Reverse
    /// sets of the node a written pointer now targets are NOT maintained
    /// here: call `set_back(target, tag, id, ..)` before this write, never
    /// after it.
    pub fn write(
        &mut self,
        now: Version,
        id: NodeId,
        tag: S::Tag,
        value: FieldValue<S::Value>,
    ) -> PersistResult<WriteReport> {
        self.check_write(id, tag, &value)?;

        let mut report = WriteReport {
            live: id,
            replacements: Vec::new(),
        };
        let mut pending = VecDeque::from([PendingWrite::<S> {
            node: id,
            tag,
            value,
        }]);

        while let Some(write) = pending.pop_front() {
            let target = report.resolve(write.node);
            let value = match write.value {
                FieldValue::Pointer(to) => FieldValue::Pointer(report.resolve(to)),
                other => other,
            };
            let node = self.node_mut(target)?;

            if node.has_capacity() {
                node.record(now, write.tag, value);
                self.metrics.increment_log_appends();
                continue;
            }

            let fresh = self.split(now, target, write.tag, value)?;
            report.replacements.push(Replacement {
                old: target,
                new: fresh,
            });

            for ptr in S::POINTER_TAGS {
                let referencers: Vec<NodeId> =
                    self.node(fresh)?.reverse(*ptr)?.iter().copied().collect();
                for referencer in referencers {
                    self.metrics.increment_pointer_rewrites();
                    if Logger::enabled(Severity::Trace) {
                        Logger::trace(
                            Event::PointerRewritten,
                            &[
                                ("referencer", referencer.to_string().as_str()),
                                ("target", fresh.to_string().as_str()),
                                ("version", now.to_string().as_str()),
                            ],
                        );
                    }
                    pending.push_back(PendingWrite {
                        node: referencer,
                        tag: *ptr,
                        value: FieldValue::Pointer(fresh),
                    });
                }
            }
        }

        report.live = report.resolve(id);
        Ok(report)
    }

    /// Write a data tag.
    pub fn write_data(
        &mut self,
        now: Version,
        id: NodeId,
        tag: S::Tag,
        value: S::Value,
    ) -> PersistResult<WriteReport> {
        self.write(now, id, tag, FieldValue::Data(value))
    }

    /// Write a pointer tag; `None` clears it.
    pub fn write_pointer(
        &mut self,
        now: Version,
        id: NodeId,
        tag: S::Tag,
        target: Option<NodeId>,
    ) -> PersistResult<WriteReport> {
        schema::expect_kind::<S>(tag, TagKind::Pointer)?;
        self.write(now, id, tag, target.into())
    }

    fn check_write(&self, id: NodeId, tag: S::Tag, value: &FieldValue<S::Value>) -> PersistResult<()> {
        self.live(id)?;
        match value.kind() {
            None => {
                if schema::kind_of::<S>(tag).is_none() {
                    return Err(PersistError::UnknownField {
                        tag: schema::tag_name(tag),
                    });
                }
            }
            Some(kind) => schema::expect_kind::<S>(tag, kind)?,
        }
        if let Some(target) = value.as_pointer() {
            self.live(target)?;
        }
        Ok(())
    }

    /// Steps 1 to 3 of a split. Returns the fresh node.
    ///
    /// Every step 3 edge is checked before anything is mutated, so a failed
    /// split leaves the arena as it was.
    fn split(
        &mut self,
        now: Version,
        old: NodeId,
        tag: S::Tag,
        value: FieldValue<S::Value>,
    ) -> PersistResult<NodeId> {
        let folded = self.node(old)?.folded(now, tag, value);
        let targets = folded.baseline_pointers();
        let fresh = NodeId::from_index(self.nodes.len())?;

        for (ptr, target) in &targets {
            self.node(*target)?.check_set_back(*ptr, fresh, Some(old))?;
        }

        self.nodes.push(folded);
        self.node_mut(old)?.mark_replaced(fresh);
        self.metrics.increment_splits();

        for (ptr, target) in targets {
            self.node_mut(target)?.set_back(ptr, fresh, Some(old))?;
        }

        if Logger::enabled(Severity::Trace) {
            Logger::trace(
                Event::SplitPerformed,
                &[
                    ("new", fresh.to_string().as_str()),
                    ("old", old.to_string().as_str()),
                    ("version", now.to_string().as_str()),
                ],
            );
        }
        Ok(fresh)
    }

    // ------------------------------------------------------------------
    // Reverse edges
    // ------------------------------------------------------------------

    /// Record `new_referencer` as pointing at `id` through `tag`, replacing
    /// `old_referencer` when given.
    ///
    /// Must precede the pointer write it describes. Both `id` and
    /// `new_referencer` must be live.
    pub fn set_back(
        &mut self,
        id: NodeId,
        tag: S::Tag,
        new_referencer: NodeId,
        old_referencer: Option<NodeId>,
    ) -> PersistResult<()> {
        self.live(id)?;
        self.live(new_referencer)?;
        self.node_mut(id)?
            .set_back(tag, new_referencer, old_referencer)
    }

    /// Forget `referencer` as pointing at `id` through `tag`.
    pub fn unset_back(&mut self, id: NodeId, tag: S::Tag, referencer: NodeId) -> PersistResult<bool> {
        self.node_mut(id)?.unset_back(tag, referencer)
    }

    /// Current referencers of `id` through `tag`, in handle order.
    pub fn reverse(&self, id: NodeId, tag: S::Tag) -> PersistResult<Vec<NodeId>> {
        Ok(self.node(id)?.reverse(tag)?.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Tag {
        Value,
        Next,
        Stray,
    }

    struct Chain;
    impl Schema for Chain {
        type Tag = Tag;
        type Value = i32;
        const MAX_IN_DEGREE: usize = 1;
        const DATA_TAGS: &'static [Tag] = &[Tag::Value];
        const POINTER_TAGS: &'static [Tag] = &[Tag::Next];
    }

    struct Empty;
    impl Schema for Empty {
        type Tag = Tag;
        type Value = i32;
        const MAX_IN_DEGREE: usize = 1;
        const DATA_TAGS: &'static [Tag] = &[];
        const POINTER_TAGS: &'static [Tag] = &[];
    }

    fn v(n: u64) -> Version {
        Version::new(n)
    }

    /// a -> b, reverse edges maintained
    fn linked_pair(arena: &mut NodeArena<Chain>) -> (NodeId, NodeId) {
        let a = arena.alloc(v(0)).unwrap();
        let b = arena.alloc(v(0)).unwrap();
        arena.write_data(v(0), a, Tag::Value, 1).unwrap();
        arena.write_data(v(0), b, Tag::Value, 2).unwrap();
        arena.set_back(b, Tag::Next, a, None).unwrap();
        arena.write_pointer(v(0), a, Tag::Next, Some(b)).unwrap();
        (a, b)
    }

    #[test]
    fn test_invalid_schema_rejected() {
        assert!(matches!(
            NodeArena::<Empty>::new(),
            Err(PersistError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let n = arena.alloc(v(0)).unwrap();
        let report = arena.write_data(v(1), n, Tag::Value, 5).unwrap();

        assert_eq!(report.live(), n);
        assert!(!report.did_split());
        assert_eq!(arena.read_data(n, Tag::Value, v(1)).unwrap(), Some(&5));
        assert_eq!(arena.read_data(n, Tag::Value, v(0)).unwrap(), None);
    }

    #[test]
    fn test_tag_checks() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let n = arena.alloc(v(0)).unwrap();

        assert_eq!(
            arena.write(v(0), n, Tag::Stray, FieldValue::Absent),
            Err(PersistError::UnknownField {
                tag: "Stray".into()
            })
        );
        assert_eq!(
            arena.write(v(0), n, Tag::Next, FieldValue::Data(1)),
            Err(PersistError::InvalidDataField { tag: "Next".into() })
        );
        assert_eq!(
            arena.write(v(0), n, Tag::Value, FieldValue::Pointer(n)),
            Err(PersistError::InvalidPointerField {
                tag: "Value".into()
            })
        );
        assert_eq!(
            arena.read_pointer(n, Tag::Value, v(0)),
            Err(PersistError::InvalidPointerField {
                tag: "Value".into()
            })
        );
        assert_eq!(
            arena.set_back(n, Tag::Value, n, None),
            Err(PersistError::InvalidPointerField {
                tag: "Value".into()
            })
        );
    }

    #[test]
    fn test_unknown_node() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let n = arena.alloc(v(0)).unwrap();
        let foreign = NodeId::from_index(42).unwrap();

        assert_eq!(
            arena.write_pointer(v(0), n, Tag::Next, Some(foreign)),
            Err(PersistError::UnknownNode { node: 42 })
        );
        assert!(arena.read(foreign, Tag::Value, v(0)).is_err());
    }

    #[test]
    fn test_fourth_write_splits_exactly_once() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let n = arena.alloc(v(0)).unwrap();
        for i in 0..3 {
            let report = arena.write_data(v(i), n, Tag::Value, i as i32).unwrap();
            assert!(!report.did_split());
        }
        assert_eq!(arena.node(n).unwrap().log_len(), 3);

        let before = arena.len();
        let report = arena.write_data(v(3), n, Tag::Value, 3).unwrap();
        assert_eq!(arena.len(), before + 1);
        assert_eq!(report.replacements().len(), 1);

        let fresh = report.live();
        assert_ne!(fresh, n);
        assert_eq!(arena.node(fresh).unwrap().log_len(), 0);
        assert_eq!(arena.node(fresh).unwrap().origin(), v(3));
        assert_eq!(arena.read_data(fresh, Tag::Value, v(3)).unwrap(), Some(&3));

        // the old node is untouched
        assert_eq!(arena.node(n).unwrap().log_len(), 3);
        assert_eq!(arena.read_data(n, Tag::Value, v(2)).unwrap(), Some(&2));
        assert_eq!(arena.read_data(n, Tag::Value, v(3)).unwrap(), Some(&2));
        assert_eq!(arena.metrics().snapshot().splits, 1);
    }

    #[test]
    fn test_split_rewrites_referencer() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let (a, b) = linked_pair(&mut arena);

        // fill b's log (one entry already)
        arena.write_data(v(1), b, Tag::Value, 20).unwrap();
        arena.write_data(v(2), b, Tag::Value, 21).unwrap();
        let report = arena.write_data(v(3), b, Tag::Value, 22).unwrap();

        let b2 = report.live();
        assert_ne!(b2, b);
        assert_eq!(arena.read_pointer(a, Tag::Next, v(3)).unwrap(), Some(b2));
        assert_eq!(arena.read_pointer(a, Tag::Next, v(2)).unwrap(), Some(b));
        assert_eq!(arena.reverse(b2, Tag::Next).unwrap(), vec![a]);
        assert_eq!(arena.metrics().snapshot().pointer_rewrites, 1);
    }

    #[test]
    fn test_split_moves_forward_reverse_edge() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let (a, b) = linked_pair(&mut arena);

        // a has two entries; two more value writes overflow it
        arena.write_data(v(1), a, Tag::Value, 10).unwrap();
        let report = arena.write_data(v(2), a, Tag::Value, 11).unwrap();

        let a2 = report.live();
        assert_ne!(a2, a);
        assert_eq!(arena.read_pointer(a2, Tag::Next, v(2)).unwrap(), Some(b));
        assert_eq!(arena.reverse(b, Tag::Next).unwrap(), vec![a2]);
    }

    #[test]
    fn test_cascading_split() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let (a, b) = linked_pair(&mut arena);

        // a: value, next, value = full
        arena.write_data(v(1), a, Tag::Value, 10).unwrap();
        // b: value + 2 = full
        arena.write_data(v(1), b, Tag::Value, 20).unwrap();
        arena.write_data(v(2), b, Tag::Value, 21).unwrap();

        let report = arena.write_data(v(3), b, Tag::Value, 22).unwrap();
        assert_eq!(report.replacements().len(), 2);

        let b2 = report.live();
        let a2 = report.resolve(a);
        assert_ne!(a2, a);
        assert_eq!(arena.read_pointer(a2, Tag::Next, v(3)).unwrap(), Some(b2));
        assert_eq!(arena.read_data(a2, Tag::Value, v(3)).unwrap(), Some(&10));
        assert_eq!(arena.reverse(b2, Tag::Next).unwrap(), vec![a2]);

        // history through the old nodes
        assert_eq!(arena.read_pointer(a, Tag::Next, v(2)).unwrap(), Some(b));
        assert_eq!(arena.read_data(b, Tag::Value, v(2)).unwrap(), Some(&21));
    }

    #[test]
    fn test_write_pointer_absent_clears() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let (a, b) = linked_pair(&mut arena);
        arena.write_pointer(v(1), a, Tag::Next, None).unwrap();
        arena.unset_back(b, Tag::Next, a).unwrap();

        assert_eq!(arena.read_pointer(a, Tag::Next, v(1)).unwrap(), None);
        assert_eq!(arena.read_pointer(a, Tag::Next, v(0)).unwrap(), Some(b));
        assert!(arena.reverse(b, Tag::Next).unwrap().is_empty());
    }

    #[test]
    fn test_replaced_node_refuses_writes() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let (a, b) = linked_pair(&mut arena);
        arena.write_data(v(1), b, Tag::Value, 20).unwrap();
        arena.write_data(v(2), b, Tag::Value, 21).unwrap();
        let b2 = arena.write_data(v(3), b, Tag::Value, 22).unwrap().live();
        let len = arena.len();

        let superseded = PersistError::SupersededNode {
            node: b.value(),
            successor: b2.value(),
        };
        assert_eq!(arena.write_data(v(4), b, Tag::Value, 23), Err(superseded.clone()));
        assert_eq!(
            arena.write_pointer(v(4), a, Tag::Next, Some(b)),
            Err(superseded.clone())
        );
        assert_eq!(arena.set_back(b, Tag::Next, a, None), Err(superseded));

        assert_eq!(arena.len(), len);
        assert_eq!(arena.node(b).unwrap().replaced_by(), Some(b2));
        assert!(arena.live(b2).is_ok());
        assert_eq!(arena.reverse(b2, Tag::Next).unwrap(), vec![a]);
        assert_eq!(arena.read_pointer(a, Tag::Next, v(4)).unwrap(), Some(b2));
    }

    #[test]
    fn test_failed_split_leaves_arena_unchanged() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let a = arena.alloc(v(0)).unwrap();
        let b = arena.alloc(v(0)).unwrap();
        let z = arena.alloc(v(0)).unwrap();
        arena.set_back(b, Tag::Next, z, None).unwrap();
        // a -> b without recording a in b's reverse set
        arena.write_pointer(v(0), a, Tag::Next, Some(b)).unwrap();
        arena.write_data(v(1), a, Tag::Value, 1).unwrap();
        arena.write_data(v(2), a, Tag::Value, 2).unwrap();

        let len = arena.len();
        let before = arena.metrics().snapshot();
        assert_eq!(
            arena.write_data(v(3), a, Tag::Value, 3),
            Err(PersistError::InDegreeExceeded {
                tag: "Next".into(),
                limit: 1
            })
        );

        let after = arena.metrics().snapshot();
        assert_eq!(arena.len(), len);
        assert_eq!(after.splits, before.splits);
        assert_eq!(after.log_appends, before.log_appends);
        assert!(arena.node(a).unwrap().is_live());
        assert_eq!(arena.node(a).unwrap().log_len(), 3);
        assert_eq!(arena.reverse(b, Tag::Next).unwrap(), vec![z]);
    }

    #[test]
    fn test_set_back_before_splitting_write() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let x = arena.alloc(v(0)).unwrap();
        let y = arena.alloc(v(0)).unwrap();
        for i in 0..3 {
            arena.write_data(v(i), x, Tag::Value, i as i32).unwrap();
        }

        arena.set_back(y, Tag::Next, x, None).unwrap();
        let report = arena.write_pointer(v(3), x, Tag::Next, Some(y)).unwrap();

        let x2 = report.live();
        assert_ne!(x2, x);
        assert_eq!(arena.reverse(y, Tag::Next).unwrap(), vec![x2]);
        assert_eq!(arena.read_pointer(x2, Tag::Next, v(3)).unwrap(), Some(y));
    }

    #[test]
    fn test_set_back_after_splitting_write_rejected() {
        let mut arena = NodeArena::<Chain>::new().unwrap();
        let x = arena.alloc(v(0)).unwrap();
        let y = arena.alloc(v(0)).unwrap();
        for i in 0..3 {
            arena.write_data(v(i), x, Tag::Value, i as i32).unwrap();
        }

        let x2 = arena.write_pointer(v(3), x, Tag::Next, Some(y)).unwrap().live();
        assert_eq!(arena.reverse(y, Tag::Next).unwrap(), vec![x2]);
        assert_eq!(
            arena.set_back(y, Tag::Next, x, None),
            Err(PersistError::SupersededNode {
                node: x.value(),
                successor: x2.value(),
            })
        );
        assert_eq!(arena.reverse(y, Tag::Next).unwrap(), vec![x2]);
    }

    #[test]
    fn test_report_resolve_chain() {
        let n = |i| NodeId::from_index(i).unwrap();
        let report = WriteReport {
            live: n(3),
            replacements: vec![
                Replacement { old: n(1), new: n(2) },
                Replacement { old: n(2), new: n(3) },
            ],
        };
        assert_eq!(report.resolve(n(1)), n(3));
        assert_eq!(report.resolve(n(0)), n(0));
    }
}
