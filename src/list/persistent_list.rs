//! PersistentList - A partially persistent singly linked list
//!
//! Every mutating operation takes exactly one version from the list's clock
//! and stamps every engine call it makes with it, so a read at any version
//! observes either all or none of an operation.
//!
//! Validation that can reject an operation runs before the version is
//! taken: a rejected operation leaves no trace in history. Every error a
//! mutation returns is logged at ERROR and counted as rejected first.
//!
//! Reverse edges are maintained here for every `Next` pointer the list
//! writes, always BEFORE the pointer write itself. If that write splits the
//! writer, the split then moves the freshly recorded edge to the replacement.

use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;

use crate::observability::{EngineMetrics, Event, Logger, Severity};
use crate::persist::{
    Clock, NodeArena, NodeId, PersistError, PersistResult, Schema, Version, WriteReport,
};

use super::config::{ListConfig, PastEndPolicy};
use super::render::{render_values, ListSnapshot};

/// Field tags of a list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListTag {
    /// Element payload
    Value,
    /// Successor
    Next,
}

/// Node layout of a list: one data tag, one pointer tag, in-degree 1.
pub struct ListSchema<V>(PhantomData<V>);

impl<V: Clone + Debug + 'static> Schema for ListSchema<V> {
    type Tag = ListTag;
    type Value = V;

    const MAX_IN_DEGREE: usize = 1;
    const DATA_TAGS: &'static [ListTag] = &[ListTag::Value];
    const POINTER_TAGS: &'static [ListTag] = &[ListTag::Next];
}

/// Result of walking a number of hops from the root.
enum Walk {
    Reached(NodeId),
    PastEnd { len: usize },
}

/// A singly linked list whose every past version stays readable.
pub struct PersistentList<V: Clone + Debug + 'static> {
    arena: NodeArena<ListSchema<V>>,
    clock: Clock,
    /// Root node per version, ascending. Grows when a split replaces the root.
    roots: Vec<(Version, NodeId)>,
    config: ListConfig,
}

impl<V: Clone + Debug + 'static> PersistentList<V> {
    /// Create a list holding only an empty root.
    pub fn new() -> PersistResult<Self> {
        Self::with_config(ListConfig::default())
    }

    /// Create a list holding only an empty root.
    pub fn with_config(config: ListConfig) -> PersistResult<Self> {
        Self::with_clock(Clock::new(), config)
    }

    /// Create a list driven by a caller-supplied clock.
    pub fn with_clock(clock: Clock, config: ListConfig) -> PersistResult<Self> {
        config.validate()?;
        let mut arena = NodeArena::new()?;
        let root = arena.alloc(clock.peek())?;
        Ok(Self {
            arena,
            roots: vec![(clock.peek(), root)],
            clock,
            config,
        })
    }

    /// Create a list whose root holds `value`.
    pub fn with_root(value: V, config: ListConfig) -> PersistResult<Self> {
        let mut list = Self::with_config(config)?;
        list.set_root_value(value)?;
        Ok(list)
    }

    #[inline]
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    #[inline]
    pub fn arena(&self) -> &NodeArena<ListSchema<V>> {
        &self.arena
    }

    #[inline]
    pub fn metrics(&self) -> &EngineMetrics {
        self.arena.metrics()
    }

    /// The most recently issued version, if any.
    #[inline]
    pub fn latest_version(&self) -> Option<Version> {
        self.clock.latest()
    }

    /// Root node at version `at`.
    pub fn root_at(&self, at: Version) -> NodeId {
        let idx = self.roots.partition_point(|(since, _)| *since <= at);
        self.roots[idx.saturating_sub(1)].1
    }

    /// Every root the list has had, with the version it became live.
    pub fn root_history(&self) -> &[(Version, NodeId)] {
        &self.roots
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Write the root's value.
    pub fn set_root_value(&mut self, value: V) -> PersistResult<Version> {
        self.set_root_value_inner(value)
            .map_err(|err| self.reject(err))
    }

    /// Append `value` after the last element.
    pub fn append(&mut self, value: V) -> PersistResult<Version> {
        self.append_inner(value).map_err(|err| self.reject(err))
    }

    /// Overwrite the value of element `index`.
    ///
    /// Past the end, the configured `PastEndPolicy` applies.
    pub fn modify_at(&mut self, index: usize, value: V) -> PersistResult<Version> {
        self.modify_at_inner(index, value)
            .map_err(|err| self.reject(err))
    }

    /// Insert `value` directly after element `index`.
    ///
    /// Past the end, the configured `PastEndPolicy` applies.
    pub fn insert_after(&mut self, index: usize, value: V) -> PersistResult<Version> {
        self.insert_after_inner(index, value)
            .map_err(|err| self.reject(err))
    }

    /// Unlink element `index`.
    ///
    /// The root can never be deleted. Returns the version of the deletion,
    /// or `None` when the index was past the end under `PastEndPolicy::Append`.
    pub fn delete_at(&mut self, index: usize) -> PersistResult<Option<Version>> {
        self.delete_at_inner(index).map_err(|err| self.reject(err))
    }

    fn set_root_value_inner(&mut self, value: V) -> PersistResult<Version> {
        let at = self.clock.tick();
        let root = self.root_at(at);
        let report = self
            .arena
            .write_data(at, root, ListTag::Value, value)?;
        self.track_root(at, &report);
        Ok(self.committed(at))
    }

    fn append_inner(&mut self, value: V) -> PersistResult<Version> {
        let at = self.clock.tick();
        self.append_at(at, value)?;
        Ok(self.committed(at))
    }

    fn modify_at_inner(&mut self, index: usize, value: V) -> PersistResult<Version> {
        let node = match self.walk(index, self.clock.peek())? {
            Walk::Reached(node) => node,
            Walk::PastEnd { len } => return self.append_past_end("modify_at", index, len, value),
        };

        let at = self.clock.tick();
        let report = self.arena.write_data(at, node, ListTag::Value, value)?;
        self.track_root(at, &report);
        Ok(self.committed(at))
    }

    fn insert_after_inner(&mut self, index: usize, value: V) -> PersistResult<Version> {
        let cursor = match self.walk(index, self.clock.peek())? {
            Walk::Reached(node) => node,
            Walk::PastEnd { len } => {
                return self.append_past_end("insert_after", index, len, value)
            }
        };

        let at = self.clock.tick();
        let successor = self.arena.read_pointer(cursor, ListTag::Next, at)?;

        let node = self.arena.alloc(at)?;
        self.arena.write_data(at, node, ListTag::Value, value)?;
        self.arena.set_back(node, ListTag::Next, cursor, None)?;
        if let Some(successor) = successor {
            self.arena
                .set_back(successor, ListTag::Next, node, Some(cursor))?;
            self.arena
                .write_pointer(at, node, ListTag::Next, Some(successor))?;
        }

        let report = self
            .arena
            .write_pointer(at, cursor, ListTag::Next, Some(node))?;
        self.track_root(at, &report);
        Ok(self.committed(at))
    }

    fn delete_at_inner(&mut self, index: usize) -> PersistResult<Option<Version>> {
        if index == 0 {
            return Err(PersistError::precondition("the root cannot be deleted"));
        }

        let peek = self.clock.peek();
        let cursor = match self.walk(index - 1, peek)? {
            Walk::Reached(node) => node,
            Walk::PastEnd { len } => return self.delete_past_end(index, len),
        };
        let Some(removed) = self.arena.read_pointer(cursor, ListTag::Next, peek)? else {
            return self.delete_past_end(index, index);
        };

        let at = self.clock.tick();
        let after = self.arena.read_pointer(removed, ListTag::Next, at)?;
        if let Some(after) = after {
            self.arena
                .set_back(after, ListTag::Next, cursor, Some(removed))?;
        }
        self.arena.unset_back(removed, ListTag::Next, cursor)?;

        let report = self.arena.write_pointer(at, cursor, ListTag::Next, after)?;
        self.track_root(at, &report);
        Ok(Some(self.committed(at)))
    }

    fn append_at(&mut self, at: Version, value: V) -> PersistResult<()> {
        let tail = self.tail(at)?;
        let node = self.arena.alloc(at)?;
        self.arena.write_data(at, node, ListTag::Value, value)?;
        self.arena.set_back(node, ListTag::Next, tail, None)?;

        let report = self
            .arena
            .write_pointer(at, tail, ListTag::Next, Some(node))?;
        self.track_root(at, &report);
        Ok(())
    }

    fn append_past_end(
        &mut self,
        operation: &str,
        index: usize,
        len: usize,
        value: V,
    ) -> PersistResult<Version> {
        self.past_end(operation, index, len)?;
        let at = self.clock.tick();
        self.append_at(at, value)?;
        Ok(self.committed(at))
    }

    fn delete_past_end(&mut self, index: usize, len: usize) -> PersistResult<Option<Version>> {
        self.past_end("delete_at", index, len)?;
        Ok(None)
    }

    /// Apply the past-end policy: `Ok` to fall back, `Err` to reject.
    fn past_end(&mut self, operation: &str, index: usize, len: usize) -> PersistResult<()> {
        match self.config.past_end {
            PastEndPolicy::Reject => Err(PersistError::IndexOutOfRange { index, len }),
            PastEndPolicy::Append => {
                Logger::warn(
                    Event::PastEndFallback,
                    &[
                        ("index", index.to_string().as_str()),
                        ("len", len.to_string().as_str()),
                        ("operation", operation),
                    ],
                );
                Ok(())
            }
        }
    }

    fn reject(&self, err: PersistError) -> PersistError {
        self.metrics().increment_operations_rejected();
        Logger::error(
            Event::OperationRejected,
            &[("code", err.code()), ("message", err.to_string().as_str())],
        );
        err
    }

    fn committed(&self, at: Version) -> Version {
        self.metrics().increment_operations();
        at
    }

    /// Record a new root if `report` replaced the current one.
    fn track_root(&mut self, at: Version, report: &WriteReport) {
        let Some(&(_, current)) = self.roots.last() else {
            return;
        };
        let live = report.resolve(current);
        if live == current {
            return;
        }

        self.roots.push((at, live));
        if Logger::enabled(Severity::Trace) {
            Logger::trace(
                Event::RootReplaced,
                &[
                    ("new", live.to_string().as_str()),
                    ("old", current.to_string().as_str()),
                    ("version", at.to_string().as_str()),
                ],
            );
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    fn walk(&self, hops: usize, at: Version) -> PersistResult<Walk> {
        let mut cursor = self.root_at(at);
        for hop in 0..hops {
            match self.arena.read_pointer(cursor, ListTag::Next, at)? {
                Some(next) => cursor = next,
                None => return Ok(Walk::PastEnd { len: hop + 1 }),
            }
        }
        Ok(Walk::Reached(cursor))
    }

    fn tail(&self, at: Version) -> PersistResult<NodeId> {
        let mut cursor = self.root_at(at);
        while let Some(next) = self.arena.read_pointer(cursor, ListTag::Next, at)? {
            cursor = next;
        }
        Ok(cursor)
    }

    /// Nodes of the list at version `at`, root first.
    pub fn nodes_at(&self, at: Version) -> PersistResult<Vec<NodeId>> {
        let mut nodes = vec![self.root_at(at)];
        while let Some(next) =
            self.arena
                .read_pointer(nodes[nodes.len() - 1], ListTag::Next, at)?
        {
            nodes.push(next);
        }
        Ok(nodes)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Element values at version `at`; `None` for never-written values.
    pub fn values_at(&self, at: Version) -> PersistResult<Vec<Option<V>>> {
        let mut values = Vec::new();
        for node in self.nodes_at(at)? {
            values.push(self.arena.read_data(node, ListTag::Value, at)?.cloned());
        }
        Ok(values)
    }

    /// Number of elements at version `at`, root included.
    pub fn len_at(&self, at: Version) -> PersistResult<usize> {
        Ok(self.nodes_at(at)?.len())
    }

    /// Value of element `index` at version `at`.
    ///
    /// An index past the end is logged and counted like a rejected mutation.
    pub fn get_at(&self, index: usize, at: Version) -> PersistResult<Option<V>> {
        match self.walk(index, at)? {
            Walk::Reached(node) => Ok(self.arena.read_data(node, ListTag::Value, at)?.cloned()),
            Walk::PastEnd { len } => Err(self.reject(PersistError::IndexOutOfRange { index, len })),
        }
    }

    /// The list as seen at version `at`.
    pub fn snapshot_at(&self, at: Version) -> PersistResult<ListSnapshot<V>> {
        Ok(ListSnapshot {
            version: at,
            values: self.values_at(at)?,
        })
    }

    /// Version used by current-state queries: the latest one issued, or the
    /// clock's starting point before anything was issued.
    fn current_version(&self) -> Version {
        self.clock.latest().unwrap_or_else(|| self.clock.peek())
    }
}

impl<V: Clone + Debug + Display + 'static> PersistentList<V> {
    /// Render the list as seen at version `at`, e.g. `1->2->3->END`.
    ///
    /// Does not consume a version.
    pub fn render_at(&self, at: Version) -> PersistResult<String> {
        let mut values = Vec::new();
        for node in self.nodes_at(at)? {
            values.push(self.arena.read_data(node, ListTag::Value, at)?);
        }
        Ok(render_values(values, &self.config.absent_marker))
    }

    /// Render the list at the latest issued version.
    pub fn render_current(&self) -> PersistResult<String> {
        self.render_at(self.current_version())
    }
}

impl<V: Clone + Debug + Display + 'static> Display for PersistentList<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render_current().map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl<V: Clone + Debug + 'static> Debug for PersistentList<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentList")
            .field("latest_version", &self.clock.latest())
            .field("nodes", &self.arena.len())
            .field("roots", &self.roots)
            .field("config", &self.config)
            .finish()
    }
}
