//! Append-only node-and-edge arena.
//!
//! A [`Graph`] owns every node of one catalog snapshot together with its
//! outgoing and incoming adjacency. Nodes are addressed by [`NodeId`] handles
//! which are only meaningful inside the graph that issued them.

mod query;
mod selection;

pub use query::{Kind, Ref};
pub use selection::Selection;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use slab::Slab;

use crate::error::GraphError;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a graph instance. Every graph, clones included, has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a node inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    graph: GraphId,
    index: usize,
}

impl NodeId {
    /// Insertion position of the node in its graph.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Graph that issued this handle.
    pub fn graph(&self) -> GraphId {
        self.graph
    }
}

#[derive(Debug, Clone)]
struct Entry<N> {
    key: String,
    value: N,
    outgoing: Vec<NodeId>,
    incoming: Vec<NodeId>,
}

/// Mutable while being built, read-only afterwards. There is no removal.
#[derive(Debug)]
pub struct Graph<N> {
    id: GraphId,
    entries: Slab<Entry<N>>,
    by_key: HashMap<String, NodeId>,
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self {
            id: GraphId::fresh(),
            entries: Slab::new(),
            by_key: HashMap::new(),
        }
    }
}

/// The copy gets a fresh [`GraphId`] and its own handles; handles of the
/// source are foreign to it.
impl<N: Clone> Clone for Graph<N> {
    fn clone(&self) -> Self {
        let id = GraphId::fresh();
        let rebind = |node: &mut NodeId| node.graph = id;
        let mut entries = self.entries.clone();
        for (_, entry) in entries.iter_mut() {
            entry.outgoing.iter_mut().for_each(rebind);
            entry.incoming.iter_mut().for_each(rebind);
        }
        let mut by_key = self.by_key.clone();
        by_key.values_mut().for_each(rebind);
        Self {
            id,
            entries,
            by_key,
        }
    }
}

impl<N> Graph<N> {
    /// Create an empty graph with a fresh identity.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register `value` under `key`.
    pub fn add_node(&mut self, key: impl Into<String>, value: N) -> Result<NodeId, GraphError> {
        let key = key.into();
        if self.by_key.contains_key(&key) {
            return Err(GraphError::DuplicateId(key));
        }
        let index = self.entries.vacant_key();
        let id = NodeId {
            graph: self.id,
            index,
        };
        self.entries.insert(Entry {
            key: key.clone(),
            value,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Record a directed edge. Parallel edges are kept, in insertion order.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check(from)?;
        self.check(to)?;
        self.entries[from.index].outgoing.push(to);
        self.entries[to.index].incoming.push(from);
        Ok(())
    }

    /// Resolve a registered key to its handle.
    pub fn lookup(&self, key: &str) -> Result<NodeId, GraphError> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::NotFound(key.to_string()))
    }

    /// The node behind a handle.
    pub fn node(&self, id: NodeId) -> Result<&N, GraphError> {
        self.entry(id).map(|entry| &entry.value)
    }

    /// The key a node was registered under.
    pub fn key(&self, id: NodeId) -> Result<&str, GraphError> {
        self.entry(id).map(|entry| entry.key.as_str())
    }

    /// Outgoing neighbors in edge insertion order.
    pub fn outgoing(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.entry(id).map(|entry| entry.outgoing.as_slice())
    }

    /// Incoming neighbors in edge insertion order.
    pub fn incoming(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.entry(id).map(|entry| entry.incoming.as_slice())
    }

    /// Handles of all nodes in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        let graph = self.id;
        self.entries.iter().map(move |(index, _)| NodeId { graph, index })
    }

    /// Nodes in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &N> + '_ {
        self.entries.iter().map(|(_, entry)| &entry.value)
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        if id.graph != self.id {
            return Err(GraphError::ForeignNode(id));
        }
        if !self.entries.contains(id.index) {
            return Err(GraphError::UnknownNode(id));
        }
        Ok(())
    }

    fn entry(&self, id: NodeId) -> Result<&Entry<N>, GraphError> {
        self.check(id)?;
        Ok(&self.entries[id.index])
    }

    // Handles stored in adjacency lists were validated on insertion.
    pub(crate) fn value_unchecked(&self, id: NodeId) -> &N {
        &self.entries[id.index].value
    }

    pub(crate) fn outgoing_unchecked(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.index].outgoing
    }

    pub(crate) fn incoming_unchecked(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.index].incoming
    }
}

impl<N: fmt::Display> fmt::Display for Graph<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter() {
            writeln!(f, "{index}: {}", entry.value)?;
        }
        for (index, entry) in self.entries.iter() {
            for to in &entry.outgoing {
                writeln!(f, "{index} -> {}", to.index)?;
            }
        }
        Ok(())
    }
}
