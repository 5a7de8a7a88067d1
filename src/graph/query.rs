//! Typed, kind-filtered reads over a [`Graph`].

use std::fmt;
use std::ops::Deref;

use rand::Rng;

use super::{Graph, NodeId, Selection};
use crate::error::{GraphError, SelectionError};

/// A node kind that can be projected out of the node type `N`.
///
/// Every node type is trivially a kind of itself, which selects all nodes.
pub trait Kind<N> {
    /// Returns the payload if `node` is of this kind.
    fn cast(node: &N) -> Option<&Self>;

    /// Human readable kind name used in error messages.
    fn kind_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<N> Kind<N> for N {
    fn cast(node: &N) -> Option<&N> {
        Some(node)
    }
}

/// A typed reference to a node, bound to the graph that owns it.
///
/// Two refs are equal when they point at the same node of the same graph.
pub struct Ref<'g, N, T> {
    graph: &'g Graph<N>,
    id: NodeId,
    value: &'g T,
}

impl<'g, N, T> Clone for Ref<'g, N, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'g, N, T> Copy for Ref<'g, N, T> {}

impl<'g, N, T> PartialEq for Ref<'g, N, T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<'g, N, T> Eq for Ref<'g, N, T> {}

impl<'g, N, T: fmt::Debug> fmt::Debug for Ref<'g, N, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.value, self.id.index())
    }
}

impl<'g, N, T> Deref for Ref<'g, N, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<'g, N, T: Kind<N>> Ref<'g, N, T> {
    fn resolve(graph: &'g Graph<N>, id: NodeId) -> Option<Self> {
        T::cast(graph.value_unchecked(id)).map(|value| Ref { graph, id, value })
    }
}

impl<'g, N, T> Ref<'g, N, T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &'g Graph<N> {
        self.graph
    }

    /// The payload with the graph's lifetime.
    pub fn value(&self) -> &'g T {
        self.value
    }

    /// The key the node was registered under.
    pub fn key(&self) -> &'g str {
        // The handle came from this graph.
        self.graph.key(self.id).unwrap_or_default()
    }

    /// Outgoing neighbors of kind `U`, in edge insertion order.
    pub fn outgoing<U: Kind<N>>(&self) -> Selection<'g, N, U> {
        collect(self.graph, self.graph.outgoing_unchecked(self.id))
    }

    /// Incoming neighbors of kind `U`, in edge insertion order.
    pub fn incoming<U: Kind<N>>(&self) -> Selection<'g, N, U> {
        collect(self.graph, self.graph.incoming_unchecked(self.id))
    }
}

fn collect<'g, N, U: Kind<N>>(graph: &'g Graph<N>, ids: &[NodeId]) -> Selection<'g, N, U> {
    ids.iter()
        .filter_map(|&id| Ref::resolve(graph, id))
        .collect()
}

impl<N> Graph<N> {
    /// All nodes of kind `T` in insertion order.
    pub fn nodes<T: Kind<N>>(&self) -> Selection<'_, N, T> {
        self.ids().filter_map(|id| Ref::resolve(self, id)).collect()
    }

    /// Typed access through a handle.
    pub fn get<T: Kind<N>>(&self, id: NodeId) -> Result<Ref<'_, N, T>, GraphError> {
        let value = self.node(id)?;
        T::cast(value)
            .map(|value| Ref {
                graph: self,
                id,
                value,
            })
            .ok_or_else(|| GraphError::KindMismatch {
                key: self.key(id).unwrap_or_default().to_string(),
                expected: T::kind_name(),
            })
    }

    /// Typed access through a registered key.
    pub fn by_id<T: Kind<N>>(&self, key: &str) -> Result<Ref<'_, N, T>, GraphError> {
        self.get(self.lookup(key)?)
    }

    /// A uniformly random node of kind `T`.
    pub fn any<T: Kind<N>, R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Ref<'_, N, T>, SelectionError> {
        self.nodes::<T>().any(rng)
    }
}
