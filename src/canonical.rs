//! Identity-independent comparison of graphs.
//!
//! Two snapshots of the same catalog taken from different backends share no
//! node keys or handles. [`Graph::comparable`] strips both away, keeping node
//! content and the content of each node's neighbors, so snapshots can be
//! compared position by position. The form is sensitive to insertion order:
//! backends must emit rows in a deterministic, content-defined order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeId};

/// A node with its neighbors, all reduced to content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalNode<N> {
    pub node: N,
    pub outgoing: Vec<N>,
    pub incoming: Vec<N>,
}

/// Comparable form of a whole graph, in node insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparable<N>(pub Vec<CanonicalNode<N>>);

impl<N: Clone> Graph<N> {
    pub fn comparable(&self) -> Comparable<N> {
        let content = |ids: &[NodeId]| -> Vec<N> {
            ids.iter()
                .map(|&id| self.value_unchecked(id).clone())
                .collect()
        };
        Comparable(
            self.ids()
                .map(|id| CanonicalNode {
                    node: self.value_unchecked(id).clone(),
                    outgoing: content(self.outgoing_unchecked(id)),
                    incoming: content(self.incoming_unchecked(id)),
                })
                .collect(),
        )
    }
}

impl<N: Clone + PartialEq> Graph<N> {
    /// True when both graphs have the same comparable form.
    pub fn equivalent(&self, other: &Graph<N>) -> bool {
        self.comparable() == other.comparable()
    }
}

impl<N> Comparable<N> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: PartialEq + fmt::Display> Comparable<N> {
    /// Every position at which `other` departs from `self`, or `None` when the
    /// forms are equal.
    pub fn diff(&self, other: &Comparable<N>) -> Option<StructuralDiff> {
        let mut entries = Vec::new();
        for (position, (expected, actual)) in self.0.iter().zip(&other.0).enumerate() {
            if expected.node != actual.node {
                entries.push(DiffEntry::Node {
                    position,
                    expected: expected.node.to_string(),
                    actual: actual.node.to_string(),
                });
            }
            if expected.outgoing != actual.outgoing {
                entries.push(DiffEntry::Outgoing {
                    position,
                    node: expected.node.to_string(),
                    expected: render(&expected.outgoing),
                    actual: render(&actual.outgoing),
                });
            }
            if expected.incoming != actual.incoming {
                entries.push(DiffEntry::Incoming {
                    position,
                    node: expected.node.to_string(),
                    expected: render(&expected.incoming),
                    actual: render(&actual.incoming),
                });
            }
        }
        let shared = self.0.len().min(other.0.len());
        for (offset, missing) in self.0[shared..].iter().enumerate() {
            entries.push(DiffEntry::Missing {
                position: shared + offset,
                node: missing.node.to_string(),
            });
        }
        for (offset, extra) in other.0[shared..].iter().enumerate() {
            entries.push(DiffEntry::Extra {
                position: shared + offset,
                node: extra.node.to_string(),
            });
        }

        if entries.is_empty() {
            None
        } else {
            Some(StructuralDiff { entries })
        }
    }
}

fn render<N: fmt::Display>(nodes: &[N]) -> Vec<String> {
    nodes.iter().map(ToString::to_string).collect()
}

/// One differing position between an expected and an actual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffEntry {
    Node {
        position: usize,
        expected: String,
        actual: String,
    },
    Outgoing {
        position: usize,
        node: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    Incoming {
        position: usize,
        node: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    /// Present only in the expected form.
    Missing { position: usize, node: String },
    /// Present only in the actual form.
    Extra { position: usize, node: String },
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffEntry::Node {
                position,
                expected,
                actual,
            } => write!(f, "[{position}] node: - {expected} + {actual}"),
            DiffEntry::Outgoing {
                position,
                node,
                expected,
                actual,
            } => write!(
                f,
                "[{position}] {node} outgoing: - [{}] + [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
            DiffEntry::Incoming {
                position,
                node,
                expected,
                actual,
            } => write!(
                f,
                "[{position}] {node} incoming: - [{}] + [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
            DiffEntry::Missing { position, node } => write!(f, "[{position}] - {node}"),
            DiffEntry::Extra { position, node } => write!(f, "[{position}] + {node}"),
        }
    }
}

/// All differences between two comparable forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralDiff {
    pub entries: Vec<DiffEntry>,
}

impl fmt::Display for StructuralDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}
