//! Error types for graph construction, generation, execution and runs.

use std::sync::Arc;

use crate::canonical::StructuralDiff;
use crate::command::CommandKind;
use crate::graph::NodeId;

/// Errors raised by [`Graph`](crate::Graph) construction and lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node was registered twice under the same id.
    #[error("node id {0:?} is already registered")]
    DuplicateId(String),

    /// No node is registered under this id.
    #[error("no node registered under id {0:?}")]
    NotFound(String),

    /// The handle was produced by another graph.
    #[error("node handle {0:?} belongs to another graph")]
    ForeignNode(NodeId),

    /// The handle does not resolve to a node of this graph.
    #[error("node handle {0:?} is out of range")]
    UnknownNode(NodeId),

    /// The node exists but is of another kind.
    #[error("node {key:?} is not a {expected}")]
    KindMismatch {
        /// Id of the node.
        key: String,
        /// Requested kind.
        expected: &'static str,
    },
}

/// Cardinality errors raised by [`Selection`](crate::Selection).
///
/// These signal a broken invariant in the caller, not a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// `one()` was called on a selection that does not hold exactly one node.
    #[error("expected exactly one {kind}, found {found}")]
    NotExactlyOne {
        /// Kind of the selection.
        kind: &'static str,
        /// Number of nodes found.
        found: usize,
    },

    /// More nodes were requested than the selection holds.
    #[error("cannot pick {requested} of {available} nodes")]
    Insufficient {
        /// Requested count.
        requested: usize,
        /// Selection size.
        available: usize,
    },
}

/// A structural invariant of a catalog graph does not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A node does not have exactly one structural parent.
    #[error("{kind} {key:?} has {found} {parent} parents, expected 1")]
    ParentCount {
        /// Kind of the node.
        kind: &'static str,
        /// Id of the node.
        key: String,
        /// Expected parent kind.
        parent: &'static str,
        /// Number of parents found.
        found: usize,
    },

    /// A foreign key does not reference exactly two columns.
    #[error("foreign key {key:?} references {found} columns, expected 2")]
    ForeignKeyArity {
        /// Id of the constraint.
        key: String,
        /// Number of referenced columns.
        found: usize,
    },

    /// An index has no member columns.
    #[error("index {key:?} has no columns")]
    EmptyIndex {
        /// Id of the index.
        key: String,
    },

    /// An index references a column of another table.
    #[error("index {index:?} references column {column:?} of another table")]
    ForeignIndexColumn {
        /// Id of the index.
        index: String,
        /// Id of the column.
        column: String,
    },

    /// Two siblings share a name.
    #[error("duplicate {kind} name {name:?} under {parent:?}")]
    DuplicateName {
        /// Kind of the siblings.
        kind: &'static str,
        /// Qualified name of the parent (empty for databases).
        parent: String,
        /// Duplicated name.
        name: String,
    },

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Errors raised while building a graph from catalog rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("catalog row references missing or mistyped node: {0}")]
    Graph(#[from] GraphError),

    #[error("catalog snapshot violates an invariant: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Errors raised by the [`CommandGenerator`](crate::CommandGenerator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// Every command kind has weight zero.
    #[error("no command kind has a positive weight")]
    EmptyPool,

    /// The retry budget was exhausted without a feasible command.
    #[error("no viable command found after {attempts} attempts (tried {tried:?})")]
    NoViableCommand {
        /// Number of constructor invocations.
        attempts: usize,
        /// Kinds tried, in order.
        tried: Vec<CommandKind>,
    },

    /// A constructor produced a command of another kind.
    #[error("constructor for {expected} produced {actual}")]
    KindMismatch {
        /// Kind the constructor was registered for.
        expected: CommandKind,
        /// Kind it produced.
        actual: CommandKind,
    },
}

/// Errors returned by a [`System`](crate::System) backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SystemError {
    /// The backend refused the command.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The command references a catalog object the backend does not have.
    #[error("unknown catalog object: {0}")]
    UnknownObject(String),

    /// The snapshot could not be turned into a graph.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Traversal of the command's targets failed.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Backend-specific failure (connection, driver, ...).
    #[error("backend error: {0}")]
    Backend(Arc<anyhow::Error>),
}

impl SystemError {
    /// Wrap any backend error.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        SystemError::Backend(Arc::new(err.into()))
    }
}

/// Errors raised while loading a [`RunConfig`](crate::RunConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fatal errors that end a differential run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("step {step}: {source}")]
    Generation {
        step: usize,
        #[source]
        source: GenerateError,
    },

    #[error("step {step}: {system} failed to execute {command}: {source}")]
    Execution {
        step: usize,
        system: String,
        command: String,
        #[source]
        source: SystemError,
    },

    #[error("step {step}: failed to translate {command}: {source}")]
    Translation {
        step: usize,
        command: String,
        #[source]
        source: SelectionError,
    },

    #[error("{system} failed to produce a catalog snapshot: {source}")]
    StateLoad {
        system: String,
        #[source]
        source: SystemError,
    },

    #[error(
        "state mismatch after step {step} (seed {seed})\n{}",
        render_mismatch(.diff, .history)
    )]
    Mismatch {
        step: usize,
        seed: u64,
        diff: StructuralDiff,
        history: Vec<String>,
    },
}

/// Errors raised while replaying a [`Transcript`](crate::Transcript).
///
/// Step 0 is the state before the first command.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("step {step}: command target not found: {source}")]
    Resolve {
        step: usize,
        #[source]
        source: GraphError,
    },

    #[error("step {step}: failed to execute {command}: {source}")]
    Execution {
        step: usize,
        command: String,
        #[source]
        source: SystemError,
    },

    #[error("step {step}: failed to produce a catalog snapshot: {source}")]
    StateLoad {
        step: usize,
        #[source]
        source: SystemError,
    },

    #[error("state mismatch after step {step}\n{diff}")]
    Mismatch { step: usize, diff: StructuralDiff },
}

fn render_mismatch(diff: &StructuralDiff, history: &[String]) -> String {
    let mut out = String::from("commands:\n");
    for (i, command) in history.iter().enumerate() {
        out.push_str(&format!("  {i}: {command}\n"));
    }
    out.push_str("diff (oracle -> sut):\n");
    out.push_str(&diff.to_string());
    out
}
