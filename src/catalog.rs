//! Catalog node kinds and their typed accessors.
//!
//! Every accessor is a graph query: a table's schema is its single incoming
//! [`Schema`] neighbor, its columns are its outgoing [`Column`] neighbors, and
//! so on. A [`ForeignKeyConstraint`] encodes direction positionally: its first
//! outgoing column is the referenced ("to") column, the second the referencing
//! ("from") column.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, InvariantViolation, SelectionError};
use crate::graph::{Graph, Kind, Ref, Selection};

/// Name of the schema every database is created with.
pub const PUBLIC_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    pub name: String,
}

/// Content of a catalog graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogNode {
    Database(Database),
    Schema(Schema),
    Table(Table),
    Column(Column),
    Index(Index),
    ForeignKeyConstraint(ForeignKeyConstraint),
}

impl CatalogNode {
    pub fn name(&self) -> &str {
        match self {
            CatalogNode::Database(n) => &n.name,
            CatalogNode::Schema(n) => &n.name,
            CatalogNode::Table(n) => &n.name,
            CatalogNode::Column(n) => &n.name,
            CatalogNode::Index(n) => &n.name,
            CatalogNode::ForeignKeyConstraint(n) => &n.name,
        }
    }
}

impl fmt::Display for CatalogNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogNode::Index(index) => {
                write!(f, "Index{{name: {:?}, unique: {}}}", index.name, index.unique)
            }
            CatalogNode::Database(_) => write!(f, "Database{{name: {:?}}}", self.name()),
            CatalogNode::Schema(_) => write!(f, "Schema{{name: {:?}}}", self.name()),
            CatalogNode::Table(_) => write!(f, "Table{{name: {:?}}}", self.name()),
            CatalogNode::Column(_) => write!(f, "Column{{name: {:?}}}", self.name()),
            CatalogNode::ForeignKeyConstraint(_) => {
                write!(f, "ForeignKeyConstraint{{name: {:?}}}", self.name())
            }
        }
    }
}

macro_rules! catalog_kind {
    ($($kind:ident => $label:literal),* $(,)?) => {
        $(
            impl Kind<CatalogNode> for $kind {
                fn cast(node: &CatalogNode) -> Option<&Self> {
                    match node {
                        CatalogNode::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn kind_name() -> &'static str {
                    $label
                }
            }

            impl From<$kind> for CatalogNode {
                fn from(value: $kind) -> Self {
                    CatalogNode::$kind(value)
                }
            }
        )*
    };
}

catalog_kind! {
    Database => "database",
    Schema => "schema",
    Table => "table",
    Column => "column",
    Index => "index",
    ForeignKeyConstraint => "foreign key constraint",
}

/// A snapshot of one catalog.
pub type CatalogGraph = Graph<CatalogNode>;

/// A typed node of a [`CatalogGraph`].
pub type CatalogRef<'g, T> = Ref<'g, CatalogNode, T>;

/// A typed query result over a [`CatalogGraph`].
pub type CatalogSelection<'g, T> = Selection<'g, CatalogNode, T>;

impl<'g> CatalogRef<'g, Database> {
    pub fn schemas(&self) -> CatalogSelection<'g, Schema> {
        self.outgoing()
    }

    /// Every table of every schema of this database.
    pub fn tables(&self) -> CatalogSelection<'g, Table> {
        self.schemas()
            .into_iter()
            .flat_map(|schema| schema.tables())
            .collect()
    }

    pub fn fqn(&self) -> String {
        self.name.clone()
    }
}

impl<'g> CatalogRef<'g, Schema> {
    pub fn database(&self) -> Result<CatalogRef<'g, Database>, SelectionError> {
        self.incoming().one()
    }

    pub fn tables(&self) -> CatalogSelection<'g, Table> {
        self.outgoing()
    }

    pub fn fqn(&self) -> Result<String, SelectionError> {
        Ok(format!("{}.{}", self.database()?.fqn(), self.name))
    }
}

impl<'g> CatalogRef<'g, Table> {
    pub fn schema(&self) -> Result<CatalogRef<'g, Schema>, SelectionError> {
        self.incoming().one()
    }

    pub fn database(&self) -> Result<CatalogRef<'g, Database>, SelectionError> {
        self.schema()?.database()
    }

    pub fn columns(&self) -> CatalogSelection<'g, Column> {
        self.outgoing()
    }

    pub fn indexes(&self) -> CatalogSelection<'g, Index> {
        self.outgoing()
    }

    /// Constraints whose referencing column belongs to this table.
    pub fn foreign_keys(&self) -> CatalogSelection<'g, ForeignKeyConstraint> {
        self.graph()
            .nodes::<ForeignKeyConstraint>()
            .filter(|fk| {
                fk.from()
                    .and_then(|column| column.table())
                    .is_ok_and(|table| table == *self)
            })
    }

    /// Constraints from other tables referencing a column of this table.
    pub fn referencing_foreign_keys(&self) -> CatalogSelection<'g, ForeignKeyConstraint> {
        self.columns()
            .into_iter()
            .flat_map(|column| column.referenced_by())
            .filter(|fk| {
                fk.from()
                    .and_then(|column| column.table())
                    .is_ok_and(|table| table != *self)
            })
            .collect()
    }

    pub fn fqn(&self) -> Result<String, SelectionError> {
        Ok(format!("{}.{}", self.schema()?.fqn()?, self.name))
    }
}

impl<'g> CatalogRef<'g, Column> {
    pub fn table(&self) -> Result<CatalogRef<'g, Table>, SelectionError> {
        self.incoming().one()
    }

    /// Indexes this column is a member of.
    pub fn indexes(&self) -> CatalogSelection<'g, Index> {
        self.incoming()
    }

    /// Constraints with this column as their "to" end.
    pub fn referenced_by(&self) -> CatalogSelection<'g, ForeignKeyConstraint> {
        self.incoming::<ForeignKeyConstraint>()
            .filter(|fk| fk.to().is_ok_and(|to| to == *self))
    }

    /// Constraints with this column as their "from" end.
    pub fn references(&self) -> CatalogSelection<'g, ForeignKeyConstraint> {
        self.incoming::<ForeignKeyConstraint>()
            .filter(|fk| fk.from().is_ok_and(|from| from == *self))
    }

    /// True when some unique index has this column as its only member.
    pub fn is_uniquely_indexed(&self) -> bool {
        self.indexes()
            .iter()
            .any(|index| index.unique && index.columns().len() == 1)
    }

    pub fn fqn(&self) -> Result<String, SelectionError> {
        Ok(format!("{}.cols.{}", self.table()?.fqn()?, self.name))
    }
}

impl<'g> CatalogRef<'g, Index> {
    pub fn table(&self) -> Result<CatalogRef<'g, Table>, SelectionError> {
        self.incoming().one()
    }

    /// Member columns; element 0 is the leading column.
    pub fn columns(&self) -> CatalogSelection<'g, Column> {
        self.outgoing()
    }

    pub fn fqn(&self) -> Result<String, SelectionError> {
        Ok(format!("{}.idxs.{}", self.table()?.fqn()?, self.name))
    }
}

impl<'g> CatalogRef<'g, ForeignKeyConstraint> {
    /// The referenced column.
    pub fn to(&self) -> Result<CatalogRef<'g, Column>, SelectionError> {
        self.endpoint(0)
    }

    /// The referencing column.
    pub fn from(&self) -> Result<CatalogRef<'g, Column>, SelectionError> {
        self.endpoint(1)
    }

    fn endpoint(&self, position: usize) -> Result<CatalogRef<'g, Column>, SelectionError> {
        let columns = self.outgoing::<Column>();
        if columns.len() != 2 {
            return Err(SelectionError::NotExactlyOne {
                kind: "foreign key column pair",
                found: columns.len(),
            });
        }
        columns.get(position).ok_or(SelectionError::Insufficient {
            requested: position + 1,
            available: columns.len(),
        })
    }

    pub fn fqn(&self) -> Result<String, SelectionError> {
        Ok(format!("{}.fks.{}", self.from()?.table()?.fqn()?, self.name))
    }
}

/// Node kinds with a fully qualified name.
pub trait Qualified: Kind<CatalogNode> + Sized {
    fn qualified_name(node: &CatalogRef<'_, Self>) -> Result<String, SelectionError>;
}

impl Qualified for Database {
    fn qualified_name(node: &CatalogRef<'_, Self>) -> Result<String, SelectionError> {
        Ok(node.fqn())
    }
}

macro_rules! qualified {
    ($($kind:ident),*) => {
        $(impl Qualified for $kind {
            fn qualified_name(node: &CatalogRef<'_, Self>) -> Result<String, SelectionError> {
                node.fqn()
            }
        })*
    };
}

qualified!(Schema, Table, Column, Index, ForeignKeyConstraint);

impl Graph<CatalogNode> {
    /// The node of kind `T` whose fully qualified name is `fqn`.
    pub fn by_fqn<T: Qualified>(&self, fqn: &str) -> Result<CatalogRef<'_, T>, GraphError> {
        let mut matches = self
            .nodes::<T>()
            .filter(|node| T::qualified_name(node).is_ok_and(|name| name == fqn))
            .into_iter();
        match (matches.next(), matches.next()) {
            (Some(node), None) => Ok(node),
            (None, _) => Err(GraphError::NotFound(fqn.to_string())),
            (Some(_), Some(_)) => Err(GraphError::DuplicateId(fqn.to_string())),
        }
    }
}

/// Check the structural invariants of a catalog snapshot: one structural
/// parent per non-root node, two columns per foreign key, index members from
/// the owning table, and unique names among siblings.
pub fn validate(graph: &CatalogGraph) -> Result<(), InvariantViolation> {
    unique_names("database", "", graph.nodes::<Database>().iter().map(|d| d.value()))?;

    for schema in graph.nodes::<Schema>().iter() {
        parent_count::<Schema, Database>(&schema)?;
    }
    for table in graph.nodes::<Table>().iter() {
        parent_count::<Table, Schema>(&table)?;
    }
    for column in graph.nodes::<Column>().iter() {
        parent_count::<Column, Table>(&column)?;
    }
    for index in graph.nodes::<Index>().iter() {
        parent_count::<Index, Table>(&index)?;
        let table = index.table()?;
        let columns = index.columns();
        if columns.is_empty() {
            return Err(InvariantViolation::EmptyIndex {
                key: index.key().to_string(),
            });
        }
        for column in columns.iter() {
            if column.table()? != table {
                return Err(InvariantViolation::ForeignIndexColumn {
                    index: index.key().to_string(),
                    column: column.key().to_string(),
                });
            }
        }
    }
    for fk in graph.nodes::<ForeignKeyConstraint>().iter() {
        let found = fk.graph().outgoing_unchecked(fk.id()).len();
        if found != 2 || fk.outgoing::<Column>().len() != 2 {
            return Err(InvariantViolation::ForeignKeyArity {
                key: fk.key().to_string(),
                found,
            });
        }
    }

    for database in graph.nodes::<Database>().iter() {
        unique_names("schema", &database.fqn(), database.schemas().iter().map(|s| s.value()))?;
        for schema in database.schemas().iter() {
            unique_names("table", &schema.fqn()?, schema.tables().iter().map(|t| t.value()))?;
            for table in schema.tables().iter() {
                let parent = table.fqn()?;
                unique_names("column", &parent, table.columns().iter().map(|c| c.value()))?;
                unique_names("index", &parent, table.indexes().iter().map(|i| i.value()))?;
                unique_names(
                    "foreign key constraint",
                    &parent,
                    table.foreign_keys().iter().map(|fk| fk.value()),
                )?;
            }
        }
    }
    Ok(())
}

fn parent_count<T, P>(node: &CatalogRef<'_, T>) -> Result<(), InvariantViolation>
where
    T: Kind<CatalogNode>,
    P: Kind<CatalogNode>,
{
    // Columns also have index and constraint predecessors; only P counts.
    let found = node.incoming::<P>().len();
    if found != 1 {
        return Err(InvariantViolation::ParentCount {
            kind: T::kind_name(),
            key: node.key().to_string(),
            parent: P::kind_name(),
            found,
        });
    }
    Ok(())
}

macro_rules! named {
    ($($kind:ident),*) => {
        $(impl AsRef<str> for $kind {
            fn as_ref(&self) -> &str {
                &self.name
            }
        })*
    };
}

named!(Database, Schema, Table, Column, Index, ForeignKeyConstraint);

fn unique_names<'a, T: AsRef<str> + 'a>(
    kind: &'static str,
    parent: &str,
    siblings: impl Iterator<Item = &'a T>,
) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();
    for sibling in siblings {
        if !seen.insert(sibling.as_ref()) {
            return Err(InvariantViolation::DuplicateName {
                kind,
                parent: parent.to_string(),
                name: sibling.as_ref().to_string(),
            });
        }
    }
    Ok(())
}
