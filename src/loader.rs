//! Building catalog graphs from backend rows.

use serde::{Deserialize, Serialize};

use crate::catalog::{
    validate, CatalogGraph, Column, Database, ForeignKeyConstraint, Index, Schema, Table,
};
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRow {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRow {
    pub id: u64,
    pub database_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: u64,
    pub schema_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub id: u64,
    pub table_id: u64,
    pub name: String,
    /// Carried for reports; not part of the graph.
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub id: u64,
    pub table_id: u64,
    pub name: String,
    pub unique: bool,
}

/// Index membership. Rows of one index appear in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumnRow {
    pub index_id: u64,
    pub column_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRow {
    pub id: u64,
    pub name: String,
    pub from_column_id: u64,
    pub to_column_id: u64,
}

/// Catalog tables as read from a backend, in the order the backend returned
/// them. Row order becomes node and edge insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRows {
    pub databases: Vec<DatabaseRow>,
    pub schemas: Vec<SchemaRow>,
    pub tables: Vec<TableRow>,
    pub columns: Vec<ColumnRow>,
    pub indexes: Vec<IndexRow>,
    pub index_columns: Vec<IndexColumnRow>,
    pub foreign_keys: Vec<ForeignKeyRow>,
}

fn database_key(id: u64) -> String {
    format!("db:{id}")
}

fn schema_key(id: u64) -> String {
    format!("schema:{id}")
}

fn table_key(id: u64) -> String {
    format!("table:{id}")
}

fn column_key(id: u64) -> String {
    format!("column:{id}")
}

fn index_key(id: u64) -> String {
    format!("index:{id}")
}

fn foreign_key_key(id: u64) -> String {
    format!("fk:{id}")
}

impl CatalogRows {
    /// Build and validate the graph. Parents must precede their children's
    /// references; a row pointing at a missing parent fails with
    /// [`LoadError::Graph`].
    pub fn into_graph(self) -> Result<CatalogGraph, LoadError> {
        let mut graph = CatalogGraph::new();

        for row in self.databases {
            graph.add_node(database_key(row.id), Database { name: row.name }.into())?;
        }
        for row in self.schemas {
            let parent = graph.lookup(&database_key(row.database_id))?;
            let node = graph.add_node(schema_key(row.id), Schema { name: row.name }.into())?;
            graph.add_edge(parent, node)?;
        }
        for row in self.tables {
            let parent = graph.lookup(&schema_key(row.schema_id))?;
            let node = graph.add_node(table_key(row.id), Table { name: row.name }.into())?;
            graph.add_edge(parent, node)?;
        }
        for row in self.columns {
            let parent = graph.lookup(&table_key(row.table_id))?;
            let node = graph.add_node(column_key(row.id), Column { name: row.name }.into())?;
            graph.add_edge(parent, node)?;
        }
        for row in self.indexes {
            let parent = graph.lookup(&table_key(row.table_id))?;
            let index = Index {
                name: row.name,
                unique: row.unique,
            };
            let node = graph.add_node(index_key(row.id), index.into())?;
            graph.add_edge(parent, node)?;
        }
        for row in self.index_columns {
            let index = graph.lookup(&index_key(row.index_id))?;
            let column = graph.lookup(&column_key(row.column_id))?;
            graph.add_edge(index, column)?;
        }
        for row in self.foreign_keys {
            let to = graph.lookup(&column_key(row.to_column_id))?;
            let from = graph.lookup(&column_key(row.from_column_id))?;
            let node = graph.add_node(
                foreign_key_key(row.id),
                ForeignKeyConstraint { name: row.name }.into(),
            )?;
            graph.add_edge(node, to)?;
            graph.add_edge(node, from)?;
        }

        validate(&graph)?;
        Ok(graph)
    }
}
