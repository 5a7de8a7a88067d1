//! In-memory reference catalog.
//!
//! [`MemoryCatalog`] keeps catalog rows in id-keyed maps behind a mutex and
//! applies commands with the semantics of a relational engine: every database
//! starts with a `public` schema, drops of containers cascade, sibling names
//! are unique, a foreign key must reference a column backed by a unique
//! single-column index, and dropping that index drops the dependent
//! constraints. Snapshots list rows by name descending (ties broken by
//! qualified name) so two catalogs with equal content produce equal
//! comparable forms.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::catalog::{
    CatalogGraph, CatalogRef, Column, Database, ForeignKeyConstraint, Index, Schema, Table,
    PUBLIC_SCHEMA,
};
use crate::command::Command;
use crate::error::SystemError;
use crate::loader::{
    CatalogRows, ColumnRow, DatabaseRow, ForeignKeyRow, IndexColumnRow, IndexRow, SchemaRow,
    TableRow,
};
use crate::system::System;

/// Databases every new catalog is seeded with.
pub const SEED_DATABASES: [&str; 2] = ["defaultdb", "postgres"];

type Id = u64;

#[derive(Debug, Clone)]
struct DatabaseRecord {
    name: String,
}

#[derive(Debug, Clone)]
struct SchemaRecord {
    database: Id,
    name: String,
}

#[derive(Debug, Clone)]
struct TableRecord {
    schema: Id,
    name: String,
}

#[derive(Debug, Clone)]
struct ColumnRecord {
    table: Id,
    name: String,
    nullable: bool,
}

#[derive(Debug, Clone)]
struct IndexRecord {
    table: Id,
    name: String,
    unique: bool,
    columns: Vec<Id>,
}

#[derive(Debug, Clone)]
struct ForeignKeyRecord {
    name: String,
    from: Id,
    to: Id,
}

#[derive(Debug, Default)]
struct Store {
    next_id: Id,
    databases: BTreeMap<Id, DatabaseRecord>,
    schemas: BTreeMap<Id, SchemaRecord>,
    tables: BTreeMap<Id, TableRecord>,
    columns: BTreeMap<Id, ColumnRecord>,
    indexes: BTreeMap<Id, IndexRecord>,
    foreign_keys: BTreeMap<Id, ForeignKeyRecord>,
}

fn rejected(kind: &str, name: &str, reason: &str) -> SystemError {
    SystemError::Rejected(format!("{kind} {name:?} {reason}"))
}

fn ensure_free(kind: &str, name: &str, taken: bool) -> Result<(), SystemError> {
    if taken {
        return Err(rejected(kind, name, "already exists"));
    }
    Ok(())
}

/// Ids of the entries ordered by name descending, then qualified name.
fn snapshot_order(mut entries: Vec<(Id, String, String)>) -> Vec<Id> {
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    entries.into_iter().map(|(id, _, _)| id).collect()
}

impl Store {
    fn alloc(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    // Lookups by name under a parent.

    fn find_database(&self, name: &str) -> Option<Id> {
        self.databases
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| *id)
    }

    fn find_schema(&self, database: Id, name: &str) -> Option<Id> {
        self.schemas
            .iter()
            .find(|(_, r)| r.database == database && r.name == name)
            .map(|(id, _)| *id)
    }

    fn find_table(&self, schema: Id, name: &str) -> Option<Id> {
        self.tables
            .iter()
            .find(|(_, r)| r.schema == schema && r.name == name)
            .map(|(id, _)| *id)
    }

    fn find_column(&self, table: Id, name: &str) -> Option<Id> {
        self.columns
            .iter()
            .find(|(_, r)| r.table == table && r.name == name)
            .map(|(id, _)| *id)
    }

    fn find_index(&self, table: Id, name: &str) -> Option<Id> {
        self.indexes
            .iter()
            .find(|(_, r)| r.table == table && r.name == name)
            .map(|(id, _)| *id)
    }

    fn find_foreign_key(&self, table: Id, name: &str) -> Option<Id> {
        self.foreign_keys
            .iter()
            .find(|(_, r)| r.name == name && self.column_table(r.from) == Some(table))
            .map(|(id, _)| *id)
    }

    fn column_table(&self, column: Id) -> Option<Id> {
        self.columns.get(&column).map(|r| r.table)
    }

    fn table_database(&self, table: Id) -> Option<Id> {
        let schema = self.tables.get(&table)?.schema;
        self.schemas.get(&schema).map(|r| r.database)
    }

    // Resolution of command targets.

    fn database(&self, node: &CatalogRef<'_, Database>) -> Result<Id, SystemError> {
        self.find_database(&node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn()))
    }

    fn schema(&self, node: &CatalogRef<'_, Schema>) -> Result<Id, SystemError> {
        let database = self.database(&node.database()?)?;
        self.find_schema(database, &node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn().unwrap_or_default()))
    }

    fn table(&self, node: &CatalogRef<'_, Table>) -> Result<Id, SystemError> {
        let schema = self.schema(&node.schema()?)?;
        self.find_table(schema, &node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn().unwrap_or_default()))
    }

    fn column(&self, node: &CatalogRef<'_, Column>) -> Result<Id, SystemError> {
        let table = self.table(&node.table()?)?;
        self.find_column(table, &node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn().unwrap_or_default()))
    }

    fn index(&self, node: &CatalogRef<'_, Index>) -> Result<Id, SystemError> {
        let table = self.table(&node.table()?)?;
        self.find_index(table, &node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn().unwrap_or_default()))
    }

    fn foreign_key(
        &self,
        node: &CatalogRef<'_, ForeignKeyConstraint>,
    ) -> Result<Id, SystemError> {
        let table = self.table(&node.from()?.table()?)?;
        self.find_foreign_key(table, &node.name)
            .ok_or_else(|| SystemError::UnknownObject(node.fqn().unwrap_or_default()))
    }

    // Mutations.

    fn create_database(&mut self, name: &str) -> Result<(), SystemError> {
        ensure_free("database", name, self.find_database(name).is_some())?;
        let id = self.alloc();
        self.databases.insert(
            id,
            DatabaseRecord {
                name: name.to_string(),
            },
        );
        self.create_schema(id, PUBLIC_SCHEMA)
    }

    fn create_schema(&mut self, database: Id, name: &str) -> Result<(), SystemError> {
        ensure_free("schema", name, self.find_schema(database, name).is_some())?;
        let id = self.alloc();
        self.schemas.insert(
            id,
            SchemaRecord {
                database,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    fn create_table(&mut self, schema: Id, name: &str) -> Result<(), SystemError> {
        ensure_free("table", name, self.find_table(schema, name).is_some())?;
        let id = self.alloc();
        self.tables.insert(
            id,
            TableRecord {
                schema,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    fn add_column(&mut self, table: Id, name: &str, nullable: bool) -> Result<(), SystemError> {
        ensure_free("column", name, self.find_column(table, name).is_some())?;
        let id = self.alloc();
        self.columns.insert(
            id,
            ColumnRecord {
                table,
                name: name.to_string(),
                nullable,
            },
        );
        Ok(())
    }

    fn create_index(
        &mut self,
        table: Id,
        columns: Vec<Id>,
        name: &str,
        unique: bool,
    ) -> Result<(), SystemError> {
        ensure_free("index", name, self.find_index(table, name).is_some())?;
        if columns.is_empty() {
            return Err(rejected("index", name, "has no columns"));
        }
        for (position, column) in columns.iter().enumerate() {
            if self.column_table(*column) != Some(table) {
                return Err(rejected("index", name, "references a column of another table"));
            }
            if columns[..position].contains(column) {
                return Err(rejected("index", name, "lists a column twice"));
            }
        }
        let id = self.alloc();
        self.indexes.insert(
            id,
            IndexRecord {
                table,
                name: name.to_string(),
                unique,
                columns,
            },
        );
        Ok(())
    }

    fn uniquely_indexed(&self, column: Id) -> bool {
        self.indexes
            .values()
            .any(|index| index.unique && index.columns == [column])
    }

    fn create_foreign_key(&mut self, from: Id, to: Id, name: &str) -> Result<(), SystemError> {
        let from_table = self
            .column_table(from)
            .ok_or_else(|| SystemError::UnknownObject(format!("column {from}")))?;
        let to_table = self
            .column_table(to)
            .ok_or_else(|| SystemError::UnknownObject(format!("column {to}")))?;
        ensure_free(
            "constraint",
            name,
            self.find_foreign_key(from_table, name).is_some(),
        )?;
        if self.table_database(from_table) != self.table_database(to_table) {
            return Err(rejected("constraint", name, "crosses databases"));
        }
        if !self.uniquely_indexed(to) {
            return Err(rejected(
                "constraint",
                name,
                "references a column without a unique index",
            ));
        }
        let id = self.alloc();
        self.foreign_keys.insert(
            id,
            ForeignKeyRecord {
                name: name.to_string(),
                from,
                to,
            },
        );
        Ok(())
    }

    fn drop_database(&mut self, database: Id) {
        let schemas: Vec<Id> = self
            .schemas
            .iter()
            .filter(|(_, r)| r.database == database)
            .map(|(id, _)| *id)
            .collect();
        for schema in schemas {
            self.drop_schema(schema);
        }
        self.databases.remove(&database);
    }

    fn drop_schema(&mut self, schema: Id) {
        let tables: Vec<Id> = self
            .tables
            .iter()
            .filter(|(_, r)| r.schema == schema)
            .map(|(id, _)| *id)
            .collect();
        for table in tables {
            self.drop_table(table);
        }
        self.schemas.remove(&schema);
    }

    fn drop_table(&mut self, table: Id) {
        let columns: Vec<Id> = self
            .columns
            .iter()
            .filter(|(_, r)| r.table == table)
            .map(|(id, _)| *id)
            .collect();
        self.foreign_keys
            .retain(|_, fk| !columns.contains(&fk.from) && !columns.contains(&fk.to));
        self.indexes.retain(|_, index| index.table != table);
        self.columns.retain(|_, column| column.table != table);
        self.tables.remove(&table);
    }

    fn drop_column(&mut self, column: Id) -> Result<(), SystemError> {
        let name = self
            .columns
            .get(&column)
            .map(|r| r.name.clone())
            .unwrap_or_default();
        if self.indexes.values().any(|i| i.columns.contains(&column)) {
            return Err(rejected("column", &name, "is indexed"));
        }
        if self
            .foreign_keys
            .values()
            .any(|fk| fk.from == column || fk.to == column)
        {
            return Err(rejected("column", &name, "is part of a foreign key"));
        }
        self.columns.remove(&column);
        Ok(())
    }

    fn drop_index(&mut self, index: Id) {
        self.indexes.remove(&index);
        let orphaned: Vec<Id> = self
            .foreign_keys
            .iter()
            .filter(|(_, fk)| !self.uniquely_indexed(fk.to))
            .map(|(id, _)| *id)
            .collect();
        for fk in orphaned {
            tracing::debug!(constraint = fk, "dropping constraint with its backing index");
            self.foreign_keys.remove(&fk);
        }
    }

    // Snapshot.

    fn schema_fqn(&self, schema: &SchemaRecord) -> String {
        let database = self
            .databases
            .get(&schema.database)
            .map(|r| r.name.as_str())
            .unwrap_or_default();
        format!("{database}.{}", schema.name)
    }

    fn table_fqn(&self, table: &TableRecord) -> String {
        let schema = self
            .schemas
            .get(&table.schema)
            .map(|r| self.schema_fqn(r))
            .unwrap_or_default();
        format!("{schema}.{}", table.name)
    }

    fn table_fqn_of(&self, table: Id) -> String {
        self.tables
            .get(&table)
            .map(|r| self.table_fqn(r))
            .unwrap_or_default()
    }

    fn rows(&self) -> CatalogRows {
        let mut rows = CatalogRows::default();

        let order = snapshot_order(
            self.databases
                .iter()
                .map(|(id, r)| (*id, r.name.clone(), r.name.clone()))
                .collect(),
        );
        for id in order {
            rows.databases.push(DatabaseRow {
                id,
                name: self.databases[&id].name.clone(),
            });
        }

        let order = snapshot_order(
            self.schemas
                .iter()
                .map(|(id, r)| (*id, r.name.clone(), self.schema_fqn(r)))
                .collect(),
        );
        for id in order {
            let r = &self.schemas[&id];
            rows.schemas.push(SchemaRow {
                id,
                database_id: r.database,
                name: r.name.clone(),
            });
        }

        let order = snapshot_order(
            self.tables
                .iter()
                .map(|(id, r)| (*id, r.name.clone(), self.table_fqn(r)))
                .collect(),
        );
        for id in order {
            let r = &self.tables[&id];
            rows.tables.push(TableRow {
                id,
                schema_id: r.schema,
                name: r.name.clone(),
            });
        }

        let order = snapshot_order(
            self.columns
                .iter()
                .map(|(id, r)| {
                    let fqn = format!("{}.cols.{}", self.table_fqn_of(r.table), r.name);
                    (*id, r.name.clone(), fqn)
                })
                .collect(),
        );
        for id in order {
            let r = &self.columns[&id];
            rows.columns.push(ColumnRow {
                id,
                table_id: r.table,
                name: r.name.clone(),
                nullable: r.nullable,
            });
        }

        let order = snapshot_order(
            self.indexes
                .iter()
                .map(|(id, r)| {
                    let fqn = format!("{}.idxs.{}", self.table_fqn_of(r.table), r.name);
                    (*id, r.name.clone(), fqn)
                })
                .collect(),
        );
        for id in order {
            let r = &self.indexes[&id];
            rows.indexes.push(IndexRow {
                id,
                table_id: r.table,
                name: r.name.clone(),
                unique: r.unique,
            });
            rows.index_columns
                .extend(r.columns.iter().map(|column| IndexColumnRow {
                    index_id: id,
                    column_id: *column,
                }));
        }

        let order = snapshot_order(
            self.foreign_keys
                .iter()
                .map(|(id, r)| {
                    let table = self.column_table(r.from).unwrap_or_default();
                    let fqn = format!("{}.fks.{}", self.table_fqn_of(table), r.name);
                    (*id, r.name.clone(), fqn)
                })
                .collect(),
        );
        for id in order {
            let r = &self.foreign_keys[&id];
            rows.foreign_keys.push(ForeignKeyRow {
                id,
                name: r.name.clone(),
                from_column_id: r.from,
                to_column_id: r.to,
            });
        }

        rows
    }
}

/// A [`System`] keeping its catalog in memory.
#[derive(Debug)]
pub struct MemoryCatalog {
    name: String,
    store: Mutex<Store>,
}

impl MemoryCatalog {
    /// A catalog holding the seed databases, each with its `public` schema.
    pub fn new(name: impl Into<String>) -> Result<Self, SystemError> {
        let catalog = Self::empty(name);
        {
            let mut store = catalog.store.lock();
            for database in SEED_DATABASES {
                store.create_database(database)?;
            }
        }
        Ok(catalog)
    }

    /// A catalog without any database.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: Mutex::new(Store::default()),
        }
    }

    /// The rows the next snapshot is built from.
    pub fn rows(&self) -> CatalogRows {
        self.store.lock().rows()
    }
}

impl System for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, command: &Command<'_>) -> Result<(), SystemError> {
        tracing::debug!(system = %self.name, %command, "execute");
        let mut store = self.store.lock();
        match command {
            Command::CreateDatabase { name } => store.create_database(name),
            Command::RenameDatabase { database, name } => {
                let id = store.database(database)?;
                ensure_free("database", name, store.find_database(name).is_some())?;
                if let Some(record) = store.databases.get_mut(&id) {
                    record.name = name.clone();
                }
                Ok(())
            }
            Command::DropDatabase { database } => {
                let id = store.database(database)?;
                store.drop_database(id);
                Ok(())
            }
            Command::CreateSchema { database, name } => {
                let id = store.database(database)?;
                store.create_schema(id, name)
            }
            Command::RenameSchema { schema, name } => {
                let id = store.schema(schema)?;
                let parent = store.schemas[&id].database;
                ensure_free("schema", name, store.find_schema(parent, name).is_some())?;
                if let Some(record) = store.schemas.get_mut(&id) {
                    record.name = name.clone();
                }
                Ok(())
            }
            Command::DropSchema { schema } => {
                let id = store.schema(schema)?;
                store.drop_schema(id);
                Ok(())
            }
            Command::CreateTable { schema, name } => {
                let id = store.schema(schema)?;
                store.create_table(id, name)
            }
            Command::RenameTable { table, name } => {
                let id = store.table(table)?;
                let parent = store.tables[&id].schema;
                ensure_free("table", name, store.find_table(parent, name).is_some())?;
                if let Some(record) = store.tables.get_mut(&id) {
                    record.name = name.clone();
                }
                Ok(())
            }
            Command::DropTable { table } => {
                let id = store.table(table)?;
                store.drop_table(id);
                Ok(())
            }
            Command::AddColumn {
                table,
                name,
                nullable,
            } => {
                let id = store.table(table)?;
                store.add_column(id, name, *nullable)
            }
            Command::DropColumn { column } => {
                let id = store.column(column)?;
                store.drop_column(id)
            }
            Command::CreateIndex {
                table,
                columns,
                name,
                unique,
            } => {
                let id = store.table(table)?;
                let columns = columns
                    .iter()
                    .map(|column| store.column(column))
                    .collect::<Result<Vec<_>, _>>()?;
                store.create_index(id, columns, name, *unique)
            }
            Command::DropIndex { index } => {
                let id = store.index(index)?;
                store.drop_index(id);
                Ok(())
            }
            Command::CreateForeignKeyConstraint { from, to, name } => {
                let from = store.column(from)?;
                let to = store.column(to)?;
                store.create_foreign_key(from, to, name)
            }
            Command::DropForeignKeyConstraint { constraint } => {
                let id = store.foreign_key(constraint)?;
                store.foreign_keys.remove(&id);
                Ok(())
            }
        }
    }

    fn state(&self) -> Result<CatalogGraph, SystemError> {
        let rows = self.rows();
        Ok(rows.into_graph()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogNode;
    use crate::graph::Kind;

    fn names<T: Kind<CatalogNode> + AsRef<str>>(graph: &CatalogGraph) -> Vec<String> {
        graph
            .nodes::<T>()
            .iter()
            .map(|r| r.value().as_ref().to_string())
            .collect()
    }

    #[test]
    fn test_seeded() {
        let catalog = MemoryCatalog::new("oracle").unwrap();
        let state = catalog.state().unwrap();
        assert_eq!(names::<Database>(&state), vec!["postgres", "defaultdb"]);
        assert_eq!(names::<Schema>(&state), vec!["public", "public"]);
        assert!(state.nodes::<Table>().is_empty());
    }

    #[test]
    fn test_duplicate_database_rejected() {
        let catalog = MemoryCatalog::new("oracle").unwrap();
        let err = catalog
            .execute(&Command::CreateDatabase {
                name: "postgres".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SystemError::Rejected(_)));
    }

    #[test]
    fn test_unknown_target() {
        let catalog = MemoryCatalog::new("oracle").unwrap();
        let other = MemoryCatalog::empty("other");
        other
            .execute(&Command::CreateDatabase { name: "x".into() })
            .unwrap();
        let state = other.state().unwrap();
        let x = state.nodes::<Database>().one().unwrap();
        let err = catalog
            .execute(&Command::DropDatabase { database: x })
            .unwrap_err();
        assert!(matches!(err, SystemError::UnknownObject(ref name) if name == "x"));
    }

    #[test]
    fn test_drop_database_cascades() {
        let catalog = MemoryCatalog::new("oracle").unwrap();
        {
            let state = catalog.state().unwrap();
            let public = state
                .nodes::<Schema>()
                .filter(|s| s.database().is_ok_and(|d| d.name == "postgres"))
                .one()
                .unwrap();
            catalog
                .execute(&Command::CreateTable {
                    schema: public,
                    name: "t".into(),
                })
                .unwrap();
        }
        {
            let state = catalog.state().unwrap();
            let table = state.nodes::<Table>().one().unwrap();
            catalog
                .execute(&Command::AddColumn {
                    table,
                    name: "a".into(),
                    nullable: true,
                })
                .unwrap();
        }
        let state = catalog.state().unwrap();
        let postgres = state
            .nodes::<Database>()
            .filter(|d| d.name == "postgres")
            .one()
            .unwrap();
        catalog
            .execute(&Command::DropDatabase { database: postgres })
            .unwrap();

        let state = catalog.state().unwrap();
        assert_eq!(names::<Database>(&state), vec!["defaultdb"]);
        assert_eq!(state.len(), 2);
        assert!(state.nodes::<Column>().is_empty());
        assert!(catalog.rows().columns.is_empty());
    }

    #[test]
    fn test_rows_carry_nullability() {
        let catalog = MemoryCatalog::new("oracle").unwrap();
        {
            let state = catalog.state().unwrap();
            let public = state
                .nodes::<Schema>()
                .filter(|s| s.database().is_ok_and(|d| d.name == "defaultdb"))
                .one()
                .unwrap();
            catalog
                .execute(&Command::CreateTable {
                    schema: public,
                    name: "t".into(),
                })
                .unwrap();
        }
        for (name, nullable) in [("a", true), ("b", false)] {
            let state = catalog.state().unwrap();
            let table = state.nodes::<Table>().one().unwrap();
            catalog
                .execute(&Command::AddColumn {
                    table,
                    name: name.into(),
                    nullable,
                })
                .unwrap();
        }

        let columns: Vec<(String, bool)> = catalog
            .rows()
            .columns
            .into_iter()
            .map(|row| (row.name, row.nullable))
            .collect();
        assert_eq!(columns, vec![("b".into(), false), ("a".into(), true)]);
    }
}
