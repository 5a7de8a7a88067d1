//! Weighted, constraint-aware random command generation.
//!
//! A generation step builds a candidate pool in which every command kind
//! appears as many times as its weight, shuffles it, and walks it asking a
//! [`Construct`] implementation for a command of each kind in turn. A
//! constructor returns `None` when the graph offers no valid target for its
//! kind; the walk stops at the first command produced or after
//! `max_attempts` tries.

use crate::catalog::{
    CatalogGraph, CatalogRef, CatalogSelection, Column, Database, ForeignKeyConstraint, Index,
    Schema, Table, PUBLIC_SCHEMA,
};
use crate::command::{Command, CommandKind};
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::names::fresh_name;
use rand::seq::SliceRandom;
use rand::Rng;

/// Builds a command of a requested kind against a graph.
pub trait Construct {
    /// Returns `None` when `kind` is infeasible on `graph`.
    fn construct<'g, R: Rng + ?Sized>(
        &self,
        kind: CommandKind,
        graph: &'g CatalogGraph,
        rng: &mut R,
    ) -> Option<Command<'g>>;
}

impl<C: Construct + ?Sized> Construct for &C {
    fn construct<'g, R: Rng + ?Sized>(
        &self,
        kind: CommandKind,
        graph: &'g CatalogGraph,
        rng: &mut R,
    ) -> Option<Command<'g>> {
        (**self).construct(kind, graph, rng)
    }
}

/// Constructors for every [`CommandKind`] over a catalog graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogConstructors;

impl Construct for CatalogConstructors {
    fn construct<'g, R: Rng + ?Sized>(
        &self,
        kind: CommandKind,
        graph: &'g CatalogGraph,
        rng: &mut R,
    ) -> Option<Command<'g>> {
        match kind {
            CommandKind::CreateDatabase => create_database(graph, rng),
            CommandKind::RenameDatabase => rename_database(graph, rng),
            CommandKind::DropDatabase => drop_database(graph, rng),
            CommandKind::CreateSchema => create_schema(graph, rng),
            CommandKind::RenameSchema => rename_schema(graph, rng),
            CommandKind::DropSchema => drop_schema(graph, rng),
            CommandKind::CreateTable => create_table(graph, rng),
            CommandKind::RenameTable => rename_table(graph, rng),
            CommandKind::DropTable => drop_table(graph, rng),
            CommandKind::AddColumn => add_column(graph, rng),
            CommandKind::DropColumn => drop_column(graph, rng),
            CommandKind::CreateIndex => create_index(graph, rng),
            CommandKind::DropIndex => drop_index(graph, rng),
            CommandKind::CreateForeignKeyConstraint => create_foreign_key(graph, rng),
            CommandKind::DropForeignKeyConstraint => drop_foreign_key(graph, rng),
        }
    }
}

fn names<'g, T: AsRef<str>>(selection: &CatalogSelection<'g, T>) -> Vec<&'g str> {
    selection.iter().map(|r| r.value().as_ref()).collect()
}

fn create_database<'g, R: Rng + ?Sized>(
    graph: &'g CatalogGraph,
    rng: &mut R,
) -> Option<Command<'g>> {
    let taken = graph.nodes::<Database>();
    let name = fresh_name(rng, names(&taken))?;
    Some(Command::CreateDatabase { name })
}

fn rename_database<'g, R: Rng + ?Sized>(
    graph: &'g CatalogGraph,
    rng: &mut R,
) -> Option<Command<'g>> {
    let databases = graph.nodes::<Database>();
    let database = databases.any(rng).ok()?;
    let name = fresh_name(rng, names(&databases))?;
    Some(Command::RenameDatabase { database, name })
}

fn drop_database<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let database = graph.any::<Database, _>(rng).ok()?;
    Some(Command::DropDatabase { database })
}

fn create_schema<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let database = graph.any::<Database, _>(rng).ok()?;
    let name = fresh_name(rng, names(&database.schemas()))?;
    Some(Command::CreateSchema { database, name })
}

fn user_schemas(graph: &CatalogGraph) -> CatalogSelection<'_, Schema> {
    graph.nodes::<Schema>().filter(|s| s.name != PUBLIC_SCHEMA)
}

fn rename_schema<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let schema = user_schemas(graph).any(rng).ok()?;
    let siblings = schema.database().ok()?.schemas();
    let name = fresh_name(rng, names(&siblings))?;
    Some(Command::RenameSchema { schema, name })
}

fn drop_schema<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let schema = user_schemas(graph).any(rng).ok()?;
    Some(Command::DropSchema { schema })
}

fn create_table<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let schema = graph.any::<Schema, _>(rng).ok()?;
    let name = fresh_name(rng, names(&schema.tables()))?;
    Some(Command::CreateTable { schema, name })
}

fn rename_table<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let table = graph.any::<Table, _>(rng).ok()?;
    let siblings = table.schema().ok()?.tables();
    let name = fresh_name(rng, names(&siblings))?;
    Some(Command::RenameTable { table, name })
}

fn drop_table<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let table = graph
        .nodes::<Table>()
        .filter(|t| t.referencing_foreign_keys().is_empty())
        .any(rng)
        .ok()?;
    Some(Command::DropTable { table })
}

fn add_column<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let table = graph.any::<Table, _>(rng).ok()?;
    let name = fresh_name(rng, names(&table.columns()))?;
    Some(Command::AddColumn {
        table,
        name,
        nullable: rng.gen(),
    })
}

fn drop_column<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let column = graph
        .nodes::<Column>()
        .filter(|c| c.indexes().is_empty())
        .filter(|c| c.incoming::<ForeignKeyConstraint>().is_empty())
        .any(rng)
        .ok()?;
    Some(Command::DropColumn { column })
}

fn create_index<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let table = graph
        .nodes::<Table>()
        .filter(|t| t.columns().len() > 1)
        .any(rng)
        .ok()?;
    let candidates = table.columns();
    let columns = candidates.pick_between(rng, 1, candidates.len()).ok()?;
    let name = fresh_name(rng, names(&table.indexes()))?;
    Some(Command::CreateIndex {
        table,
        columns,
        name,
        unique: rng.gen(),
    })
}

/// True when dropping `index` would leave a referenced column without a
/// unique single-column index.
fn backs_foreign_key(index: &CatalogRef<'_, Index>) -> bool {
    if !index.unique {
        return false;
    }
    let Ok(column) = index.columns().one() else {
        return false;
    };
    if column.referenced_by().is_empty() {
        return false;
    }
    let backing = column
        .indexes()
        .filter(|other| other.unique && other.columns().len() == 1)
        .len();
    backing == 1
}

fn drop_index<'g, R: Rng + ?Sized>(graph: &'g CatalogGraph, rng: &mut R) -> Option<Command<'g>> {
    let index = graph
        .nodes::<Index>()
        .filter(|i| !backs_foreign_key(i))
        .any(rng)
        .ok()?;
    Some(Command::DropIndex { index })
}

/// Columns of other tables in the database of `to` that may reference it.
fn referencing_candidates<'g>(
    to: &CatalogRef<'g, Column>,
) -> Option<CatalogSelection<'g, Column>> {
    let table = to.table().ok()?;
    let database = table.database().ok()?;
    Some(
        database
            .tables()
            .filter(|other| *other != table)
            .into_iter()
            .flat_map(|other| other.columns())
            .collect(),
    )
}

fn create_foreign_key<'g, R: Rng + ?Sized>(
    graph: &'g CatalogGraph,
    rng: &mut R,
) -> Option<Command<'g>> {
    let index = graph
        .nodes::<Index>()
        .filter(|i| i.unique)
        .filter(|i| {
            i.columns()
                .one()
                .ok()
                .and_then(|to| referencing_candidates(&to))
                .is_some_and(|from| !from.is_empty())
        })
        .any(rng)
        .ok()?;
    let to = index.columns().one().ok()?;
    let from = referencing_candidates(&to)?.any(rng).ok()?;
    let name = fresh_name(rng, names(&from.table().ok()?.foreign_keys()))?;
    Some(Command::CreateForeignKeyConstraint { from, to, name })
}

fn drop_foreign_key<'g, R: Rng + ?Sized>(
    graph: &'g CatalogGraph,
    rng: &mut R,
) -> Option<Command<'g>> {
    let constraint = graph.any::<ForeignKeyConstraint, _>(rng).ok()?;
    Some(Command::DropForeignKeyConstraint { constraint })
}

/// Random command source driven by a [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct CommandGenerator<C = CatalogConstructors> {
    config: GeneratorConfig,
    constructors: C,
}

impl CommandGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_constructors(config, CatalogConstructors)
    }
}

impl Default for CommandGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl<C: Construct> CommandGenerator<C> {
    pub fn with_constructors(config: GeneratorConfig, constructors: C) -> Self {
        Self {
            config,
            constructors,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Every kind repeated by its weight, shuffled.
    pub fn candidates<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<CommandKind> {
        let mut pool: Vec<CommandKind> = CommandKind::ALL
            .iter()
            .flat_map(|&kind| std::iter::repeat(kind).take(self.config.weight(kind) as usize))
            .collect();
        pool.shuffle(rng);
        pool
    }

    /// Produce one feasible command for `graph`.
    pub fn generate<'g, R: Rng + ?Sized>(
        &self,
        graph: &'g CatalogGraph,
        rng: &mut R,
    ) -> Result<Command<'g>, GenerateError> {
        let pool = self.candidates(rng);
        if pool.is_empty() {
            return Err(GenerateError::EmptyPool);
        }

        let mut tried = Vec::with_capacity(self.config.max_attempts);
        for kind in pool.iter().cycle().take(self.config.max_attempts).copied() {
            tried.push(kind);
            let Some(command) = self.constructors.construct(kind, graph, rng) else {
                tracing::trace!(%kind, "infeasible");
                continue;
            };
            if command.kind() != kind {
                return Err(GenerateError::KindMismatch {
                    expected: kind,
                    actual: command.kind(),
                });
            }
            return Ok(command);
        }

        Err(GenerateError::NoViableCommand {
            attempts: tried.len(),
            tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{
        CatalogRows, ColumnRow, DatabaseRow, ForeignKeyRow, IndexColumnRow, IndexRow, SchemaRow,
        TableRow,
    };
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    /// Two tables in one schema: `users(id, email)` with a unique index on
    /// `id`, and `orders(user_id)`.
    fn shop_rows() -> CatalogRows {
        CatalogRows {
            databases: vec![DatabaseRow {
                id: 1,
                name: "shop".into(),
            }],
            schemas: vec![SchemaRow {
                id: 2,
                database_id: 1,
                name: PUBLIC_SCHEMA.into(),
            }],
            tables: vec![
                TableRow {
                    id: 3,
                    schema_id: 2,
                    name: "users".into(),
                },
                TableRow {
                    id: 4,
                    schema_id: 2,
                    name: "orders".into(),
                },
            ],
            columns: vec![
                ColumnRow {
                    id: 5,
                    table_id: 3,
                    name: "id".into(),
                    nullable: false,
                },
                ColumnRow {
                    id: 6,
                    table_id: 3,
                    name: "email".into(),
                    nullable: false,
                },
                ColumnRow {
                    id: 7,
                    table_id: 4,
                    name: "user_id".into(),
                    nullable: false,
                },
            ],
            indexes: vec![IndexRow {
                id: 8,
                table_id: 3,
                name: "users_id".into(),
                unique: true,
            }],
            index_columns: vec![IndexColumnRow {
                index_id: 8,
                column_id: 5,
            }],
            foreign_keys: vec![],
        }
    }

    fn shop() -> CatalogGraph {
        shop_rows().into_graph().unwrap()
    }

    fn construct(kind: CommandKind, graph: &CatalogGraph, seed: u64) -> Option<Command<'_>> {
        CatalogConstructors.construct(kind, graph, &mut SmallRng::seed_from_u64(seed))
    }

    #[test]
    fn test_every_kind_has_matching_constructor() {
        let graph = shop();
        for kind in CommandKind::ALL {
            for seed in 0..20 {
                if let Some(command) = construct(kind, &graph, seed) {
                    assert_eq!(command.kind(), kind);
                }
            }
        }
    }

    #[test]
    fn test_public_schema_is_never_targeted() {
        let graph = shop();
        for seed in 0..50 {
            assert!(construct(CommandKind::DropSchema, &graph, seed).is_none());
            assert!(construct(CommandKind::RenameSchema, &graph, seed).is_none());
        }
    }

    #[test]
    fn test_foreign_key_targets_unique_index_of_other_table() {
        let graph = shop();
        for seed in 0..50 {
            match construct(CommandKind::CreateForeignKeyConstraint, &graph, seed) {
                Some(Command::CreateForeignKeyConstraint { from, to, .. }) => {
                    assert_eq!(to.name, "id");
                    assert_eq!(from.name, "user_id");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_indexed_column_is_not_dropped() {
        let graph = shop();
        for seed in 0..50 {
            match construct(CommandKind::DropColumn, &graph, seed) {
                Some(Command::DropColumn { column }) => assert_ne!(column.name, "id"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_referenced_table_is_not_dropped() {
        let mut rows = shop_rows();
        rows.foreign_keys.push(ForeignKeyRow {
            id: 9,
            name: "orders_user".into(),
            from_column_id: 7,
            to_column_id: 5,
        });
        let graph = rows.into_graph().unwrap();
        for seed in 0..50 {
            match construct(CommandKind::DropTable, &graph, seed) {
                Some(Command::DropTable { table }) => assert_eq!(table.name, "orders"),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(construct(CommandKind::DropTable, &shop(), 0).is_some());
    }

    #[test]
    fn test_create_index_needs_two_columns() {
        let graph = shop();
        for seed in 0..50 {
            match construct(CommandKind::CreateIndex, &graph, seed) {
                Some(Command::CreateIndex { table, columns, .. }) => {
                    assert_eq!(table.name, "users");
                    assert!((1..=2).contains(&columns.len()));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_candidates_repeat_by_weight() {
        let generator = CommandGenerator::new(
            GeneratorConfig::only()
                .with_weight(CommandKind::CreateTable, 2)
                .with_weight(CommandKind::AddColumn, 3),
        );
        let mut pool = generator.candidates(&mut SmallRng::seed_from_u64(1));
        pool.sort();
        assert_eq!(
            pool,
            vec![
                CommandKind::CreateTable,
                CommandKind::CreateTable,
                CommandKind::AddColumn,
                CommandKind::AddColumn,
                CommandKind::AddColumn,
            ]
        );
    }

    #[test]
    fn test_empty_pool() {
        let generator = CommandGenerator::new(GeneratorConfig::only());
        let graph = shop();
        assert_eq!(
            generator
                .generate(&graph, &mut SmallRng::seed_from_u64(1))
                .unwrap_err(),
            GenerateError::EmptyPool
        );
    }
}
