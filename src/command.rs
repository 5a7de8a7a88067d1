//! The schema-mutation command vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{
    CatalogRef, Column, Database, ForeignKeyConstraint, Index, Schema, Table,
};
use crate::error::SelectionError;

/// Discriminant of a [`Command`], used for weights and reporting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateDatabase,
    RenameDatabase,
    DropDatabase,
    CreateSchema,
    RenameSchema,
    DropSchema,
    CreateTable,
    RenameTable,
    DropTable,
    AddColumn,
    DropColumn,
    CreateIndex,
    DropIndex,
    CreateForeignKeyConstraint,
    DropForeignKeyConstraint,
}

impl CommandKind {
    pub const ALL: [CommandKind; 15] = [
        CommandKind::CreateDatabase,
        CommandKind::RenameDatabase,
        CommandKind::DropDatabase,
        CommandKind::CreateSchema,
        CommandKind::RenameSchema,
        CommandKind::DropSchema,
        CommandKind::CreateTable,
        CommandKind::RenameTable,
        CommandKind::DropTable,
        CommandKind::AddColumn,
        CommandKind::DropColumn,
        CommandKind::CreateIndex,
        CommandKind::DropIndex,
        CommandKind::CreateForeignKeyConstraint,
        CommandKind::DropForeignKeyConstraint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::CreateDatabase => "CreateDatabase",
            CommandKind::RenameDatabase => "RenameDatabase",
            CommandKind::DropDatabase => "DropDatabase",
            CommandKind::CreateSchema => "CreateSchema",
            CommandKind::RenameSchema => "RenameSchema",
            CommandKind::DropSchema => "DropSchema",
            CommandKind::CreateTable => "CreateTable",
            CommandKind::RenameTable => "RenameTable",
            CommandKind::DropTable => "DropTable",
            CommandKind::AddColumn => "AddColumn",
            CommandKind::DropColumn => "DropColumn",
            CommandKind::CreateIndex => "CreateIndex",
            CommandKind::DropIndex => "DropIndex",
            CommandKind::CreateForeignKeyConstraint => "CreateForeignKeyConstraint",
            CommandKind::DropForeignKeyConstraint => "DropForeignKeyConstraint",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A schema mutation whose targets are nodes of the graph `'g` it was
/// generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'g> {
    CreateDatabase {
        name: String,
    },
    RenameDatabase {
        database: CatalogRef<'g, Database>,
        name: String,
    },
    DropDatabase {
        database: CatalogRef<'g, Database>,
    },
    CreateSchema {
        database: CatalogRef<'g, Database>,
        name: String,
    },
    RenameSchema {
        schema: CatalogRef<'g, Schema>,
        name: String,
    },
    DropSchema {
        schema: CatalogRef<'g, Schema>,
    },
    CreateTable {
        schema: CatalogRef<'g, Schema>,
        name: String,
    },
    RenameTable {
        table: CatalogRef<'g, Table>,
        name: String,
    },
    DropTable {
        table: CatalogRef<'g, Table>,
    },
    AddColumn {
        table: CatalogRef<'g, Table>,
        name: String,
        nullable: bool,
    },
    DropColumn {
        column: CatalogRef<'g, Column>,
    },
    CreateIndex {
        table: CatalogRef<'g, Table>,
        columns: Vec<CatalogRef<'g, Column>>,
        name: String,
        unique: bool,
    },
    DropIndex {
        index: CatalogRef<'g, Index>,
    },
    CreateForeignKeyConstraint {
        from: CatalogRef<'g, Column>,
        to: CatalogRef<'g, Column>,
        name: String,
    },
    DropForeignKeyConstraint {
        constraint: CatalogRef<'g, ForeignKeyConstraint>,
    },
}

impl<'g> Command<'g> {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateDatabase { .. } => CommandKind::CreateDatabase,
            Command::RenameDatabase { .. } => CommandKind::RenameDatabase,
            Command::DropDatabase { .. } => CommandKind::DropDatabase,
            Command::CreateSchema { .. } => CommandKind::CreateSchema,
            Command::RenameSchema { .. } => CommandKind::RenameSchema,
            Command::DropSchema { .. } => CommandKind::DropSchema,
            Command::CreateTable { .. } => CommandKind::CreateTable,
            Command::RenameTable { .. } => CommandKind::RenameTable,
            Command::DropTable { .. } => CommandKind::DropTable,
            Command::AddColumn { .. } => CommandKind::AddColumn,
            Command::DropColumn { .. } => CommandKind::DropColumn,
            Command::CreateIndex { .. } => CommandKind::CreateIndex,
            Command::DropIndex { .. } => CommandKind::DropIndex,
            Command::CreateForeignKeyConstraint { .. } => CommandKind::CreateForeignKeyConstraint,
            Command::DropForeignKeyConstraint { .. } => CommandKind::DropForeignKeyConstraint,
        }
    }
}

/// Writes `field: value` pairs after the kind name.
struct Fields<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    first: bool,
}

impl<'a, 'b> Fields<'a, 'b> {
    fn start(f: &'a mut fmt::Formatter<'b>, kind: CommandKind) -> Result<Self, fmt::Error> {
        write!(f, "{kind}{{")?;
        Ok(Self { f, first: true })
    }

    fn field(&mut self, name: &str, value: impl fmt::Display) -> Result<&mut Self, fmt::Error> {
        if !self.first {
            self.f.write_str(", ")?;
        }
        self.first = false;
        write!(self.f, "{name}: {value}")?;
        Ok(self)
    }

    fn text(&mut self, name: &str, value: &str) -> Result<&mut Self, fmt::Error> {
        self.field(name, format_args!("{value:?}"))
    }

    fn node(
        &mut self,
        name: &str,
        fqn: Result<String, SelectionError>,
    ) -> Result<&mut Self, fmt::Error> {
        match fqn {
            Ok(fqn) => self.text(name, &fqn),
            Err(_) => self.field(name, "<detached>"),
        }
    }

    fn finish(&mut self) -> fmt::Result {
        self.f.write_str("}")
    }
}

impl<'g> fmt::Display for Command<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Fields::start(f, self.kind())?;
        match self {
            Command::CreateDatabase { name } => out.text("name", name)?,
            Command::RenameDatabase { database, name } => out
                .node("database", Ok(database.fqn()))?
                .text("name", name)?,
            Command::DropDatabase { database } => out.node("database", Ok(database.fqn()))?,
            Command::CreateSchema { database, name } => out
                .node("database", Ok(database.fqn()))?
                .text("name", name)?,
            Command::RenameSchema { schema, name } => {
                out.node("schema", schema.fqn())?.text("name", name)?
            }
            Command::DropSchema { schema } => out.node("schema", schema.fqn())?,
            Command::CreateTable { schema, name } => {
                out.node("schema", schema.fqn())?.text("name", name)?
            }
            Command::RenameTable { table, name } => {
                out.node("table", table.fqn())?.text("name", name)?
            }
            Command::DropTable { table } => out.node("table", table.fqn())?,
            Command::AddColumn {
                table,
                name,
                nullable,
            } => out
                .node("table", table.fqn())?
                .text("name", name)?
                .field("nullable", nullable)?,
            Command::DropColumn { column } => out.node("column", column.fqn())?,
            Command::CreateIndex {
                table,
                columns,
                name,
                unique,
            } => {
                let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                out.node("table", table.fqn())?
                    .field("columns", format_args!("{names:?}"))?
                    .text("name", name)?
                    .field("unique", unique)?
            }
            Command::DropIndex { index } => out.node("index", index.fqn())?,
            Command::CreateForeignKeyConstraint { from, to, name } => out
                .node("from", from.fqn())?
                .node("to", to.fqn())?
                .text("name", name)?,
            Command::DropForeignKeyConstraint { constraint } => {
                out.node("constraint", constraint.fqn())?
            }
        };
        out.finish()
    }
}
