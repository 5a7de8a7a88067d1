//! Rendering commands as statements.

use crate::catalog::{CatalogRef, Schema, Table};
use crate::command::Command;
use crate::error::SelectionError;

/// Turns a command into the statement a backend executes.
pub trait Translate {
    fn translate(&self, command: &Command<'_>) -> Result<String, SelectionError>;
}

/// Schema-definition statements with quoted identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ddl;

/// `name` as a quoted identifier.
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn schema_name(schema: &CatalogRef<'_, Schema>) -> Result<String, SelectionError> {
    Ok(format!(
        "{}.{}",
        quote(&schema.database()?.name),
        quote(&schema.name)
    ))
}

fn table_name(table: &CatalogRef<'_, Table>) -> Result<String, SelectionError> {
    Ok(format!("{}.{}", schema_name(&table.schema()?)?, quote(&table.name)))
}

impl Translate for Ddl {
    fn translate(&self, command: &Command<'_>) -> Result<String, SelectionError> {
        let statement = match command {
            Command::CreateDatabase { name } => format!("CREATE DATABASE {}", quote(name)),
            Command::RenameDatabase { database, name } => format!(
                "ALTER DATABASE {} RENAME TO {}",
                quote(&database.name),
                quote(name)
            ),
            Command::DropDatabase { database } => {
                format!("DROP DATABASE {} CASCADE", quote(&database.name))
            }
            Command::CreateSchema { database, name } => format!(
                "CREATE SCHEMA {}.{}",
                quote(&database.name),
                quote(name)
            ),
            Command::RenameSchema { schema, name } => format!(
                "ALTER SCHEMA {} RENAME TO {}",
                schema_name(schema)?,
                quote(name)
            ),
            Command::DropSchema { schema } => {
                format!("DROP SCHEMA {} CASCADE", schema_name(schema)?)
            }
            Command::CreateTable { schema, name } => {
                format!("CREATE TABLE {}.{} ()", schema_name(schema)?, quote(name))
            }
            Command::RenameTable { table, name } => format!(
                "ALTER TABLE {} RENAME TO {}",
                table_name(table)?,
                quote(name)
            ),
            Command::DropTable { table } => format!("DROP TABLE {} CASCADE", table_name(table)?),
            Command::AddColumn {
                table,
                name,
                nullable,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT {}",
                table_name(table)?,
                quote(name),
                if *nullable { "NULL" } else { "NOT NULL" }
            ),
            Command::DropColumn { column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table_name(&column.table()?)?,
                quote(&column.name)
            ),
            Command::CreateIndex {
                table,
                columns,
                name,
                unique,
            } => {
                let columns: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if *unique { "UNIQUE " } else { "" },
                    quote(name),
                    table_name(table)?,
                    columns.join(", ")
                )
            }
            Command::DropIndex { index } => format!(
                "DROP INDEX {}@{} CASCADE",
                table_name(&index.table()?)?,
                quote(&index.name)
            ),
            Command::CreateForeignKeyConstraint { from, to, name } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                table_name(&from.table()?)?,
                quote(name),
                quote(&from.name),
                table_name(&to.table()?)?,
                quote(&to.name)
            ),
            Command::DropForeignKeyConstraint { constraint } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                table_name(&constraint.from()?.table()?)?,
                quote(&constraint.name)
            ),
        };
        Ok(statement)
    }
}
