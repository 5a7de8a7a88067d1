//! Replayable command sequences.
//!
//! A [`Command`] borrows the snapshot it was generated from, so it cannot
//! outlive a run. [`RecordedCommand`] names its targets by fully qualified
//! name instead and is resolved again against whatever snapshot a system
//! reports when the transcript is replayed.

use crate::canonical::Comparable;
use crate::catalog::{CatalogGraph, CatalogNode};
use crate::command::{Command, CommandKind};
use crate::error::{ConfigError, GraphError, SelectionError, TranscriptError};
use crate::system::System;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A [`Command`] with its targets replaced by fully qualified names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedCommand {
    CreateDatabase {
        name: String,
    },
    RenameDatabase {
        database: String,
        name: String,
    },
    DropDatabase {
        database: String,
    },
    CreateSchema {
        database: String,
        name: String,
    },
    RenameSchema {
        schema: String,
        name: String,
    },
    DropSchema {
        schema: String,
    },
    CreateTable {
        schema: String,
        name: String,
    },
    RenameTable {
        table: String,
        name: String,
    },
    DropTable {
        table: String,
    },
    AddColumn {
        table: String,
        name: String,
        nullable: bool,
    },
    DropColumn {
        column: String,
    },
    CreateIndex {
        table: String,
        columns: Vec<String>,
        name: String,
        unique: bool,
    },
    DropIndex {
        index: String,
    },
    CreateForeignKeyConstraint {
        from: String,
        to: String,
        name: String,
    },
    DropForeignKeyConstraint {
        constraint: String,
    },
}

impl RecordedCommand {
    /// Capture `command` by the qualified names of its targets.
    pub fn record(command: &Command<'_>) -> Result<Self, SelectionError> {
        Ok(match command {
            Command::CreateDatabase { name } => RecordedCommand::CreateDatabase { name: name.clone() },
            Command::RenameDatabase { database, name } => RecordedCommand::RenameDatabase {
                database: database.fqn(),
                name: name.clone(),
            },
            Command::DropDatabase { database } => RecordedCommand::DropDatabase {
                database: database.fqn(),
            },
            Command::CreateSchema { database, name } => RecordedCommand::CreateSchema {
                database: database.fqn(),
                name: name.clone(),
            },
            Command::RenameSchema { schema, name } => RecordedCommand::RenameSchema {
                schema: schema.fqn()?,
                name: name.clone(),
            },
            Command::DropSchema { schema } => RecordedCommand::DropSchema {
                schema: schema.fqn()?,
            },
            Command::CreateTable { schema, name } => RecordedCommand::CreateTable {
                schema: schema.fqn()?,
                name: name.clone(),
            },
            Command::RenameTable { table, name } => RecordedCommand::RenameTable {
                table: table.fqn()?,
                name: name.clone(),
            },
            Command::DropTable { table } => RecordedCommand::DropTable {
                table: table.fqn()?,
            },
            Command::AddColumn {
                table,
                name,
                nullable,
            } => RecordedCommand::AddColumn {
                table: table.fqn()?,
                name: name.clone(),
                nullable: *nullable,
            },
            Command::DropColumn { column } => RecordedCommand::DropColumn {
                column: column.fqn()?,
            },
            Command::CreateIndex {
                table,
                columns,
                name,
                unique,
            } => RecordedCommand::CreateIndex {
                table: table.fqn()?,
                columns: columns
                    .iter()
                    .map(|column| column.fqn())
                    .collect::<Result<_, _>>()?,
                name: name.clone(),
                unique: *unique,
            },
            Command::DropIndex { index } => RecordedCommand::DropIndex {
                index: index.fqn()?,
            },
            Command::CreateForeignKeyConstraint { from, to, name } => {
                RecordedCommand::CreateForeignKeyConstraint {
                    from: from.fqn()?,
                    to: to.fqn()?,
                    name: name.clone(),
                }
            }
            Command::DropForeignKeyConstraint { constraint } => {
                RecordedCommand::DropForeignKeyConstraint {
                    constraint: constraint.fqn()?,
                }
            }
        })
    }

    /// Rebind the targets to the nodes of `graph` carrying the recorded names.
    pub fn resolve<'g>(&self, graph: &'g CatalogGraph) -> Result<Command<'g>, GraphError> {
        Ok(match self {
            RecordedCommand::CreateDatabase { name } => Command::CreateDatabase { name: name.clone() },
            RecordedCommand::RenameDatabase { database, name } => Command::RenameDatabase {
                database: graph.by_fqn(database)?,
                name: name.clone(),
            },
            RecordedCommand::DropDatabase { database } => Command::DropDatabase {
                database: graph.by_fqn(database)?,
            },
            RecordedCommand::CreateSchema { database, name } => Command::CreateSchema {
                database: graph.by_fqn(database)?,
                name: name.clone(),
            },
            RecordedCommand::RenameSchema { schema, name } => Command::RenameSchema {
                schema: graph.by_fqn(schema)?,
                name: name.clone(),
            },
            RecordedCommand::DropSchema { schema } => Command::DropSchema {
                schema: graph.by_fqn(schema)?,
            },
            RecordedCommand::CreateTable { schema, name } => Command::CreateTable {
                schema: graph.by_fqn(schema)?,
                name: name.clone(),
            },
            RecordedCommand::RenameTable { table, name } => Command::RenameTable {
                table: graph.by_fqn(table)?,
                name: name.clone(),
            },
            RecordedCommand::DropTable { table } => Command::DropTable {
                table: graph.by_fqn(table)?,
            },
            RecordedCommand::AddColumn {
                table,
                name,
                nullable,
            } => Command::AddColumn {
                table: graph.by_fqn(table)?,
                name: name.clone(),
                nullable: *nullable,
            },
            RecordedCommand::DropColumn { column } => Command::DropColumn {
                column: graph.by_fqn(column)?,
            },
            RecordedCommand::CreateIndex {
                table,
                columns,
                name,
                unique,
            } => Command::CreateIndex {
                table: graph.by_fqn(table)?,
                columns: columns
                    .iter()
                    .map(|column| graph.by_fqn(column))
                    .collect::<Result<_, _>>()?,
                name: name.clone(),
                unique: *unique,
            },
            RecordedCommand::DropIndex { index } => Command::DropIndex {
                index: graph.by_fqn(index)?,
            },
            RecordedCommand::CreateForeignKeyConstraint { from, to, name } => {
                Command::CreateForeignKeyConstraint {
                    from: graph.by_fqn(from)?,
                    to: graph.by_fqn(to)?,
                    name: name.clone(),
                }
            }
            RecordedCommand::DropForeignKeyConstraint { constraint } => {
                Command::DropForeignKeyConstraint {
                    constraint: graph.by_fqn(constraint)?,
                }
            }
        })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            RecordedCommand::CreateDatabase { .. } => CommandKind::CreateDatabase,
            RecordedCommand::RenameDatabase { .. } => CommandKind::RenameDatabase,
            RecordedCommand::DropDatabase { .. } => CommandKind::DropDatabase,
            RecordedCommand::CreateSchema { .. } => CommandKind::CreateSchema,
            RecordedCommand::RenameSchema { .. } => CommandKind::RenameSchema,
            RecordedCommand::DropSchema { .. } => CommandKind::DropSchema,
            RecordedCommand::CreateTable { .. } => CommandKind::CreateTable,
            RecordedCommand::RenameTable { .. } => CommandKind::RenameTable,
            RecordedCommand::DropTable { .. } => CommandKind::DropTable,
            RecordedCommand::AddColumn { .. } => CommandKind::AddColumn,
            RecordedCommand::DropColumn { .. } => CommandKind::DropColumn,
            RecordedCommand::CreateIndex { .. } => CommandKind::CreateIndex,
            RecordedCommand::DropIndex { .. } => CommandKind::DropIndex,
            RecordedCommand::CreateForeignKeyConstraint { .. } => {
                CommandKind::CreateForeignKeyConstraint
            }
            RecordedCommand::DropForeignKeyConstraint { .. } => {
                CommandKind::DropForeignKeyConstraint
            }
        }
    }
}

/// A command and the state the system must reach after executing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptStep {
    pub command: RecordedCommand,
    pub expected: Comparable<CatalogNode>,
}

/// A starting state and the steps that follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub initial: Comparable<CatalogNode>,
    pub steps: Vec<TranscriptStep>,
}

impl Transcript {
    /// An empty transcript starting from `initial`.
    pub fn new(initial: &CatalogGraph) -> Self {
        Self {
            initial: initial.comparable(),
            steps: Vec::new(),
        }
    }

    /// Record `command` and the state expected after it.
    pub fn push(&mut self, command: RecordedCommand, expected: &CatalogGraph) {
        self.steps.push(TranscriptStep {
            command,
            expected: expected.comparable(),
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The transcript cut after its first `len` steps.
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            initial: self.initial.clone(),
            steps: self.steps.iter().take(len).cloned().collect(),
        }
    }

    /// Replay every step against `system`, checking its state before the first
    /// step and after each one. Step 0 is the starting state.
    pub fn run<S: System + ?Sized>(&self, system: &S) -> Result<(), TranscriptError> {
        let mut state = snapshot(system, 0)?;
        if let Some(diff) = self.initial.diff(&state.comparable()) {
            return Err(TranscriptError::Mismatch { step: 0, diff });
        }

        for (i, recorded) in self.steps.iter().enumerate() {
            let step = i + 1;
            {
                let command = recorded
                    .command
                    .resolve(&state)
                    .map_err(|source| TranscriptError::Resolve { step, source })?;
                tracing::debug!(step, %command, system = system.name(), "replaying");
                system
                    .execute(&command)
                    .map_err(|source| TranscriptError::Execution {
                        step,
                        command: command.to_string(),
                        source,
                    })?;
            }
            state = snapshot(system, step)?;
            if let Some(diff) = recorded.expected.diff(&state.comparable()) {
                return Err(TranscriptError::Mismatch { step, diff });
            }
        }
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn snapshot<S: System + ?Sized>(system: &S, step: usize) -> Result<CatalogGraph, TranscriptError> {
    system
        .state()
        .map_err(|source| TranscriptError::StateLoad { step, source })
}
