#![doc = include_str!("../README.md")]

mod canonical;
mod catalog;
mod command;
mod config;
mod error;
mod generator;
mod graph;
mod loader;
mod memory;
mod names;
mod runner;
mod system;
mod transcript;
mod translate;

pub use canonical::{CanonicalNode, Comparable, DiffEntry, StructuralDiff};
pub use catalog::{
    validate, CatalogGraph, CatalogNode, CatalogRef, CatalogSelection, Column, Database,
    ForeignKeyConstraint, Index, Qualified, Schema, Table, PUBLIC_SCHEMA,
};
pub use command::{Command, CommandKind};
pub use config::{GeneratorConfig, RunConfig};
pub use error::{
    ConfigError, GenerateError, GraphError, InvariantViolation, LoadError, RunError,
    SelectionError, SystemError, TranscriptError,
};
pub use generator::{CatalogConstructors, CommandGenerator, Construct};
pub use graph::{Graph, GraphId, Kind, NodeId, Ref, Selection};
pub use loader::{
    CatalogRows, ColumnRow, DatabaseRow, ForeignKeyRow, IndexColumnRow, IndexRow, SchemaRow,
    TableRow,
};
pub use memory::{MemoryCatalog, SEED_DATABASES};
pub use names::{fresh_name, random_name, MAX_NAME_DRAWS};
pub use runner::{FinalStates, RunReport, Runner, StepRecord};
pub use system::System;
pub use transcript::{RecordedCommand, Transcript, TranscriptStep};
pub use translate::{quote, Ddl, Translate};
