//! Tests for the in-memory catalog and the differential runner.

use std::collections::BTreeMap;

use catalog_fuzz::{
    validate, CatalogGraph, CatalogRef, Column, Command, CommandKind, Database,
    ForeignKeyConstraint, GeneratorConfig, Index, MemoryCatalog, RecordedCommand, RunConfig,
    RunError, Runner, Schema, System, SystemError, Table, Transcript, TranscriptError,
};

fn schema<'g>(state: &'g CatalogGraph, database: &str) -> CatalogRef<'g, Schema> {
    state
        .nodes::<Schema>()
        .filter(|s| s.name == "public")
        .filter(|s| s.database().is_ok_and(|d| d.name == database))
        .one()
        .unwrap()
}

fn table<'g>(state: &'g CatalogGraph, name: &str) -> CatalogRef<'g, Table> {
    state
        .nodes::<Table>()
        .filter(|t| t.name == name)
        .one()
        .unwrap()
}

fn column<'g>(state: &'g CatalogGraph, table_name: &str, name: &str) -> CatalogRef<'g, Column> {
    table(state, table_name)
        .columns()
        .filter(|c| c.name == name)
        .one()
        .unwrap()
}

/// `t1(a, b)` with a unique index on `a`, and `t2(c)`.
fn two_tables() -> MemoryCatalog {
    let catalog = MemoryCatalog::new("oracle").unwrap();
    for name in ["t1", "t2"] {
        let state = catalog.state().unwrap();
        catalog
            .execute(&Command::CreateTable {
                schema: schema(&state, "defaultdb"),
                name: name.into(),
            })
            .unwrap();
    }
    for (table_name, name) in [("t1", "a"), ("t1", "b"), ("t2", "c")] {
        let state = catalog.state().unwrap();
        catalog
            .execute(&Command::AddColumn {
                table: table(&state, table_name),
                name: name.into(),
                nullable: false,
            })
            .unwrap();
    }
    let state = catalog.state().unwrap();
    let t1 = table(&state, "t1");
    catalog
        .execute(&Command::CreateIndex {
            table: t1,
            columns: vec![t1.columns().filter(|c| c.name == "a").one().unwrap()],
            name: "t1_a".into(),
            unique: true,
        })
        .unwrap();
    catalog
}

fn add_foreign_key(catalog: &MemoryCatalog, to: &str) -> Result<(), SystemError> {
    let state = catalog.state().unwrap();
    catalog.execute(&Command::CreateForeignKeyConstraint {
        from: column(&state, "t2", "c"),
        to: column(&state, "t1", to),
        name: "fk".into(),
    })
}

// =============================================================================
// Catalog semantics
// =============================================================================

#[test]
fn test_foreign_key_edges_are_to_then_from() {
    let catalog = two_tables();
    add_foreign_key(&catalog, "a").unwrap();

    let state = catalog.state().unwrap();
    let fk = state.nodes::<ForeignKeyConstraint>().one().unwrap();
    let ends: Vec<String> = fk
        .outgoing::<Column>()
        .into_iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(ends, vec!["a", "c"]);
    assert_eq!(fk.to().unwrap().name, "a");
    assert_eq!(fk.from().unwrap().name, "c");
    assert_eq!(fk.fqn().unwrap(), "defaultdb.public.t2.fks.fk");
    assert_eq!(table(&state, "t1").referencing_foreign_keys().len(), 1);
}

#[test]
fn test_foreign_key_needs_unique_index() {
    let catalog = two_tables();
    let err = add_foreign_key(&catalog, "b").unwrap_err();
    assert!(matches!(err, SystemError::Rejected(_)), "{err}");
}

#[test]
fn test_drop_index_drops_dependent_foreign_keys() {
    let catalog = two_tables();
    add_foreign_key(&catalog, "a").unwrap();

    let state = catalog.state().unwrap();
    let index = state.nodes::<Index>().one().unwrap();
    catalog.execute(&Command::DropIndex { index }).unwrap();

    let state = catalog.state().unwrap();
    assert!(state.nodes::<Index>().is_empty());
    assert!(state.nodes::<ForeignKeyConstraint>().is_empty());
}

#[test]
fn test_drop_foreign_key() {
    let catalog = two_tables();
    add_foreign_key(&catalog, "a").unwrap();

    let state = catalog.state().unwrap();
    let constraint = state.nodes::<ForeignKeyConstraint>().one().unwrap();
    catalog
        .execute(&Command::DropForeignKeyConstraint { constraint })
        .unwrap();

    let state = catalog.state().unwrap();
    assert!(state.nodes::<ForeignKeyConstraint>().is_empty());
    assert_eq!(state.nodes::<Index>().len(), 1);
    assert!(table(&state, "t1").referencing_foreign_keys().is_empty());
    // The former referencing column is free to go.
    catalog
        .execute(&Command::DropColumn {
            column: column(&state, "t2", "c"),
        })
        .unwrap();
}

#[test]
fn test_drop_table_drops_foreign_keys_on_either_end() {
    for (dropped, kept) in [("t1", "t2"), ("t2", "t1")] {
        let catalog = two_tables();
        add_foreign_key(&catalog, "a").unwrap();

        let state = catalog.state().unwrap();
        catalog
            .execute(&Command::DropTable {
                table: table(&state, dropped),
            })
            .unwrap();

        let state = catalog.state().unwrap();
        validate(&state).unwrap();
        assert!(state.nodes::<ForeignKeyConstraint>().is_empty(), "{dropped}");
        let names: Vec<String> = state
            .nodes::<Table>()
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec![kept.to_string()]);
    }
}

#[test]
fn test_indexed_column_cannot_be_dropped() {
    let catalog = two_tables();
    let state = catalog.state().unwrap();
    let err = catalog
        .execute(&Command::DropColumn {
            column: column(&state, "t1", "a"),
        })
        .unwrap_err();
    assert!(matches!(err, SystemError::Rejected(_)));
}

#[test]
fn test_rename_keeps_children() {
    let catalog = two_tables();
    let state = catalog.state().unwrap();
    catalog
        .execute(&Command::RenameTable {
            table: table(&state, "t1"),
            name: "people".into(),
        })
        .unwrap();

    let state = catalog.state().unwrap();
    let people = table(&state, "people");
    assert_eq!(people.columns().len(), 2);
    assert_eq!(
        people.indexes().one().unwrap().fqn().unwrap(),
        "defaultdb.public.people.idxs.t1_a"
    );
}

#[test]
fn test_equal_content_gives_equivalent_snapshots() {
    let left = MemoryCatalog::new("left").unwrap();
    let right = MemoryCatalog::new("right").unwrap();

    // Shift the ids handed out by `right`.
    right
        .execute(&Command::CreateDatabase { name: "tmp".into() })
        .unwrap();
    let state = right.state().unwrap();
    let tmp = state
        .nodes::<Database>()
        .filter(|d| d.name == "tmp")
        .one()
        .unwrap();
    right.execute(&Command::DropDatabase { database: tmp }).unwrap();

    for catalog in [&left, &right] {
        catalog
            .execute(&Command::CreateDatabase { name: "x".into() })
            .unwrap();
    }
    let left = left.state().unwrap();
    let right = right.state().unwrap();
    assert!(left.equivalent(&right));
    assert_eq!(left.comparable().diff(&right.comparable()), None);
}

// =============================================================================
// Runner
// =============================================================================

fn everything() -> GeneratorConfig {
    // A budget covering the whole pool always reaches CreateDatabase.
    GeneratorConfig::uniform().with_max_attempts(CommandKind::ALL.len())
}

#[test]
fn test_run_keeps_invariants() {
    for seed in 0..5 {
        let config = RunConfig::default()
            .with_seed(seed)
            .with_iterations(150)
            .with_statements(true)
            .with_generator(everything());
        let mut runner = Runner::new(
            config,
            MemoryCatalog::new("oracle").unwrap(),
            MemoryCatalog::new("sut").unwrap(),
        )
        .unwrap();
        for _ in 0..150 {
            let record = runner.step().unwrap();
            assert!(record.statement.is_some());
            validate(runner.current()).unwrap();
        }
        let report = runner.report();
        assert_eq!(report.seed, seed);
        assert_eq!(report.kind_counts.values().sum::<usize>(), 150);
    }
}

#[test]
fn test_default_weights_reach_every_constraint_command() {
    let generator = GeneratorConfig::default()
        .with_weight(CommandKind::DropDatabase, 1)
        .with_weight(CommandKind::DropSchema, 1)
        .with_weight(CommandKind::DropTable, 1)
        .with_weight(CommandKind::DropColumn, 1)
        .with_max_attempts(64);
    let mut counts: BTreeMap<CommandKind, usize> = BTreeMap::new();
    for seed in 0..4 {
        let config = RunConfig::default()
            .with_seed(seed)
            .with_iterations(400)
            .with_generator(generator.clone());
        let mut runner = Runner::new(
            config,
            MemoryCatalog::new("oracle").unwrap(),
            MemoryCatalog::new("sut").unwrap(),
        )
        .unwrap();
        for _ in 0..400 {
            runner.step().unwrap();
            validate(runner.current()).unwrap();
        }
        for (kind, count) in &runner.report().kind_counts {
            *counts.entry(*kind).or_default() += count;
        }
    }

    for kind in [
        CommandKind::CreateForeignKeyConstraint,
        CommandKind::DropForeignKeyConstraint,
        CommandKind::DropIndex,
        CommandKind::DropTable,
    ] {
        assert!(counts.get(&kind).is_some_and(|n| *n > 0), "{kind}: {counts:?}");
    }
    for kind in [
        CommandKind::RenameDatabase,
        CommandKind::RenameSchema,
        CommandKind::RenameTable,
    ] {
        assert_eq!(counts.get(&kind), None, "{kind}");
    }
}

#[test]
fn test_run_is_reproducible() {
    let run = || {
        let config = RunConfig::default()
            .with_seed(17)
            .with_iterations(80)
            .with_generator(everything());
        Runner::new(
            config,
            MemoryCatalog::new("oracle").unwrap(),
            MemoryCatalog::new("sut").unwrap(),
        )
        .and_then(Runner::run)
        .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.steps.len(), 80);
    assert_eq!(first.history(), second.history());
}

#[test]
fn test_report_json() {
    let config = RunConfig::default().with_seed(3).with_iterations(10);
    let report = Runner::new(
        config,
        MemoryCatalog::new("oracle").unwrap(),
        MemoryCatalog::new("sut").unwrap(),
    )
    .and_then(Runner::run)
    .unwrap();

    let path = std::env::temp_dir()
        .join(format!("catalog-fuzz-report-{}.json", std::process::id()));
    report.write_json(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let parsed: catalog_fuzz::RunReport = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, report);
}

/// Drops every AddColumn on the floor.
struct SkipsColumns(MemoryCatalog);

impl System for SkipsColumns {
    fn name(&self) -> &str {
        "sut"
    }

    fn execute(&self, command: &Command<'_>) -> Result<(), SystemError> {
        if command.kind() == CommandKind::AddColumn {
            return Ok(());
        }
        self.0.execute(command)
    }

    fn state(&self) -> Result<CatalogGraph, SystemError> {
        self.0.state()
    }
}

#[test]
fn test_mismatch_is_reported_with_history() {
    let config = RunConfig::default()
        .with_seed(9)
        .with_iterations(50)
        .with_generator(
            GeneratorConfig::only()
                .with_weight(CommandKind::CreateTable, 1)
                .with_weight(CommandKind::AddColumn, 1),
        );
    let sut = SkipsColumns(MemoryCatalog::new("sut").unwrap());
    let err = Runner::new(config, MemoryCatalog::new("oracle").unwrap(), sut)
        .and_then(Runner::run)
        .unwrap_err();

    assert!(err.to_string().contains("seed 9"), "{err}");
    match err {
        RunError::Mismatch {
            step,
            seed,
            diff,
            history,
        } => {
            assert_eq!(seed, 9);
            assert_eq!(history.len(), step);
            assert!(history.last().unwrap().starts_with("AddColumn"));
            assert!(!diff.entries.is_empty());
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn test_failed_run_still_reports() {
    let config = RunConfig::default()
        .with_seed(9)
        .with_iterations(50)
        .with_generator(
            GeneratorConfig::only()
                .with_weight(CommandKind::CreateTable, 1)
                .with_weight(CommandKind::AddColumn, 1),
        );
    let sut = SkipsColumns(MemoryCatalog::new("sut").unwrap());
    let mut runner = Runner::new(config, MemoryCatalog::new("oracle").unwrap(), sut).unwrap();

    let err = runner.advance().unwrap_err();
    let report = runner.finish();
    assert_eq!(report.failure, Some(err.to_string()));
    assert_eq!(report.steps.last().unwrap().kind, CommandKind::AddColumn);
    let states = report.states.as_ref().unwrap();
    assert!(states.oracle.0.len() > states.sut.0.len());
    assert!(states.oracle.diff(&states.sut).is_some());

    let json = serde_json::to_string(&report).unwrap();
    let parsed: catalog_fuzz::RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn test_initial_states_are_compared() {
    let err = Runner::new(
        RunConfig::default().with_seed(1),
        MemoryCatalog::new("oracle").unwrap(),
        MemoryCatalog::empty("sut"),
    )
    .err()
    .unwrap();
    assert!(matches!(err, RunError::Mismatch { step: 0, .. }));
}

/// Refuses every command.
struct ReadOnly(MemoryCatalog);

impl System for ReadOnly {
    fn name(&self) -> &str {
        "read-only"
    }

    fn execute(&self, _command: &Command<'_>) -> Result<(), SystemError> {
        Err(SystemError::backend(anyhow::anyhow!("catalog is read only")))
    }

    fn state(&self) -> Result<CatalogGraph, SystemError> {
        self.0.state()
    }
}

#[test]
fn test_execution_failure_names_system() {
    let sut = ReadOnly(MemoryCatalog::new("sut").unwrap());
    let mut runner = Runner::new(
        RunConfig::default().with_seed(2),
        MemoryCatalog::new("oracle").unwrap(),
        sut,
    )
    .unwrap();
    match runner.step().unwrap_err() {
        RunError::Execution {
            step,
            system,
            source,
            ..
        } => {
            assert_eq!(step, 1);
            assert_eq!(system, "read-only");
            assert!(source.to_string().contains("read only"));
        }
        other => panic!("unexpected {other}"),
    }
}

// =============================================================================
// Transcripts
// =============================================================================

fn recorded_run(seed: u64, iterations: usize) -> Transcript {
    let config = RunConfig::default()
        .with_seed(seed)
        .with_iterations(iterations)
        .with_generator(everything());
    let mut runner = Runner::new(
        config,
        MemoryCatalog::new("oracle").unwrap(),
        MemoryCatalog::new("sut").unwrap(),
    )
    .unwrap();
    runner.advance().unwrap();
    assert_eq!(runner.transcript().len(), iterations);
    runner.transcript().clone()
}

#[test]
fn test_transcript_replays_on_fresh_catalog() {
    let transcript = recorded_run(5, 120);
    transcript
        .run(&MemoryCatalog::new("replay").unwrap())
        .unwrap();
}

#[test]
fn test_transcript_json_replays() {
    let transcript = recorded_run(6, 60);
    let path = std::env::temp_dir()
        .join(format!("catalog-fuzz-transcript-{}.json", std::process::id()));
    transcript.write_json(&path).unwrap();
    let loaded = Transcript::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, transcript);
    loaded.run(&MemoryCatalog::new("replay").unwrap()).unwrap();
}

#[test]
fn test_transcript_rejects_wrong_start() {
    let transcript = recorded_run(7, 10);
    let err = transcript.run(&MemoryCatalog::empty("empty")).unwrap_err();
    assert!(matches!(err, TranscriptError::Mismatch { step: 0, .. }), "{err}");
}

#[test]
fn test_transcript_catches_divergence() {
    let config = RunConfig::default()
        .with_seed(9)
        .with_iterations(50)
        .with_generator(
            GeneratorConfig::only()
                .with_weight(CommandKind::CreateTable, 1)
                .with_weight(CommandKind::AddColumn, 1),
        );
    let sut = SkipsColumns(MemoryCatalog::new("sut").unwrap());
    let mut runner = Runner::new(config, MemoryCatalog::new("oracle").unwrap(), sut).unwrap();
    let failed_at = match runner.advance().unwrap_err() {
        RunError::Mismatch { step, .. } => step,
        other => panic!("unexpected {other}"),
    };
    let transcript = runner.transcript().clone();
    assert_eq!(transcript.len(), failed_at);
    assert_eq!(
        transcript.steps.last().unwrap().command.kind(),
        CommandKind::AddColumn
    );

    // The oracle side replays cleanly; the faulty catalog fails at the same step.
    transcript
        .run(&MemoryCatalog::new("replay").unwrap())
        .unwrap();
    let err = transcript
        .run(&SkipsColumns(MemoryCatalog::new("replay").unwrap()))
        .unwrap_err();
    assert!(
        matches!(err, TranscriptError::Mismatch { step, .. } if step == failed_at),
        "{err}"
    );
    // The step before the divergence holds up.
    transcript
        .truncated(failed_at - 1)
        .run(&SkipsColumns(MemoryCatalog::new("replay").unwrap()))
        .unwrap();
}

#[test]
fn test_transcript_resolves_by_qualified_name() {
    let transcript = recorded_run(8, 40);
    let json = serde_json::to_value(&transcript).unwrap();
    let first = &json["steps"][0]["command"];
    assert!(first["kind"].is_string(), "{first}");

    let recorded = RecordedCommand::CreateTable {
        schema: "postgres.public".into(),
        name: "t".into(),
    };
    let catalog = MemoryCatalog::new("oracle").unwrap();
    let state = catalog.state().unwrap();
    match recorded.resolve(&state).unwrap() {
        Command::CreateTable { schema, name } => {
            assert_eq!(schema.database().unwrap().name, "postgres");
            assert_eq!(name, "t");
        }
        other => panic!("unexpected {other}"),
    }
}
