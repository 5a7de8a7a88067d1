//! Differential test execution.

use crate::canonical::Comparable;
use crate::catalog::{CatalogGraph, CatalogNode};
use crate::command::{Command, CommandKind};
use crate::config::RunConfig;
use crate::error::RunError;
use crate::generator::CommandGenerator;
use crate::system::System;
use crate::transcript::{RecordedCommand, Transcript};
use crate::translate::{Ddl, Translate};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub kind: CommandKind,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub iterations: usize,
    pub steps: Vec<StepRecord>,
    pub kind_counts: BTreeMap<CommandKind, usize>,
    /// The error that ended the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Both snapshots as they were when the run ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<FinalStates>,
}

/// Comparable snapshots of both systems at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStates {
    pub oracle: Comparable<CatalogNode>,
    pub sut: Comparable<CatalogNode>,
}

impl RunReport {
    fn new(seed: u64, iterations: usize) -> Self {
        Self {
            seed,
            iterations,
            steps: Vec::new(),
            kind_counts: BTreeMap::new(),
            failure: None,
            states: None,
        }
    }

    /// Rendered commands in execution order.
    pub fn history(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.command.clone()).collect()
    }

    /// Export to JSON file.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

/// Drives an oracle and a system under test through the same random
/// commands, comparing their snapshots after every step.
pub struct Runner<O, S> {
    config: RunConfig,
    seed: u64,
    rng: SmallRng,
    generator: CommandGenerator,
    oracle: O,
    sut: S,
    /// Oracle snapshot the next command is generated from.
    current: CatalogGraph,
    report: RunReport,
    transcript: Transcript,
}

impl<O: System, S: System> Runner<O, S> {
    /// Seed the generator and check that both systems start out equivalent.
    pub fn new(config: RunConfig, oracle: O, sut: S) -> Result<Self, RunError> {
        let seed = config.seed.unwrap_or_else(rand::random);
        tracing::info!(
            seed,
            iterations = config.iterations,
            oracle = oracle.name(),
            sut = sut.name(),
            "starting differential run"
        );
        let mut runner = Self {
            rng: SmallRng::seed_from_u64(seed),
            generator: CommandGenerator::new(config.generator.clone()),
            report: RunReport::new(seed, config.iterations),
            current: CatalogGraph::new(),
            transcript: Transcript::new(&CatalogGraph::new()),
            config,
            seed,
            oracle,
            sut,
        };
        let initial = runner.compare(0)?;
        runner.transcript = Transcript::new(&initial);
        runner.current = initial;
        Ok(runner)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn sut(&self) -> &S {
        &self.sut
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Every executed command with the oracle state that followed it.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The last verified oracle snapshot.
    pub fn current(&self) -> &CatalogGraph {
        &self.current
    }

    /// Generate one command, apply it to both systems and compare.
    pub fn step(&mut self) -> Result<&StepRecord, RunError> {
        let step = self.report.steps.len() + 1;
        let (record, recorded) = {
            let command = self
                .generator
                .generate(&self.current, &mut self.rng)
                .map_err(|source| RunError::Generation { step, source })?;
            let statement = if self.config.record_statements {
                let statement =
                    Ddl.translate(&command)
                        .map_err(|source| RunError::Translation {
                            step,
                            command: command.to_string(),
                            source,
                        })?;
                tracing::debug!(step, %statement, "translated");
                Some(statement)
            } else {
                None
            };
            let recorded =
                RecordedCommand::record(&command).map_err(|source| RunError::Translation {
                    step,
                    command: command.to_string(),
                    source,
                })?;
            tracing::info!(step, %command, "executing");
            execute(&self.oracle, step, &command)?;
            execute(&self.sut, step, &command)?;
            let record = StepRecord {
                step,
                kind: command.kind(),
                command: command.to_string(),
                statement,
            };
            (record, recorded)
        };

        *self.report.kind_counts.entry(record.kind).or_default() += 1;
        self.report.steps.push(record);
        let expected = load(&self.oracle)?;
        // The diverging step stays in the transcript so a replay reproduces it.
        self.transcript.push(recorded, &expected);
        self.current = self.verify(step, expected)?;
        Ok(&self.report.steps[step - 1])
    }

    /// Run the steps left of the configured iterations.
    ///
    /// The error that stops the run is also kept in the report.
    pub fn advance(&mut self) -> Result<(), RunError> {
        while self.report.steps.len() < self.config.iterations {
            if let Err(err) = self.step() {
                self.report.failure = Some(err.to_string());
                return Err(err);
            }
        }
        tracing::info!(
            seed = self.seed,
            steps = self.report.steps.len(),
            "run completed without mismatch"
        );
        Ok(())
    }

    /// Close the run, attaching both systems' current snapshots to the report.
    pub fn finish(mut self) -> RunReport {
        match (load(&self.oracle), load(&self.sut)) {
            (Ok(oracle), Ok(sut)) => {
                self.report.states = Some(FinalStates {
                    oracle: oracle.comparable(),
                    sut: sut.comparable(),
                });
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(%err, "final snapshots unavailable");
            }
        }
        self.report
    }

    /// Run the configured number of steps.
    pub fn run(mut self) -> Result<RunReport, RunError> {
        self.advance()?;
        Ok(self.finish())
    }

    fn compare(&self, step: usize) -> Result<CatalogGraph, RunError> {
        let expected = load(&self.oracle)?;
        self.verify(step, expected)
    }

    /// Check the system under test against the oracle snapshot `expected`.
    fn verify(&self, step: usize, expected: CatalogGraph) -> Result<CatalogGraph, RunError> {
        let actual = load(&self.sut)?;
        if let Some(diff) = expected.comparable().diff(&actual.comparable()) {
            tracing::error!(step, seed = self.seed, "state mismatch\n{diff}");
            return Err(RunError::Mismatch {
                step,
                seed: self.seed,
                diff,
                history: self.report.history(),
            });
        }
        Ok(expected)
    }
}

fn execute<T: System>(system: &T, step: usize, command: &Command<'_>) -> Result<(), RunError> {
    system
        .execute(command)
        .map_err(|source| RunError::Execution {
            step,
            system: system.name().to_string(),
            command: command.to_string(),
            source,
        })
}

fn load<T: System>(system: &T) -> Result<CatalogGraph, RunError> {
    system.state().map_err(|source| RunError::StateLoad {
        system: system.name().to_string(),
        source,
    })
}
