//! Configuration types for differential runs.

use crate::command::CommandKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Weights and retry budget of the [`CommandGenerator`](crate::CommandGenerator).
///
/// When deserialized, `weights` is laid over the default table unless
/// `default_weight` is also given, in which case the listed weights are the
/// whole table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GeneratorConfigFile")]
pub struct GeneratorConfig {
    /// Per-kind weights. A weight of 0 disables the kind.
    pub weights: BTreeMap<CommandKind, u32>,

    /// Weight of kinds missing from `weights`.
    pub default_weight: u32,

    /// Constructor invocations per `generate` call before giving up.
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::uniform()
            .with_weight(CommandKind::CreateIndex, 3)
            .with_weight(CommandKind::AddColumn, 3)
            .with_weight(CommandKind::CreateTable, 2)
            .with_weight(CommandKind::RenameDatabase, 0)
            .with_weight(CommandKind::RenameSchema, 0)
            .with_weight(CommandKind::RenameTable, 0)
            .with_weight(CommandKind::DropDatabase, 0)
            .with_weight(CommandKind::DropSchema, 0)
            .with_weight(CommandKind::DropTable, 0)
            .with_weight(CommandKind::DropColumn, 0)
    }
}

/// Serialized shape of [`GeneratorConfig`]; every field may be omitted.
#[derive(Deserialize)]
struct GeneratorConfigFile {
    #[serde(default)]
    weights: BTreeMap<CommandKind, u32>,
    default_weight: Option<u32>,
    max_attempts: Option<usize>,
}

impl From<GeneratorConfigFile> for GeneratorConfig {
    fn from(file: GeneratorConfigFile) -> Self {
        let mut config = match file.default_weight {
            Some(weight) => GeneratorConfig::only().with_default_weight(weight),
            None => GeneratorConfig::default(),
        };
        config.weights.extend(file.weights);
        if let Some(attempts) = file.max_attempts {
            config.max_attempts = attempts;
        }
        config
    }
}

impl GeneratorConfig {
    /// Every kind at weight 1.
    pub fn uniform() -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight: 1,
            max_attempts: 10,
        }
    }

    /// Every kind at weight 0 until enabled with [`with_weight`](Self::with_weight).
    pub fn only() -> Self {
        Self {
            default_weight: 0,
            ..Self::uniform()
        }
    }

    pub fn weight(&self, kind: CommandKind) -> u32 {
        self.weights
            .get(&kind)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn with_weight(mut self, kind: CommandKind, weight: u32) -> Self {
        self.weights.insert(kind, weight);
        self
    }

    pub fn with_default_weight(mut self, weight: u32) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Complete configuration for a differential run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for reproducibility (None = random).
    pub seed: Option<u64>,

    /// Number of generate/execute/compare steps.
    pub iterations: usize,

    /// Translate every command and record the statement.
    pub record_statements: bool,

    pub generator: GeneratorConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            iterations: 500,
            record_statements: false,
            generator: GeneratorConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a JSON configuration. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_random_seed(mut self) -> Self {
        self.seed = None;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_statements(mut self, enabled: bool) -> Self {
        self.record_statements = enabled;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }
}
