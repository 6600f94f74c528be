//! Match plans: JSON descriptions of a headless CodeFight battle.

use std::fs;
use std::path::{Path, PathBuf};

use codefight_core::{
    AiReport, AiStatus, EngineError, Game, GameConfig, InitializationMode, StopEvent, parse_program,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Step budget used when a plan does not name one.
pub const DEFAULT_STEPS: u64 = 10_000;

/// One AI as written in a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiEntry {
    pub name: String,
    /// Comma separated `OPCODE,argA,argB` triples.
    pub program: String,
}

/// Everything needed to play one battle without interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchPlan {
    #[serde(default)]
    pub config: GameConfig,
    pub ais: Vec<AiEntry>,
    /// Template names to start, in turn order. Repeats are allowed.
    pub lineup: Vec<String>,
    #[serde(default = "default_steps")]
    pub steps: u64,
}

fn default_steps() -> u64 {
    DEFAULT_STEPS
}

/// Command-line adjustments applied on top of a loaded plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOverrides {
    pub steps: Option<u64>,
    pub seed: Option<i32>,
    pub memory_size: Option<usize>,
}

/// Failures while loading or playing a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed plan: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("program of AI {name} is invalid: {source}")]
    Program {
        name: String,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Outcome of a played plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchReport {
    /// AIs in the order they stopped.
    pub stops: Vec<StopEvent>,
    /// Every instance in activation order, stopped ones included.
    pub ais: Vec<AiReport>,
}

impl MatchReport {
    /// Names still running when the step budget ran out.
    pub fn survivors(&self) -> impl Iterator<Item = &str> + '_ {
        self.ais
            .iter()
            .filter(|ai| ai.status == AiStatus::Active)
            .map(|ai| ai.name.as_str())
    }
}

impl MatchPlan {
    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let text = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Apply overrides. A seed switches the filler to random mode.
    #[must_use]
    pub fn with_overrides(mut self, overrides: PlanOverrides) -> Self {
        if let Some(steps) = overrides.steps {
            self.steps = steps;
        }
        if let Some(seed) = overrides.seed {
            self.config.init_mode = InitializationMode::Random { seed };
        }
        if let Some(memory_size) = overrides.memory_size {
            self.config.memory_size = memory_size;
        }
        self
    }

    /// Register every AI, start the lineup, and run the step budget.
    pub fn run(&self) -> Result<MatchReport, PlanError> {
        let mut game = Game::new(self.config)?;
        for entry in &self.ais {
            let program = parse_program(&entry.program).map_err(|source| PlanError::Program {
                name: entry.name.clone(),
                source,
            })?;
            game.register(&entry.name, program)?;
        }
        debug!(ais = self.ais.len(), lineup = ?self.lineup, "plan registered");

        game.start(&self.lineup)?;
        let stops = game.step(self.steps)?;
        let names: Vec<String> = game
            .roster()
            .instances()
            .map(|ai| ai.name().to_owned())
            .collect();
        let ais = names
            .iter()
            .map(|name| game.ai_report(name))
            .collect::<Result<Vec<_>, _>>()?;
        game.end()?;

        info!(stopped = stops.len(), steps = self.steps, "plan finished");
        Ok(MatchReport { stops, ais })
    }
}
