//! Core engine for CodeFight, a Core-War style battle between small programs.
//!
//! Programs ("AIs") share one circular memory arena and take turns executing a
//! single instruction each. The crate is organised leaf to root:
//!
//! - [`instruction`]: the nine opcodes and the value-semantics [`Instruction`] cell.
//! - [`arena`]: the fixed-size circular memory.
//! - [`exec`]: opcode effects, run against a [`Machine`] context.
//! - [`roster`]: registered templates plus active and stopped instances.
//! - [`init`]: program placement and pluggable cell fillers.
//! - [`scheduler`]: the round-robin dispatcher.
//! - [`game`]: the phase-gated facade consumed by front ends.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod arena;
pub mod config;
pub mod exec;
pub mod game;
pub mod init;
pub mod instruction;
pub mod roster;
pub mod scheduler;

pub use arena::{Arena, CellOwnership};
pub use config::GameConfig;
pub use exec::Machine;
pub use game::{AiReport, Game, Operation};
pub use init::{CellFiller, InitializationMode, MemoryInitializer, RandomFiller, StopFiller};
pub use instruction::{Instruction, Opcode, parse_program};
pub use roster::{AiId, AiInstance, AiStatus, Roster};
pub use scheduler::{Scheduler, StopEvent};

/// Smallest supported arena.
pub const MIN_MEMORY_SIZE: usize = 7;
/// Largest supported arena.
pub const MAX_MEMORY_SIZE: usize = 1337;
/// A game needs at least this many AIs to start.
pub const MIN_PLAYERS: usize = 2;
/// Inclusive lower bound for random-filler seeds.
pub const MIN_SEED: i32 = -1337;
/// Inclusive upper bound for random-filler seeds.
pub const MAX_SEED: i32 = 1337;

/// Map any signed address onto `[0, size)`.
///
/// Equivalent to `((index % size) + size) % size`; an empty arena maps everything to 0.
#[inline]
#[must_use]
pub fn normalize(index: i64, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    index.rem_euclid(size as i64) as usize
}

/// Coarse lifecycle of a game: roster edits happen before the battle, stepping during it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Initialization,
    Running,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization => f.write_str("initialization"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Every failure the engine reports. All of them are recoverable at the call site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed external input such as sizes, names, or program text.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),
    /// A template could not be registered or instantiated.
    #[error("cannot create AI: {0}")]
    AiCreation(String),
    /// The named AI is not in the partition the operation needs.
    #[error("{0}")]
    MissingAi(String),
    /// A raw index was outside the arena before any normalisation.
    #[error("index {index} is out of bounds for memory size {size}")]
    MemoryOutOfBounds { index: i64, size: usize },
    /// A cell was read before the arena was filled.
    #[error("memory cell {0} has not been initialized")]
    UninitializedCell(usize),
    /// Starting programs do not fit, or the arena could not be filled.
    #[error("memory overload: {0}")]
    MemoryOverload(String),
    /// An opcode effect failed.
    #[error("instruction execution failed: {0}")]
    InstructionExecution(#[source] Box<EngineError>),
    /// The requested initialization mode or seed was rejected.
    #[error("cannot change initialization mode: {0}")]
    InitializationModeChange(String),
    /// The transition into the running phase failed and was rolled back.
    #[error("cannot start game: {0}")]
    StartingGame(#[source] Box<EngineError>),
    /// A step batch was aborted.
    #[error("error during execution of the game: {0}")]
    GameExecution(#[source] Box<EngineError>),
    /// The operation is not available in the current phase.
    #[error("{operation} is not available during the {phase} phase")]
    PhaseViolation { operation: Operation, phase: GamePhase },
}

impl EngineError {
    pub(crate) fn execution(inner: EngineError) -> Self {
        Self::InstructionExecution(Box::new(inner))
    }

    pub(crate) fn starting(inner: EngineError) -> Self {
        Self::StartingGame(Box::new(inner))
    }

    pub(crate) fn game_execution(inner: EngineError) -> Self {
        Self::GameExecution(Box::new(inner))
    }

    /// Innermost error, skipping the wrapping variants.
    #[must_use]
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::InstructionExecution(inner)
            | Self::StartingGame(inner)
            | Self::GameExecution(inner) => inner.root_cause(),
            other => other,
        }
    }
}
