//! Arena layout at game start: program placement, fillers, and entry points.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::arena::Arena;
use crate::instruction::{Instruction, Opcode};
use crate::roster::Roster;
use crate::{EngineError, MAX_SEED, MIN_SEED};

/// How the arena is filled before the starting programs are laid over it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InitializationMode {
    /// Every cell starts as an unowned `STOP 0 0`.
    #[default]
    Stop,
    /// Cells get random opcodes and arguments drawn from a seeded generator.
    Random { seed: i32 },
}

impl InitializationMode {
    /// Build a mode from its user-facing name and optional seed.
    ///
    /// Accepts `stop`/`random` as well as `INIT_MODE_STOP`/`INIT_MODE_RANDOM`. The seed
    /// is required for the random mode and rejected for the stop mode.
    pub fn parse(name: &str, seed: Option<i32>) -> Result<Self, EngineError> {
        let mode = match (name, seed) {
            ("stop" | "INIT_MODE_STOP", None) => Self::Stop,
            ("stop" | "INIT_MODE_STOP", Some(_)) => {
                return Err(EngineError::InitializationModeChange(
                    "the stop mode does not take a seed".to_owned(),
                ));
            }
            ("random" | "INIT_MODE_RANDOM", Some(seed)) => Self::Random { seed },
            ("random" | "INIT_MODE_RANDOM", None) => {
                return Err(EngineError::InitializationModeChange(
                    "the random mode requires a seed".to_owned(),
                ));
            }
            (other, _) => {
                return Err(EngineError::InitializationModeChange(format!(
                    "unknown initialization mode {other}"
                )));
            }
        };
        mode.validate()?;
        Ok(mode)
    }

    /// Reject seeds outside `[MIN_SEED, MAX_SEED]`.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::Stop => Ok(()),
            Self::Random { seed } if (MIN_SEED..=MAX_SEED).contains(seed) => Ok(()),
            Self::Random { seed } => Err(EngineError::InitializationModeChange(format!(
                "seed {seed} must be between {MIN_SEED} and {MAX_SEED}"
            ))),
        }
    }

    /// Fresh filler for this mode. Each call starts the random sequence over.
    #[must_use]
    pub fn filler(&self) -> Box<dyn CellFiller> {
        match *self {
            Self::Stop => Box::new(StopFiller),
            Self::Random { seed } => Box::new(RandomFiller::new(seed)),
        }
    }
}

impl fmt::Display for InitializationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("INIT_MODE_STOP"),
            Self::Random { seed } => write!(f, "INIT_MODE_RANDOM {seed}"),
        }
    }
}

/// Source of the unowned instructions the arena starts with.
pub trait CellFiller: Send {
    /// Static identifier of the filler implementation.
    fn kind(&self) -> &'static str;

    /// Next unowned cell.
    fn next_cell(&mut self) -> Instruction;
}

/// Fills with `STOP 0 0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopFiller;

impl CellFiller for StopFiller {
    fn kind(&self) -> &'static str {
        "stop"
    }

    fn next_cell(&mut self) -> Instruction {
        Instruction::new(Opcode::Stop, 0, 0)
    }
}

/// Fills with uniformly random opcodes and full-range `i32` arguments.
#[derive(Debug, Clone)]
pub struct RandomFiller {
    rng: SmallRng,
}

impl RandomFiller {
    #[must_use]
    pub fn new(seed: i32) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(i64::from(seed) as u64),
        }
    }
}

impl CellFiller for RandomFiller {
    fn kind(&self) -> &'static str {
        "random"
    }

    fn next_cell(&mut self) -> Instruction {
        let opcode = Opcode::ALL[self.rng.random_range(0..Opcode::ALL.len())];
        let arg_a = self.rng.random::<i32>();
        let arg_b = self.rng.random::<i32>();
        Instruction::new(opcode, arg_a, arg_b)
    }
}

/// Lays out a fresh arena for the active AIs of a roster.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInitializer {
    mode: InitializationMode,
}

impl MemoryInitializer {
    #[must_use]
    pub fn new(mode: InitializationMode) -> Self {
        Self { mode }
    }

    /// Build the starting arena and point every active AI at its entry cell.
    ///
    /// Every cell is filled first, so cell `i` outside the programs holds the
    /// filler's `i`-th draw whatever the lineup. AI `i` of `k` then starts at
    /// `floor(i * N / k)`. Its program may use `floor(N / k)` cells, or `ceil(N / k)`
    /// for the last AI.
    pub fn initialize(&self, roster: &mut Roster) -> Result<Arena, EngineError> {
        let size = roster.memory_size();
        let mut arena = Arena::new(size);
        let mut filler = self.mode.filler();
        for address in 0..size as i64 {
            arena.put(address, filler.next_cell());
        }
        let placements = place_programs(&mut arena, roster)?;

        for (name, start) in placements {
            let entry = find_entry(&arena, start)
                .ok_or_else(|| EngineError::MemoryOverload(format!("AI {name} has no valid entry point")))?;
            roster.initialize_pointer(&name, entry as i64)?;
        }
        Ok(arena)
    }
}

fn place_programs(arena: &mut Arena, roster: &Roster) -> Result<Vec<(String, usize)>, EngineError> {
    let count = roster.active_count();
    if count == 0 {
        return Ok(Vec::new());
    }
    let spacing = arena.size() as f64 / count as f64;
    let mut placements = Vec::with_capacity(count);
    for (i, instance) in roster.active().enumerate() {
        let start = (i as f64 * spacing).floor() as usize;
        let room = if i + 1 == count {
            spacing.ceil() as usize
        } else {
            spacing.floor() as usize
        };
        let program = instance.program();
        if program.len() > room {
            return Err(EngineError::MemoryOverload(format!(
                "AI {} needs {} cells but only {room} are available",
                instance.name(),
                program.len()
            )));
        }
        for (offset, cell) in program.iter().enumerate() {
            arena.put((start + offset) as i64, cell.clone());
        }
        placements.push((instance.name().to_owned(), start));
    }
    Ok(placements)
}

/// First address at or after `start` whose opcode may begin execution.
fn find_entry(arena: &Arena, start: usize) -> Option<usize> {
    (0..arena.size())
        .map(|offset| arena.address((start + offset) as i64))
        .find(|&address| {
            arena
                .get(address as i64)
                .is_ok_and(|cell| cell.is_valid_first_instruction())
        })
}
