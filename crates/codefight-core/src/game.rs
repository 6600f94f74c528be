//! Phase-gated facade over the roster, arena, and scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::arena::{Arena, CellOwnership};
use crate::config::GameConfig;
use crate::init::{InitializationMode, MemoryInitializer};
use crate::instruction::Instruction;
use crate::roster::{AiInstance, AiStatus, Roster};
use crate::scheduler::{Scheduler, StopEvent};
use crate::{EngineError, GamePhase, MIN_PLAYERS};

/// Public calls whose legality depends on the game phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Register,
    Unregister,
    SetInitMode,
    Start,
    Step,
    End,
    Inspect,
}

impl Operation {
    /// The only phase in which the operation may run.
    #[must_use]
    pub const fn required_phase(self) -> GamePhase {
        match self {
            Self::Register | Self::Unregister | Self::SetInitMode | Self::Start => {
                GamePhase::Initialization
            }
            Self::Step | Self::End | Self::Inspect => GamePhase::Running,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Register => "add-ai",
            Self::Unregister => "remove-ai",
            Self::SetInitMode => "set-init-mode",
            Self::Start => "start-game",
            Self::Step => "next",
            Self::End => "end-game",
            Self::Inspect => "inspection",
        };
        f.write_str(label)
    }
}

/// State of one AI as seen from outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiReport {
    pub name: String,
    pub status: AiStatus,
    pub pointer: usize,
    pub steps: u64,
    /// Cell at the pointer, absent once the AI has stopped.
    pub next_instruction: Option<Instruction>,
}

/// A CodeFight game: roster edits during initialization, stepping while running.
#[derive(Debug, Clone)]
pub struct Game {
    config: GameConfig,
    phase: GamePhase,
    roster: Roster,
    arena: Option<Arena>,
    scheduler: Scheduler,
}

impl Game {
    /// Create a game in the initialization phase.
    pub fn new(config: GameConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            roster: Roster::new(config.memory_size, config.max_players),
            config,
            phase: GamePhase::Initialization,
            arena: None,
            scheduler: Scheduler::new(),
        })
    }

    /// Create a game with the default filler.
    pub fn with_size(memory_size: usize, max_players: usize) -> Result<Self, EngineError> {
        Self::new(GameConfig::new(memory_size, max_players))
    }

    fn ensure(&self, operation: Operation) -> Result<(), EngineError> {
        if operation.required_phase() == self.phase {
            Ok(())
        } else {
            Err(EngineError::PhaseViolation {
                operation,
                phase: self.phase,
            })
        }
    }

    fn running_arena(&self) -> Result<&Arena, EngineError> {
        self.ensure(Operation::Inspect)?;
        self.arena
            .as_ref()
            .ok_or(EngineError::PhaseViolation {
                operation: Operation::Inspect,
                phase: self.phase,
            })
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    #[must_use]
    pub fn mode(&self) -> InitializationMode {
        self.config.init_mode
    }

    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.config.memory_size
    }

    /// Read access to the roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn register(&mut self, name: &str, program: Vec<Instruction>) -> Result<(), EngineError> {
        self.ensure(Operation::Register)?;
        self.roster.register(name, program)
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), EngineError> {
        self.ensure(Operation::Unregister)?;
        self.roster.unregister(name).map(|_| ())
    }

    /// Registered template names in lexical order.
    #[must_use]
    pub fn registered_names(&self) -> Vec<String> {
        self.roster.registered_names().map(str::to_owned).collect()
    }

    /// Select the filler by name: `stop` or `random`, the latter with a seed.
    pub fn set_init_mode(&mut self, name: &str, seed: Option<i32>) -> Result<(), EngineError> {
        self.ensure(Operation::SetInitMode)?;
        let mode = InitializationMode::parse(name, seed)?;
        self.set_mode(mode)
    }

    pub fn set_mode(&mut self, mode: InitializationMode) -> Result<(), EngineError> {
        self.ensure(Operation::SetInitMode)?;
        mode.validate()?;
        debug!(%mode, "initialization mode changed");
        self.config.init_mode = mode;
        Ok(())
    }

    /// Activate `names`, lay out the arena, and enter the running phase.
    ///
    /// On failure the roster keeps its templates, no instance survives, and the game
    /// stays in the initialization phase.
    pub fn start<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), EngineError> {
        self.ensure(Operation::Start)?;
        if names.len() < MIN_PLAYERS {
            return Err(EngineError::starting(EngineError::ArgumentInvalid(format!(
                "at least {MIN_PLAYERS} AIs are needed to start, got {}",
                names.len()
            ))));
        }

        let arena = self
            .roster
            .activate(names)
            .and_then(|_| MemoryInitializer::new(self.config.init_mode).initialize(&mut self.roster));
        match arena {
            Ok(arena) => {
                self.arena = Some(arena);
                self.scheduler = Scheduler::new();
                self.phase = GamePhase::Running;
                info!(
                    ais = self.roster.active_count(),
                    memory_size = self.config.memory_size,
                    mode = %self.config.init_mode,
                    "game started"
                );
                Ok(())
            }
            Err(err) => {
                self.roster.clear_instances();
                warn!(error = %err, "game start rolled back");
                Err(EngineError::starting(err))
            }
        }
    }

    /// Run up to `count` turns and report the AIs that stopped meanwhile.
    pub fn step(&mut self, count: u64) -> Result<Vec<StopEvent>, EngineError> {
        self.ensure(Operation::Step)?;
        let arena = self.arena.as_mut().ok_or(EngineError::PhaseViolation {
            operation: Operation::Step,
            phase: self.phase,
        })?;
        self.scheduler.step(arena, &mut self.roster, count)
    }

    /// Discard the battle and return to the initialization phase, keeping templates.
    pub fn end(&mut self) -> Result<(), EngineError> {
        self.ensure(Operation::End)?;
        self.arena = None;
        self.roster.clear_instances();
        self.scheduler = Scheduler::new();
        self.phase = GamePhase::Initialization;
        info!("game ended");
        Ok(())
    }

    /// Owner and bomb flag of every cell.
    pub fn ownership(&self) -> Result<Vec<CellOwnership>, EngineError> {
        Ok(self.running_arena()?.ownership())
    }

    /// Copy of every cell.
    pub fn cells(&self) -> Result<Vec<Instruction>, EngineError> {
        let arena = self.running_arena()?;
        (0..arena.size() as i64).map(|i| arena.get(i)).collect()
    }

    /// Raw-checked single cell.
    pub fn cell(&self, index: i64) -> Result<Instruction, EngineError> {
        self.running_arena()?.cell(index)
    }

    /// `len` cells from the raw-checked `start`, wrapping around the arena.
    pub fn segment(&self, start: i64, len: usize) -> Result<Vec<Instruction>, EngineError> {
        self.running_arena()?.segment(start, len)
    }

    pub fn ai_report(&self, name: &str) -> Result<AiReport, EngineError> {
        let arena = self.running_arena()?;
        let instance = self
            .roster
            .instance(name)
            .ok_or_else(|| EngineError::MissingAi(format!("AI {name} is not in the current game")))?;
        let next_instruction = if instance.is_active() {
            Some(arena.get(instance.pointer() as i64)?)
        } else {
            None
        };
        Ok(AiReport {
            name: instance.name().to_owned(),
            status: instance.status(),
            pointer: instance.pointer(),
            steps: instance.counter(),
            next_instruction,
        })
    }

    /// Active AI names in activation order.
    #[must_use]
    pub fn running_ais(&self) -> Vec<String> {
        self.roster.active().map(|ai| ai.name().to_owned()).collect()
    }

    /// Stopped AI names in activation order.
    #[must_use]
    pub fn stopped_ais(&self) -> Vec<String> {
        self.roster.stopped().map(|ai| ai.name().to_owned()).collect()
    }

    /// The AI whose turn comes next.
    #[must_use]
    pub fn next_to_move(&self) -> Option<String> {
        self.scheduler
            .next_to_move(&self.roster)
            .map(AiInstance::name)
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;

    fn game() -> Game {
        let mut game = Game::with_size(16, 3).expect("game");
        game.register("imp", vec![Instruction::new(Opcode::MovR, 0, 1)])
            .expect("imp");
        game.register(
            "dwarf",
            vec![
                Instruction::new(Opcode::Add, 4, 3),
                Instruction::new(Opcode::MovR, 2, 2),
                Instruction::new(Opcode::Jmp, -2, 0),
            ],
        )
        .expect("dwarf");
        game
    }

    #[test]
    fn every_operation_names_one_phase() {
        let init = [
            Operation::Register,
            Operation::Unregister,
            Operation::SetInitMode,
            Operation::Start,
        ];
        assert!(init.iter().all(|op| op.required_phase() == GamePhase::Initialization));
        let running = [Operation::Step, Operation::End, Operation::Inspect];
        assert!(running.iter().all(|op| op.required_phase() == GamePhase::Running));
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(matches!(Game::with_size(6, 2), Err(EngineError::ArgumentInvalid(_))));
        assert!(matches!(Game::with_size(16, 1), Err(EngineError::ArgumentInvalid(_))));
    }

    #[test]
    fn phase_gates_calls() {
        let mut game = game();
        assert_eq!(
            game.step(1),
            Err(EngineError::PhaseViolation {
                operation: Operation::Step,
                phase: GamePhase::Initialization
            })
        );
        assert!(matches!(game.end(), Err(EngineError::PhaseViolation { .. })));
        assert!(matches!(game.ownership(), Err(EngineError::PhaseViolation { .. })));

        game.start(&["imp", "dwarf"]).expect("start");
        assert_eq!(game.phase(), GamePhase::Running);
        let err = game
            .register("late", vec![Instruction::new(Opcode::Add, 0, 0)])
            .expect_err("late registration");
        assert_eq!(err.to_string(), "add-ai is not available during the running phase");
        assert!(matches!(game.set_init_mode("stop", None), Err(EngineError::PhaseViolation { .. })));
        assert!(matches!(game.start(&["imp", "dwarf"]), Err(EngineError::PhaseViolation { .. })));
    }

    #[test]
    fn start_needs_two_ais() {
        let mut game = game();
        let err = game.start(&["imp"]).expect_err("one AI");
        assert!(matches!(err, EngineError::StartingGame(_)));
        assert_eq!(game.phase(), GamePhase::Initialization);
    }

    #[test]
    fn failed_start_rolls_back() {
        let mut game = game();
        game.set_init_mode("random", Some(9)).expect("mode");
        let err = game.start(&["imp", "ghost"]).expect_err("unknown AI");
        assert!(matches!(err.root_cause(), EngineError::MissingAi(_)));
        assert_eq!(game.phase(), GamePhase::Initialization);
        assert_eq!(game.mode(), InitializationMode::Random { seed: 9 });
        assert_eq!(game.registered_names(), vec!["dwarf", "imp"]);
        assert_eq!(game.roster().instances().count(), 0);
        game.start(&["imp", "dwarf"]).expect("retry");
    }

    #[test]
    fn introspection_while_running() {
        let mut game = game();
        game.start(&["dwarf", "imp"]).expect("start");
        assert_eq!(game.running_ais(), vec!["dwarf", "imp"]);
        assert_eq!(game.next_to_move().as_deref(), Some("dwarf"));
        assert_eq!(game.ownership().expect("ownership").len(), 16);
        assert_eq!(game.cells().expect("cells").len(), 16);

        let report = game.ai_report("imp").expect("report");
        assert_eq!(report.pointer, 8);
        assert_eq!(report.status, AiStatus::Active);
        assert_eq!(
            report.next_instruction.map(|cell| cell.opcode()),
            Some(Opcode::MovR)
        );
        assert!(matches!(game.ai_report("ghost"), Err(EngineError::MissingAi(_))));

        assert!(matches!(game.cell(16), Err(EngineError::MemoryOutOfBounds { .. })));
        assert_eq!(game.segment(14, 4).expect("segment").len(), 4);

        game.step(1).expect("step");
        assert_eq!(game.next_to_move().as_deref(), Some("imp"));
        assert_eq!(game.cell(0).expect("cell").arg_b(), 7);
    }

    #[test]
    fn end_discards_battle_but_keeps_templates() {
        let mut game = game();
        game.start(&["imp", "imp", "dwarf"]).expect("start");
        assert_eq!(game.running_ais(), vec!["imp#0", "imp#1", "dwarf"]);
        game.step(10).expect("step");
        game.end().expect("end");
        assert_eq!(game.phase(), GamePhase::Initialization);
        assert_eq!(game.registered_names(), vec!["dwarf", "imp"]);
        assert!(game.running_ais().is_empty());
        assert!(game.stopped_ais().is_empty());
        assert!(game.next_to_move().is_none());
        game.unregister("imp").expect("unregister");
    }
}
