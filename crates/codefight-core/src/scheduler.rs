//! Round-robin dispatch over the active AIs.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::EngineError;
use crate::arena::Arena;
use crate::roster::{AiInstance, Roster};

/// An AI that executed `STOP` during a step batch, with its final step count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StopEvent {
    pub name: String,
    pub steps: u64,
}

/// Turn index into the shrinking list of active AIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    index: usize,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the next mover in the active list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The AI whose turn comes next, if any AI is still active.
    #[must_use]
    pub fn next_to_move<'r>(&self, roster: &'r Roster) -> Option<&'r AiInstance> {
        roster.nth_active(self.index)
    }

    /// Execute up to `count` single-instruction turns.
    ///
    /// Stops early without error once every AI has stopped. Any failure aborts
    /// the batch as [`EngineError::GameExecution`]; turns already taken stay applied.
    pub fn step(
        &mut self,
        arena: &mut Arena,
        roster: &mut Roster,
        count: u64,
    ) -> Result<Vec<StopEvent>, EngineError> {
        let mut events = Vec::new();
        for _ in 0..count {
            if roster.active_count() == 0 {
                break;
            }
            if let Some(event) = self
                .turn(arena, roster)
                .map_err(EngineError::game_execution)?
            {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn turn(&mut self, arena: &mut Arena, roster: &mut Roster) -> Result<Option<StopEvent>, EngineError> {
        let current = roster
            .nth_active(self.index)
            .map(|instance| instance.name().to_owned())
            .ok_or_else(|| {
                EngineError::MissingAi(format!("no active AI at turn index {}", self.index))
            })?;
        let pointer = roster.pointer(&current)?;
        trace!(ai = %current, pointer, "executing turn");
        arena.execute(roster, pointer as i64, &current)?;

        match roster.pointer(&current) {
            Ok(pointer) => {
                roster.set_pointer(&current, pointer as i64 + 1)?;
                self.index = (self.index + 1) % roster.active_count();
                Ok(None)
            }
            Err(_) => {
                let steps = roster.counter(&current)?;
                debug!(ai = %current, steps, "AI executed its last step");
                if self.index >= roster.active_count() {
                    self.index = 0;
                }
                Ok(Some(StopEvent {
                    name: current,
                    steps,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{InitializationMode, MemoryInitializer};
    use crate::instruction::{Instruction, Opcode};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Arena of STOP cells with each program placed at its start and pointed to.
    /// An empty program leaves its AI standing on a STOP.
    fn battle(size: usize, programs: &[(&str, Vec<Instruction>, usize)]) -> (Arena, Roster) {
        let mut arena = Arena::new(size);
        for i in 0..size {
            arena.put(i as i64, Instruction::new(Opcode::Stop, 0, 0));
        }
        let mut roster = Roster::new(size, programs.len());
        for (name, _, _) in programs {
            roster
                .register(name, vec![Instruction::new(Opcode::Add, 0, 0)])
                .expect("register");
        }
        let names: Vec<&str> = programs.iter().map(|(name, _, _)| *name).collect();
        roster.activate(&names).expect("activate");
        for (name, program, start) in programs {
            for (offset, cell) in program.iter().enumerate() {
                arena.put((start + offset) as i64, cell.clone());
            }
            roster.initialize_pointer(name, *start as i64).expect("pointer");
        }
        (arena, roster)
    }

    #[test]
    fn both_stopping_ends_the_batch_quietly() {
        let (mut arena, mut roster) = battle(
            7,
            &[("imp", Vec::new(), 0), ("dwarf", Vec::new(), 3)],
        );
        let mut scheduler = Scheduler::new();
        let events = scheduler.step(&mut arena, &mut roster, 1000).expect("step");
        assert_eq!(
            events,
            vec![
                StopEvent { name: "imp".into(), steps: 0 },
                StopEvent { name: "dwarf".into(), steps: 0 },
            ]
        );
        assert_eq!(roster.active_count(), 0);
        assert!(scheduler.next_to_move(&roster).is_none());
    }

    #[test]
    fn turns_rotate_in_activation_order() {
        let looping = vec![Instruction::new(Opcode::Jmp, 0, 0)];
        let (mut arena, mut roster) = battle(
            9,
            &[
                ("a", looping.clone(), 0),
                ("b", looping.clone(), 3),
                ("c", looping, 6),
            ],
        );
        let mut scheduler = Scheduler::new();
        scheduler.step(&mut arena, &mut roster, 4).expect("step");
        assert_eq!(roster.counter("a"), Ok(2));
        assert_eq!(roster.counter("b"), Ok(1));
        assert_eq!(roster.counter("c"), Ok(1));
        assert_eq!(roster.pointer("a"), Ok(0));
        assert_eq!(
            scheduler.next_to_move(&roster).map(AiInstance::name),
            Some("b")
        );
    }

    #[test]
    fn stop_of_last_in_list_wraps_to_first() {
        let looping = vec![Instruction::new(Opcode::Jmp, 0, 0)];
        let (mut arena, mut roster) = battle(
            9,
            &[("a", looping.clone(), 0), ("b", looping, 3), ("c", Vec::new(), 6)],
        );
        let mut scheduler = Scheduler::new();
        let events = scheduler.step(&mut arena, &mut roster, 3).expect("step");
        assert_eq!(events, vec![StopEvent { name: "c".into(), steps: 0 }]);
        assert_eq!(scheduler.index(), 0);
        assert_eq!(
            scheduler.next_to_move(&roster).map(AiInstance::name),
            Some("a")
        );
    }

    #[test]
    fn stop_in_the_middle_hands_the_turn_to_the_successor() {
        let looping = vec![Instruction::new(Opcode::Jmp, 0, 0)];
        let (mut arena, mut roster) = battle(
            9,
            &[("a", looping.clone(), 0), ("b", Vec::new(), 3), ("c", looping, 6)],
        );
        let mut scheduler = Scheduler::new();
        scheduler.step(&mut arena, &mut roster, 2).expect("step");
        assert_eq!(
            scheduler.next_to_move(&roster).map(AiInstance::name),
            Some("c")
        );
        assert_eq!(roster.pointer("b").ok(), None);
        assert_eq!(roster.instance("b").map(AiInstance::pointer), Some(3));
    }

    #[test]
    fn failures_abort_the_batch_as_game_execution() {
        let (mut arena, mut roster) = battle(
            7,
            &[("imp", vec![Instruction::new(Opcode::Add, 1, 0)], 0), ("dwarf", Vec::new(), 3)],
        );
        let mut scheduler = Scheduler { index: 5 };
        let err = scheduler
            .step(&mut arena, &mut roster, 3)
            .expect_err("bad index");
        assert!(matches!(err, EngineError::GameExecution(_)));
        assert_eq!(roster.counter("imp"), Ok(0));
    }

    /// Scheduler that remembers *who* moves next instead of a list position.
    fn reference_run(arena: &mut Arena, roster: &mut Roster, count: u64) -> Vec<StopEvent> {
        let mut events = Vec::new();
        let mut next = roster.nth_active(0).map(|ai| ai.name().to_owned());
        for _ in 0..count {
            let Some(current) = next.clone() else { break };
            let order: Vec<String> = roster.instances().map(|ai| ai.name().to_owned()).collect();
            let pointer = roster.pointer(&current).expect("pointer");
            arena
                .execute(roster, pointer as i64, &current)
                .expect("execute");
            if let Ok(pointer) = roster.pointer(&current) {
                roster
                    .set_pointer(&current, pointer as i64 + 1)
                    .expect("advance");
            } else {
                events.push(StopEvent {
                    steps: roster.counter(&current).expect("counter"),
                    name: current.clone(),
                });
            }
            let position = order.iter().position(|name| *name == current).unwrap_or(0);
            next = order
                .iter()
                .cycle()
                .skip(position + 1)
                .take(order.len())
                .find(|name| roster.pointer(name).is_ok())
                .cloned();
        }
        events
    }

    #[test]
    fn index_rule_matches_identity_tracking_reference() {
        let mut seeds = SmallRng::seed_from_u64(0xC0DE);
        for _ in 0..40 {
            let seed = seeds.random_range(crate::MIN_SEED..=crate::MAX_SEED);
            let size = seeds.random_range(24..96);
            let players = seeds.random_range(2..6);
            let mut roster = Roster::new(size, players);
            let mut names = Vec::new();
            for p in 0..players {
                let name = format!("ai{p}");
                let program = vec![
                    Instruction::new(Opcode::MovR, seeds.random_range(-5..5), seeds.random_range(-5..5)),
                    Instruction::new(Opcode::Add, seeds.random_range(-3..3), seeds.random_range(-3..3)),
                    Instruction::new(Opcode::Jmz, seeds.random_range(-4..4), seeds.random_range(-4..4)),
                ];
                roster.register(&name, program).expect("register");
                names.push(name);
            }
            roster.activate(&names).expect("activate");
            let mut arena = MemoryInitializer::new(InitializationMode::Random { seed })
                .initialize(&mut roster)
                .expect("arena");

            let mut ref_arena = arena.clone();
            let mut ref_roster = roster.clone();
            let mut scheduler = Scheduler::new();

            let mut actual = Vec::new();
            for batch in [1, 7, 50, 400] {
                actual.extend(scheduler.step(&mut arena, &mut roster, batch).expect("step"));
            }
            let expected = reference_run(&mut ref_arena, &mut ref_roster, 458);

            assert_eq!(actual, expected, "seed {seed} size {size} players {players}");
            assert_eq!(arena, ref_arena, "seed {seed}");
        }
    }
}
