//! Opcode effects.
//!
//! Instructions carry no references to engine services. Executing one borrows the
//! arena and the roster together as a [`Machine`] for the duration of a single step.

use crate::EngineError;
use crate::arena::Arena;
use crate::instruction::{Instruction, Opcode};
use crate::roster::Roster;

/// Mutable execution context for one instruction.
#[derive(Debug)]
pub struct Machine<'a> {
    arena: &'a mut Arena,
    roster: &'a mut Roster,
}

impl<'a> Machine<'a> {
    #[must_use]
    pub fn new(arena: &'a mut Arena, roster: &'a mut Roster) -> Self {
        Self { arena, roster }
    }

    /// Execute the cell at `address` on behalf of `executor`.
    ///
    /// Relative targets are resolved against the executor's pointer. Any failure is
    /// reported as [`EngineError::InstructionExecution`].
    pub fn execute(&mut self, address: i64, executor: &str) -> Result<(), EngineError> {
        self.dispatch(address, executor)
            .map_err(EngineError::execution)
    }

    fn dispatch(&mut self, address: i64, executor: &str) -> Result<(), EngineError> {
        let address = self.arena.address(address) as i64;
        let instruction = self.arena.get(address)?;
        let pointer = self.roster.pointer(executor)? as i64;
        let arg_a = i64::from(instruction.arg_a());
        let arg_b = i64::from(instruction.arg_b());

        match instruction.opcode() {
            Opcode::Stop => return self.roster.stop(executor),
            Opcode::MovR => {
                let copy = self.arena.get(pointer + arg_a)?;
                self.write(pointer + arg_b, copy, executor);
            }
            Opcode::MovI => {
                let hop = self.arena.address(pointer + arg_b) as i64;
                let offset = i64::from(self.arena.get(hop)?.arg_b());
                let copy = self.arena.get(pointer + arg_a)?;
                self.write(hop + offset, copy, executor);
            }
            Opcode::Add => {
                let mut cell = instruction;
                cell.set_arg_b(cell.arg_b().wrapping_add(cell.arg_a()));
                self.write(address, cell, executor);
            }
            Opcode::AddR => {
                let mut target = self.arena.get(pointer + arg_b)?;
                target.set_arg_b(target.arg_b().wrapping_add(instruction.arg_a()));
                self.write(pointer + arg_b, target, executor);
            }
            Opcode::Jmp => self.jump(pointer + arg_a, executor)?,
            Opcode::Jmz => {
                if self.arena.get(pointer + arg_b)?.arg_b() == 0 {
                    self.jump(pointer + arg_a, executor)?;
                }
            }
            Opcode::Cmp => {
                let left = self.arena.get(pointer + arg_a)?.arg_a();
                let right = self.arena.get(pointer + arg_b)?.arg_b();
                if left != right {
                    self.roster.set_pointer(executor, pointer + 1)?;
                }
            }
            Opcode::Swap => {
                let first = self.arena.address(pointer + arg_a) as i64;
                let second = self.arena.address(pointer + arg_b) as i64;
                if first == second {
                    let mut cell = self.arena.get(first)?;
                    let (a, b) = (cell.arg_a(), cell.arg_b());
                    cell.set_arg_a(b);
                    cell.set_arg_b(a);
                    self.write(first, cell, executor);
                } else {
                    let mut left = self.arena.get(first)?;
                    let mut right = self.arena.get(second)?;
                    let held = left.arg_a();
                    left.set_arg_a(right.arg_b());
                    right.set_arg_b(held);
                    self.write(first, left, executor);
                    self.write(second, right, executor);
                }
            }
        }

        self.roster.increment_counter(executor)
    }

    fn write(&mut self, index: i64, mut cell: Instruction, executor: &str) {
        cell.stamp(executor);
        self.arena.put(index, cell);
    }

    /// The scheduler adds one after every surviving step, so land one cell short.
    fn jump(&mut self, target: i64, executor: &str) -> Result<(), EngineError> {
        let landing = self.arena.address(target) as i64;
        self.roster.set_pointer(executor, landing - 1)
    }
}
