//! Fixed-size circular memory shared by every AI in a battle.

use serde::{Deserialize, Serialize};

use crate::exec::Machine;
use crate::instruction::Instruction;
use crate::roster::Roster;
use crate::{EngineError, normalize};

/// Attribution view of one cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CellOwnership {
    pub owner: Option<String>,
    pub bomb: bool,
}

/// Circular array of cells.
///
/// Every public accessor normalizes its index, except the raw-checked lookups
/// [`Arena::cell`] and [`Arena::segment`] used for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arena {
    cells: Vec<Option<Instruction>>,
}

impl Arena {
    /// Allocate `size` empty cells.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![None; size],
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Normalized storage index for `index`.
    #[inline]
    #[must_use]
    pub fn address(&self, index: i64) -> usize {
        normalize(index, self.size())
    }

    /// Copy of the cell at `index` (normalized).
    pub fn get(&self, index: i64) -> Result<Instruction, EngineError> {
        let address = self.address(index);
        self.cells
            .get(address)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(EngineError::UninitializedCell(address))
    }

    /// Overwrite the cell at `index` (normalized).
    pub fn put(&mut self, index: i64, instruction: Instruction) {
        let address = self.address(index);
        if let Some(slot) = self.cells.get_mut(address) {
            *slot = Some(instruction);
        }
    }

    #[must_use]
    pub fn is_empty(&self, index: i64) -> bool {
        let address = self.address(index);
        self.cells.get(address).is_none_or(Option::is_none)
    }

    /// True once no cell is empty.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Reject an index that lies outside `[0, size)` before normalization.
    pub fn check_index(&self, index: i64) -> Result<usize, EngineError> {
        usize::try_from(index)
            .ok()
            .filter(|&address| address < self.size())
            .ok_or(EngineError::MemoryOutOfBounds {
                index,
                size: self.size(),
            })
    }

    /// Raw-checked read of a single cell.
    pub fn cell(&self, index: i64) -> Result<Instruction, EngineError> {
        let address = self.check_index(index)?;
        self.get(address as i64)
    }

    /// Up to `len` consecutive cells starting at the raw-checked `start`, wrapping at
    /// the end. The length is capped at the arena size.
    pub fn segment(&self, start: i64, len: usize) -> Result<Vec<Instruction>, EngineError> {
        let start = self.check_index(start)?;
        (start..start + len.min(self.size()))
            .map(|address| self.get(address as i64))
            .collect()
    }

    /// Owner and bomb flag of every cell in address order.
    #[must_use]
    pub fn ownership(&self) -> Vec<CellOwnership> {
        self.cells
            .iter()
            .map(|cell| match cell {
                Some(instruction) => CellOwnership {
                    owner: instruction.owner().map(str::to_owned),
                    bomb: instruction.is_bomb(),
                },
                None => CellOwnership::default(),
            })
            .collect()
    }

    /// Copies of every cell in address order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Option<Instruction>> {
        self.cells.clone()
    }

    /// Run the instruction stored at `index` on behalf of `executor`.
    pub fn execute(
        &mut self,
        roster: &mut Roster,
        index: i64,
        executor: &str,
    ) -> Result<(), EngineError> {
        Machine::new(self, roster).execute(index, executor)
    }
}
