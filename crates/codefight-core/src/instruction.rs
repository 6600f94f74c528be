//! The nine CodeFight opcodes and the value-semantics cell that carries them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EngineError;

/// Closed set of instruction kinds. Discriminants are the numeric opcode ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    #[serde(rename = "STOP")]
    Stop = 0,
    #[serde(rename = "MOV_R")]
    MovR = 1,
    #[serde(rename = "MOV_I")]
    MovI = 2,
    #[serde(rename = "ADD")]
    Add = 3,
    #[serde(rename = "ADD_R")]
    AddR = 4,
    #[serde(rename = "JMP")]
    Jmp = 5,
    #[serde(rename = "JMZ")]
    Jmz = 6,
    #[serde(rename = "CMP")]
    Cmp = 7,
    #[serde(rename = "SWAP")]
    Swap = 8,
}

impl Opcode {
    /// Number of distinct opcodes; random fillers draw ids from `0..COUNT`.
    pub const COUNT: u8 = 9;

    /// Every opcode in id order.
    pub const ALL: [Opcode; 9] = [
        Self::Stop,
        Self::MovR,
        Self::MovI,
        Self::Add,
        Self::AddR,
        Self::Jmp,
        Self::Jmz,
        Self::Cmp,
        Self::Swap,
    ];

    /// Numeric id of the opcode.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look an opcode up by its numeric id.
    pub fn from_id(id: u8) -> Result<Self, EngineError> {
        Self::ALL
            .get(usize::from(id))
            .copied()
            .ok_or_else(|| EngineError::ArgumentInvalid(format!("instruction id {id} does not exist")))
    }

    /// Assembly mnemonic, e.g. `MOV_R`.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::MovR => "MOV_R",
            Self::MovI => "MOV_I",
            Self::Add => "ADD",
            Self::AddR => "ADD_R",
            Self::Jmp => "JMP",
            Self::Jmz => "JMZ",
            Self::Cmp => "CMP",
            Self::Swap => "SWAP",
        }
    }

    /// Whether an AI may begin executing at a cell holding this opcode.
    #[must_use]
    pub const fn is_valid_first_instruction(self) -> bool {
        !matches!(self, Self::Stop)
    }

    /// Bomb rule for a cell holding this opcode with the given arguments.
    #[must_use]
    pub const fn is_bomb(self, arg_a: i32, arg_b: i32) -> bool {
        match self {
            Self::Stop => true,
            Self::Jmp => arg_a == 0,
            Self::Jmz => arg_a == 0 && arg_b == 0,
            Self::MovR | Self::MovI | Self::Add | Self::AddR | Self::Cmp | Self::Swap => false,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Opcode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|opcode| opcode.mnemonic() == s)
            .ok_or_else(|| EngineError::ArgumentInvalid(format!("instruction {s} does not exist")))
    }
}

/// One memory cell: an opcode, two arguments, and attribution metadata.
///
/// Cells are plain values. Reading one out of the arena or a template yields an
/// independent copy, so mutating the copy never reaches the stored cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    arg_a: i32,
    arg_b: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default)]
    bomb: bool,
}

impl Instruction {
    /// Unowned cell with the bomb flag cleared.
    #[must_use]
    pub const fn new(opcode: Opcode, arg_a: i32, arg_b: i32) -> Self {
        Self {
            opcode,
            arg_a,
            arg_b,
            owner: None,
            bomb: false,
        }
    }

    /// Cell attributed to `owner` without touching the bomb flag.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[must_use]
    pub const fn arg_a(&self) -> i32 {
        self.arg_a
    }

    #[must_use]
    pub const fn arg_b(&self) -> i32 {
        self.arg_b
    }

    /// Name of the AI that last wrote this cell, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Display-only hazard flag, refreshed whenever an AI writes the cell.
    #[must_use]
    pub const fn is_bomb(&self) -> bool {
        self.bomb
    }

    #[must_use]
    pub const fn is_valid_first_instruction(&self) -> bool {
        self.opcode.is_valid_first_instruction()
    }

    pub(crate) fn set_arg_a(&mut self, value: i32) {
        self.arg_a = value;
    }

    pub(crate) fn set_arg_b(&mut self, value: i32) {
        self.arg_b = value;
    }

    /// Attribute the cell to `editor` and recompute its bomb flag.
    pub(crate) fn stamp(&mut self, editor: &str) {
        self.owner = Some(editor.to_owned());
        self.bomb = self.opcode.is_bomb(self.arg_a, self.arg_b);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.opcode, self.arg_a, self.arg_b)
    }
}

/// Parse the textual program format: comma separated `OPCODE,argA,argB` triples.
///
/// ```
/// use codefight_core::{Opcode, parse_program};
///
/// let program = parse_program("ADD,4,3, JMP,-1,0").unwrap();
/// assert_eq!(program.len(), 2);
/// assert_eq!(program[1].opcode(), Opcode::Jmp);
/// assert_eq!(program[1].arg_a(), -1);
/// ```
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, EngineError> {
    let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
    if text.trim().is_empty() || tokens.len() % 3 != 0 {
        return Err(EngineError::ArgumentInvalid(
            "each instruction must have a name and exactly two arguments".to_owned(),
        ));
    }
    tokens
        .chunks_exact(3)
        .map(|triple| {
            let opcode: Opcode = triple[0].parse()?;
            let arg_a = parse_argument(triple[1])?;
            let arg_b = parse_argument(triple[2])?;
            Ok(Instruction::new(opcode, arg_a, arg_b))
        })
        .collect()
}

fn parse_argument(raw: &str) -> Result<i32, EngineError> {
    raw.parse::<i32>().map_err(|_| {
        EngineError::ArgumentInvalid(format!("instruction argument {raw:?} must be a valid integer"))
    })
}
