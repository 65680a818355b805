//! Data models for instruct.

mod instruction;

pub use instruction::{Instruction, InstructionCollection, InstructionId};
