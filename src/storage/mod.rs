//! Storage layer.
//!
//! The instruction history lives in a single JSON document that is read in
//! full on every operation and rewritten in full on every mutation.

// Lock guards are held across the whole read-modify-write on purpose.
#![allow(clippy::significant_drop_tightening)]

pub mod instruction;

pub use instruction::{FileInstructionStore, InstructionStorage};
