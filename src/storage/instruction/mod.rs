//! Instruction history storage.
//!
//! # Document Format
//!
//! ```json
//! {
//!     "instructions": [
//!         { "id": 1700000000000, "text": "Summarize", "usageCount": 3 }
//!     ]
//! }
//! ```
//!
//! The document is UTF-8, pretty-printed with 4-space indentation, and always
//! a single object with exactly one key.

mod filesystem;
mod traits;

pub use filesystem::{DEFAULT_FILE_NAME, FileInstructionStore};
pub use traits::InstructionStorage;
