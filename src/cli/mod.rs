//! CLI command implementations.
//!
//! Each submodule implements one `instruct` subcommand. Argument parsing lives
//! in the binary; these functions take the parsed values and an explicit
//! [`InstructConfig`](crate::InstructConfig).
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Apply an instruction to the selection ("Instruct") |
//! | `run --multiple` | Apply it to each selected line ("Instruct - Multiple") |
//! | `find` | Suggest instructions from history, optionally run one |
//! | `list` | Show the history ranked by usage |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Continue a paragraph of a note in place
//! instruct run -i "Continue this paragraph" --file notes.md --lines 4:9
//!
//! # Translate each line from stdin
//! printf 'hello\ngoodbye\n' | instruct run -i "Translate to German" --multiple
//!
//! # Re-run the second most used instruction containing "translate"
//! instruct find translate --pick 2 --file notes.md --lines 12
//! ```

mod config;
mod find;
mod list;
mod run;

pub use config::{cmd_config, mask_secret, write_config};
pub use find::{cmd_find, write_suggestions};
pub use list::{OutputFormat, cmd_list, write_json, write_table};
pub use run::{
    DocumentArgs, apply_instruction, build_orchestrator, cmd_run, open_document, report_warnings,
    write_warnings,
};
