//! List CLI command.

use crate::config::InstructConfig;
use crate::models::Instruction;
use crate::services::InstructionService;
use crate::storage::FileInstructionStore;
use crate::{Error, Result};
use std::io::{self, Write};
use std::str::FromStr;

/// Output format for the list command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// Pretty-printed JSON array.
    Json,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        })
    }
}

const TEXT_WIDTH: usize = 60;

/// Writes instructions as a table.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(writer: &mut W, instructions: &[Instruction]) -> io::Result<()> {
    if instructions.is_empty() {
        return writeln!(writer, "No instructions recorded.");
    }
    writeln!(writer, "{:<6} {:<15} TEXT", "USAGE", "ID")?;
    writeln!(writer, "{}", "-".repeat(80))?;
    for instruction in instructions {
        writeln!(
            writer,
            "{:<6} {:<15} {}",
            instruction.usage_count,
            instruction.id,
            truncate(&instruction.text, TEXT_WIDTH)
        )?;
    }
    Ok(())
}

/// Writes instructions as JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, instructions: &[Instruction]) -> Result<()> {
    let json = serde_json::to_string_pretty(instructions)
        .map_err(|e| Error::operation("serialize_instructions", e))?;
    writeln!(writer, "{json}").map_err(|e| Error::operation("write_stdout", e))
}

/// One line, at most `width` characters.
fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > width || line.len() < text.trim_end().len() {
        let kept: String = line.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        line.to_string()
    }
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the history exists but cannot be read, or output fails.
pub fn cmd_list(config: &InstructConfig, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let service = InstructionService::new(FileInstructionStore::new(config.data_path.clone()));
    let instructions = service.suggestions("", limit)?;
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Json => write_json(&mut out, &instructions),
        OutputFormat::Table => {
            write_table(&mut out, &instructions).map_err(|e| Error::operation("write_stdout", e))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstructionId;

    fn instruction(id: u64, text: &str, usage_count: u64) -> Instruction {
        Instruction {
            id: InstructionId::new(id),
            text: text.to_string(),
            usage_count,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str("other").unwrap(), OutputFormat::Table);
    }

    #[test]
    fn test_write_table() {
        let mut out = Vec::new();
        write_table(&mut out, &[instruction(7, "Summarize", 3)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("USAGE"));
        assert!(text.contains("3      7               Summarize"));
    }

    #[test]
    fn test_write_json_uses_document_field_names() {
        let mut out = Vec::new();
        write_json(&mut out, &[instruction(7, "Summarize", 3)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["usageCount"], 3);
        assert_eq!(value[0]["id"], 7);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("first\nsecond", 20), "first...");
    }
}
