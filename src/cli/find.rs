//! Find CLI command.

use super::run::{
    DocumentArgs, apply_instruction, build_orchestrator, open_document, report_warnings,
};
use crate::config::InstructConfig;
use crate::models::Instruction;
use crate::services::InstructionService;
use crate::storage::FileInstructionStore;
use crate::{Error, Result};
use std::io::{self, Write};

/// Writes numbered suggestions, most used first.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_suggestions<W: Write>(writer: &mut W, suggestions: &[Instruction]) -> io::Result<()> {
    if suggestions.is_empty() {
        return writeln!(writer, "No instructions found.");
    }
    for (n, instruction) in suggestions.iter().enumerate() {
        writeln!(
            writer,
            "{:>3}. {} ({}x)",
            n + 1,
            instruction.text,
            instruction.usage_count
        )?;
    }
    Ok(())
}

/// Executes the find command.
///
/// Without `pick`, prints the suggestions for `query`. With `pick`, runs the
/// N-th suggestion (1-based) exactly like `run`.
///
/// # Errors
///
/// Returns an error if the history cannot be read, `pick` is out of range, or
/// the picked instruction fails like `run` would.
pub fn cmd_find(
    config: &InstructConfig,
    query: Option<&str>,
    pick: Option<usize>,
    multiple: bool,
    document: &DocumentArgs,
) -> Result<()> {
    let service = InstructionService::new(FileInstructionStore::new(config.data_path.clone()));
    let suggestions = service.suggestions(query.unwrap_or_default(), None)?;
    tracing::debug!(
        query = query.unwrap_or_default(),
        matches = suggestions.len(),
        "Searched instruction history"
    );

    let Some(pick) = pick else {
        return write_suggestions(&mut io::stdout().lock(), &suggestions)
            .map_err(|e| Error::operation("write_stdout", e));
    };

    let chosen = pick
        .checked_sub(1)
        .and_then(|i| suggestions.get(i))
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "--pick {pick} is out of range ({} suggestions)",
                suggestions.len()
            ))
        })?;

    let mut document = open_document(document)?;
    let orchestrator = build_orchestrator(config)?;
    let report = apply_instruction(&orchestrator, document.as_mut(), &chosen.text, multiple)?;
    report_warnings(&mut io::stderr().lock(), &report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstructionId;

    #[test]
    fn test_write_suggestions() {
        let suggestions = vec![
            Instruction {
                id: InstructionId::new(2),
                text: "Translate to German".to_string(),
                usage_count: 5,
            },
            Instruction {
                id: InstructionId::new(1),
                text: "Translate to French".to_string(),
                usage_count: 1,
            },
        ];
        let mut out = Vec::new();
        write_suggestions(&mut out, &suggestions).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "  1. Translate to German (5x)\n  2. Translate to French (1x)\n"
        );
    }

    #[test]
    fn test_write_no_suggestions() {
        let mut out = Vec::new();
        write_suggestions(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No instructions found.\n");
    }

    #[test]
    fn test_pick_out_of_range() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = InstructConfig::new().with_data_path(dir.path().join("instructions.json"));
        let err = cmd_find(&config, None, Some(1), false, &DocumentArgs::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
