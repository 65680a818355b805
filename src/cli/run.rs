//! Run CLI command.

use crate::Result;
use crate::config::InstructConfig;
use crate::document::{Document, FileDocument, FileSelection, LineRange, StdinDocument};
use crate::llm::{LlmProvider, OpenAiClient};
use crate::services::{
    CompletionReport, CompletionRequester, InstructionService, SelectionCompletionOrchestrator,
};
use crate::storage::{FileInstructionStore, InstructionStorage};
use std::io::{self, Write};
use std::path::PathBuf;

/// Where the selection comes from and where the replacement goes.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DocumentArgs {
    /// File to edit in place (stdin/stdout when omitted).
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Selected lines as `START:END` or `LINE` (1-based, inclusive).
    #[arg(short, long, requires = "file", conflicts_with = "cursor")]
    pub lines: Option<LineRange>,

    /// Empty selection; insert the completion before this line.
    #[arg(long, requires = "file")]
    pub cursor: Option<usize>,
}

impl DocumentArgs {
    /// The file selection these arguments describe.
    #[must_use]
    pub const fn selection(&self) -> FileSelection {
        match (self.lines, self.cursor) {
            (Some(range), _) => FileSelection::Lines(range),
            (None, Some(line)) => FileSelection::Cursor(line),
            (None, None) => FileSelection::Whole,
        }
    }
}

/// Opens the document named by `args`.
///
/// # Errors
///
/// Returns [`Error::NoActiveDocument`](crate::Error::NoActiveDocument) when no
/// file is given and stdin is a terminal, or the error from opening the file.
pub fn open_document(args: &DocumentArgs) -> Result<Box<dyn Document>> {
    match &args.file {
        Some(path) => Ok(Box::new(FileDocument::open(path.clone(), args.selection())?)),
        None => Ok(Box::new(StdinDocument::from_stdin()?)),
    }
}

/// Builds the orchestrator over the configured store and `OpenAI` client.
///
/// # Errors
///
/// Returns an error if the instruction history cannot be created.
pub fn build_orchestrator(
    config: &InstructConfig,
) -> Result<SelectionCompletionOrchestrator<FileInstructionStore, OpenAiClient>> {
    let store = FileInstructionStore::open(config.data_path.clone())?;
    let requester = CompletionRequester::new(OpenAiClient::from_config(&config.llm))
        .with_max_concurrency(config.llm.max_concurrency);
    Ok(SelectionCompletionOrchestrator::from_parts(
        InstructionService::new(store),
        requester,
    ))
}

/// Runs `instruction` against the document's selection and writes the
/// replacement back.
///
/// # Errors
///
/// Returns an error if the instruction is blank or the document cannot be
/// written.
pub fn apply_instruction<S: InstructionStorage, P: LlmProvider>(
    orchestrator: &SelectionCompletionOrchestrator<S, P>,
    document: &mut dyn Document,
    instruction: &str,
    multiple: bool,
) -> Result<CompletionReport> {
    let report = orchestrator.run(instruction, document.selection(), multiple)?;
    document.replace_selection(&report.replacement)?;
    Ok(report)
}

/// Writes the run's warnings to `writer`.
///
/// The replacement is already written by then, so a failed write is logged
/// rather than returned.
pub fn report_warnings<W: Write>(writer: &mut W, report: &CompletionReport) {
    if let Err(e) = write_warnings(writer, report) {
        tracing::warn!(error = %e, "Failed to write run warnings");
    }
}

/// Writes the non-fatal problems of a run, one per line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_warnings<W: Write>(writer: &mut W, report: &CompletionReport) -> io::Result<()> {
    if let Some(e) = &report.bookkeeping_error {
        writeln!(writer, "warning: instruction history not updated: {e}")?;
    }
    for failure in &report.failures {
        if report.requests > 1 {
            writeln!(
                writer,
                "warning: completion for line {} failed: {}",
                failure.index + 1,
                failure.error
            )?;
        } else {
            writeln!(writer, "warning: completion failed: {}", failure.error)?;
        }
    }
    Ok(())
}

/// Executes the run command.
///
/// # Errors
///
/// Returns an error if there is no document, the instruction is blank, or the
/// document cannot be written.
pub fn cmd_run(
    config: &InstructConfig,
    instruction: &str,
    multiple: bool,
    document: &DocumentArgs,
) -> Result<()> {
    let mut document = open_document(document)?;
    let orchestrator = build_orchestrator(config)?;
    let report = apply_instruction(&orchestrator, document.as_mut(), instruction, multiple)?;
    report_warnings(&mut io::stderr().lock(), &report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::services::SlotFailure;

    struct Fixed;

    impl LlmProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn complete(&self, _prompt: &str) -> Result<Option<String>> {
            Ok(Some("done".to_string()))
        }
    }

    #[test]
    fn test_document_args_selection() {
        let mut args = DocumentArgs::default();
        assert_eq!(args.selection(), FileSelection::Whole);

        args.cursor = Some(3);
        assert_eq!(args.selection(), FileSelection::Cursor(3));

        let range = LineRange::new(1, 2).unwrap();
        args.lines = Some(range);
        assert_eq!(args.selection(), FileSelection::Lines(range));
    }

    #[test]
    fn test_apply_instruction_to_stdin_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileInstructionStore::open(dir.path().join("instructions.json")).unwrap();
        let orchestrator = SelectionCompletionOrchestrator::new(store, Fixed);
        let mut document = StdinDocument::from_reader("text\n".as_bytes(), Vec::new()).unwrap();

        let report = apply_instruction(&orchestrator, &mut document, "Fix", false).unwrap();
        assert_eq!(report.replacement, "text\ndone");
        assert_eq!(document.into_output(), b"text\ndone\n");
    }

    /// Rejects every write.
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn failed_report() -> CompletionReport {
        CompletionReport {
            replacement: String::new(),
            mode: crate::services::SelectionMode::Multiple,
            requests: 3,
            instruction: None,
            bookkeeping_error: Some(Error::operation("write_instructions", "disk full")),
            failures: vec![SlotFailure {
                index: 1,
                error: Error::operation("openai_request", "timeout"),
            }],
        }
    }

    #[test]
    fn test_write_warnings() {
        let report = failed_report();
        let mut out = Vec::new();
        write_warnings(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("history not updated"));
        assert!(text.contains("line 2 failed"));
    }

    #[test]
    fn test_report_warnings_survives_closed_stream() {
        let report = failed_report();
        let mut closed = Closed;
        assert!(write_warnings(&mut closed, &report).is_err());
        report_warnings(&mut closed, &report);

        let mut out = Vec::new();
        report_warnings(&mut out, &report);
        assert!(String::from_utf8(out).unwrap().contains("line 2 failed"));
    }
}
