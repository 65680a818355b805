//! Document access.
//!
//! A [`Document`] hands out the current selection and takes back the text that
//! replaces it. Two adapters exist:
//!
//! - [`FileDocument`]: a file on disk with a line-range selection, a cursor
//!   line, or the whole file selected.
//! - [`StdinDocument`]: stdin is the selection; the replacement is written to
//!   an output stream (stdout by default).

use crate::{Error, Result};
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Selection access for a document.
pub trait Document {
    /// Current selection text (may be empty).
    fn selection(&self) -> &str;

    /// Replaces the selection with `replacement` and persists the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    fn replace_selection(&mut self, replacement: &str) -> Result<()>;
}

/// A 1-based inclusive line range, written `START:END` or `LINE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// First line (1-based).
    pub start: usize,
    /// Last line (1-based, inclusive).
    pub end: usize,
}

impl LineRange {
    /// Creates a range, rejecting zero or reversed bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `start` is 0 or `end < start`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start == 0 || end < start {
            return Err(Error::InvalidInput(format!(
                "invalid line range {start}:{end} (lines are 1-based, start <= end)"
            )));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for LineRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("invalid line number '{part}'")))
        };
        match s.split_once(':') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => {
                let line = parse(s)?;
                Self::new(line, line)
            },
        }
    }
}

/// What part of a file is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    /// The whole file, minus one trailing newline.
    Whole,
    /// A range of lines.
    Lines(LineRange),
    /// Nothing selected; insert before the given 1-based line.
    Cursor(usize),
}

/// A file with a selection.
#[derive(Debug)]
pub struct FileDocument {
    path: PathBuf,
    content: String,
    /// Byte span of the selection within `content`.
    span: (usize, usize),
    /// Line breaks an insertion at the span needs around it.
    breaks: LineBreaks,
}

/// Line breaks placed around text inserted at a cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LineBreaks {
    /// The cursor follows a last line with no final newline.
    before: bool,
    /// The cursor sits in front of an existing line.
    after: bool,
}

impl FileDocument {
    /// Opens `path` and resolves `selection` against its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the selection lies
    /// outside the file.
    pub fn open(path: impl Into<PathBuf>, selection: FileSelection) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::operation("read_document", format!("{}: {e}", path.display())))?;
        let (span, breaks) = resolve(&content, selection)?;
        tracing::debug!(
            path = %path.display(),
            start = span.0,
            end = span.1,
            "Opened document"
        );
        Ok(Self {
            path,
            content,
            span,
            breaks,
        })
    }
}

impl Document for FileDocument {
    fn selection(&self) -> &str {
        &self.content[self.span.0..self.span.1]
    }

    fn replace_selection(&mut self, replacement: &str) -> Result<()> {
        let (start, end) = self.span;
        let mut inserted = replacement.to_string();
        let mut lead = 0;
        if !inserted.is_empty() {
            if self.breaks.after && !inserted.ends_with('\n') {
                inserted.push('\n');
            }
            if self.breaks.before {
                inserted.insert(0, '\n');
                lead = 1;
            }
        }
        self.content.replace_range(start..end, &inserted);
        self.span = (start + lead, start + inserted.len());
        self.breaks.before = false;

        fs::write(&self.path, &self.content).map_err(|e| {
            Error::operation("write_document", format!("{}: {e}", self.path.display()))
        })?;
        tracing::info!(path = %self.path.display(), "Replaced selection");
        Ok(())
    }
}

/// Byte offsets where each line starts.
fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Number of lines, not counting the empty remainder after a final newline.
fn line_count(content: &str, starts: &[usize]) -> usize {
    if content.ends_with('\n') {
        starts.len() - 1
    } else {
        starts.len()
    }
}

/// Resolves a selection into a byte span and the line breaks an insertion needs.
fn resolve(content: &str, selection: FileSelection) -> Result<((usize, usize), LineBreaks)> {
    let starts = line_starts(content);
    let lines = line_count(content, &starts);

    match selection {
        FileSelection::Whole => {
            let end = content.strip_suffix('\n').map_or(content.len(), str::len);
            Ok(((0, end), LineBreaks::default()))
        },
        FileSelection::Lines(range) => {
            if range.end > lines {
                return Err(Error::InvalidInput(format!(
                    "line range {range} is outside the document ({lines} lines)"
                )));
            }
            let start = starts[range.start - 1];
            let end = starts
                .get(range.end)
                .map_or(content.len(), |next| next - 1);
            Ok(((start, end), LineBreaks::default()))
        },
        FileSelection::Cursor(line) => {
            if line == 0 || line > lines + 1 {
                return Err(Error::InvalidInput(format!(
                    "cursor line {line} is outside the document ({lines} lines)"
                )));
            }
            let at = starts.get(line - 1).copied().unwrap_or(content.len());
            let breaks = LineBreaks {
                before: line > lines && !content.is_empty() && !content.ends_with('\n'),
                after: line <= lines,
            };
            Ok(((at, at), breaks))
        },
    }
}

/// Stdin as the selection, with the replacement written to an output stream.
pub struct StdinDocument<W: Write = io::Stdout> {
    selection: String,
    output: W,
}

impl StdinDocument<io::Stdout> {
    /// Reads the selection from stdin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveDocument`] when stdin is an interactive
    /// terminal, or an error if stdin cannot be read.
    pub fn from_stdin() -> Result<Self> {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Err(Error::NoActiveDocument);
        }
        Self::from_reader(stdin.lock(), io::stdout())
    }
}

impl<W: Write> StdinDocument<W> {
    /// Reads the selection from `reader`; the replacement goes to `output`.
    ///
    /// A single trailing newline is not part of the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails or yields invalid UTF-8.
    pub fn from_reader(mut reader: impl Read, output: W) -> Result<Self> {
        let mut selection = String::new();
        reader
            .read_to_string(&mut selection)
            .map_err(|e| Error::operation("read_stdin", e))?;
        if selection.ends_with('\n') {
            selection.pop();
            if selection.ends_with('\r') {
                selection.pop();
            }
        }
        Ok(Self { selection, output })
    }

    /// Consumes the document, returning the output stream.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<W: Write> Document for StdinDocument<W> {
    fn selection(&self) -> &str {
        &self.selection
    }

    fn replace_selection(&mut self, replacement: &str) -> Result<()> {
        writeln!(self.output, "{replacement}")
            .and_then(|()| self.output.flush())
            .map_err(|e| Error::operation("write_stdout", e))
    }
}
