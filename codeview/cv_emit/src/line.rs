//! Per-function line table accumulation.

use crate::sink::Label;
use crate::source_file::FileId;

/// One (line, file) transition tagged with its code-position label.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub line: u32,
    pub file: FileId,
    pub label: Label,
}

/// Accumulates line transitions for one function. Consecutive duplicate
/// (line, file) pairs are not recorded twice.
#[derive(Debug, Default)]
pub struct LineTable {
    entries: Vec<LineEntry>,
}

impl LineTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, line: u32, file: FileId, label: Label) {
        if let Some(last) = self.entries.last() {
            if last.line == line && last.file == file {
                return;
            }
        }
        self.entries.push(LineEntry { line, file, label });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximal runs of consecutive entries sharing one source file; each
    /// run becomes one line-table block at emission.
    pub fn runs(&self) -> impl Iterator<Item = (FileId, &[LineEntry])> {
        self.entries
            .chunk_by(|a, b| a.file == b.file)
            .map(|run| (run[0].file, run))
    }
}
