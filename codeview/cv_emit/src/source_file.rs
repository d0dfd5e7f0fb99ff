//! Source file table: path deduplication, normalization, content hashes.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rustc_hash::FxHashMap;

/// Ordinal of a registered source file within one unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct FileId(u32);

impl FileId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One registered source file.
#[derive(Debug)]
pub struct SourceFile {
    /// Path exactly as the front end reported it (the deduplication key).
    pub path: PathBuf,
    /// Consumer-facing spelling: separators normalized to backslashes.
    pub normalized: String,
    /// MD5 of the file contents; `None` when the file could not be read,
    /// in which case the file is omitted from the checksum table.
    pub digest: Option<[u8; 16]>,
}

/// Files referenced by the unit, deduplicated by original path and created
/// on first reference.
#[derive(Debug, Default)]
pub struct FileTable {
    map: FxHashMap<PathBuf, FileId>,
    files: Vec<SourceFile>,
}

impl FileTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file, reading and hashing its contents on first
    /// reference. An unreadable file degrades to a missing checksum, never
    /// an error.
    pub fn intern(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.map.get(path) {
            return id;
        }
        let digest = match std::fs::read(path) {
            Ok(contents) => Some(Md5::digest(&contents).into()),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cannot checksum source file");
                None
            }
        };
        self.insert(path, digest)
    }

    /// Register a file with externally supplied contents (or none).
    pub fn intern_with_contents(&mut self, path: &Path, contents: Option<&[u8]>) -> FileId {
        if let Some(&id) = self.map.get(path) {
            return id;
        }
        let digest = contents.map(|c| Md5::digest(c).into());
        self.insert(path, digest)
    }

    fn insert(&mut self, path: &Path, digest: Option<[u8; 16]>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.to_path_buf(),
            normalized: normalize(path),
            digest,
        });
        self.map.insert(path.to_path_buf(), id);
        id
    }

    #[must_use]
    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Debugger-facing path spelling: forward slashes become backslashes.
fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('/', "\\")
}
