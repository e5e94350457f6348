//! Error types for selection, resolution and writing.
//!
//! Structural failures (DSL parse errors, missing literal files, bad patterns)
//! are single `ConcatError` values. Failures that happen for one entry while a
//! loop keeps going (walk entries, file reads) are collected as `EntryError`s
//! and surfaced together through `MultiError` once the loop has finished.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("no render(...) block found")]
    NoneFound,

    #[error("render block on line {line} has an empty output name")]
    MissingName { line: usize },

    #[error("render({name}) block is never closed")]
    UnclosedBlock { name: String },

    #[error("`{keyword}` section in render({name}) is never closed")]
    UnclosedSection { name: String, keyword: &'static str },

    #[error("malformed configuration on line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("path does not exist or is not a file: {0}")]
    NotFound(String),

    #[error("failed to compile pattern `{pattern}`")]
    PatternCompilationFailed {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to resolve {}", path.display())]
    PathResolutionFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load ignore map {}", path.display())]
    IgnoreMapLoadFailed {
        path: PathBuf,
        #[source]
        source: Box<ConcatError>,
    },

    #[error("refusing to include protected file {}: {reason}", path.display())]
    ProtectedFile { path: PathBuf, reason: String },

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to {operation} {}", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Entries(#[from] MultiError),
}

pub type Result<T> = std::result::Result<T, ConcatError>;

impl ConcatError {
    pub fn read_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation: "read",
            source,
        }
    }

    pub fn write_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation: "write",
            source,
        }
    }
}

/// Where in the pipeline an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Walk,
    Read,
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Walk => "walk",
            Stage::Read => "read",
            Stage::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// A failure tied to a single path. Never aborts sibling processing.
#[derive(Error, Debug)]
#[error("[{stage}] {}: {source}", path.display())]
pub struct EntryError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub source: io::Error,
}

impl EntryError {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, source: io::Error) -> Self {
        Self {
            path: path.into(),
            stage,
            source,
        }
    }

    pub(crate) fn from_walk(err: walkdir::Error, fallback: &Path) -> Self {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| fallback.to_path_buf());
        let stage = if err.loop_ancestor().is_some() {
            Stage::Resolve
        } else {
            Stage::Walk
        };
        let message = err.to_string();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other(message));
        Self::new(path, stage, source)
    }
}

/// Every per-entry failure of one walk or write, reported together.
#[derive(Debug, Default)]
pub struct MultiError {
    pub errors: Vec<EntryError>,
}

impl MultiError {
    pub fn push(&mut self, error: EntryError) {
        self.errors.push(error);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing failed, otherwise the whole collection.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConcatError::Entries(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "entry" } else { "entries" };
        write!(f, "{} {} failed:", self.errors.len(), noun)?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_error_lists_every_entry() {
        let mut errors = MultiError::default();
        errors.push(EntryError::new(
            "/tmp/a.txt",
            Stage::Read,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        errors.push(EntryError::new(
            "/tmp/b.bin",
            Stage::Decode,
            io::Error::new(io::ErrorKind::InvalidData, "not text"),
        ));

        let rendered = errors.to_string();
        assert!(rendered.starts_with("2 entries failed:"));
        assert!(rendered.contains("[read] /tmp/a.txt: denied"));
        assert!(rendered.contains("[decode] /tmp/b.bin: not text"));
    }

    #[test]
    fn test_empty_multi_error_is_ok() {
        assert!(MultiError::default().into_result().is_ok());
    }
}
