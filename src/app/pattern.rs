//! Glob compilation.
//!
//! Only `*` (any run of characters, including `/`) and `?` (any single
//! character) are special. Everything else is matched literally and the
//! pattern is anchored against the whole input.

use crate::app::error::{ConcatError, Result};
use regex::Regex;
use std::path::Path;

/// Compiles one glob into an anchored matcher.
pub fn compile(glob: &str) -> Result<Regex> {
    let escaped = regex::escape(glob)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped)).map_err(|source| ConcatError::PatternCompilationFailed {
        pattern: glob.to_string(),
        source,
    })
}

/// True when the token carries a wildcard.
pub fn is_glob(token: &str) -> bool {
    token.contains('*') || token.contains('?')
}

/// A compiled list of globs; a path matches when any member does.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    globs: Vec<String>,
    regexes: Vec<Regex>,
}

impl PatternSet {
    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn is_match_str(&self, candidate: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(candidate))
    }

    /// Matches the full path string or just its base name, so `*.log` and
    /// `secrets.txt` both work against absolute paths.
    pub fn is_match_path(&self, path: &Path) -> bool {
        if self.is_match_str(&path.to_string_lossy()) {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.is_match_str(&name.to_string_lossy()))
    }

    /// Like `is_match_path` but also tries the trailing-separator spelling
    /// used by directory patterns (`build/`, `*/backups/`).
    pub fn is_match_dir(&self, path: &Path) -> bool {
        if self.is_match_path(path) {
            return true;
        }
        let full = format!("{}/", path.to_string_lossy());
        if self.is_match_str(&full) {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.is_match_str(&format!("{}/", name.to_string_lossy())))
    }
}

/// Helper to build a pattern set from raw globs.
pub fn build_pattern_set<S: AsRef<str>>(patterns: &[S]) -> Result<PatternSet> {
    let mut set = PatternSet::default();
    for pat in patterns {
        let pat = pat.as_ref();
        set.regexes.push(compile(pat)?);
        set.globs.push(pat.to_string());
    }
    Ok(set)
}
