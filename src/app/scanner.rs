use crate::app::error::Result;
use crate::app::ignore_map::IgnoreMap;
use crate::app::models::WalkOptions;
use crate::app::pattern::{build_pattern_set, PatternSet};
use crate::app::walker::PathWalker;
use std::path::PathBuf;

/// Names a run must never read back in: its own control files and the
/// default output artifacts.
pub struct StaticIgnores;

impl StaticIgnores {
    pub const CONFIGS: &'static [&'static str] = &[".conignore", ".conselect", ".configure", ".conany"];
    pub const OUTPUTS: &'static [&'static str] = &["concatenation.txt", "conselection.txt", "configure.txt"];
    pub const OTHER: &'static [&'static str] = &["concatenation", "tree"];

    pub fn all_patterns() -> Vec<String> {
        Self::CONFIGS
            .iter()
            .chain(Self::OUTPUTS)
            .chain(Self::OTHER)
            .map(|s| s.to_string())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub walk: WalkOptions,
    pub include: Vec<String>,
    pub exclude_files: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub ignore_static_defaults: bool,
    pub static_ignores: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            include: vec!["*".to_string()],
            exclude_files: Vec::new(),
            exclude_dirs: Vec::new(),
            ignore_static_defaults: true,
            static_ignores: StaticIgnores::all_patterns(),
        }
    }
}

impl ScanOptions {
    pub fn with_include(mut self, patterns: Vec<String>) -> Self {
        self.include = patterns;
        self
    }
}

/// Pattern filtering layered on top of `PathWalker`.
pub struct FileScanner<'a> {
    root: PathBuf,
    walk: WalkOptions,
    include_set: PatternSet,
    exclude_set: PatternSet,
    exclude_dir_set: PatternSet,
    ignore_map: Option<&'a IgnoreMap>,
}

impl<'a> FileScanner<'a> {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions, ignore_map: Option<&'a IgnoreMap>) -> Result<Self> {
        let mut exclude_files = Vec::new();
        if options.ignore_static_defaults {
            exclude_files.extend(options.static_ignores.iter().cloned());
        }
        exclude_files.extend(options.exclude_files.iter().cloned());

        Ok(Self {
            root: root.into(),
            walk: options.walk,
            include_set: build_pattern_set(&options.include)?,
            exclude_set: build_pattern_set(&exclude_files)?,
            exclude_dir_set: build_pattern_set(&options.exclude_dirs)?,
            ignore_map,
        })
    }

    /// Walks the root and keeps files matching an include pattern and no
    /// exclude pattern. Directories matching an exclude-directory pattern are
    /// pruned. Output is sorted by path string.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let walker = PathWalker::new(&self.root, self.walk.clone());
        let ignore_map = self.ignore_map;

        let entries = walker.walk_filtered(
            |dir| {
                !self.exclude_dir_set.is_match_dir(dir)
                    && !ignore_map.is_some_and(|m| m.should_ignore_entry(dir, true))
            },
            |file| {
                self.include_set.is_match_path(file)
                    && !self.exclude_set.is_match_path(file)
                    && !ignore_map.is_some_and(|m| m.should_ignore_entry(file, false))
            },
        )?;

        log::debug!(
            "scan of {} kept {} entries (include: {:?})",
            self.root.display(),
            entries.len(),
            self.include_set.globs()
        );
        Ok(entries.into_iter().map(|e| e.path).collect())
    }
}
