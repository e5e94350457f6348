//! Named selections: a `.conselect` file listing patterns, directory names
//! and file names.

use crate::app::error::{ConcatError, Result};
use crate::app::ignore_map::IgnoreMap;
use crate::app::models::{ResolvedFileSet, WalkOptions};
use crate::app::resolver::ResolveOptions;
use crate::app::scanner::{FileScanner, ScanOptions};
use crate::app::walker::PathWalker;
use std::fs;
use std::path::{Path, PathBuf};

pub const SELECT_FILE_NAME: &str = ".conselect";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub patterns: Vec<String>,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Patterns,
    Directories,
    Files,
}

impl Selection {
    /// Lines outside a known section are ignored, as are `#` comments.
    pub fn parse(content: &str) -> Self {
        let mut selection = Selection::default();
        let mut section = Section::None;

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line {
                "[Patterns]" => section = Section::Patterns,
                "[Directories]" => section = Section::Directories,
                "[Files]" => section = Section::Files,
                _ => match section {
                    Section::Patterns => selection.patterns.push(line.to_string()),
                    Section::Directories => selection
                        .directories
                        .push(line.trim_end_matches('/').to_string()),
                    Section::Files => selection.files.push(line.to_string()),
                    Section::None => log::debug!("ignoring line outside a section: {}", line),
                },
            }
        }
        selection
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConcatError::read_error(path, e))?;
        Ok(Self::parse(&content))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.directories.is_empty() && self.files.is_empty()
    }

    /// Pattern matches, then whole directories found by name at any depth,
    /// then files found by base name. Deduplicated and sorted.
    pub fn resolve(
        &self,
        root: &Path,
        options: &ResolveOptions,
        ignore_map: Option<&IgnoreMap>,
    ) -> Result<Vec<PathBuf>> {
        let walk = WalkOptions {
            include_empty: false,
            ..options.walk.clone()
        };
        let scan = |dir: &Path, include: Vec<String>| -> Result<Vec<PathBuf>> {
            let scan_options = ScanOptions {
                walk: walk.clone(),
                ignore_static_defaults: options.ignore_static_defaults,
                ..Default::default()
            }
            .with_include(include);
            FileScanner::new(dir, scan_options, ignore_map)?.scan()
        };

        let mut set = ResolvedFileSet::default();

        if !self.patterns.is_empty() {
            for path in scan(root, self.patterns.clone())? {
                set.insert(path);
            }
        }

        let walker = PathWalker::new(root, walk.clone()).with_ignore_map(ignore_map);
        for name in &self.directories {
            let found = walker.find_directories(name)?;
            if found.is_empty() {
                log::warn!("no directory named {} under {}", name, root.display());
            }
            for dir in found {
                for path in scan(&dir, vec!["*".to_string()])? {
                    set.insert(path);
                }
            }
        }

        if !self.files.is_empty() {
            let all = scan(root, vec!["*".to_string()])?;
            for target in &self.files {
                let mut hits = 0;
                for path in all.iter().filter(|p| p.file_name().is_some_and(|n| n == target.as_str())) {
                    set.insert(path.clone());
                    hits += 1;
                }
                if hits == 0 {
                    log::warn!("no file named {} under {}", target, root.display());
                }
            }
        }

        options.safeguard.screen(set.into_sorted(), options.secrets)
    }
}

pub fn default_template() -> &'static str {
    "[Patterns]\n\
     # Add glob patterns, e.g. *.rs\n\
     \n\
     [Directories]\n\
     # Add directory names, e.g. src/\n\
     \n\
     [Files]\n\
     # Add file names, e.g. README.md\n"
}
