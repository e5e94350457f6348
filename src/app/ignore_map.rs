//! `.conignore` policy: file globs, directory globs and an obscure table.

use crate::app::error::{ConcatError, Result};
use crate::app::pattern::{build_pattern_set, PatternSet};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const IGNORE_FILE_NAME: &str = ".conignore";

/// How a literal value is masked in written output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObscureMethod {
    #[default]
    Redact,
    Preserve,
    Verbose,
}

impl FromStr for ObscureMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redact" => Ok(Self::Redact),
            "preserve" => Ok(Self::Preserve),
            "verbose" => Ok(Self::Verbose),
            other => Err(format!("unknown obscure method `{}`", other)),
        }
    }
}

impl fmt::Display for ObscureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redact => "redact",
            Self::Preserve => "preserve",
            Self::Verbose => "verbose",
        })
    }
}

/// Parsed and compiled ignore policy. Loaded once per run, shared by reference.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMap {
    pub ignore_files: Vec<String>,
    pub ignore_directories: Vec<String>,
    pub obscure: BTreeMap<String, ObscureMethod>,
    file_patterns: PatternSet,
    dir_patterns: PatternSet,
}

impl IgnoreMap {
    pub fn new(
        ignore_files: Vec<String>,
        ignore_directories: Vec<String>,
        obscure: BTreeMap<String, ObscureMethod>,
    ) -> Result<Self> {
        let file_patterns = build_pattern_set(&ignore_files)?;
        let dir_patterns = build_pattern_set(&ignore_directories)?;
        Ok(Self {
            ignore_files,
            ignore_directories,
            obscure,
            file_patterns,
            dir_patterns,
        })
    }

    /// Parses the three-section text format.
    pub fn parse(content: &str) -> Result<Self> {
        #[derive(Clone, Copy)]
        enum Section {
            None,
            Files,
            Directories,
            Obscure,
        }

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        let mut obscure = BTreeMap::new();
        let mut section = Section::None;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line {
                "[IgnoreFiles]" => {
                    section = Section::Files;
                    continue;
                }
                "[IgnoreDirectories]" => {
                    section = Section::Directories;
                    continue;
                }
                "[Obscure]" => {
                    section = Section::Obscure;
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Files => files.push(line.to_string()),
                Section::Directories => dirs.push(line.to_string()),
                Section::Obscure => {
                    let (value, method) = match line.split_once(':') {
                        Some((value, method)) => (value.trim(), method.trim()),
                        None => (line, ""),
                    };
                    let method = if method.is_empty() {
                        ObscureMethod::Redact
                    } else {
                        method.parse().unwrap_or_else(|err| {
                            log::warn!("{} for `{}`, falling back to redact", err, value);
                            ObscureMethod::Redact
                        })
                    };
                    obscure.insert(value.to_string(), method);
                }
                Section::None => {}
            }
        }

        Self::new(files, dirs, obscure)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let wrap = |source: ConcatError| ConcatError::IgnoreMapLoadFailed {
            path: path.to_path_buf(),
            source: Box::new(source),
        };
        let content = fs::read_to_string(path)
            .map_err(|e| wrap(ConcatError::read_error(path, e)))?;
        Self::parse(&content).map_err(wrap)
    }

    /// Single predicate used by walkers and scanners. Directory patterns only
    /// apply when `is_dir` is set.
    pub fn should_ignore_entry(&self, path: &Path, is_dir: bool) -> bool {
        if self.file_patterns.is_match_path(path) {
            return true;
        }
        is_dir && self.dir_patterns.is_match_dir(path)
    }
}

/// Flavour of a generated `.conignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreTemplate {
    Clean,
    Comments,
}

const DEFAULT_FILES: &[&str] = &["*.env", "*.log", "*.pem", "*.pub", "*.conf", "secrets.txt"];
const DEFAULT_DIRS: &[&str] = &["env/", "build/", ".build/", "*/backups/"];
const DEFAULT_OBSCURE: &[(&str, ObscureMethod)] = &[("apiKey", ObscureMethod::Verbose)];

fn push_section(out: &mut String, header: &str, comment: Option<&str>, body: &[String], empty: &str) {
    out.push_str(header);
    out.push('\n');
    if let Some(comment) = comment {
        out.push_str(&format!("# {}\n", comment));
    }
    if body.is_empty() {
        out.push_str(&format!("# {}\n", empty));
    } else {
        for line in body {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
}

/// Renders a `.conignore` file. Entries of `existing` replace the default
/// file and directory lists; obscure entries are merged with the defaults.
pub fn render_template(template: IgnoreTemplate, existing: Option<&IgnoreMap>) -> String {
    let (top, file_c, dir_c, obs_c): (&[&str], _, _, _) = match template {
        IgnoreTemplate::Clean => (&[], None, None, None),
        IgnoreTemplate::Comments => (
            &[
                ".conignore configuration file",
                "Use [IgnoreFiles] and [IgnoreDirectories] to skip items,",
                "and [Obscure] to mask sensitive values.",
            ],
            Some("List files to exclude (one per line)."),
            Some("List directories to exclude (one per line)."),
            Some("Specify value : method (redact, preserve, verbose)."),
        ),
    };

    let dedup = |items: &[String]| {
        let mut seen = std::collections::HashSet::new();
        items
            .iter()
            .filter(|item| seen.insert(item.as_str()))
            .cloned()
            .collect::<Vec<_>>()
    };
    let to_owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let files = existing.map_or_else(|| to_owned(DEFAULT_FILES), |m| dedup(&m.ignore_files));
    let dirs = existing.map_or_else(|| to_owned(DEFAULT_DIRS), |m| dedup(&m.ignore_directories));
    let mut obscure = existing.map(|m| m.obscure.clone()).unwrap_or_default();
    for (value, method) in DEFAULT_OBSCURE {
        obscure.insert(value.to_string(), *method);
    }
    let obscure: Vec<String> = obscure
        .iter()
        .map(|(value, method)| format!("{} : {}", value, method))
        .collect();

    let mut out = String::new();
    for line in top {
        out.push_str(&format!("# {}\n", line));
    }
    out.push('\n');
    push_section(&mut out, "[IgnoreFiles]", file_c, &files, "No files to ignore");
    push_section(&mut out, "[IgnoreDirectories]", dir_c, &dirs, "No directories to ignore");
    push_section(&mut out, "[Obscure]", obs_c, &obscure, "No values to obscure");
    out
}
