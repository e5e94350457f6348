use crate::app::safeguard::Denylist;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One `render(<name>) { ... }` block of a selection document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionBlock {
    pub output: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub context: Option<Context>,
}

/// Free-form metadata attached to a block and rendered as a preamble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub title: Option<String>,
    pub details: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.details.is_none() && self.dependencies.is_none()
    }
}

/// How an include token is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Glob,
    Directory,
    Literal,
}

impl TokenKind {
    pub fn classify(token: &str) -> Self {
        if crate::app::pattern::is_glob(token) {
            TokenKind::Glob
        } else if token.ends_with('/') {
            TokenKind::Directory
        } else {
            TokenKind::Literal
        }
    }
}

/// Knobs shared by every walk in a run.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Maximum depth below the root. None means unlimited.
    pub max_depth: Option<usize>,
    pub include_dotfiles: bool,
    /// Keep directories that produced no children as placeholder entries.
    pub include_empty: bool,
    pub respect_gitignore: bool,
}

/// What to do with files the safeguard flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretPolicy {
    pub allow_secrets: bool,
    pub fail_on_secret: bool,
    pub deep_inspect: bool,
}

/// Header/footer style written around every file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DelimiterStyle {
    None,
    Comment,
    Asterisk,
    Classic,
    #[default]
    Boxed,
}

/// Writer settings after merging the settings file and CLI flags.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub delimiter: DelimiterStyle,
    pub delimiter_closure: bool,
    pub max_lines: Option<usize>,
    pub trim_blank_lines: bool,
    pub relative_paths: bool,
    pub raw: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            delimiter: DelimiterStyle::Boxed,
            delimiter_closure: false,
            max_lines: Some(5000),
            trim_blank_lines: true,
            relative_paths: true,
            raw: false,
        }
    }
}

/// Represents the final configuration after merging the settings file and CLI args.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub walk: WalkOptions,
    pub ignore_static_defaults: bool,
    pub ignore_file: Option<PathBuf>,
    pub secrets: SecretPolicy,
    pub denylist: Denylist,
    pub output: OutputOptions,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            ignore_static_defaults: true,
            ignore_file: None,
            secrets: SecretPolicy::default(),
            denylist: Denylist::default(),
            output: OutputOptions::default(),
            include: Vec::new(),
            exclude: Vec::new(),
            exclude_dirs: Vec::new(),
        }
    }
}

/// Canonical, deduplicated file list. Sorting happens once, at the end.
#[derive(Debug, Default)]
pub struct ResolvedFileSet {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl ResolvedFileSet {
    /// Returns false when the canonical path was already present.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        let seen = &mut self.seen;
        self.paths.retain(|p| {
            let kept = keep(p);
            if !kept {
                seen.remove(p);
            }
            kept
        });
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Lexicographic by path string, not component-wise.
    pub fn into_sorted(self) -> Vec<PathBuf> {
        let mut paths = self.paths;
        sort_by_path_string(&mut paths);
        paths
    }
}

pub fn sort_by_path_string(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|p| p.to_string_lossy().into_owned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_classification() {
        assert_eq!(TokenKind::classify("/src/**/*.rs"), TokenKind::Glob);
        assert_eq!(TokenKind::classify("/src/lib?.rs"), TokenKind::Glob);
        assert_eq!(TokenKind::classify("/src/"), TokenKind::Directory);
        assert_eq!(TokenKind::classify("/src/main.rs"), TokenKind::Literal);
    }

    #[test]
    fn test_resolved_set_dedupes_and_sorts_by_string() {
        let mut set = ResolvedFileSet::default();
        assert!(set.insert(PathBuf::from("/p/a-b")));
        assert!(set.insert(PathBuf::from("/p/a/b")));
        assert!(!set.insert(PathBuf::from("/p/a-b")));
        assert_eq!(set.len(), 2);

        // '-' (0x2d) sorts before '/' (0x2f) as strings
        assert_eq!(
            set.into_sorted(),
            vec![PathBuf::from("/p/a-b"), PathBuf::from("/p/a/b")]
        );
    }

    #[test]
    fn test_resolved_set_retain_forgets_removed() {
        let mut set = ResolvedFileSet::default();
        set.insert(PathBuf::from("/p/a.log"));
        set.insert(PathBuf::from("/p/b.txt"));
        set.retain(|p| p.extension().is_some_and(|e| e == "txt"));
        assert!(!set.contains(Path::new("/p/a.log")));
        assert!(set.insert(PathBuf::from("/p/a.log")));
    }

    #[test]
    fn test_empty_context() {
        assert!(Context::default().is_empty());
        let ctx = Context {
            title: Some("t".into()),
            ..Default::default()
        };
        assert!(!ctx.is_empty());
    }
}
