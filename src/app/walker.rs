//! Depth-limited recursive enumeration with symlink resolution.

use crate::app::error::{ConcatError, EntryError, MultiError, Result, Stage};
use crate::app::ignore_map::IgnoreMap;
use crate::app::models::WalkOptions;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One surviving entry, already resolved to its real location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

pub struct PathWalker<'a> {
    root: PathBuf,
    options: WalkOptions,
    ignore_map: Option<&'a IgnoreMap>,
}

impl<'a> PathWalker<'a> {
    pub fn new(root: impl Into<PathBuf>, options: WalkOptions) -> Self {
        Self {
            root: root.into(),
            options,
            ignore_map: None,
        }
    }

    pub fn with_ignore_map(mut self, ignore_map: Option<&'a IgnoreMap>) -> Self {
        self.ignore_map = ignore_map;
        self
    }

    /// Files (and empty-directory placeholders when requested) that survive
    /// the ignore map.
    pub fn walk(&self) -> Result<Vec<WalkEntry>> {
        let ignore_map = self.ignore_map;
        self.walk_filtered(
            |dir| !ignore_map.is_some_and(|m| m.should_ignore_entry(dir, true)),
            |file| !ignore_map.is_some_and(|m| m.should_ignore_entry(file, false)),
        )
    }

    /// Core traversal. `keep_dir` prunes whole subtrees, `keep_file` filters
    /// leaves; both receive resolved paths. Per-entry failures are collected
    /// and raised together after the traversal.
    pub fn walk_filtered(
        &self,
        keep_dir: impl Fn(&Path) -> bool,
        keep_file: impl Fn(&Path) -> bool,
    ) -> Result<Vec<WalkEntry>> {
        let root = fs::canonicalize(&self.root).map_err(|source| ConcatError::PathResolutionFailed {
            path: self.root.clone(),
            source,
        })?;
        let gitignore = self.load_gitignore(&root);

        let mut walker = WalkDir::new(&root).follow_links(true).sort_by_file_name();
        if let Some(depth) = self.options.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut results = Vec::new();
        let mut errors = MultiError::default();
        let mut dirs: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut parents_with_children: HashSet<PathBuf> = HashSet::new();

        let mut iter = walker.into_iter();
        while let Some(next) = iter.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    errors.push(EntryError::from_walk(err, &root));
                    continue;
                }
            };

            let depth = entry.depth();
            if depth > 0 && !self.options.include_dotfiles && is_hidden(entry.path()) {
                if entry.file_type().is_dir() {
                    iter.skip_current_dir();
                }
                continue;
            }

            let resolved = match fs::canonicalize(entry.path()) {
                Ok(resolved) => resolved,
                Err(source) => {
                    errors.push(EntryError::new(entry.path(), Stage::Resolve, source));
                    if entry.file_type().is_dir() {
                        iter.skip_current_dir();
                    }
                    continue;
                }
            };
            if depth > 0 && !self.options.include_dotfiles && is_hidden(&resolved) {
                if entry.file_type().is_dir() {
                    iter.skip_current_dir();
                }
                continue;
            }

            if depth > 0 {
                if let Some(parent) = entry.path().parent() {
                    parents_with_children.insert(parent.to_path_buf());
                }
            }

            let is_dir = entry.file_type().is_dir();
            if depth > 0 && is_gitignored(gitignore.as_ref(), &resolved, is_dir) {
                if is_dir {
                    iter.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                if depth > 0 && !keep_dir(&resolved) {
                    iter.skip_current_dir();
                    continue;
                }
                dirs.push((entry.path().to_path_buf(), resolved));
            } else if keep_file(&resolved) {
                results.push(WalkEntry {
                    path: resolved,
                    is_dir: false,
                });
            }
        }

        if self.options.include_empty {
            for (walked, resolved) in dirs {
                if !parents_with_children.contains(&walked) {
                    results.push(WalkEntry {
                        path: resolved,
                        is_dir: true,
                    });
                }
            }
        }

        errors.into_result()?;
        results.sort_by_cached_key(|e| e.path.to_string_lossy().into_owned());
        Ok(results)
    }

    /// Every directory below the root whose base name is `name`. Hidden
    /// directories (unless dotfiles are on) and directories the ignore map
    /// rejects are not searched; unreadable entries are ignored.
    pub fn find_directories(&self, name: &str) -> Result<Vec<PathBuf>> {
        let root = fs::canonicalize(&self.root).map_err(|source| ConcatError::PathResolutionFailed {
            path: self.root.clone(),
            source,
        })?;
        let mut walker = WalkDir::new(&root).follow_links(true).sort_by_file_name();
        if let Some(depth) = self.options.max_depth {
            walker = walker.max_depth(depth);
        }

        let dotfiles = self.options.include_dotfiles;
        let ignore_map = self.ignore_map;
        let mut matches = Vec::new();
        for entry in walker
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || ((dotfiles || !is_hidden(e.path()))
                        && !(e.file_type().is_dir()
                            && ignore_map.is_some_and(|m| m.should_ignore_entry(e.path(), true))))
            })
            .filter_map(|e| e.ok())
        {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy() == name {
                match fs::canonicalize(entry.path()) {
                    Ok(resolved) => matches.push(resolved),
                    Err(err) => log::debug!("skipping {}: {}", entry.path().display(), err),
                }
            }
        }
        Ok(matches)
    }

    fn load_gitignore(&self, root: &Path) -> Option<Gitignore> {
        if !self.options.respect_gitignore {
            return None;
        }
        let file = root.join(".gitignore");
        if !file.is_file() {
            return None;
        }
        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&file) {
            log::warn!("ignoring unreadable {}: {}", file.display(), err);
            return None;
        }
        builder.build().ok()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn is_gitignored(gitignore: Option<&Gitignore>, path: &Path, is_dir: bool) -> bool {
    gitignore.is_some_and(|gi| {
        path.starts_with(gi.path()) && gi.matched(path, is_dir).is_ignore()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/b.txt"), "b").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), "c").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        dir
    }

    fn names(entries: &[WalkEntry], root: &Path) -> Vec<String> {
        entries
            .iter()
            .map(|e| {
                e.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_walk_skips_dotfiles_by_default() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let entries = PathWalker::new(&root, WalkOptions::default()).walk().unwrap();
        assert_eq!(
            names(&entries, &root),
            vec!["a.txt", "sub/b.txt", "sub/deeper/c.txt"]
        );
    }

    #[test]
    fn test_walk_with_dotfiles() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let options = WalkOptions {
            include_dotfiles: true,
            ..Default::default()
        };
        let found = names(&PathWalker::new(&root, options).walk().unwrap(), &root);
        assert!(found.contains(&".hidden".to_string()));
        assert!(found.contains(&".git/config".to_string()));
    }

    #[test]
    fn test_max_depth_limits_children() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let options = WalkOptions {
            max_depth: Some(1),
            ..Default::default()
        };
        let found = names(&PathWalker::new(&root, options).walk().unwrap(), &root);
        assert_eq!(found, vec!["a.txt"]);

        let options = WalkOptions {
            max_depth: Some(2),
            ..Default::default()
        };
        let found = names(&PathWalker::new(&root, options).walk().unwrap(), &root);
        assert_eq!(found, vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn test_include_empty_keeps_placeholder() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let options = WalkOptions {
            include_empty: true,
            ..Default::default()
        };
        let entries = PathWalker::new(&root, options).walk().unwrap();
        let empty: Vec<_> = entries.iter().filter(|e| e.is_dir).collect();
        assert_eq!(empty.len(), 1);
        assert!(empty[0].path.ends_with("empty"));
    }

    #[test]
    fn test_ignore_map_prunes_directories() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let map = IgnoreMap::parse("[IgnoreDirectories]\nsub/\n").unwrap();
        let entries = PathWalker::new(&root, WalkOptions::default())
            .with_ignore_map(Some(&map))
            .walk()
            .unwrap();
        assert_eq!(names(&entries, &root), vec!["a.txt"]);
    }

    #[test]
    fn test_missing_root_fails_outright() {
        let dir = TempDir::new().unwrap();
        let err = PathWalker::new(dir.path().join("nope"), WalkOptions::default())
            .walk()
            .unwrap_err();
        assert!(matches!(err, ConcatError::PathResolutionFailed { .. }));
    }

    #[test]
    fn test_find_directories_by_name() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("sub/deeper/sub")).unwrap();
        let found = PathWalker::new(&root, WalkOptions::default())
            .find_directories("sub")
            .unwrap();
        assert_eq!(found, vec![root.join("sub"), root.join("sub/deeper/sub")]);

        let map = IgnoreMap::parse("[IgnoreDirectories]\ndeeper\n").unwrap();
        let found = PathWalker::new(&root, WalkOptions::default())
            .with_ignore_map(Some(&map))
            .find_directories("sub")
            .unwrap();
        assert_eq!(found, vec![root.join("sub")]);
    }

    #[test]
    fn test_gitignore_is_opt_in() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::write(root.join(".gitignore"), "sub/\n").unwrap();

        let plain = PathWalker::new(&root, WalkOptions::default()).walk().unwrap();
        assert_eq!(plain.len(), 3);

        let options = WalkOptions {
            respect_gitignore: true,
            ..Default::default()
        };
        let filtered = PathWalker::new(&root, options).walk().unwrap();
        assert_eq!(names(&filtered, &root), vec!["a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_resolve_to_target() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();
        let entries = PathWalker::new(&root, WalkOptions::default()).walk().unwrap();
        let found = names(&entries, &root);
        assert_eq!(found.iter().filter(|n| *n == "a.txt").count(), 2);
        assert!(!found.contains(&"link.txt".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_collected_not_fatal_midwalk() {
        let dir = create_test_dir();
        let root = fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("broken.txt")).unwrap();
        let err = PathWalker::new(&root, WalkOptions::default()).walk().unwrap_err();
        match err {
            ConcatError::Entries(multi) => {
                assert_eq!(multi.len(), 1);
                assert!(multi.errors[0].path.ends_with("broken.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
