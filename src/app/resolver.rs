//! Turns a `SelectionBlock` into a canonical, deduplicated, sorted file list.

use crate::app::error::{ConcatError, Result};
use crate::app::ignore_map::IgnoreMap;
use crate::app::models::{ResolvedFileSet, SecretPolicy, SelectionBlock, TokenKind, WalkOptions};
use crate::app::pattern::build_pattern_set;
use crate::app::safeguard::Safeguard;
use crate::app::scanner::{FileScanner, ScanOptions};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub walk: WalkOptions,
    pub ignore_static_defaults: bool,
    pub secrets: SecretPolicy,
    pub safeguard: Safeguard,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            ignore_static_defaults: true,
            secrets: SecretPolicy::default(),
            safeguard: Safeguard::default(),
        }
    }
}

pub struct SelectionResolver<'a> {
    base_dir: PathBuf,
    options: ResolveOptions,
    ignore_map: Option<&'a IgnoreMap>,
}

impl<'a> SelectionResolver<'a> {
    /// `base_dir` is the directory holding the selection document; relative
    /// tokens resolve against it.
    pub fn new(base_dir: &Path, options: ResolveOptions) -> Self {
        let base_dir = fs::canonicalize(base_dir).unwrap_or_else(|_| normalize_lexically(base_dir));
        Self {
            base_dir,
            options,
            ignore_map: None,
        }
    }

    pub fn with_ignore_map(mut self, ignore_map: Option<&'a IgnoreMap>) -> Self {
        self.ignore_map = ignore_map;
        self
    }

    /// Where the block's artifact is written.
    pub fn output_path(&self, block: &SelectionBlock) -> PathBuf {
        PathBuf::from(self.absolutize(&block.output, false))
    }

    /// Expands includes in order, drops canonical duplicates, applies
    /// excludes, sorts, then applies the secret policy. Never cached.
    pub fn resolve(&self, block: &SelectionBlock) -> Result<Vec<PathBuf>> {
        let mut set = ResolvedFileSet::default();

        for token in &block.include {
            let abs = self.absolutize(token, true);
            let kind = TokenKind::classify(&abs);
            log::debug!("include token {:?} -> {} ({:?})", token, abs, kind);

            let found = match kind {
                TokenKind::Glob => self.expand_glob(&abs)?,
                TokenKind::Directory => self.expand_directory(token, &abs)?,
                TokenKind::Literal => vec![self.expand_literal(token, &abs)?],
            };
            let before = set.len();
            for path in found {
                set.insert(path);
            }
            log::debug!("  {} new file(s)", set.len() - before);
        }

        let patterns: Vec<String> = block
            .exclude
            .iter()
            .map(|token| {
                let mut abs = self.absolutize(token, false);
                if token.ends_with('/') {
                    abs.push_str("/*");
                }
                canonical_prefix(&abs).map_or(abs, |(_, pattern)| pattern)
            })
            .collect();
        let exclude = build_pattern_set(&patterns)?;

        let output = self.output_path(block);
        let output = fs::canonicalize(&output).unwrap_or(output);
        set.retain(|p| p != output && !exclude.is_match_str(&p.to_string_lossy()));

        let sorted = set.into_sorted();
        self.options.safeguard.screen(sorted, self.options.secrets)
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            include_empty: false,
            ..self.options.walk.clone()
        }
    }

    fn scan_options(&self, include: String) -> ScanOptions {
        ScanOptions {
            walk: self.walk_options(),
            include: vec![include],
            ignore_static_defaults: self.options.ignore_static_defaults,
            ..Default::default()
        }
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let (canonical, pattern) = match canonical_prefix(pattern) {
            Ok(found) => found,
            Err(err) => {
                log::warn!("no files for {}: scan root {} ({})", pattern, glob_root(pattern).display(), err);
                return Ok(Vec::new());
            }
        };
        log::debug!("  glob root {} pattern {}", canonical.display(), pattern);

        FileScanner::new(canonical, self.scan_options(pattern), self.ignore_map)?.scan()
    }

    fn expand_directory(&self, token: &str, abs: &str) -> Result<Vec<PathBuf>> {
        let dir = Path::new(abs.trim_end_matches('/'));
        if !dir.is_dir() {
            return Err(ConcatError::NotFound(token.to_string()));
        }
        log::debug!("  dir walk {}", dir.display());
        let scanned = FileScanner::new(dir, self.scan_options("*".to_string()), self.ignore_map)?.scan()?;
        Ok(scanned.into_iter().filter(|p| !p.is_dir()).collect())
    }

    fn expand_literal(&self, token: &str, abs: &str) -> Result<PathBuf> {
        match fs::canonicalize(abs) {
            Ok(path) if !path.is_dir() => Ok(path),
            _ => Err(ConcatError::NotFound(token.to_string())),
        }
    }

    fn absolutize(&self, token: &str, keep_trailing_slash: bool) -> String {
        let expanded = expand_tilde(token);
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        };
        let mut abs = normalize_lexically(&joined).to_string_lossy().into_owned();
        if keep_trailing_slash && token.ends_with('/') && !abs.ends_with('/') {
            abs.push('/');
        }
        abs
    }
}

/// Resolves the literal directory prefix of an absolute pattern through the
/// filesystem. Walked paths are canonical, so patterns matched against them
/// must be too. Returns the canonical root and the rewritten pattern.
fn canonical_prefix(pattern: &str) -> std::io::Result<(PathBuf, String)> {
    let root = glob_root(pattern);
    let canonical = fs::canonicalize(&root)?;
    if canonical == root {
        return Ok((canonical, pattern.to_string()));
    }
    let root_len = root.to_string_lossy().len();
    let rewritten = format!("{}{}", canonical.to_string_lossy(), &pattern[root_len..]);
    Ok((canonical, rewritten))
}

/// Longest literal directory before the first wildcard; `/` when the
/// wildcard sits in the first segment.
pub fn glob_root(pattern: &str) -> PathBuf {
    let first = pattern.find(['*', '?']).unwrap_or(pattern.len());
    match pattern[..first].rfind('/') {
        None | Some(0) => PathBuf::from("/"),
        Some(i) => PathBuf::from(&pattern[..i]),
    }
}

pub fn expand_tilde(token: &str) -> PathBuf {
    let rest = if token == "~" {
        ""
    } else if let Some(rest) = token.strip_prefix("~/") {
        rest
    } else {
        return PathBuf::from(token);
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => {
            log::warn!("cannot expand {}: home directory unknown", token);
            PathBuf::from(token)
        }
    }
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::safeguard::Denylist;
    use tempfile::TempDir;

    fn block(include: &[&str], exclude: &[&str]) -> SelectionBlock {
        SelectionBlock {
            output: "out.txt".to_string(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            context: None,
        }
    }

    fn project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap().join("proj");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.log"), "b").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        (dir, root)
    }

    #[test]
    fn test_directory_include_with_glob_exclude() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let dir_token = format!("{}/", root.display());
        let files = resolver.resolve(&block(&[dir_token.as_str()], &["*.log"])).unwrap();
        assert_eq!(files, vec![root.join("a.txt"), root.join("sub/c.txt")]);
    }

    #[test]
    fn test_relative_tokens_use_base_dir() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver
            .resolve(&block(&["sub/c.txt", "./a.txt", "sub/../b.log"], &[]))
            .unwrap();
        assert_eq!(
            files,
            vec![root.join("a.txt"), root.join("b.log"), root.join("sub/c.txt")]
        );
    }

    #[test]
    fn test_missing_literal_is_not_found() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let err = resolver
            .resolve(&block(&["a.txt", "missing.txt", "sub/"], &[]))
            .unwrap_err();
        match err {
            ConcatError::NotFound(token) => assert_eq!(token, "missing.txt"),
            other => panic!("unexpected error: {other}"),
        }

        let err = resolver.resolve(&block(&["sub"], &[])).unwrap_err();
        assert!(matches!(err, ConcatError::NotFound(t) if t == "sub"));
    }

    #[test]
    fn test_glob_token_scans_from_literal_prefix() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver.resolve(&block(&["sub/*.txt"], &[])).unwrap();
        assert_eq!(files, vec![root.join("sub/c.txt")]);

        // '*' crosses separators
        let files = resolver.resolve(&block(&["*.txt"], &[])).unwrap();
        assert_eq!(files, vec![root.join("a.txt"), root.join("sub/c.txt")]);
    }

    #[test]
    fn test_glob_with_missing_root_matches_nothing() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver.resolve(&block(&["nope/*.rs", "a.txt"], &[])).unwrap();
        assert_eq!(files, vec![root.join("a.txt")]);
    }

    #[test]
    fn test_excludes_apply_after_all_includes() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let forward = resolver.resolve(&block(&["a.txt", "sub/", "b.log"], &["sub/"])).unwrap();
        let reversed = resolver.resolve(&block(&["b.log", "sub/", "a.txt"], &["sub/"])).unwrap();
        assert_eq!(forward, vec![root.join("a.txt"), root.join("b.log")]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let b = block(&["./"], &[]);
        assert_eq!(resolver.resolve(&b).unwrap(), resolver.resolve(&b).unwrap());
    }

    #[test]
    fn test_own_output_is_never_included() {
        let (_dir, root) = project();
        fs::write(root.join("out.txt"), "previous run").unwrap();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver.resolve(&block(&["./"], &[])).unwrap();
        assert!(!files.contains(&root.join("out.txt")));
    }

    #[test]
    fn test_secret_policy_applies() {
        let (_dir, root) = project();
        fs::write(root.join("id_rsa"), "key").unwrap();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver.resolve(&block(&["./"], &[])).unwrap();
        assert!(!files.contains(&root.join("id_rsa")));

        let strict = ResolveOptions {
            secrets: SecretPolicy {
                fail_on_secret: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = SelectionResolver::new(&root, strict)
            .resolve(&block(&["./"], &[]))
            .unwrap_err();
        assert!(matches!(err, ConcatError::ProtectedFile { .. }));

        // an exclude wins before the policy is consulted
        let strict = ResolveOptions {
            secrets: SecretPolicy {
                fail_on_secret: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let files = SelectionResolver::new(&root, strict)
            .resolve(&block(&["./"], &["id_rsa"]))
            .unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_injected_denylist() {
        let (_dir, root) = project();
        let mut denylist = Denylist::default();
        denylist.exact_names.insert("a.txt".to_string());
        let options = ResolveOptions {
            safeguard: Safeguard::new(denylist),
            ..Default::default()
        };
        let resolver = SelectionResolver::new(&root, options);
        let files = resolver.resolve(&block(&["./"], &[])).unwrap();
        assert_eq!(files, vec![root.join("b.log"), root.join("sub/c.txt")]);
    }

    #[test]
    fn test_ignore_map_filters_walked_files() {
        let (_dir, root) = project();
        let map = IgnoreMap::parse("[IgnoreFiles]\n*.log\n").unwrap();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default()).with_ignore_map(Some(&map));
        let files = resolver.resolve(&block(&["./"], &[])).unwrap();
        assert_eq!(files, vec![root.join("a.txt"), root.join("sub/c.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_alias_collapses() {
        let (_dir, root) = project();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("alias.txt")).unwrap();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        let files = resolver.resolve(&block(&["alias.txt", "a.txt"], &[])).unwrap();
        assert_eq!(files, vec![root.join("a.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exclude_through_symlinked_directory() {
        let (_dir, root) = project();
        fs::write(root.join("sub/d.log"), "d").unwrap();
        std::os::unix::fs::symlink(root.join("sub"), root.join("link")).unwrap();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());

        let files = resolver.resolve(&block(&["link/"], &["link/*.log"])).unwrap();
        assert_eq!(files, vec![root.join("sub/c.txt")]);

        let absolute = format!("{}/link/", root.display());
        let files = resolver.resolve(&block(&["a.txt", "link/"], &[absolute.as_str()])).unwrap();
        assert_eq!(files, vec![root.join("a.txt")]);
    }

    #[test]
    fn test_output_path_resolution() {
        let (_dir, root) = project();
        let resolver = SelectionResolver::new(&root, ResolveOptions::default());
        assert_eq!(resolver.output_path(&block(&[], &[])), root.join("out.txt"));
    }

    #[test]
    fn test_glob_root() {
        assert_eq!(glob_root("/a/b/*.rs"), PathBuf::from("/a/b"));
        assert_eq!(glob_root("/a/b*/c.rs"), PathBuf::from("/a"));
        assert_eq!(glob_root("/*.rs"), PathBuf::from("/"));
        assert_eq!(glob_root("*.rs"), PathBuf::from("/"));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/notes"), home.join("notes"));
            assert_eq!(expand_tilde("~"), home);
        }
        assert_eq!(expand_tilde("~other/x"), PathBuf::from("~other/x"));
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_lexically(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
