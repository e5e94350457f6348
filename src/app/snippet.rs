//! Anchored snippets: `.configure` filters that pull a window of lines
//! around every line containing an anchor string.

use crate::app::error::{ConcatError, MultiError, Result};
use crate::app::ignore_map::IgnoreMap;
use crate::app::models::WalkOptions;
use crate::app::resolver::ResolveOptions;
use crate::app::scanner::{FileScanner, ScanOptions};
use crate::app::writer::read_lines;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const FILTER_FILE_NAME: &str = ".configure";

/// `<anchor>[+offset|-offset][:count]`. A trailing signed number always
/// reads as the offset, with or without a space or `:` before it.
static FILTER_RHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<anchor>.+?)(?:(?:\s*|:)(?P<offset>[+-]\d+))?(?::(?P<count>\d+))?$")
        .expect("filter pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub glob: String,
    pub anchor: String,
    pub offset: i64,
    pub count: usize,
}

/// Lines `start..start + lines.len()` (zero based) of `file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub file: PathBuf,
    pub start: usize,
    pub lines: Vec<String>,
}

/// Parses the `[Filters]` section. Lines before it are ignored.
pub fn parse(content: &str) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();
    let mut in_section = false;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line == "[Filters]";
            continue;
        }
        if !in_section {
            continue;
        }

        let malformed = |message: &str| ConcatError::Malformed {
            line: idx + 1,
            message: message.to_string(),
        };
        let (glob, rhs) = line
            .split_once('=')
            .ok_or_else(|| malformed("expected `<glob> = <anchor>`"))?;
        let glob = glob.trim();
        if glob.is_empty() {
            return Err(malformed("empty glob"));
        }
        let caps = FILTER_RHS
            .captures(rhs.trim())
            .ok_or_else(|| malformed("missing anchor"))?;
        let anchor = caps["anchor"].trim();
        if anchor.is_empty() {
            return Err(malformed("missing anchor"));
        }
        let offset = match caps.name("offset") {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| malformed("offset out of range"))?,
            None => 0,
        };
        let count = match caps.name("count") {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| malformed("count out of range"))?,
            None => 1,
        };

        filters.push(Filter {
            glob: glob.to_string(),
            anchor: anchor.to_string(),
            offset,
            count,
        });
    }
    Ok(filters)
}

pub fn parse_file(path: &Path) -> Result<Vec<Filter>> {
    let content = fs::read_to_string(path).map_err(|e| ConcatError::read_error(path, e))?;
    parse(&content)
}

/// Half-open window for an anchor hit on line `hit` of an `n`-line file.
pub fn window(hit: usize, offset: i64, count: usize, n: usize) -> (usize, usize) {
    let clamp = |v: i128| v.clamp(0, n as i128) as usize;
    let start = hit as i128 + offset as i128;
    (clamp(start), clamp(start + count as i128))
}

/// Runs every filter under `root`. Snippets come out in filter order, then
/// file order, then line order.
pub fn resolve(
    filters: &[Filter],
    root: &Path,
    options: &ResolveOptions,
    ignore_map: Option<&IgnoreMap>,
) -> Result<Vec<Snippet>> {
    let safeguard = &options.safeguard;
    let mut snippets = Vec::new();
    let mut errors = MultiError::default();

    for filter in filters {
        let scan_options = ScanOptions {
            walk: WalkOptions {
                include_empty: false,
                ..options.walk.clone()
            },
            ignore_static_defaults: options.ignore_static_defaults,
            ..Default::default()
        }
        .with_include(vec![filter.glob.clone()]);
        let files = FileScanner::new(root, scan_options, ignore_map)?.scan()?;
        let files = safeguard.screen(files, options.secrets)?;
        log::debug!("filter {} = {} matched {} file(s)", filter.glob, filter.anchor, files.len());

        for file in files {
            let lines = match read_lines(&file) {
                Ok(lines) => lines,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            for (i, line) in lines.iter().enumerate() {
                if !line.contains(&filter.anchor) {
                    continue;
                }
                let (start, end) = window(i, filter.offset, filter.count, lines.len());
                snippets.push(Snippet {
                    file: file.clone(),
                    start,
                    lines: lines[start..end].to_vec(),
                });
            }
        }
    }

    errors.into_result()?;
    Ok(snippets)
}

pub fn default_template() -> &'static str {
    "[Filters]\n\
     # <glob> = <anchor> [+offset][:count]\n\
     # *.rs = fn main +0:10\n"
}
