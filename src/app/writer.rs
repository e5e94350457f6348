//! Writes resolved files (or snippets) into a single artifact.

use crate::app::error::{ConcatError, EntryError, MultiError, Result, Stage};
use crate::app::formatter::OutputGenerator;
use crate::app::ignore_map::ObscureMethod;
use crate::app::models::OutputOptions;
use crate::app::snippet::Snippet;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub files: usize,
    pub lines: usize,
}

pub struct Concatenator<'a> {
    options: &'a OutputOptions,
    label_base: PathBuf,
    obscure: Option<&'a BTreeMap<String, ObscureMethod>>,
}

impl<'a> Concatenator<'a> {
    /// Relative labels are computed against `label_base`.
    pub fn new(options: &'a OutputOptions, label_base: impl Into<PathBuf>) -> Self {
        Self {
            options,
            label_base: label_base.into(),
            obscure: None,
        }
    }

    pub fn with_obscure(mut self, table: Option<&'a BTreeMap<String, ObscureMethod>>) -> Self {
        self.obscure = table;
        self
    }

    /// Writes `files` to `output`. Files that cannot be read or decoded are
    /// skipped and reported together once every other file is written.
    pub fn write(&self, files: &[PathBuf], output: &Path, preamble: Option<&str>) -> Result<WriteSummary> {
        let mut out = create_output(output)?;
        let (summary, errors) = self.render(files, &mut out, preamble)
            .map_err(|e| ConcatError::write_error(output, e))?;
        out.flush().map_err(|e| ConcatError::write_error(output, e))?;
        errors.into_result()?;
        Ok(summary)
    }

    pub fn render<W: Write>(
        &self,
        files: &[PathBuf],
        out: &mut W,
        preamble: Option<&str>,
    ) -> io::Result<(WriteSummary, MultiError)> {
        let mut summary = WriteSummary::default();
        let mut errors = MultiError::default();

        if let Some(preamble) = preamble {
            write!(out, "{}\n\n", preamble)?;
        }

        let mut first = true;
        for path in files {
            let (block, lines) = match self.format_file(path) {
                Ok(formatted) => formatted,
                Err(err) => {
                    log::warn!("{}", err);
                    errors.push(err);
                    continue;
                }
            };
            if !first {
                out.write_all(b"\n\n")?;
            }
            first = false;
            out.write_all(block.as_bytes())?;
            summary.files += 1;
            summary.lines += lines;
        }
        Ok((summary, errors))
    }

    /// One file's block and the number of content lines it carries.
    pub fn format_file(&self, path: &Path) -> std::result::Result<(String, usize), EntryError> {
        let lines = read_lines(path)?;
        let (lines, notes) = OutputGenerator::process_blank_lines(lines, self.options.trim_blank_lines);
        let total = lines.len();
        let limit = self.options.max_lines.unwrap_or(usize::MAX);

        let label = self.label(path);
        let style = self.options.delimiter;
        let mut block = String::new();

        if !self.options.raw {
            let header = style.header(&label);
            if !header.is_empty() {
                block.push_str(&header);
                block.push('\n');
            }
            block.push_str(&notes.header());
        }

        let kept = total.min(limit);
        for line in &lines[..kept] {
            match self.obscure {
                Some(table) if !table.is_empty() => block.push_str(&OutputGenerator::obscure_line(line, table)),
                _ => block.push_str(line),
            }
            block.push('\n');
        }
        if kept < total {
            log::warn!("{} truncated at {} of {} lines", label, kept, total);
            block.push_str(&format!(
                "(!): truncated, file exceeded max line limit ({}/{} lines)\n",
                kept, total
            ));
        }

        if !self.options.raw {
            block.push_str(&notes.footer());
            if self.options.delimiter_closure {
                let footer = style.footer(&label);
                if !footer.is_empty() {
                    block.push_str(&footer);
                    block.push('\n');
                }
            }
        }
        Ok((block, kept))
    }

    /// Writes anchored snippets, one delimited block each.
    pub fn write_snippets(&self, snippets: &[Snippet], output: &Path) -> Result<WriteSummary> {
        let mut out = create_output(output)?;
        let summary = self
            .render_snippets(snippets, &mut out)
            .map_err(|e| ConcatError::write_error(output, e))?;
        out.flush().map_err(|e| ConcatError::write_error(output, e))?;
        Ok(summary)
    }

    pub fn render_snippets<W: Write>(&self, snippets: &[Snippet], out: &mut W) -> io::Result<WriteSummary> {
        let style = self.options.delimiter;
        let mut summary = WriteSummary::default();

        for (i, snippet) in snippets.iter().enumerate() {
            if i > 0 {
                out.write_all(b"\n\n")?;
            }
            let label = format!("{}:{}", self.label(&snippet.file), snippet.start + 1);
            if !self.options.raw {
                let header = style.header(&label);
                if !header.is_empty() {
                    writeln!(out, "{}", header)?;
                }
            }
            for line in &snippet.lines {
                writeln!(out, "{}", line)?;
            }
            if !self.options.raw && self.options.delimiter_closure {
                let footer = style.footer(&label);
                if !footer.is_empty() {
                    writeln!(out, "{}", footer)?;
                }
            }
            summary.files += 1;
            summary.lines += snippet.lines.len();
        }
        Ok(summary)
    }

    fn label(&self, path: &Path) -> String {
        if self.options.relative_paths {
            if let Some(rel) = pathdiff::diff_paths(path, &self.label_base) {
                if !rel.components().any(|c| c == Component::ParentDir) && !rel.as_os_str().is_empty() {
                    return rel.to_string_lossy().into_owned();
                }
            }
        }
        path.to_string_lossy().into_owned()
    }
}

fn create_output(output: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConcatError::write_error(parent, e))?;
    }
    let file = File::create(output).map_err(|e| ConcatError::write_error(output, e))?;
    Ok(BufWriter::new(file))
}

/// Reads a text file as lines. UTF-8 first, then UTF-16 when a byte order
/// mark is present; anything else is a decode failure.
pub fn read_lines(path: &Path) -> std::result::Result<Vec<String>, EntryError> {
    let bytes = fs::read(path).map_err(|e| EntryError::new(path, Stage::Read, e))?;
    let text = decode(&bytes).ok_or_else(|| {
        EntryError::new(
            path,
            Stage::Decode,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not UTF-8 or UTF-16 text ({} bytes)", bytes.len()),
            ),
        )
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

fn decode(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }
    let (body, from): (&[u8], fn([u8; 2]) -> u16) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => (rest, u16::from_be_bytes),
        _ => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }
    let units = body.chunks_exact(2).map(|c| from([c[0], c[1]]));
    char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::DelimiterStyle;
    use tempfile::TempDir;

    fn options(delimiter: DelimiterStyle) -> OutputOptions {
        OutputOptions {
            delimiter,
            ..Default::default()
        }
    }

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("a.txt"), "\n\nalpha\nbeta\n\n").unwrap();
        fs::write(root.join("src/b.rs"), "fn b() {}\n").unwrap();
        (dir, root)
    }

    #[test]
    fn test_write_joins_files_with_delimiters() {
        let (_dir, root) = setup();
        let opts = OutputOptions {
            delimiter_closure: true,
            ..options(DelimiterStyle::Classic)
        };
        let out = root.join("bundle.txt");
        let files = vec![root.join("a.txt"), root.join("src/b.rs")];
        let summary = Concatenator::new(&opts, &root).write(&files, &out, None).unwrap();
        assert_eq!(summary, WriteSummary { files: 2, lines: 3 });

        let written = fs::read_to_string(&out).unwrap();
        let expected = "\
=== Contents of a.txt ===
(!): 2 blank lines
alpha
beta

(!): 1 blank lines
=== End of a.txt ===


=== Contents of src/b.rs ===
fn b() {}
=== End of src/b.rs ===
";
        assert_eq!(written, expected);
    }

    #[test]
    fn test_raw_mode_and_absolute_labels() {
        let (_dir, root) = setup();
        let raw = OutputOptions {
            raw: true,
            trim_blank_lines: false,
            ..Default::default()
        };
        let mut buf = Vec::new();
        Concatenator::new(&raw, &root)
            .render(&[root.join("src/b.rs")], &mut buf, None)
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "fn b() {}\n");

        let absolute = OutputOptions {
            relative_paths: false,
            ..options(DelimiterStyle::Comment)
        };
        let (block, _) = Concatenator::new(&absolute, &root)
            .format_file(&root.join("src/b.rs"))
            .unwrap();
        assert!(block.starts_with(&format!("# {}\n", root.join("src/b.rs").display())));
    }

    #[test]
    fn test_truncation_note() {
        let (_dir, root) = setup();
        let body: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        fs::write(root.join("long.txt"), body).unwrap();
        let opts = OutputOptions {
            max_lines: Some(3),
            ..options(DelimiterStyle::None)
        };
        let (block, lines) = Concatenator::new(&opts, &root)
            .format_file(&root.join("long.txt"))
            .unwrap();
        assert_eq!(lines, 3);
        assert_eq!(
            block,
            "line 1\nline 2\nline 3\n(!): truncated, file exceeded max line limit (3/10 lines)\n"
        );
    }

    #[test]
    fn test_obscure_table_applies_to_content() {
        let (_dir, root) = setup();
        fs::write(root.join("cfg.txt"), "token=abc123\n").unwrap();
        let mut table = BTreeMap::new();
        table.insert("abc123".to_string(), ObscureMethod::Preserve);
        let opts = options(DelimiterStyle::None);
        let (block, _) = Concatenator::new(&opts, &root)
            .with_obscure(Some(&table))
            .format_file(&root.join("cfg.txt"))
            .unwrap();
        assert_eq!(block, "token=aaa000\n");
    }

    #[test]
    fn test_preamble_and_unreadable_files() {
        let (_dir, root) = setup();
        fs::write(root.join("blob.bin"), [0xC3u8, 0x28, 0x00, 0xFF]).unwrap();
        let opts = options(DelimiterStyle::Asterisk);
        let out = root.join("out/bundle.txt");
        let files = vec![root.join("blob.bin"), root.join("missing.txt"), root.join("src/b.rs")];
        let err = Concatenator::new(&opts, &root)
            .write(&files, &out, Some("PRE"))
            .unwrap_err();
        match err {
            ConcatError::Entries(multi) => {
                assert_eq!(multi.len(), 2);
                assert_eq!(multi.errors[0].stage, Stage::Decode);
                assert_eq!(multi.errors[1].stage, Stage::Read);
            }
            other => panic!("unexpected error: {other}"),
        }
        // the readable file is still written
        assert_eq!(fs::read_to_string(&out).unwrap(), "PRE\n\n* src/b.rs\nfn b() {}\n");
    }

    #[test]
    fn test_utf16_with_bom_decodes() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi\nthere".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes).unwrap(), "hi\nthere");
        assert_eq!(decode(b"\xEF\xBB\xBFplain").unwrap(), "plain");
        assert!(decode(&[0xC3, 0x28]).is_none());
    }

    #[test]
    fn test_snippet_rendering() {
        let (_dir, root) = setup();
        let snippets = vec![
            Snippet {
                file: root.join("src/b.rs"),
                start: 0,
                lines: vec!["fn b() {}".to_string()],
            },
            Snippet {
                file: root.join("a.txt"),
                start: 2,
                lines: vec!["alpha".to_string(), "beta".to_string()],
            },
        ];
        let opts = options(DelimiterStyle::Comment);
        let mut buf = Vec::new();
        let summary = Concatenator::new(&opts, &root)
            .render_snippets(&snippets, &mut buf)
            .unwrap();
        assert_eq!(summary, WriteSummary { files: 2, lines: 3 });
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "# src/b.rs:1\nfn b() {}\n\n\n# a.txt:3\nalpha\nbeta\n"
        );
    }
}
