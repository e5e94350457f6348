use crate::app::ignore_map::ObscureMethod;
use crate::app::models::DelimiterStyle;
use std::path::{Path, PathBuf};

impl DelimiterStyle {
    /// Line written before a file. Empty for `none`.
    pub fn header(&self, label: &str) -> String {
        match self {
            DelimiterStyle::None => String::new(),
            DelimiterStyle::Comment => format!("# {}", label),
            DelimiterStyle::Asterisk => format!("* {}", label),
            DelimiterStyle::Classic => format!("=== Contents of {} ===", label),
            DelimiterStyle::Boxed => boxed(label),
        }
    }

    /// Line written after a file when closure is on. Only `classic` and
    /// `boxed` have one.
    pub fn footer(&self, label: &str) -> String {
        match self {
            DelimiterStyle::None | DelimiterStyle::Comment | DelimiterStyle::Asterisk => String::new(),
            DelimiterStyle::Classic => format!("=== End of {} ===", label),
            DelimiterStyle::Boxed => boxed(&format!("END {}", label)),
        }
    }
}

fn boxed(text: &str) -> String {
    let bar = "─".repeat(text.chars().count() + 2);
    format!("┌{bar}┐\n│ {text} │\n└{bar}┘")
}

/// Counts of blank lines trimmed from either end of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlankLineNotes {
    pub leading: usize,
    pub trailing: usize,
}

impl BlankLineNotes {
    pub fn header(&self) -> String {
        if self.leading > 0 {
            format!("(!): {} blank lines\n", self.leading)
        } else {
            String::new()
        }
    }

    pub fn footer(&self) -> String {
        if self.trailing > 0 {
            format!("\n(!): {} blank lines\n", self.trailing)
        } else {
            String::new()
        }
    }
}

pub struct OutputGenerator;

impl OutputGenerator {
    /// Strips whitespace-only lines from both ends when `trim` is set.
    pub fn process_blank_lines(lines: Vec<String>, trim: bool) -> (Vec<String>, BlankLineNotes) {
        if !trim {
            return (lines, BlankLineNotes::default());
        }
        let is_blank = |l: &String| l.trim().is_empty();
        let leading = lines.iter().take_while(|l| is_blank(l)).count();
        let trailing = lines[leading..].iter().rev().take_while(|l| is_blank(l)).count();
        let end = lines.len() - trailing;
        let kept = lines[leading..end].to_vec();
        (kept, BlankLineNotes { leading, trailing })
    }

    pub fn obscure_value(value: &str, method: ObscureMethod) -> String {
        match method {
            ObscureMethod::Redact => "[REDACTED]".to_string(),
            ObscureMethod::Preserve => value
                .chars()
                .map(|c| {
                    if c.is_numeric() {
                        '0'
                    } else if c.is_alphabetic() {
                        'a'
                    } else {
                        c
                    }
                })
                .collect(),
            ObscureMethod::Verbose => {
                if value.chars().all(char::is_numeric) {
                    "[INT]".to_string()
                } else if value.chars().all(char::is_alphabetic) {
                    "[STRING]".to_string()
                } else {
                    "[OBSCURED]".to_string()
                }
            }
        }
    }

    /// Replaces every occurrence of each table value in `line`.
    pub fn obscure_line<'a>(
        line: &str,
        table: impl IntoIterator<Item = (&'a String, &'a ObscureMethod)>,
    ) -> String {
        let mut out = line.to_string();
        for (value, method) in table {
            if !value.is_empty() && out.contains(value.as_str()) {
                out = out.replace(value.as_str(), &Self::obscure_value(value, *method));
            }
        }
        out
    }

    /// Renders files as an indented tree below `root`. Paths outside the
    /// root are listed by their full path.
    pub fn generate_tree(root: &Path, paths: &[PathBuf], trailing_slash: bool) -> String {
        let slash = if trailing_slash { "/" } else { "" };
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());

        let mut rels: Vec<(String, bool)> = paths
            .iter()
            .map(|p| {
                let rel = p
                    .strip_prefix(root)
                    .map(|r| r.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| p.to_string_lossy().into_owned());
                (rel, p.is_dir())
            })
            .collect();
        rels.sort();

        let mut output = format!("{}{}\n", root_name, slash);
        let mut stack: Vec<String> = Vec::new();

        for (rel, is_dir) in rels {
            let comps: Vec<&str> = rel.split('/').filter(|c| !c.is_empty()).collect();
            let Some((name, dirs)) = comps.split_last() else {
                continue;
            };

            let common = stack
                .iter()
                .zip(dirs.iter())
                .take_while(|(a, b)| a.as_str() == **b)
                .count();
            stack.truncate(common);

            while stack.len() < dirs.len() {
                let next = dirs[stack.len()];
                output.push_str(&format!("{}└── {}{}\n", "    ".repeat(stack.len()), next, slash));
                stack.push(next.to_string());
            }

            let marker = if is_dir { slash } else { "" };
            output.push_str(&format!("{}└── {}{}\n", "    ".repeat(stack.len()), name, marker));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_delimiters() {
        assert_eq!(DelimiterStyle::None.header("a.rs"), "");
        assert_eq!(DelimiterStyle::Comment.header("a.rs"), "# a.rs");
        assert_eq!(DelimiterStyle::Asterisk.footer("a.rs"), "");
        assert_eq!(DelimiterStyle::Classic.header("a.rs"), "=== Contents of a.rs ===");
        assert_eq!(DelimiterStyle::Classic.footer("a.rs"), "=== End of a.rs ===");
        assert_eq!(DelimiterStyle::Boxed.header("a.rs"), "┌──────┐\n│ a.rs │\n└──────┘");
        assert!(DelimiterStyle::Boxed.footer("a.rs").contains("│ END a.rs │"));
    }

    #[test]
    fn test_blank_line_trimming() {
        let lines: Vec<String> = ["", "  ", "a", "", "b", "", ""].iter().map(|s| s.to_string()).collect();
        let (kept, notes) = OutputGenerator::process_blank_lines(lines.clone(), true);
        assert_eq!(kept, vec!["a", "", "b"]);
        assert_eq!(notes, BlankLineNotes { leading: 2, trailing: 2 });
        assert_eq!(notes.header(), "(!): 2 blank lines\n");
        assert_eq!(notes.footer(), "\n(!): 2 blank lines\n");

        let (kept, notes) = OutputGenerator::process_blank_lines(lines.clone(), false);
        assert_eq!(kept, lines);
        assert_eq!(notes.header(), "");
    }

    #[test]
    fn test_all_blank_file() {
        let lines = vec![String::new(), " ".to_string()];
        let (kept, notes) = OutputGenerator::process_blank_lines(lines, true);
        assert!(kept.is_empty());
        assert_eq!(notes, BlankLineNotes { leading: 2, trailing: 0 });
    }

    #[test]
    fn test_obscure_methods() {
        assert_eq!(OutputGenerator::obscure_value("hunter2", ObscureMethod::Redact), "[REDACTED]");
        assert_eq!(OutputGenerator::obscure_value("ab-12", ObscureMethod::Preserve), "aa-00");
        assert_eq!(OutputGenerator::obscure_value("12345", ObscureMethod::Verbose), "[INT]");
        assert_eq!(OutputGenerator::obscure_value("apiKey", ObscureMethod::Verbose), "[STRING]");
        assert_eq!(OutputGenerator::obscure_value("k3y", ObscureMethod::Verbose), "[OBSCURED]");
    }

    #[test]
    fn test_obscure_line() {
        let mut table = BTreeMap::new();
        table.insert("hunter2".to_string(), ObscureMethod::Redact);
        table.insert("4242".to_string(), ObscureMethod::Preserve);
        let line = OutputGenerator::obscure_line("pw=hunter2 pin=4242", &table);
        assert_eq!(line, "pw=[REDACTED] pin=0000");
    }

    #[test]
    fn test_generate_tree() {
        let root = Path::new("/proj");
        let paths = vec![
            PathBuf::from("/proj/src/main.rs"),
            PathBuf::from("/proj/README.md"),
            PathBuf::from("/proj/src/app/cli.rs"),
        ];
        let tree = OutputGenerator::generate_tree(root, &paths, true);
        let expected = "\
proj/
└── README.md
└── src/
    └── app/
        └── cli.rs
    └── main.rs
";
        assert_eq!(tree, expected);
    }
}
