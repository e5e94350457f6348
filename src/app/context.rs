//! Structured preamble written ahead of a block's files.

use crate::app::models::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

pub const HEADER_BEGIN: &str = "---CONTEXT-HEADER-BEGIN---";
pub const HEADER_END: &str = "---CONTEXT-HEADER-END---";

impl Context {
    /// Preamble stamped with the current time.
    pub fn header(&self, output: &Path) -> String {
        self.header_at(output, &iso8601_now())
    }

    /// Marker-bounded key/value block. Values are JSON-encoded; continuation
    /// lines of multi-line values are indented two spaces.
    pub fn header_at(&self, output: &Path, generated_at: &str) -> String {
        let mut lines = vec![HEADER_BEGIN.to_string()];
        lines.push(self.object_at(output, generated_at));
        lines.push(HEADER_END.to_string());
        lines.join("\n")
    }

    pub fn object_at(&self, output: &Path, generated_at: &str) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(title) = &self.title {
            pairs.push(("title", json_string(title)));
        }
        if let Some(details) = &self.details {
            pairs.push(("details", json_string(details)));
        }
        if let Some(deps) = self.dependencies.as_ref().filter(|d| !d.is_empty()) {
            let encoded = serde_json::to_string_pretty(deps).unwrap_or_else(|_| "[]".to_string());
            pairs.push(("dependencies", encoded));
        }
        pairs.push(("output", json_string(&output.to_string_lossy())));
        pairs.push(("generated_at", json_string(generated_at)));

        let mut lines = vec!["{".to_string()];
        let last = pairs.len() - 1;
        for (i, (key, value)) in pairs.iter().enumerate() {
            let comma = if i == last { "" } else { "," };
            lines.push(format!("  \"{}\" : {}{}", key, indent_following_lines(value, 2), comma));
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

fn indent_following_lines(value: &str, spaces: usize) -> String {
    match value.split_once('\n') {
        None => value.to_string(),
        Some((first, rest)) => {
            let pad = " ".repeat(spaces);
            let rest: Vec<String> = rest.split('\n').map(|l| format!("{}{}", pad, l)).collect();
            format!("{}\n{}", first, rest.join("\n"))
        }
    }
}

/// UTC timestamp, second precision: `2024-03-09T14:05:00Z`.
pub fn iso8601_now() -> String {
    format_utc(Utc::now())
}

fn format_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> String {
        format_utc(DateTime::from_timestamp(secs, 0).unwrap())
    }

    #[test]
    fn test_timestamps_are_utc_seconds() {
        assert_eq!(at(0), "1970-01-01T00:00:00Z");
        assert_eq!(at(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(at(1_700_000_000), "2023-11-14T22:13:20Z");
        assert!(iso8601_now().ends_with('Z'));
    }

    #[test]
    fn test_header_layout() {
        let ctx = Context {
            title: Some("Say \"hi\"".to_string()),
            details: Some("line one\nline two".to_string()),
            dependencies: Some(vec!["serde".to_string()]),
        };
        let header = ctx.header_at(Path::new("/out/bundle.txt"), "2024-01-01T00:00:00Z");
        let expected = "\
---CONTEXT-HEADER-BEGIN---
{
  \"title\" : \"Say \\\"hi\\\"\",
  \"details\" : \"line one\\nline two\",
  \"dependencies\" : [
    \"serde\"
  ],
  \"output\" : \"/out/bundle.txt\",
  \"generated_at\" : \"2024-01-01T00:00:00Z\"
}
---CONTEXT-HEADER-END---";
        assert_eq!(header, expected);
    }

    #[test]
    fn test_header_without_optional_fields() {
        let ctx = Context {
            title: Some("t".to_string()),
            ..Default::default()
        };
        let object = ctx.object_at(Path::new("/o"), "now");
        assert_eq!(object, "{\n  \"title\" : \"t\",\n  \"output\" : \"/o\",\n  \"generated_at\" : \"now\"\n}");
    }
}
