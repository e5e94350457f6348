//! Parser for `.conany` selection documents.
//!
//! ```text
//! render(out.txt) {
//!     context {
//!         title = Parser rewrite
//!         details {
//!             free text, dedented
//!         }
//!         dependencies [ serde, regex ]
//!     }
//!     include [ src/, ~/notes/*.md ]
//!     exclude [ *.log ]
//! }
//! ```
//!
//! Structure is recovered with depth counters over the comment-stripped
//! text. Any structural problem fails the whole document.

use crate::app::error::{ConcatError, Result};
use crate::app::models::{Context, SelectionBlock};
use std::fs;
use std::path::Path;

pub const DOCUMENT_NAME: &str = ".conany";

pub fn parse_file(path: &Path) -> Result<Vec<SelectionBlock>> {
    let text = fs::read_to_string(path).map_err(|e| ConcatError::read_error(path, e))?;
    parse(&text)
}

/// Every `render(...) { ... }` block of the document, in source order.
pub fn parse(text: &str) -> Result<Vec<SelectionBlock>> {
    let doc = strip_comments(text);
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(at) = find_keyword(&doc, "render", cursor) {
        let (block, next) = parse_block(&doc, at)?;
        log::debug!(
            "parsed render({}) with {} include / {} exclude tokens",
            block.output,
            block.include.len(),
            block.exclude.len()
        );
        blocks.push(block);
        cursor = next;
    }

    if blocks.is_empty() {
        return Err(ConcatError::NoneFound);
    }
    Ok(blocks)
}

/// Drops everything from an unescaped `#` to the end of each line. Quotes are
/// not special, so a `#` inside a quoted value is stripped too. `\#` keeps a
/// literal `#`.
fn strip_comments(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_line_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'#') => {
                out.push('#');
                chars.next();
            }
            '#' => break,
            _ => out.push(c),
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn parse_block(doc: &str, at: usize) -> Result<(SelectionBlock, usize)> {
    let bytes = doc.as_bytes();

    let open_paren = skip_ws(doc, at + "render".len());
    if bytes.get(open_paren) != Some(&b'(') {
        return Err(ConcatError::Malformed {
            line: line_of(doc, at),
            message: "expected '(' after render".to_string(),
        });
    }
    let close_paren = doc[open_paren + 1..]
        .find(')')
        .map(|rel| open_paren + 1 + rel)
        .ok_or_else(|| ConcatError::Malformed {
            line: line_of(doc, open_paren),
            message: "render(...) name is never closed with ')'".to_string(),
        })?;

    let name = clean_token(&doc[open_paren + 1..close_paren]);
    if name.is_empty() {
        return Err(ConcatError::MissingName {
            line: line_of(doc, at),
        });
    }

    let open_brace = skip_ws(doc, close_paren + 1);
    if bytes.get(open_brace) != Some(&b'{') {
        return Err(ConcatError::Malformed {
            line: line_of(doc, close_paren),
            message: format!("expected '{{' after render({})", name),
        });
    }
    let close_brace = matching_close(doc, open_brace, b'{', b'}')
        .ok_or_else(|| ConcatError::UnclosedBlock { name: name.clone() })?;

    let block = parse_body(name, &doc[open_brace + 1..close_brace])?;
    Ok((block, close_brace + 1))
}

fn parse_body(name: String, body: &str) -> Result<SelectionBlock> {
    let (context, outer) = match find_section(body, "context", b'{', b'}') {
        Lookup::Found(section) => (
            parse_context(&name, section.inner(body))?,
            mask(body, &section),
        ),
        Lookup::Missing => (None, body.to_string()),
        Lookup::Unclosed => {
            return Err(ConcatError::UnclosedSection {
                name,
                keyword: "context",
            })
        }
    };

    let include = list_section(&name, &outer, "include")?;
    let exclude = list_section(&name, &outer, "exclude")?;

    Ok(SelectionBlock {
        output: name,
        include,
        exclude,
        context,
    })
}

fn parse_context(name: &str, text: &str) -> Result<Option<Context>> {
    let mut masked = text.to_string();

    let details = match find_section(text, "details", b'{', b'}') {
        Lookup::Found(section) => {
            masked = mask(&masked, &section);
            Some(dedent(section.inner(text))).filter(|d| !d.is_empty())
        }
        Lookup::Missing => None,
        Lookup::Unclosed => return Err(unclosed(name, "details")),
    };

    let dependencies = match find_section(&masked, "dependencies", b'[', b']') {
        Lookup::Found(section) => {
            let deps = split_list(section.inner(&masked));
            masked = mask(&masked, &section);
            Some(deps).filter(|d| !d.is_empty())
        }
        Lookup::Missing => None,
        Lookup::Unclosed => return Err(unclosed(name, "dependencies")),
    };

    let context = Context {
        title: find_title(&masked),
        details,
        dependencies,
    };
    Ok((!context.is_empty()).then_some(context))
}

fn unclosed(name: &str, keyword: &'static str) -> ConcatError {
    ConcatError::UnclosedSection {
        name: name.to_string(),
        keyword,
    }
}

fn list_section(name: &str, text: &str, keyword: &'static str) -> Result<Vec<String>> {
    match find_section(text, keyword, b'[', b']') {
        Lookup::Found(section) => Ok(split_list(section.inner(text))),
        Lookup::Missing => Ok(Vec::new()),
        Lookup::Unclosed => Err(unclosed(name, keyword)),
    }
}

/// `title = <rest of line>`
fn find_title(text: &str) -> Option<String> {
    let mut from = 0;
    while let Some(at) = find_word(text, "title", from, |b| b == b'=' || is_boundary(b)) {
        let eq = skip_ws(text, at + "title".len());
        if text.as_bytes().get(eq) == Some(&b'=') {
            let rest = &text[eq + 1..];
            let line = rest.split('\n').next().unwrap_or("");
            let title = clean_token(line);
            return (!title.is_empty()).then_some(title);
        }
        from = at + "title".len();
    }
    None
}

struct Section {
    start: usize,
    open: usize,
    close: usize,
}

impl Section {
    fn inner<'t>(&self, text: &'t str) -> &'t str {
        &text[self.open + 1..self.close]
    }
}

enum Lookup {
    Found(Section),
    Missing,
    Unclosed,
}

/// Standalone `keyword` immediately followed (modulo whitespace) by `open`,
/// together with its balanced closing delimiter.
fn find_section(text: &str, keyword: &str, open: u8, close: u8) -> Lookup {
    let mut from = 0;
    while let Some(at) = find_keyword(text, keyword, from) {
        let next = skip_ws(text, at + keyword.len());
        if text.as_bytes().get(next) == Some(&open) {
            return match matching_close(text, next, open, close) {
                Some(end) => Lookup::Found(Section {
                    start: at,
                    open: next,
                    close: end,
                }),
                None => Lookup::Unclosed,
            };
        }
        from = at + keyword.len();
    }
    Lookup::Missing
}

/// Blanks a section out so later keyword searches cannot see inside it.
/// Byte offsets of the surrounding text are preserved.
fn mask(text: &str, section: &Section) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..section.start]);
    out.extend(std::iter::repeat(' ').take(section.close + 1 - section.start));
    out.push_str(&text[section.close + 1..]);
    out
}

fn is_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || b"{}()[]".contains(&b)
}

/// Next occurrence of `keyword` bounded on both sides by whitespace, a
/// bracket, or the text edges.
fn find_keyword(text: &str, keyword: &str, from: usize) -> Option<usize> {
    find_word(text, keyword, from, is_boundary)
}

/// Like `find_keyword`, with the byte allowed after the word chosen by `ends`.
fn find_word(text: &str, keyword: &str, from: usize, ends: impl Fn(u8) -> bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut start = from;
    while let Some(rel) = text.get(start..)?.find(keyword) {
        let at = start + rel;
        let end = at + keyword.len();
        let before = at == 0 || is_boundary(bytes[at - 1]);
        let after = end == bytes.len() || ends(bytes[end]);
        if before && after {
            return Some(at);
        }
        start = end;
    }
    None
}

fn matching_close(text: &str, open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(open_at) {
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn skip_ws(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

fn clean_token(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn split_list(payload: &str) -> Vec<String> {
    payload
        .split([',', '\n'])
        .map(clean_token)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Removes the common leading-space indent and surrounding blank lines.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    let body: Vec<&str> = lines
        .iter()
        .copied()
        .map(|l| if l.trim().is_empty() { "" } else { l[indent..].trim_end() })
        .collect();

    let start = body.iter().position(|l| !l.is_empty()).unwrap_or(body.len());
    let end = body.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);
    body[start..end].join("\n")
}
