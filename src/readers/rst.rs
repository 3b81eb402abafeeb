//! reStructuredText reader
//!
//! Covers the subset used by site pages: a leading field list with the
//! metadata, section titles with an underline, paragraphs, bullet lists,
//! literal blocks introduced by `::` and inline emphasis, strong text,
//! literals and hyperlinks.

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value;

use super::{Parsed, ReadContext, Reader};
use crate::content::{html_escape, Body, ContentError, RawMetadata, Result};

lazy_static! {
    static ref FIELD: Regex = Regex::new(r"^:([^:\s][^:]*):(?:\s+(.*))?$").unwrap();
    static ref LINK: Regex = Regex::new(r"`([^`]+?)\s*&lt;([^`]+?)&gt;`_").unwrap();
    static ref STRONG: Regex = Regex::new(r"\*\*(.+?)\*\*").unwrap();
    static ref EMPHASIS: Regex = Regex::new(r"\*(.+?)\*").unwrap();
}

const ADORNMENTS: &str = "=-~^\"'`#*+:._";

pub struct RstReader;

impl Reader for RstReader {
    fn name(&self) -> &'static str {
        "RstReader"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rst"]
    }

    fn read(&self, src: &[u8], path: &str, _ext: &str, _ctx: &ReadContext) -> Result<Parsed> {
        let text = std::str::from_utf8(src)
            .map_err(|_| ContentError::build(format!("'{}' is not valid UTF-8", path)))?;
        let lines: Vec<&str> = text.lines().collect();
        let (mut metadata, start) = field_list(&lines);
        let html = convert(&lines[start..]);
        metadata.push(("content_type".to_string(), "text/html".into()));
        Ok(Parsed::new(Body::Text(html), metadata, path))
    }
}

/// Leading field list and the index of the first body line
fn field_list(lines: &[&str]) -> (RawMetadata, usize) {
    let mut fields: Vec<(String, Vec<String>)> = Vec::new();
    let mut i = 0;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = FIELD.captures(line) {
            let value = caps.get(2).map_or("", |m| m.as_str()).trim();
            let mut values = Vec::new();
            if !value.is_empty() {
                values.push(value.to_string());
            }
            fields.push((caps[1].trim().to_lowercase(), values));
        } else if let (true, Some(last)) = (is_indented(line), fields.last_mut()) {
            last.1.push(line.trim().to_string());
        } else {
            break;
        }
        i += 1;
    }
    if fields.is_empty() {
        return (Vec::new(), 0);
    }

    let meta = fields
        .into_iter()
        .map(|(key, mut values)| {
            let value = match values.len() {
                0 => Value::Null,
                1 => Value::String(values.remove(0)),
                _ => Value::Sequence(values.into_iter().map(Value::String).collect()),
            };
            (key, value)
        })
        .collect();
    (meta, i)
}

fn is_indented(line: &str) -> bool {
    !line.trim().is_empty() && line.starts_with([' ', '\t'])
}

fn is_underline(line: &str, title: &str) -> bool {
    let line = line.trim_end();
    let Some(first) = line.chars().next() else {
        return false;
    };
    ADORNMENTS.contains(first)
        && line.chars().all(|c| c == first)
        && !title.trim().is_empty()
        && !is_indented(title)
        && line.chars().count() >= title.trim().chars().count()
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

/// Convert body lines to HTML
fn convert(lines: &[&str]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut levels: Vec<char> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        if i + 1 < lines.len() && is_underline(lines[i + 1], line) {
            let adornment = lines[i + 1].chars().next().unwrap_or('=');
            let level = match levels.iter().position(|&c| c == adornment) {
                Some(pos) => pos + 1,
                None => {
                    levels.push(adornment);
                    levels.len()
                }
            }
            .min(6);
            out.push(format!("<h{0}>{1}</h{0}>", level, inline(line.trim())));
            i += 2;
            continue;
        }

        if bullet(line).is_some() {
            out.push("<ul>".to_string());
            while let Some(item) = lines.get(i).and_then(|l| bullet(l)) {
                let mut text = item.trim().to_string();
                i += 1;
                while i < lines.len() && is_indented(lines[i]) {
                    text.push(' ');
                    text.push_str(lines[i].trim());
                    i += 1;
                }
                out.push(format!("<li>{}</li>", inline(&text)));
            }
            out.push("</ul>".to_string());
            continue;
        }

        let mut para = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() {
            para.push(lines[i].trim());
            i += 1;
        }
        let mut text = para.join(" ");
        let literal = text.ends_with("::");
        if literal {
            if text == "::" {
                text.clear();
            } else if let Some(stripped) = text.strip_suffix(" ::") {
                text = stripped.to_string();
            } else {
                text.pop();
            }
        }
        if !text.is_empty() {
            out.push(format!("<p>{}</p>", inline(&text)));
        }
        if literal {
            let (block, next) = literal_block(lines, i);
            if !block.is_empty() {
                out.push(format!("<pre>{}</pre>", html_escape(&block)));
            }
            i = next;
        }
    }

    out.join("\n")
}

/// Indented block starting at `start`, dedented, and the index after it
fn literal_block(lines: &[&str], start: usize) -> (String, usize) {
    let mut end = start;
    while end < lines.len() && (lines[end].trim().is_empty() || is_indented(lines[end])) {
        end += 1;
    }
    let block = &lines[start..end];
    let indent = block
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let text = block
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    (text.trim_matches('\n').to_string(), end)
}

/// Inline markup; inline literals are left untouched
fn inline(text: &str) -> String {
    text.split("``")
        .enumerate()
        .map(|(n, part)| {
            let escaped = html_escape(part);
            if n % 2 == 1 {
                return format!("<code>{}</code>", escaped);
            }
            let linked = LINK.replace_all(&escaped, r#"<a href="$2">$1</a>"#);
            let strong = STRONG.replace_all(&linked, "<strong>$1</strong>");
            EMPHASIS.replace_all(&strong, "<em>$1</em>").into_owned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::tests::fixture;

    const PAGE: &str = "\
:title: Hello
:keywords: rust,
    web

Section
=======

Some *emphasis*, **strong** and ``a*b*c`` text
on two lines.

Sub
---

- one
- two with `link <https://example.com>`_

Example::

    let x = 1;
      let y = 2;

After.
";

    #[test]
    fn test_field_list() {
        let lines: Vec<&str> = PAGE.lines().collect();
        let (meta, start) = field_list(&lines);
        assert_eq!(meta[0], ("title".to_string(), Value::from("Hello")));
        assert_eq!(
            meta[1].1,
            Value::Sequence(vec![Value::from("rust,"), Value::from("web")])
        );
        assert_eq!(start, 3);
    }

    #[test]
    fn test_convert() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let parsed = RstReader.read(PAGE.as_bytes(), "page", "rst", &ctx).unwrap();
        let html = parsed.body.as_text().unwrap();

        assert!(html.contains("<h1>Section</h1>"));
        assert!(html.contains("<h2>Sub</h2>"));
        assert!(html.contains(
            "<p>Some <em>emphasis</em>, <strong>strong</strong> and <code>a*b*c</code> text on two lines.</p>"
        ));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains(r#"<li>two with <a href="https://example.com">link</a></li>"#));
        assert!(html.contains("<p>Example:</p>"));
        assert!(html.contains("<pre>let x = 1;\n  let y = 2;</pre>"));
        assert!(html.contains("<p>After.</p>"));
    }

    #[test]
    fn test_no_fields() {
        let lines = vec!["Just text."];
        let (meta, start) = field_list(&lines);
        assert!(meta.is_empty());
        assert_eq!(start, 0);
        assert_eq!(convert(&lines), "<p>Just text.</p>");
    }
}
