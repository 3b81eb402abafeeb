//! Front-matter parsing for text sources
//!
//! Two notations are understood: a YAML block fenced by `---` lines, and the
//! Markdown meta-data notation (`Key: value` lines at the top of the file,
//! indented lines continuing the previous key, ended by a blank line).

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value;

use super::metadata::RawMetadata;

lazy_static! {
    static ref META_LINE: Regex = Regex::new(r"^[ ]{0,3}([A-Za-z0-9_-]+):\s*(.*)$").unwrap();
    static ref META_MORE: Regex = Regex::new(r"^[ ]{4,}(.*)$").unwrap();
}

/// Split `content` into raw metadata and the remaining body
pub fn parse(content: &str) -> (RawMetadata, &str) {
    let trimmed = content.trim_start_matches(['\n', '\r']);

    if trimmed.starts_with("---") {
        if let Some(parsed) = parse_yaml(trimmed) {
            return parsed;
        }
        return (Vec::new(), content);
    }

    parse_meta_lines(trimmed)
}

fn parse_yaml(content: &str) -> Option<(RawMetadata, &str)> {
    let rest = content[3..].trim_start_matches(['\n', '\r']);
    let end_pos = rest.find("\n---").or_else(|| rest.find("\n..."))?;

    let yaml_content = &rest[..end_pos];
    let remaining = rest[end_pos + 4..].trim_start_matches(['\n', '\r']);

    if yaml_content.trim().is_empty() {
        return Some((Vec::new(), remaining));
    }

    // A `---` separator followed by prose is a markdown rule, not front matter
    let has_yaml_structure = yaml_content.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        if let Some(colon_pos) = trimmed.find(':') {
            let before_colon = &trimmed[..colon_pos];
            let is_valid_key = !before_colon.is_empty()
                && before_colon
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                && before_colon != "http"
                && before_colon != "https"
                && before_colon != "ftp";
            if is_valid_key {
                let after_colon = &trimmed[colon_pos + 1..];
                return after_colon.is_empty() || after_colon.starts_with(' ');
            }
        }
        false
    });

    if !has_yaml_structure {
        return None;
    }

    match serde_yaml::from_str::<serde_yaml::Mapping>(yaml_content) {
        Ok(mapping) => {
            let meta = mapping
                .into_iter()
                .filter_map(|(key, value)| yaml_key(&key).map(|k| (k, value)))
                .collect();
            Some((meta, remaining))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse YAML front-matter, treating as content: {}",
                e
            );
            None
        }
    }
}

fn yaml_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Markdown meta-data notation. Keys are lower-cased and every key maps to
/// the list of its lines.
fn parse_meta_lines(content: &str) -> (RawMetadata, &str) {
    let mut meta: Vec<(String, Vec<String>)> = Vec::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            if !meta.is_empty() {
                offset += line.len();
            }
            break;
        }
        if let Some(caps) = META_LINE.captures(text) {
            let key = caps[1].to_lowercase();
            let value = caps[2].trim().to_string();
            meta.push((key, vec![value]));
        } else if let (Some(caps), Some(last)) = (META_MORE.captures(text), meta.last_mut()) {
            last.1.push(caps[1].trim().to_string());
        } else {
            break;
        }
        offset += line.len();
    }

    let body = &content[offset..];
    let meta = meta
        .into_iter()
        .map(|(key, lines)| {
            let value = if lines.len() == 1 {
                Value::String(lines.into_iter().next().unwrap_or_default())
            } else {
                Value::Sequence(lines.into_iter().map(Value::String).collect())
            };
            (key, value)
        })
        .collect();
    (meta, body)
}
