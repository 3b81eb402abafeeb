//! Front-matter metadata processing
//!
//! Readers hand over raw key/value pairs in whatever notation their format
//! uses. [`resolve`] merges them with defaults and caller overrides, slugifies
//! the keys and converts every known key with its processor. Unknown keys
//! with a `meta_`, `head_`, `og_` or `twitter_` prefix are routed into the
//! `meta` and `head` groups, anything else is logged and dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_yaml::Value;

use super::error::{ContentError, Result};

/// Raw metadata as produced by a reader, in declaration order
pub type RawMetadata = Vec<(String, Value)>;

/// Values applied before anything a reader or caller provides
const DEFAULTS: [(&str, i64); 2] = [("priority", 1), ("order", 0)];

/// Fields a draft does not have to provide
pub const NO_DRAFT_FIELDS: [&str; 2] = ["date", "category"];

/// A resolved metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Date(NaiveDateTime),
    List(Vec<MetaValue>),
    Link(UrlWrapper),
    Map(IndexMap<String, MetaValue>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            MetaValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, MetaValue>> {
        match self {
            MetaValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// True for empty strings, lists and maps
    pub fn is_empty(&self) -> bool {
        match self {
            MetaValue::Str(s) => s.is_empty(),
            MetaValue::List(l) => l.is_empty(),
            MetaValue::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    /// Convert a leaf value to its string form.
    ///
    /// Lists are comma-joined and dates use ISO-8601. A map has no string
    /// form and is reported as a build error.
    pub fn to_flat_string(&self) -> Result<String> {
        match self {
            MetaValue::Str(s) => Ok(s.clone()),
            MetaValue::Int(i) => Ok(i.to_string()),
            MetaValue::Date(d) => Ok(iso8601(d)),
            MetaValue::Link(link) => Ok(link.name.clone()),
            MetaValue::List(items) => Ok(items
                .iter()
                .map(|v| v.to_flat_string())
                .collect::<Result<Vec<_>>>()?
                .join(", ")),
            MetaValue::Map(_) => Err(ContentError::build(
                "a dictionary found when converting to string",
            )),
        }
    }

    /// JSON form used by the content API
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetaValue::Str(s) => serde_json::Value::String(s.clone()),
            MetaValue::Int(i) => serde_json::Value::from(*i),
            MetaValue::Date(d) => serde_json::Value::String(iso8601(d)),
            MetaValue::Link(link) => serde_json::json!({
                "name": link.name,
                "slug": link.slug,
            }),
            MetaValue::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            MetaValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

/// Kind of a named, sluggable metadata entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Tag,
    Category,
    Author,
}

/// A tag, category or author: a display name plus its slug
#[derive(Debug, Clone, PartialEq)]
pub struct UrlWrapper {
    pub kind: WrapperKind,
    pub name: String,
    pub slug: String,
}

impl UrlWrapper {
    pub fn new(kind: WrapperKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            slug: slug::slugify(name),
        }
    }
}

/// How a known metadata key is converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Processor {
    Text,
    Date,
    Int,
    Wrapped(WrapperKind),
    Strings,
}

fn processor(key: &str) -> Option<Processor> {
    let proc = match key {
        "name" | "slug" | "title" | "description" | "image" | "status" | "content_type"
        | "template" | "template_engine" => Processor::Text,
        "date" | "modified" => Processor::Date,
        "priority" | "order" => Processor::Int,
        "keywords" => Processor::Wrapped(WrapperKind::Tag),
        "category" => Processor::Wrapped(WrapperKind::Category),
        "author" => Processor::Wrapped(WrapperKind::Author),
        "require_css" | "require_js" | "require_context" => Processor::Strings,
        _ => return None,
    };
    Some(proc)
}

/// Slugify a metadata key using `_` as separator
pub fn slugify_key(key: &str) -> String {
    slug::slugify(key).replace('-', "_")
}

/// Metadata after processing
#[derive(Debug, Clone, Default)]
pub struct ResolvedMetadata {
    pub meta: IndexMap<String, MetaValue>,
    pub draft: bool,
}

/// Merge defaults, overrides and reader metadata and run the processors.
///
/// Later entries win: defaults first, then `overrides`, then `raw`. `path`
/// is only used for log messages.
pub fn resolve(raw: RawMetadata, overrides: RawMetadata, path: &str) -> Result<ResolvedMetadata> {
    let defaults = DEFAULTS
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)));

    let mut meta: IndexMap<String, MetaValue> = IndexMap::new();
    let mut meta_ns: IndexMap<String, MetaValue> = IndexMap::new();
    let mut head: IndexMap<String, MetaValue> = IndexMap::new();

    for (key, value) in defaults.chain(overrides).chain(raw) {
        let key = slugify_key(&key);
        let values = raw_values(value);

        let Some(proc) = processor(&key) else {
            if let Some((prefix, rest)) = key.split_once('_') {
                let target = match prefix {
                    "meta" => Some((&mut meta_ns, rest.to_string())),
                    "head" => Some((&mut head, rest.to_string())),
                    "og" | "twitter" => Some((&mut head, format!("{}:{}", prefix, rest))),
                    _ => None,
                };
                if let Some((group, name)) = target {
                    if let Some(value) = guess(strings(&key, &values)?) {
                        group.insert(name, value);
                    }
                    continue;
                }
            }
            tracing::warn!("Unknown meta '{}' in '{}'", key, path);
            continue;
        };

        match apply(proc, &key, &values)? {
            Some(value) => {
                meta.insert(key, value);
            }
            None => tracing::debug!("Dropped empty meta '{}' in '{}'", key, path),
        }
    }

    let draft = meta.get("priority").and_then(MetaValue::as_int) == Some(0);
    if draft {
        head.insert(
            "robots".to_string(),
            MetaValue::List(vec!["noindex".into(), "nofollow".into()]),
        );
    }
    if !meta_ns.is_empty() {
        meta.insert("meta".to_string(), MetaValue::Map(meta_ns));
    }
    meta.insert("head".to_string(), MetaValue::Map(head));

    Ok(ResolvedMetadata { meta, draft })
}

/// Split a raw value into its individual entries
fn raw_values(value: Value) -> Vec<Value> {
    match value {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        Value::Tagged(tagged) => raw_values(tagged.value),
        other => vec![other],
    }
}

/// String form of every raw entry, skipping nulls and blank strings
fn strings(key: &str, values: &[Value]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let s = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            Value::Tagged(tagged) => {
                out.extend(strings(key, std::slice::from_ref(&tagged.value))?);
                continue;
            }
            Value::Mapping(_) => {
                return Err(ContentError::build(format!(
                    "a dictionary found where a string was expected for '{}'",
                    key
                )))
            }
            Value::Sequence(_) => {
                return Err(ContentError::build(format!(
                    "a nested list found where a string was expected for '{}'",
                    key
                )))
            }
        };
        if !s.is_empty() {
            out.push(s);
        }
    }
    Ok(out)
}

/// A single value stays scalar, several become a list
fn guess(mut values: Vec<String>) -> Option<MetaValue> {
    match values.len() {
        0 => None,
        1 => values.pop().map(MetaValue::Str),
        _ => Some(MetaValue::List(
            values.into_iter().map(MetaValue::Str).collect(),
        )),
    }
}

/// Comma separated entries of every value
fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

fn apply(proc: Processor, key: &str, values: &[Value]) -> Result<Option<MetaValue>> {
    let values = strings(key, values)?;
    if values.is_empty() {
        return Ok(None);
    }
    let value = match proc {
        Processor::Text => MetaValue::Str(values.join(" ")),
        Processor::Date => {
            let text = values.join(" ");
            let date = parse_date(&text).ok_or_else(|| {
                ContentError::build(format!("could not parse date '{}' for '{}'", text, key))
            })?;
            MetaValue::Date(date)
        }
        Processor::Int => {
            let text = values.join("");
            let number = text.parse::<i64>().map_err(|_| {
                ContentError::build(format!("'{}' is not an integer for '{}'", text, key))
            })?;
            MetaValue::Int(number)
        }
        Processor::Wrapped(kind) => {
            let items = split_list(&values);
            if items.is_empty() {
                return Ok(None);
            }
            MetaValue::List(
                items
                    .iter()
                    .map(|name| MetaValue::Link(UrlWrapper::new(kind, name)))
                    .collect(),
            )
        }
        Processor::Strings => {
            let items = split_list(&values);
            if items.is_empty() {
                return Ok(None);
            }
            MetaValue::List(items.into_iter().map(MetaValue::Str).collect())
        }
    };
    Ok(Some(value))
}

/// Flatten nested metadata into `parent_child` keys with string values
pub fn flatten(meta: &IndexMap<String, MetaValue>) -> Result<IndexMap<String, String>> {
    let mut out = IndexMap::new();
    flatten_into(None, meta, &mut out)?;
    Ok(out)
}

fn flatten_into(
    prefix: Option<&str>,
    meta: &IndexMap<String, MetaValue>,
    out: &mut IndexMap<String, String>,
) -> Result<()> {
    for (key, value) in meta {
        let key = match prefix {
            Some(prefix) => format!("{}_{}", prefix, key),
            None => key.clone(),
        };
        match value {
            MetaValue::Map(child) => flatten_into(Some(&key), child, out)?,
            other => {
                out.insert(key, other.to_flat_string()?);
            }
        }
    }
    Ok(())
}

/// ISO-8601 form of a date-time
pub fn iso8601(date: &NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse a date string in various formats
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y", "%b %d, %Y"];
    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    // RFC 3339 with an offset keeps the wall-clock time
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    None
}
