//! The content model

use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::error::{ContentError, Result};
use super::metadata::{self, MetaValue, ResolvedMetadata, NO_DRAFT_FIELDS};
use super::request::RequestContext;
use crate::document::HtmlDocument;
use crate::templates::{FlatContext, TemplateEngine, Templates};

/// Fields copied into the `head` of the JSON document
const HEAD_META: [&str; 4] = ["title", "description", "author", "keywords"];

/// Text content types and their file suffix
const CONTENT_EXTENSIONS: [(&str, &str); 6] = [
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/css", "css"),
    ("application/json", "json"),
    ("application/javascript", "js"),
    ("application/xml", "xml"),
];

pub fn is_html(content_type: &str) -> bool {
    content_type == "text/html"
}

/// File suffix of a text content type
pub fn suffix_for(content_type: &str) -> Option<&'static str> {
    CONTENT_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == content_type)
        .map(|(_, suffix)| *suffix)
}

/// Text content type registered for a file suffix
pub fn content_type_for_suffix(suffix: &str) -> Option<&'static str> {
    CONTENT_EXTENSIONS
        .iter()
        .find(|(_, s)| *s == suffix)
        .map(|(ct, _)| *ct)
}

/// Body of a content: decoded text or raw bytes
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(s) => s.as_bytes(),
            Body::Binary(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            Body::Binary(_) => None,
        }
    }
}

/// A file based content with its resolved metadata.
///
/// The JSON document is memoised per request shape; everything else is
/// recomputed on demand and never mutates the metadata.
pub struct Content {
    path: String,
    /// URL path the content is published at, defaults to `path`
    url: String,
    src: Option<PathBuf>,
    body: Body,
    meta: IndexMap<String, MetaValue>,
    draft: bool,
    template: Option<String>,
    template_path: Option<PathBuf>,
    engine: Arc<dyn TemplateEngine>,
    json_cache: Mutex<HashMap<u64, Value>>,
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("path", &self.path)
            .field("content_type", &self.content_type())
            .field("draft", &self.draft)
            .finish()
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl Content {
    /// Build a content from processed metadata.
    ///
    /// `template` and `template_engine` are taken out of the metadata and
    /// kept under `site`; string values are rendered with `site_context`;
    /// `modified` and `name` are always set.
    pub fn new(
        templates: &Templates,
        site_context: &FlatContext,
        body: Body,
        resolved: ResolvedMetadata,
        path: &str,
        src: Option<&Path>,
    ) -> Result<Self> {
        let ResolvedMetadata { mut meta, draft } = resolved;

        let template = take_string(&mut meta, "template");
        let template_engine = take_string(&mut meta, "template_engine");
        let engine = templates.engine(template_engine.as_deref())?;

        let template_path = match &template {
            Some(name) => {
                let found = templates.find(name);
                if found.is_none() {
                    tracing::warn!("Template '{}' for '{}' not found", name, path);
                }
                found
            }
            None => None,
        };

        let mut meta = meta
            .into_iter()
            .map(|(key, value)| -> Result<_> {
                Ok((key, render_meta(engine.as_ref(), value, site_context)?))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        let mut site = IndexMap::new();
        if let Some(template) = &template {
            site.insert("template".to_string(), MetaValue::Str(template.clone()));
        }
        site.insert(
            "template_engine".to_string(),
            MetaValue::Str(engine.name().to_string()),
        );
        meta.insert("site".to_string(), MetaValue::Map(site));

        let modified = meta
            .get("modified")
            .and_then(MetaValue::as_date)
            .or_else(|| meta.get("date").and_then(MetaValue::as_date))
            .or_else(|| src.and_then(modified_datetime))
            .unwrap_or_else(|| Local::now().naive_local());
        meta.insert("modified".to_string(), MetaValue::Date(modified));
        meta.insert(
            "name".to_string(),
            MetaValue::Str(metadata::slugify_key(path)),
        );

        Ok(Self {
            path: path.to_string(),
            url: path.to_string(),
            src: src.map(Path::to_path_buf),
            body,
            meta,
            draft,
            template,
            template_path,
            engine,
            json_cache: Mutex::new(HashMap::new()),
        })
    }

    /// URL path of this content, without suffix for HTML
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Publish the content at `url` instead of its path
    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    /// URL path the content is published at, a trailing `/` denotes an index
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Output file path, without suffix: the URL with `index` appended to
    /// directory URLs
    pub fn output_path(&self) -> String {
        let url = self.url.trim_start_matches('/');
        if url.is_empty() || url.ends_with('/') {
            format!("{}index", url)
        } else {
            url.to_string()
        }
    }

    /// Source file, when the content was read from disk
    pub fn src(&self) -> Option<&Path> {
        self.src.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    /// Filesystem-safe slug of the path
    pub fn name(&self) -> &str {
        self.meta
            .get("name")
            .and_then(MetaValue::as_str)
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.get("title").and_then(MetaValue::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.meta
            .get("content_type")
            .and_then(MetaValue::as_str)
            .unwrap_or("application/octet-stream")
    }

    pub fn is_html(&self) -> bool {
        is_html(self.content_type())
    }

    pub fn is_text(&self) -> bool {
        suffix_for(self.content_type()).is_some()
    }

    pub fn is_draft(&self) -> bool {
        self.draft
    }

    pub fn suffix(&self) -> Option<&'static str> {
        suffix_for(self.content_type())
    }

    /// Name of the wrapping template, if any
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDateTime> {
        self.meta.get("date").and_then(MetaValue::as_date)
    }

    pub fn modified(&self) -> NaiveDateTime {
        self.meta
            .get("modified")
            .and_then(MetaValue::as_date)
            .unwrap_or_default()
    }

    /// Date used for archives: the explicit date, else the modification time
    pub fn reldate(&self) -> NaiveDateTime {
        self.date().unwrap_or_else(|| self.modified())
    }

    pub fn year(&self) -> i32 {
        self.reldate().year()
    }

    pub fn month(&self) -> u32 {
        self.reldate().month()
    }

    /// Two digit month
    pub fn month2(&self) -> String {
        self.reldate().format("%m").to_string()
    }

    /// Lower case abbreviated month name
    pub fn month3(&self) -> String {
        self.reldate().format("%b").to_string().to_lowercase()
    }

    /// Identifier of the JSON document, only HTML contents have one
    pub fn id(&self) -> Option<String> {
        self.is_html().then(|| format!("{}.json", self.output_path()))
    }

    /// Key for a value in a context dictionary, prefixed by the suffix
    pub fn key(&self, name: &str) -> String {
        match self.suffix() {
            Some(suffix) => format!("{}_{}", suffix, name),
            None => name.to_string(),
        }
    }

    /// Flattened metadata with `overrides` applied on top
    pub fn context(&self, overrides: Option<&FlatContext>) -> Result<FlatContext> {
        let mut ctx = metadata::flatten(&self.meta)?;
        if let Some(overrides) = overrides {
            ctx.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(ctx)
    }

    /// Render the content.
    ///
    /// HTML bodies are rendered with the flattened context and then wrapped
    /// by the content template, which receives the body under `html_main`.
    /// Other contents are returned unchanged.
    pub fn render(&self, context: Option<&FlatContext>) -> Result<Body> {
        let Some(text) = self.body.as_text().filter(|_| self.is_html()) else {
            return Ok(self.body.clone());
        };

        let mut ctx = self.context(context)?;
        let mut rendered = self.engine.render_str(text, &ctx)?;
        if let Some(template_path) = &self.template_path {
            ctx.insert(self.key("main"), rendered);
            rendered = self.engine.render_file(template_path, &ctx)?;
        }
        Ok(Body::Text(rendered))
    }

    /// JSON document for the content API, `None` for non-HTML contents
    pub fn json(&self, request: &RequestContext) -> Result<Option<Value>> {
        if !self.is_html() {
            return Ok(None);
        }
        let cache_key = request.cache_key();
        if let Some(data) = self.cached_json(cache_key) {
            return Ok(Some(data));
        }

        let context = self.context(Some(&request.context))?;
        let main = match self.render(Some(&context))? {
            Body::Text(text) => text,
            Body::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        };

        let mut data: Map<String, Value> = self
            .meta
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        let suffix = self.suffix().unwrap_or("html");
        let mut text = match data.remove(suffix) {
            Some(Value::Object(text)) => text,
            _ => Map::new(),
        };
        text.insert("main".to_string(), Value::String(main));
        data.insert(suffix.to_string(), Value::Object(text));

        let mut head = Map::new();
        for key in HEAD_META {
            if let Some(value) = data.get(key).filter(|v| is_truthy(v)) {
                head.insert(key.to_string(), value.clone());
            }
        }
        if let Some(Value::Object(explicit)) = data.get("head") {
            head.extend(explicit.clone());
        }

        data.insert(
            "url".to_string(),
            Value::String(request.absolute_uri(&self.url)),
        );
        data.insert("head".to_string(), Value::Object(head));

        let data = Value::Object(data);
        self.json_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key, data.clone());
        Ok(Some(data))
    }

    fn cached_json(&self, key: u64) -> Option<Value> {
        self.json_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
    }

    /// Fill `doc` with the page head and return the main HTML fragment
    pub fn html(&self, request: &RequestContext, doc: &mut HtmlDocument) -> Result<String> {
        if !self.is_html() {
            return Err(ContentError::Unsupported(self.content_type().to_string()));
        }
        let data = self
            .json(request)?
            .ok_or_else(|| ContentError::Unsupported(self.content_type().to_string()))?;

        let page: Map<String, Value> = data
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_object())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        doc.jscontext.insert("page".to_string(), Value::Object(page));

        let image = data
            .get("image")
            .and_then(Value::as_str)
            .map(|image| Value::String(request.absolute_uri(image)))
            .unwrap_or(Value::Null);
        doc.meta.insert("og:image".to_string(), image);
        doc.meta.insert(
            "og:published_time".to_string(),
            data.get("date").cloned().unwrap_or(Value::Null),
        );
        doc.meta.insert(
            "og:modified_time".to_string(),
            data.get("modified").cloned().unwrap_or(Value::Null),
        );
        if let Some(Value::Object(head)) = data.get("head") {
            doc.meta
                .extend(head.iter().map(|(k, v)| (k.clone(), v.clone())));
            if let Some(title) = head.get("title").and_then(Value::as_str) {
                doc.title = Some(title.to_string());
            }
        }

        if !request.html5_navigation {
            for css in string_list(data.get("require_css")) {
                doc.add_link(&css);
            }
            for js in string_list(data.get("require_js")) {
                doc.require_script(&js);
            }
        }

        let suffix = self.suffix().unwrap_or("html");
        Ok(data
            .get(suffix)
            .and_then(|text| text.get("main"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Values of URL variables.
    ///
    /// A missing `id` means the content has no page of its own and raises
    /// the skip signal; any other missing variable is a build error.
    pub fn urlparams(&self, names: &[&str]) -> Result<IndexMap<String, String>> {
        let mut params = IndexMap::new();
        for &name in names {
            let value = match self.meta.get(name).filter(|v| !v.is_empty()) {
                Some(value) => Some(value.to_flat_string()?),
                None => self.property(name),
            };
            match value.filter(|v| !v.is_empty()) {
                Some(value) => {
                    params.insert(name.to_string(), value);
                }
                None if name == "id" => {
                    return Err(ContentError::skip(format!("{} has no id", self.path)))
                }
                None => {
                    return Err(ContentError::build(format!(
                        "{} could not obtain url variable '{}'",
                        self.path, name
                    )))
                }
            }
        }
        Ok(params)
    }

    /// Computed properties usable as URL variables
    fn property(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id(),
            "path" => Some(self.path.clone()),
            "name" => Some(self.name().to_string()),
            "year" => Some(self.year().to_string()),
            "month" => Some(self.month().to_string()),
            "month2" => Some(self.month2()),
            "month3" => Some(self.month3()),
            "suffix" => self.suffix().map(str::to_string),
            "content_type" => Some(self.content_type().to_string()),
            _ => None,
        }
    }

    /// Mandatory fields this content does not provide. Drafts are exempt
    /// from the fields in [`NO_DRAFT_FIELDS`].
    pub fn missing_fields<S: AsRef<str>>(&self, mandatory: &[S]) -> Vec<String> {
        mandatory
            .iter()
            .map(AsRef::as_ref)
            .filter(|field| !(self.draft && NO_DRAFT_FIELDS.contains(field)))
            .filter(|field| self.meta.get(*field).map_or(true, MetaValue::is_empty))
            .map(str::to_string)
            .collect()
    }
}

fn take_string(meta: &mut IndexMap<String, MetaValue>, key: &str) -> Option<String> {
    match meta.shift_remove(key) {
        Some(MetaValue::Str(s)) => Some(s),
        _ => None,
    }
}

/// Render string metadata with the site context
fn render_meta(
    engine: &dyn TemplateEngine,
    value: MetaValue,
    context: &FlatContext,
) -> Result<MetaValue> {
    Ok(match value {
        MetaValue::Str(s) => MetaValue::Str(engine.render_str(&s, context)?),
        MetaValue::List(items) => MetaValue::List(
            items
                .into_iter()
                .map(|v| render_meta(engine, v, context))
                .collect::<Result<_>>()?,
        ),
        MetaValue::Map(map) => MetaValue::Map(
            map.into_iter()
                .map(|(k, v)| -> Result<_> { Ok((k, render_meta(engine, v, context)?)) })
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

fn modified_datetime(src: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(src).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}
