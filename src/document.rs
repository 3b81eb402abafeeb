//! HTML5 document assembled around a rendered content
//!
//! [`Content::html`](crate::content::Content::html) fills the head meta,
//! stylesheet links, scripts and the javascript context; [`HtmlDocument::render`]
//! turns them into a full page through the site layout.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::content::Result;
use crate::templates::{FlatContext, Templates};

/// Head collections of an HTML page
#[derive(Debug, Clone, Default)]
pub struct HtmlDocument {
    pub title: Option<String>,
    pub meta: IndexMap<String, Value>,
    pub links: Vec<String>,
    pub scripts: Vec<String>,
    pub jscontext: serde_json::Map<String, Value>,
}

/// A `<meta>` tag as seen by the layout template
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetaTag {
    pub attr: &'static str,
    pub key: String,
    pub content: String,
}

impl HtmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stylesheet link once
    pub fn add_link(&mut self, href: &str) {
        if !self.links.iter().any(|l| l == href) {
            self.links.push(href.to_string());
        }
    }

    /// Require a script once
    pub fn require_script(&mut self, src: &str) {
        if !self.scripts.iter().any(|s| s == src) {
            self.scripts.push(src.to_string());
        }
    }

    /// Head meta entries as tags, `title` excluded
    pub fn meta_tags(&self) -> Vec<MetaTag> {
        self.meta
            .iter()
            .filter(|(key, _)| key.as_str() != "title")
            .filter_map(|(key, value)| {
                let content = meta_content(value)?;
                let attr = if key.starts_with("og:") {
                    "property"
                } else {
                    "name"
                };
                Some(MetaTag {
                    attr,
                    key: key.clone(),
                    content: html_escape(&content),
                })
            })
            .collect()
    }

    /// Page title: the explicit title, else the `title` head entry
    pub fn page_title(&self) -> Option<String> {
        self.title
            .clone()
            .or_else(|| self.meta.get("title").and_then(meta_content))
    }

    /// Render the full page with the `layout` template
    pub fn render(
        &self,
        templates: &Templates,
        layout: &str,
        html_main: &str,
        site: &FlatContext,
    ) -> Result<String> {
        let mut context = crate::templates::tera_context(site);
        context.insert("title", &html_escape(&self.page_title().unwrap_or_default()));
        context.insert("meta", &self.meta_tags());
        context.insert("links", &self.links);
        context.insert("scripts", &self.scripts);
        if !self.jscontext.is_empty() {
            // a `</script>` inside a string must not close the element
            let json = serde_json::to_string(&self.jscontext)?.replace("</", "<\\/");
            context.insert("jscontext", &json);
        }
        context.insert("html_main", html_main);
        templates.render_layout(layout, &context)
    }
}

/// Text of a meta value: lists are comma joined, empty values are skipped
fn meta_content(value: &Value) -> Option<String> {
    let content = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(meta_content)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map.get("name").and_then(meta_content)?,
        other => other.to_string(),
    };
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Escape text for element content and quoted attributes
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use serde_json::json;

    #[test]
    fn test_meta_tags() {
        let mut doc = HtmlDocument::new();
        doc.meta.insert("title".into(), json!("Hello"));
        doc.meta.insert("robots".into(), json!(["noindex", "nofollow"]));
        doc.meta.insert("og:image".into(), json!("https://x.com/a.png"));
        doc.meta.insert("og:modified_time".into(), Value::Null);
        doc.meta
            .insert("author".into(), json!([{"name": "Jane", "slug": "jane"}]));

        assert_eq!(doc.page_title().as_deref(), Some("Hello"));
        let tags = doc.meta_tags();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].content, "noindex, nofollow");
        assert_eq!(tags[1].attr, "property");
        assert_eq!(tags[2].content, "Jane");
    }

    #[test]
    fn test_links_and_scripts_are_unique() {
        let mut doc = HtmlDocument::new();
        doc.add_link("/media/site.css");
        doc.add_link("/media/site.css");
        doc.require_script("app");
        doc.require_script("app");
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.scripts.len(), 1);
    }

    #[test]
    fn test_render_page() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(&SiteConfig::default(), dir.path()).unwrap();
        let mut doc = HtmlDocument::new();
        doc.meta.insert("title".into(), json!("Hello"));
        doc.meta.insert("description".into(), json!("A \"quoted\" page"));
        doc.add_link("/media/site.css");
        doc.jscontext.insert("page".into(), json!({"name": "index"}));

        let html = doc
            .render(&templates, "home.html", "<h1>Hi</h1>", &FlatContext::new())
            .unwrap();
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.contains(r#"<meta name="description" content="A &quot;quoted&quot; page">"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="/media/site.css">"#));
        assert!(html.contains(r#"var lux = {"page":{"name":"index"}};"#));
        assert!(html.contains("<h1>Hi</h1>"));
    }

    #[test]
    fn test_render_escapes_title_and_jscontext() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(&SiteConfig::default(), dir.path()).unwrap();
        let mut doc = HtmlDocument::new();
        doc.meta.insert("title".into(), json!("Tom & <Jerry>"));
        doc.jscontext
            .insert("page".into(), json!({"title": "</script><script>alert(1)"}));

        let html = doc
            .render(&templates, "home.html", "", &FlatContext::new())
            .unwrap();
        assert!(html.contains("<title>Tom &amp; &lt;Jerry&gt;</title>"));
        assert!(!html.contains("</script><script>alert(1)"));
        assert!(html.contains(r#"{"page":{"title":"<\/script><script>alert(1)"}}"#));
    }
}
