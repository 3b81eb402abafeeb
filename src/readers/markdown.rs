//! Markdown reader

use super::{Parsed, ReadContext, Reader};
use crate::config::SiteConfig;
use crate::content::{frontmatter, Body, ContentError, MarkdownRenderer, Result};

/// Reads Markdown files with a front-matter block
pub struct MarkdownReader {
    renderer: MarkdownRenderer,
    links: String,
}

impl MarkdownReader {
    pub fn new(config: &SiteConfig) -> Self {
        let mut extensions = config.md_extensions.clone();
        if !extensions.iter().any(|e| e == "meta") {
            extensions.push("meta".to_string());
        }
        Self {
            renderer: MarkdownRenderer::with_options(&extensions, &config.highlight),
            links: config.markdown_links(),
        }
    }
}

impl Reader for MarkdownReader {
    fn name(&self) -> &'static str {
        "MarkdownReader"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["md", "markdown", "mkd", "mdown"]
    }

    fn read(&self, src: &[u8], path: &str, _ext: &str, _ctx: &ReadContext) -> Result<Parsed> {
        let text = std::str::from_utf8(src)
            .map_err(|_| ContentError::build(format!("'{}' is not valid UTF-8", path)))?;
        let (mut metadata, body) = frontmatter::parse(text);

        let source = if self.links.is_empty() {
            body.to_string()
        } else {
            format!("{}\n\n{}", body, self.links)
        };
        let html = self.renderer.render(&source);

        metadata.push(("content_type".to_string(), "text/html".into()));
        Ok(Parsed::new(Body::Text(html), metadata, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkTarget;
    use crate::readers::tests::fixture;
    use crate::readers::post_process;
    use crate::content::RequestContext;

    #[test]
    fn test_read_markdown() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let reader = MarkdownReader::new(&SiteConfig::default());
        let src = b"title: Hello\ndate: 2020-01-01\n\n# Hi\n";
        let parsed = reader.read(src, "blog/hello", "md", &ctx).unwrap();
        assert_eq!(parsed.path, "blog/hello");
        assert!(parsed.body.as_text().unwrap().contains("<h1>Hi</h1>"));

        let content = post_process(parsed, Vec::new(), &ctx, None).unwrap();
        assert!(content.is_html());
        let data = content
            .json(&RequestContext::new("https://example.com"))
            .unwrap()
            .unwrap();
        assert_eq!(data["head"]["title"], "Hello");
        assert!(data["html"]["main"].as_str().unwrap().contains("<h1>Hi</h1>"));
        assert_eq!(data["date"], "2020-01-01T00:00:00");
    }

    #[test]
    fn test_yaml_front_matter() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let reader = MarkdownReader::new(&SiteConfig::default());
        let src = b"---\ntitle: Draft\npriority: 0\nkeywords: [a, b]\n---\n\nText\n";
        let parsed = reader.read(src, "draft", "md", &ctx).unwrap();
        let content = post_process(parsed, Vec::new(), &ctx, None).unwrap();
        assert!(content.is_draft());
        assert_eq!(content.title(), Some("Draft"));
        assert!(content.get("keywords").is_some());
    }

    #[test]
    fn test_config_links() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let mut config = SiteConfig::default();
        config.links.insert(
            "rust".to_string(),
            LinkTarget::Href("https://www.rust-lang.org".to_string()),
        );
        let reader = MarkdownReader::new(&config);
        let parsed = reader.read(b"Written in [rust].\n", "p", "md", &ctx).unwrap();
        let html = parsed.body.as_text().unwrap();
        assert!(html.contains(r#"<a href="https://www.rust-lang.org" title="rust">rust</a>"#));
    }

    #[test]
    fn test_invalid_utf8() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let reader = MarkdownReader::new(&SiteConfig::default());
        let err = reader.read(&[0xff, 0xfe], "bad", "md", &ctx).unwrap_err();
        assert!(matches!(err, ContentError::Build(_)));
    }
}
