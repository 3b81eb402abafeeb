//! File readers
//!
//! A [`Reader`] turns the raw bytes of a source file into a body plus raw
//! metadata. The [`ReaderRegistry`] picks the reader for a file by its
//! extension, falling back to the [`StaticReader`] which copies the file
//! through unchanged.

mod markdown;
mod rst;
mod template;

pub use markdown::MarkdownReader;
pub use rst::RstReader;
pub use template::TemplateReader;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::SiteConfig;
use crate::content::metadata::{self, RawMetadata};
use crate::content::{content_type_for_suffix, is_html, Body, Content, ContentError, Result};
use crate::templates::{FlatContext, Templates};

/// Output of a reader, before metadata processing
#[derive(Debug, Clone)]
pub struct Parsed {
    pub body: Body,
    pub metadata: RawMetadata,
    /// Content path, possibly adjusted by the reader
    pub path: String,
}

impl Parsed {
    pub fn new(body: Body, metadata: RawMetadata, path: impl Into<String>) -> Self {
        Self {
            body,
            metadata,
            path: path.into(),
        }
    }
}

/// What readers may use while reading
pub struct ReadContext<'a> {
    pub templates: &'a Templates,
    /// Site context for rendering templates and metadata
    pub site: &'a FlatContext,
}

/// A strategy for reading one family of source files
pub trait Reader: Send + Sync {
    /// Name used in log and error messages
    fn name(&self) -> &'static str;

    /// Extensions, without the leading dot, handled by this reader
    fn file_extensions(&self) -> &[&'static str];

    /// False when the reader cannot work in this build
    fn enabled(&self) -> bool {
        true
    }

    /// Parse `src`. `path` is the content path, the file path relative to
    /// the source directory without `ext`.
    fn read(&self, src: &[u8], path: &str, ext: &str, ctx: &ReadContext) -> Result<Parsed>;
}

/// Maps file extensions to readers
#[derive(Clone)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn Reader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistry {
    /// Registry with the static reader only
    pub fn new() -> Self {
        let mut registry = Self {
            readers: HashMap::new(),
        };
        registry.register(Arc::new(StaticReader));
        registry
    }

    /// Registry with every built-in reader
    pub fn with_defaults(config: &SiteConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkdownReader::new(config)));
        registry.register(Arc::new(RstReader));
        registry.register(Arc::new(TemplateReader));
        registry
    }

    /// Register `reader` for its extensions, replacing previous owners
    pub fn register(&mut self, reader: Arc<dyn Reader>) {
        for ext in reader.file_extensions() {
            self.readers.insert(ext.to_string(), reader.clone());
        }
    }

    /// Reader for `filename`
    pub fn lookup(&self, filename: &str) -> Result<Arc<dyn Reader>> {
        let ext = extension(filename);
        let reader = self
            .readers
            .get(ext)
            .or_else(|| self.readers.get(""))
            .cloned()
            .ok_or_else(|| ContentError::build(format!("no reader for '{}'", filename)))?;
        if !reader.enabled() {
            return Err(ContentError::MissingDependency(reader.name().to_string()));
        }
        Ok(reader)
    }

    /// Read `file` as the content at `path` and process its metadata
    pub fn read_file(
        &self,
        file: &Path,
        path: &str,
        overrides: RawMetadata,
        ctx: &ReadContext,
    ) -> Result<Content> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = self.lookup(&filename)?;
        let src = fs::read(file)?;
        let parsed = reader.read(&src, path, extension(&filename), ctx)?;
        tracing::debug!("Read '{}' with {}", path, reader.name());
        post_process(parsed, overrides, ctx, Some(file))
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

/// Text after the final dot, empty when there is none
pub fn extension(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Content type of a file name: known text types first, then the MIME table
pub fn guess_content_type(filename: &str) -> Option<String> {
    if let Some(ct) = content_type_for_suffix(extension(filename)) {
        return Some(ct.to_string());
    }
    mime_guess::from_path(filename)
        .first_raw()
        .map(str::to_string)
}

/// Build the content for a reader output.
///
/// Defaults come first, then `overrides`, then the reader metadata.
pub fn post_process(
    parsed: Parsed,
    overrides: RawMetadata,
    ctx: &ReadContext,
    src: Option<&Path>,
) -> Result<Content> {
    let resolved = metadata::resolve(parsed.metadata, overrides, &parsed.path)?;
    Content::new(
        ctx.templates,
        ctx.site,
        parsed.body,
        resolved,
        &parsed.path,
        src,
    )
}

/// Fallback reader for static files
pub struct StaticReader;

impl Reader for StaticReader {
    fn name(&self) -> &'static str {
        "StaticReader"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &[""]
    }

    fn read(&self, src: &[u8], path: &str, ext: &str, _ctx: &ReadContext) -> Result<Parsed> {
        let filename = if ext.is_empty() {
            path.to_string()
        } else {
            format!("{}.{}", path, ext)
        };
        let content_type = guess_content_type(&filename);

        let (body, content_type, path) = match content_type {
            Some(ct) if is_html(&ct) => {
                let text = String::from_utf8(src.to_vec()).map_err(|_| {
                    ContentError::build(format!("'{}' is not valid UTF-8", filename))
                })?;
                (Body::Text(text), ct, path.to_string())
            }
            other => (
                Body::Binary(src.to_vec()),
                other.unwrap_or_else(|| "application/octet-stream".to_string()),
                filename,
            ),
        };

        Ok(Parsed::new(
            body,
            vec![("content_type".to_string(), content_type.into())],
            path,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn fixture() -> (tempfile::TempDir, Templates, FlatContext) {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(&SiteConfig::default(), dir.path()).unwrap();
        let site = SiteConfig::default().context();
        (dir, templates, site)
    }

    struct DisabledReader;

    impl Reader for DisabledReader {
        fn name(&self) -> &'static str {
            "DisabledReader"
        }

        fn file_extensions(&self) -> &[&'static str] {
            &["adoc"]
        }

        fn enabled(&self) -> bool {
            false
        }

        fn read(&self, _: &[u8], _: &str, _: &str, _: &ReadContext) -> Result<Parsed> {
            unreachable!()
        }
    }

    #[test]
    fn test_extensions_resolve_to_their_reader() {
        let registry = ReaderRegistry::with_defaults(&SiteConfig::default());
        for (file, name) in [
            ("a.md", "MarkdownReader"),
            ("a.markdown", "MarkdownReader"),
            ("a.mkd", "MarkdownReader"),
            ("a.mdown", "MarkdownReader"),
            ("a.rst", "RstReader"),
            ("feed.xml.tera", "TemplateReader"),
            ("logo.png", "StaticReader"),
            ("README", "StaticReader"),
        ] {
            assert_eq!(registry.lookup(file).unwrap().name(), name, "{}", file);
        }

        let registry = ReaderRegistry::new();
        assert_eq!(registry.extensions(), vec![""]);
        assert_eq!(registry.lookup("a.md").unwrap().name(), "StaticReader");
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ReaderRegistry::with_defaults(&SiteConfig::default());
        registry.register(Arc::new(RstReader));
        assert_eq!(registry.lookup("a.rst").unwrap().name(), "RstReader");
        registry.register(Arc::new(DisabledReader));
        let err = registry.lookup("doc.adoc").err().unwrap();
        assert!(matches!(err, ContentError::MissingDependency(_)));
        assert_eq!(err.to_string(), "missing dependencies for DisabledReader");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_static_reader() {
        let (_dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };

        let parsed = StaticReader.read(b"<p>hi</p>", "about", "html", &ctx).unwrap();
        assert_eq!(parsed.path, "about");
        assert_eq!(parsed.body, Body::Text("<p>hi</p>".into()));

        let parsed = StaticReader.read(b"a{}", "media/site", "css", &ctx).unwrap();
        assert_eq!(parsed.path, "media/site.css");
        assert_eq!(parsed.body, Body::Binary(b"a{}".to_vec()));
        assert_eq!(parsed.metadata[0].1, serde_yaml::Value::from("text/css"));

        let parsed = StaticReader.read(&[0, 1], "blob", "", &ctx).unwrap();
        assert_eq!(
            parsed.metadata[0].1,
            serde_yaml::Value::from("application/octet-stream")
        );
    }

    #[test]
    fn test_read_file() {
        let (dir, templates, site) = fixture();
        let ctx = ReadContext {
            templates: &templates,
            site: &site,
        };
        let file = dir.path().join("logo.png");
        fs::write(&file, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let registry = ReaderRegistry::with_defaults(&SiteConfig::default());
        let content = registry
            .read_file(&file, "logo", vec![("order".into(), 3.into())], &ctx)
            .unwrap();
        assert_eq!(content.path(), "logo.png");
        assert_eq!(content.content_type(), "image/png");
        assert_eq!(content.get("order").and_then(|v| v.as_int()), Some(3));
        assert_eq!(content.src(), Some(file.as_path()));
    }
}
