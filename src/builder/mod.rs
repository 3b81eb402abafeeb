//! Static site builder
//!
//! Walks the source directory, reads every file with the reader registered
//! for its extension and writes the HTML pages, the JSON API mirror and the
//! raw assets into the static location.

mod buildinfo;
mod cache;
mod redirects;

pub use buildinfo::BuildInfo;
pub use cache::{ContentCache, Stamp};
pub use redirects::copy_redirects;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{self, Content, ContentError, RequestContext};
use crate::document::HtmlDocument;
use crate::readers::{ReadContext, ReaderRegistry};
use crate::templates::{FlatContext, Templates};

lazy_static! {
    static ref PERMALINK_VAR: Regex = Regex::new(r":([A-Za-z0-9_]+)").unwrap();
}

/// A file found in the source directory
#[derive(Debug, Clone)]
pub struct Source {
    pub file: PathBuf,
    /// Path relative to the source directory, `/` separated
    pub rel: String,
    /// Content path: `rel` without its final extension
    pub path: String,
}

impl Source {
    fn new(file: PathBuf, source_dir: &Path) -> Self {
        let rel = file
            .strip_prefix(source_dir)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        let path = match rel.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !stem.ends_with('/') && !ext.contains('/') => {
                stem.to_string()
            }
            _ => rel.clone(),
        };
        Self { file, rel, path }
    }
}

/// Outcome of a build pass
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Written output files, relative to the static location
    pub built: Vec<String>,
    /// Sources intentionally left out
    pub skipped: Vec<String>,
    /// Sources which failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds the static site and serves contents to the live server
pub struct Builder {
    config: SiteConfig,
    base_dir: PathBuf,
    source_dir: PathBuf,
    output_dir: PathBuf,
    registry: ReaderRegistry,
    templates: Templates,
    buildinfo: BuildInfo,
    site: FlatContext,
    exclude: Vec<glob::Pattern>,
    cache: ContentCache,
    /// URL path to source, refreshed by every scan
    routes: HashMap<String, Source>,
}

impl Builder {
    pub fn new(config: SiteConfig, base_dir: &Path) -> Result<Self> {
        let registry = ReaderRegistry::with_defaults(&config);
        Self::with_registry(config, base_dir, registry)
    }

    pub fn with_registry(
        config: SiteConfig,
        base_dir: &Path,
        registry: ReaderRegistry,
    ) -> Result<Self> {
        let templates = Templates::new(&config, base_dir)?;
        let buildinfo = BuildInfo::new(&config);
        let mut site = config.context();
        site.extend(buildinfo.context());

        let exclude = config
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            source_dir: base_dir.join(&config.source_dir),
            output_dir: base_dir.join(&config.static_location),
            base_dir: base_dir.to_path_buf(),
            config,
            registry,
            templates,
            buildinfo,
            site,
            exclude,
            cache: ContentCache::new(),
            routes: HashMap::new(),
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Site context: configuration values plus the `site_*` build info
    pub fn site_context(&self) -> &FlatContext {
        &self.site
    }

    /// Request context used for static output
    pub fn request(&self) -> RequestContext {
        RequestContext::new(self.config.base_url())
            .with_context(self.site.clone())
            .with_html5_navigation(self.config.html5_navigation)
    }

    /// Source files, `_` and `.` prefixed entries and excluded paths left out
    pub fn sources(&self) -> Vec<Source> {
        if !self.source_dir.is_dir() {
            tracing::warn!("Source directory {:?} does not exist", self.source_dir);
            return Vec::new();
        }
        WalkDir::new(&self.source_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || {
                    let name = e.file_name().to_string_lossy();
                    !name.starts_with('_') && !name.starts_with('.')
                }
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| Source::new(e.into_path(), &self.source_dir))
            .filter(|s| !self.exclude.iter().any(|p| p.matches(&s.rel)))
            .collect()
    }

    /// Content of `source`, from the cache when the file is unchanged
    pub fn load(&mut self, source: &Source) -> content::Result<Arc<Content>> {
        let stamp = Stamp::of(&source.file)?;
        if let Some(content) = self.cache.get(&source.rel, stamp) {
            return Ok(content);
        }

        let ctx = ReadContext {
            templates: &self.templates,
            site: &self.site,
        };
        let content = self
            .registry
            .read_file(&source.file, &source.path, Vec::new(), &ctx)?;

        let missing = content.missing_fields(&self.config.mandatory_fields);
        if !missing.is_empty() {
            return Err(ContentError::build(format!(
                "{} is missing mandatory fields: {}",
                source.rel,
                missing.join(", ")
            )));
        }

        let url = self.permalink(&content)?;
        let content = Arc::new(content.with_url(url));
        self.cache.insert(&source.rel, stamp, content.clone());
        Ok(content)
    }

    /// URL path a content is published at: the `permalink` pattern filled
    /// with the content URL variables, or the content path
    fn permalink(&self, content: &Content) -> content::Result<String> {
        let pattern = match &self.config.permalink {
            Some(pattern) if content.is_html() => pattern,
            _ => return Ok(content.path().to_string()),
        };

        let names: Vec<&str> = PERMALINK_VAR
            .captures_iter(pattern)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();
        let params = content.urlparams(&names)?;
        let url = PERMALINK_VAR.replace_all(pattern, |caps: &regex::Captures| {
            params.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(url.trim_start_matches('/').to_string())
    }

    /// Write the output files of `content`, returning them relative to the
    /// static location
    fn write(&self, content: &Content, request: &RequestContext) -> content::Result<Vec<String>> {
        let url = content.output_path();
        let mut written = Vec::new();

        if content.is_html() {
            let mut doc = HtmlDocument::new();
            doc.jscontext.extend(
                self.buildinfo
                    .context()
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v))),
            );
            let main = content.html(request, &mut doc)?;
            let page = doc.render(&self.templates, &self.config.static_template, &main, &self.site)?;
            written.push(self.write_file(&format!("{}.html", url), page.as_bytes())?);

            if !self.config.static_specials.iter().any(|s| s == content.path()) {
                if let Some(data) = content.json(request)? {
                    let api = format!("{}/{}.json", self.config.api_prefix(), url);
                    let json = serde_json::to_string_pretty(&data)?;
                    written.push(self.write_file(&api, json.as_bytes())?);
                }
            }
        } else {
            let body = content.render(Some(&self.site))?;
            written.push(self.write_file(&url, body.as_bytes())?);
        }
        Ok(written)
    }

    fn write_file(&self, rel: &str, data: &[u8]) -> content::Result<String> {
        let dst = self.output_dir.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dst, data)?;
        tracing::debug!("Wrote {}", rel);
        Ok(rel.to_string())
    }

    /// Read every source and refresh the URL routes.
    ///
    /// Sources which fail to read are logged and left out.
    pub fn scan(&mut self) -> Vec<Arc<Content>> {
        let sources = self.sources();
        self.cache.retain(sources.iter().map(|s| s.rel.as_str()));
        self.routes.clear();

        let mut contents = Vec::new();
        for source in sources {
            match self.load(&source) {
                Ok(content) => {
                    self.routes.insert(content.output_path(), source);
                    contents.push(content);
                }
                Err(e) if e.is_skip() => tracing::debug!("Skipped {}", source.rel),
                Err(e) => tracing::warn!("{}: {}", source.rel, e),
            }
        }
        contents
    }

    /// Build the site into the static location
    pub fn build(&mut self) -> Result<BuildReport> {
        let start = std::time::Instant::now();
        fs::create_dir_all(&self.output_dir)?;

        let request = self.request();
        let mut report = BuildReport::default();
        self.routes.clear();

        let sources = self.sources();
        self.cache.retain(sources.iter().map(|s| s.rel.as_str()));

        for source in sources {
            let result = self.load(&source).and_then(|content| {
                let written = self.write(&content, &request)?;
                Ok((content.output_path(), written))
            });
            match result {
                Ok((url, written)) => {
                    self.routes.insert(url, source);
                    report.built.extend(written);
                }
                Err(e) if e.is_skip() => {
                    tracing::debug!("Skipped {}: {}", source.rel, e);
                    report.skipped.push(source.rel);
                }
                Err(e) => {
                    tracing::warn!("Failed to build {}: {}", source.rel, e);
                    report.failed.push((source.rel, e.to_string()));
                }
            }
        }

        let info = serde_json::to_string_pretty(&self.buildinfo)?;
        fs::write(self.output_dir.join("buildinfo.json"), info)?;

        let redirects = copy_redirects(
            &self.base_dir.join("redirects.json"),
            &self.output_dir,
            &self.templates,
        )?;

        tracing::info!(
            "Built {} files ({} skipped, {} failed, {} redirects) in {:.2}s",
            report.built.len(),
            report.skipped.len(),
            report.failed.len(),
            redirects,
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// Content served at the URL `path`.
    ///
    /// `/` and paths ending with `/` map to `index`. Unknown paths trigger a
    /// rescan of the source directory before giving up.
    pub fn content_for_url(&mut self, path: &str) -> content::Result<Option<Arc<Content>>> {
        let mut key = path.trim_start_matches('/').to_string();
        if key.is_empty() || key.ends_with('/') {
            key.push_str("index");
        }
        let key = key.strip_suffix(".html").unwrap_or(&key).to_string();

        if !self.routes.contains_key(&key) {
            self.scan();
        }
        match self.routes.get(&key).cloned() {
            Some(source) => self.load(&source).map(Some),
            None => Ok(None),
        }
    }

    /// Render the full HTML page of `content` for `request`
    pub fn page(&self, content: &Content, request: &RequestContext) -> content::Result<String> {
        let mut doc = HtmlDocument::new();
        let main = content.html(request, &mut doc)?;
        doc.render(&self.templates, &self.config.static_template, &main, &self.site)
    }
}
