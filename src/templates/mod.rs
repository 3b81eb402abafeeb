//! Template engines and template lookup
//!
//! Contents render their body, and an optional wrapping template, through a
//! named [`TemplateEngine`]. Two engines are available: `tera` (the default,
//! with every file of the template directories loaded so bodies can extend
//! or include them) and `string`, a `$name` substitution used for small
//! generated files such as redirect stubs.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tera::Tera;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{ContentError, Result};

/// Flat context passed to engines
pub type FlatContext = IndexMap<String, String>;

/// Name of the built-in page layout
pub const DEFAULT_LAYOUT: &str = "lux/layout.html";

/// A template engine renders a template string with a flat context
pub trait TemplateEngine: Send + Sync {
    /// Name used in the `template_engine` metadata
    fn name(&self) -> &'static str;

    /// Render `template` substituting values from `context`
    fn render_str(&self, template: &str, context: &FlatContext) -> Result<String>;

    /// Read a template file and render it
    fn render_file(&self, path: &Path, context: &FlatContext) -> Result<String> {
        let template = fs::read_to_string(path)?;
        self.render_str(&template, context)
    }
}

/// Tera engine with the site templates loaded.
///
/// One-off renders borrow the shared instance, so the loaded templates are
/// never copied.
pub struct TeraEngine {
    tera: Mutex<Tera>,
}

impl TeraEngine {
    pub fn new(tera: Tera) -> Self {
        Self {
            tera: Mutex::new(tera),
        }
    }
}

impl TemplateEngine for TeraEngine {
    fn name(&self) -> &'static str {
        "tera"
    }

    fn render_str(&self, template: &str, context: &FlatContext) -> Result<String> {
        // no tag, expression or comment delimiter
        if !template.contains('{') {
            return Ok(template.to_string());
        }
        let mut tera = self.tera.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tera.render_str(template, &tera_context(context))?)
    }
}

/// `$name` / `${name}` substitution; `$$` is a literal dollar and unknown
/// names are left untouched
pub struct StringEngine;

impl TemplateEngine for StringEngine {
    fn name(&self) -> &'static str {
        "string"
    }

    fn render_str(&self, template: &str, context: &FlatContext) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
                continue;
            }

            let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                }
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            };

            match context.get(name) {
                Some(value) if !name.is_empty() => {
                    out.push_str(value);
                    rest = &after[consumed..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Convert a flat context into a Tera context
pub fn tera_context(context: &FlatContext) -> tera::Context {
    let mut ctx = tera::Context::new();
    for (key, value) in context {
        ctx.insert(key.as_str(), value);
    }
    ctx
}

/// Template directories plus the registered engines
pub struct Templates {
    dirs: Vec<PathBuf>,
    tera: Tera,
    engines: HashMap<String, Arc<dyn TemplateEngine>>,
    default_engine: String,
}

impl Templates {
    /// Load the template directories configured for the site
    pub fn new(config: &SiteConfig, base_dir: &Path) -> Result<Self> {
        let dirs: Vec<PathBuf> = config
            .template_dirs
            .iter()
            .map(|d| base_dir.join(d))
            .collect();

        let mut tera = Tera::default();
        // Generated pages embed rendered HTML, nothing is escaped
        tera.autoescape_on(vec![]);
        tera.add_raw_template(DEFAULT_LAYOUT, include_str!("layout.html"))?;

        // Earlier directories take precedence, so they are loaded last
        let mut files = Vec::new();
        for dir in dirs.iter().rev().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let name = entry
                    .path()
                    .strip_prefix(dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                files.push((entry.path().to_path_buf(), Some(name)));
            }
        }
        tracing::debug!("Loaded {} template files", files.len());
        tera.add_template_files(files)?;

        let mut templates = Self {
            dirs,
            tera: tera.clone(),
            engines: HashMap::new(),
            default_engine: config.template_engine.clone(),
        };
        templates.register(Arc::new(TeraEngine::new(tera)));
        templates.register(Arc::new(StringEngine));
        Ok(templates)
    }

    /// Register an engine, replacing any engine with the same name
    pub fn register(&mut self, engine: Arc<dyn TemplateEngine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Engine by name, the configured default when `name` is `None`
    pub fn engine(&self, name: Option<&str>) -> Result<Arc<dyn TemplateEngine>> {
        let name = name.unwrap_or(&self.default_engine);
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| ContentError::build(format!("unknown template engine '{}'", name)))
    }

    /// Full path of a named template, searching the directories in order
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Render the page layout `name`, falling back to the built-in layout
    pub fn render_layout(&self, name: &str, context: &tera::Context) -> Result<String> {
        let name = if self.tera.get_template_names().any(|n| n == name) {
            name
        } else {
            DEFAULT_LAYOUT
        };
        Ok(self.tera.render(name, context)?)
    }

    /// Tera instance with all site templates loaded
    pub fn tera(&self) -> &Tera {
        &self.tera
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> FlatContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_string_engine() {
        let engine = StringEngine;
        let context = ctx(&[("target", "/new"), ("name", "lux")]);
        let out = engine
            .render_str("go to $target, ${name}s cost $$5, keep $missing", &context)
            .unwrap();
        assert_eq!(out, "go to /new, luxs cost $5, keep $missing");
    }

    #[test]
    fn test_tera_engine() {
        let engine = TeraEngine::new(Tera::default());
        let out = engine
            .render_str("<h1>{{ title }}</h1>", &ctx(&[("title", "Hello")]))
            .unwrap();
        assert_eq!(out, "<h1>Hello</h1>");
    }

    #[test]
    fn test_tera_engine_repeated_renders() {
        let mut tera = Tera::default();
        tera.add_raw_template("greet.html", "hi {{ name }}").unwrap();
        let engine = TeraEngine::new(tera);

        for name in ["a", "b", "c"] {
            let out = engine
                .render_str("{% include \"greet.html\" %}!", &ctx(&[("name", name)]))
                .unwrap();
            assert_eq!(out, format!("hi {}!", name));
        }
        assert_eq!(engine.render_str("plain $text", &ctx(&[])).unwrap(), "plain $text");
        assert!(engine.render_str("{{ unclosed", &ctx(&[])).is_err());
        assert_eq!(engine.render_str("{{ name }}", &ctx(&[("name", "d")])).unwrap(), "d");
    }

    #[test]
    fn test_templates_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("templates");
        let second = dir.path().join("shared");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("page.html"), "first {{ html_main }}").unwrap();
        fs::write(second.join("page.html"), "second").unwrap();
        fs::write(second.join("base.html"), "base").unwrap();

        let config = SiteConfig {
            template_dirs: vec!["templates".to_string(), "shared".to_string()],
            ..Default::default()
        };
        let templates = Templates::new(&config, dir.path()).unwrap();

        assert_eq!(templates.find("page.html"), Some(first.join("page.html")));
        assert_eq!(templates.find("base.html"), Some(second.join("base.html")));
        assert_eq!(templates.find("missing.html"), None);

        let engine = templates.engine(None).unwrap();
        assert_eq!(engine.name(), "tera");
        let out = engine
            .render_file(&first.join("page.html"), &ctx(&[("html_main", "<p>x</p>")]))
            .unwrap();
        assert_eq!(out, "first <p>x</p>");

        // Earlier directories shadow later ones for includes
        let out = engine
            .render_str("{% include \"page.html\" %}", &ctx(&[("html_main", "y")]))
            .unwrap();
        assert_eq!(out, "first y");

        assert!(templates.engine(Some("jinja")).is_err());
        assert_eq!(templates.engine(Some("string")).unwrap().name(), "string");
    }

    #[test]
    fn test_default_layout() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(&SiteConfig::default(), dir.path()).unwrap();
        let mut context = tera::Context::new();
        context.insert("title", "Home");
        context.insert("html_main", "<h1>Hi</h1>");
        let html = templates.render_layout("home.html", &context).unwrap();
        assert!(html.contains("<title>Home</title>"));
        assert!(html.contains("<h1>Hi</h1>"));
    }
}
