//! Site configuration (_config.yml)

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub app_name: String,
    pub site_url: String,
    pub media_url: String,
    pub date_format: String,

    // Directory
    pub source_dir: String,
    pub static_location: String,
    pub static_api: String,
    #[serde(default)]
    pub static_specials: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,

    // Templates
    pub static_template: String,
    #[serde(default)]
    pub template_dirs: Vec<String>,
    pub template_engine: String,

    // Writing
    #[serde(default)]
    pub md_extensions: Vec<String>,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub links: IndexMap<String, LinkTarget>,
    #[serde(default)]
    pub mandatory_fields: Vec<String>,
    pub permalink: Option<String>,

    // Html document
    pub html5_navigation: bool,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            app_name: "lux".to_string(),
            site_url: String::new(),
            media_url: "/media/".to_string(),
            date_format: "%b %d, %Y".to_string(),

            source_dir: "content".to_string(),
            static_location: "build".to_string(),
            static_api: "api".to_string(),
            static_specials: vec!["404".to_string()],
            exclude: Vec::new(),

            static_template: "home.html".to_string(),
            template_dirs: vec!["templates".to_string()],
            template_engine: "tera".to_string(),

            md_extensions: vec!["extra".to_string(), "meta".to_string()],
            highlight: HighlightConfig::default(),
            links: IndexMap::new(),
            mandatory_fields: Vec::new(),
            permalink: None,

            html5_navigation: false,

            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// API prefix without leading or trailing slashes
    pub fn api_prefix(&self) -> &str {
        self.static_api.trim_matches('/')
    }

    /// Site URL without the trailing slash
    pub fn base_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// Flat string context exposed to metadata and template scripts.
    ///
    /// Scalar `extra` entries are included under their own key, nested
    /// values are ignored.
    pub fn context(&self) -> IndexMap<String, String> {
        let mut ctx = IndexMap::new();
        ctx.insert("app_name".to_string(), self.app_name.clone());
        ctx.insert("site_url".to_string(), self.base_url().to_string());
        ctx.insert("media_url".to_string(), self.media_url.clone());
        let mut extra: Vec<_> = self.extra.iter().collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in extra {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            ctx.insert(key.clone(), value);
        }
        ctx
    }

    /// Markdown reference link definitions built from `links`
    pub fn markdown_links(&self) -> String {
        self.links
            .iter()
            .map(|(name, target)| {
                let (href, title) = match target {
                    LinkTarget::Href(href) => (href.as_str(), None),
                    LinkTarget::Full { href, title } => (href.as_str(), title.as_deref()),
                };
                format!("[{}]: {} \"{}\"", name, href, title.unwrap_or(name))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A named link made available to every markdown document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LinkTarget {
    Href(String),
    Full { href: String, title: Option<String> },
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub line_number: bool,
    pub theme: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            line_number: false,
            theme: "base16-ocean.dark".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.static_location, "build");
        assert_eq!(config.api_prefix(), "api");
        assert_eq!(config.template_engine, "tera");
        assert_eq!(config.static_specials, vec!["404"]);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
app_name: Blog
site_url: https://example.com/
static_api: /json/
html5_navigation: true
github: quantmind
links:
  lux: https://github.com/quantmind/lux
  pulsar:
    href: https://github.com/quantmind/pulsar
    title: Pulsar
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.app_name, "Blog");
        assert_eq!(config.base_url(), "https://example.com");
        assert_eq!(config.api_prefix(), "json");
        assert!(config.html5_navigation);

        let ctx = config.context();
        assert_eq!(ctx["site_url"], "https://example.com");
        assert_eq!(ctx["github"], "quantmind");

        let links = config.markdown_links();
        assert!(links.contains("[lux]: https://github.com/quantmind/lux \"lux\""));
        assert!(links.contains("[pulsar]: https://github.com/quantmind/pulsar \"Pulsar\""));
    }
}
