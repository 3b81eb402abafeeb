//! lux-rs: a static site builder for Markdown, reStructuredText and template
//! contents
//!
//! Source files are read by extension-specific readers into contents with
//! resolved metadata, then written as HTML pages, a JSON API mirror and raw
//! assets. A development server can answer requests straight from the
//! sources.

pub mod builder;
pub mod commands;
pub mod config;
pub mod content;
pub mod document;
pub mod readers;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::Path;

/// Site configuration file, relative to the base directory
pub const CONFIG_FILE: &str = "_config.yml";

/// The main application
#[derive(Debug, Clone)]
pub struct Lux {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: std::path::PathBuf,
    /// Source directory
    pub source_dir: std::path::PathBuf,
    /// Static location (output directory)
    pub output_dir: std::path::PathBuf,
}

impl Lux {
    /// Create a new instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let source_dir = base_dir.join(&config.source_dir);
        let output_dir = base_dir.join(&config.static_location);

        Ok(Self {
            config,
            base_dir,
            source_dir,
            output_dir,
        })
    }

    /// Build the static site
    pub fn build(&self) -> Result<builder::BuildReport> {
        commands::build::run(self)
    }

    /// Remove the static location
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Reader registry with every built-in reader
    pub fn registry(&self) -> readers::ReaderRegistry {
        readers::ReaderRegistry::with_defaults(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let lux = Lux::new(dir.path()).unwrap();
        assert_eq!(lux.source_dir, dir.path().join("content"));
        assert_eq!(lux.output_dir, dir.path().join("build"));
    }

    #[test]
    fn test_new_with_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "app_name: Blog\nsource_dir: src\nstatic_location: out\n",
        )
        .unwrap();
        let lux = Lux::new(dir.path()).unwrap();
        assert_eq!(lux.config.app_name, "Blog");
        assert_eq!(lux.source_dir, dir.path().join("src"));
        assert_eq!(lux.output_dir, dir.path().join("out"));
        assert_eq!(lux.registry().lookup("a.md").unwrap().name(), "MarkdownReader");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "exclude: {a: b}\n").unwrap();
        assert!(Lux::new(dir.path()).is_err());
    }
}
