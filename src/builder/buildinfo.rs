//! Information about the current build

use chrono::{Datelike, Local};
use serde::Serialize;

use crate::config::SiteConfig;
use crate::templates::FlatContext;

/// Written to `buildinfo.json` and exposed to templates as `site_*`
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub date: String,
    pub year: i32,
    pub version: String,
    pub url: String,
    pub media: String,
    pub name: String,
}

impl BuildInfo {
    pub fn new(config: &SiteConfig) -> Self {
        let now = Local::now();
        Self {
            date: now.format(&config.date_format).to_string(),
            year: now.year(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: config.base_url().to_string(),
            media: config.media_url.trim_end_matches('/').to_string(),
            name: config.app_name.clone(),
        }
    }

    /// `site_` prefixed context entries
    pub fn context(&self) -> FlatContext {
        let mut ctx = FlatContext::new();
        ctx.insert("site_date".to_string(), self.date.clone());
        ctx.insert("site_year".to_string(), self.year.to_string());
        ctx.insert("site_version".to_string(), self.version.clone());
        ctx.insert("site_url".to_string(), self.url.clone());
        ctx.insert("site_media".to_string(), self.media.clone());
        ctx.insert("site_name".to_string(), self.name.clone());
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info() {
        let config = SiteConfig {
            site_url: "https://example.com/".to_string(),
            app_name: "Example".to_string(),
            ..Default::default()
        };
        let info = BuildInfo::new(&config);
        assert_eq!(info.url, "https://example.com");
        assert_eq!(info.media, "/media");

        let ctx = info.context();
        assert_eq!(ctx["site_name"], "Example");
        assert_eq!(ctx["site_year"], Local::now().year().to_string());
        assert_eq!(ctx["site_version"], env!("CARGO_PKG_VERSION"));
    }
}
