//! Description of the request a content is rendered for

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::templates::FlatContext;

/// Characters escaped in URL paths
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// What a content needs to know about the request it renders for
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Absolute site URL, without trailing slash
    pub base_url: String,
    /// When true, the client navigates with the HTML5 history API and loads
    /// page assets itself
    pub html5_navigation: bool,
    /// Application context merged over the content metadata
    pub context: FlatContext,
}

impl RequestContext {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: FlatContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_html5_navigation(mut self, enabled: bool) -> Self {
        self.html5_navigation = enabled;
        self
    }

    /// Absolute URL for `path`; absolute URLs are returned unchanged
    pub fn absolute_uri(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//") {
            return path.to_string();
        }
        let path = utf8_percent_encode(path.trim_start_matches('/'), PATH).to_string();
        format!("{}/{}", self.base_url, path)
    }

    /// Key identifying the request shape for memoised renders
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.base_url.hash(&mut hasher);
        self.html5_navigation.hash(&mut hasher);
        for (key, value) in &self.context {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_uri() {
        let request = RequestContext::new("https://example.com/");
        assert_eq!(
            request.absolute_uri("/blog/hello world"),
            "https://example.com/blog/hello%20world"
        );
        assert_eq!(request.absolute_uri("index"), "https://example.com/index");
        assert_eq!(
            request.absolute_uri("https://cdn.com/x.png"),
            "https://cdn.com/x.png"
        );
    }

    #[test]
    fn test_cache_key_depends_on_shape() {
        let a = RequestContext::new("https://a.com");
        let b = RequestContext::new("https://b.com");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), RequestContext::new("https://a.com/").cache_key());

        let mut ctx = FlatContext::new();
        ctx.insert("site_year".into(), "2020".into());
        assert_ne!(a.cache_key(), a.clone().with_context(ctx).cache_key());
    }
}
