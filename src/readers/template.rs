//! Template reader
//!
//! A `.tera` source is a generator: it is rendered with the site context and
//! its output becomes the content. Only files defining a `template` block
//! produce output, other files (partials, macros) are skipped.

use lazy_static::lazy_static;
use regex::Regex;

use super::{guess_content_type, Parsed, ReadContext, Reader};
use crate::content::{is_html, Body, ContentError, Result};
use crate::templates::tera_context;

lazy_static! {
    static ref TEMPLATE_BLOCK: Regex = Regex::new(r"\{%-?\s*block\s+template\s*-?%\}").unwrap();
}

pub struct TemplateReader;

impl Reader for TemplateReader {
    fn name(&self) -> &'static str {
        "TemplateReader"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["tera"]
    }

    fn read(&self, src: &[u8], path: &str, _ext: &str, ctx: &ReadContext) -> Result<Parsed> {
        let text = std::str::from_utf8(src)
            .map_err(|_| ContentError::build(format!("'{}' is not valid UTF-8", path)))?;
        if !TEMPLATE_BLOCK.is_match(text) {
            return Err(ContentError::skip(format!("{} has no template block", path)));
        }

        let mut tera = ctx.templates.tera().clone();
        let body = tera.render_str(text, &tera_context(ctx.site))?;

        let content_type = guess_content_type(path).unwrap_or_else(|| "text/plain".to_string());
        let path = match path.strip_suffix(".html") {
            Some(stripped) if is_html(&content_type) => stripped,
            _ => path,
        };

        Ok(Parsed::new(
            Body::Text(body),
            vec![("content_type".to_string(), content_type.into())],
            path,
        ))
    }
}
