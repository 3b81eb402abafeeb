//! Redirect stubs from `redirects.json`

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::content::{ContentError, Result};
use crate::templates::{FlatContext, Templates};

/// Page sending the browser to `$target`
const REDIRECT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset='utf-8'>
<script type="text/javascript">
window.location = location.origin + "$target";
</script>
<head>
"#;

/// Output file of a redirect origin, `None` when the origin would leave
/// `location`
fn redirect_file(location: &Path, origin: &str) -> Option<PathBuf> {
    if origin.split(['/', '\\']).any(|part| part == "..") {
        return None;
    }
    let mut origin = origin.trim_start_matches('/').to_string();
    if origin.is_empty() || origin.ends_with('/') {
        origin.push_str("index");
    }
    if !origin.ends_with(".html") {
        origin.push_str(".html");
    }
    Some(location.join(origin))
}

/// Write a stub for every entry of `file` into `location`.
///
/// A missing file is not an error; origins outside `location` are logged
/// and left out. Returns the number of stubs written.
pub fn copy_redirects(file: &Path, location: &Path, templates: &Templates) -> Result<usize> {
    if !file.is_file() {
        return Ok(0);
    }
    let redirects: IndexMap<String, String> = serde_json::from_str(&fs::read_to_string(file)?)?;
    let engine = templates.engine(Some("string"))?;

    let mut written = 0;
    for (origin, target) in &redirects {
        let Some(dst) = redirect_file(location, origin) else {
            tracing::warn!("Ignoring redirect {}: outside the static location", origin);
            continue;
        };
        let mut context = FlatContext::new();
        context.insert("target".to_string(), target.clone());
        let html = engine.render_str(REDIRECT_TEMPLATE, &context)?;

        let parent = dst
            .parent()
            .ok_or_else(|| ContentError::build(format!("invalid redirect '{}'", origin)))?;
        fs::create_dir_all(parent)?;
        tracing::info!("Redirect {} into {}", origin, dst.display());
        fs::write(&dst, html)?;
        written += 1;
    }
    Ok(written)
}
