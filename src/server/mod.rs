//! Development server
//!
//! In live mode every request is answered from the sources through a shared
//! [`Builder`], so edits show up on the next reload. In static mode the
//! files of the static location are served as they are.

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    Json, Router,
};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::builder::Builder;
use crate::content::{Body as ContentBody, ContentError};
use crate::Lux;

/// Live server state
struct LiveState {
    builder: Mutex<Builder>,
}

/// Static server state
struct StaticState {
    location: PathBuf,
    /// Whether `404.html` exists in the static location
    has_404: bool,
}

/// Start the server
pub async fn start(lux: &Lux, ip: &str, port: u16, static_mode: bool) -> Result<()> {
    let app = if static_mode {
        let location = lux.output_dir.clone();
        let has_404 = location.join("404.html").is_file();
        if !has_404 {
            tracing::debug!("No 404.html in {:?}", location);
        }
        Router::new()
            .fallback(static_handler)
            .with_state(Arc::new(StaticState { location, has_404 }))
            .layer(TraceLayer::new_for_http())
    } else {
        let builder = Builder::new(lux.config.clone(), &lux.base_dir)?;
        Router::new()
            .fallback(live_handler)
            .with_state(Arc::new(LiveState {
                builder: Mutex::new(builder),
            }))
            .layer(TraceLayer::new_for_http())
    };

    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if static_mode {
        println!("Serving files from {:?}", lux.output_dir);
    }
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Answer a request from the sources
async fn live_handler(State(state): State<Arc<LiveState>>, request: Request<Body>) -> Response {
    let path = percent_decode_str(request.uri().path())
        .decode_utf8_lossy()
        .into_owned();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let mut builder = state.builder.lock().unwrap_or_else(|e| e.into_inner());
    live_response(&mut builder, &path, host.as_deref())
}

fn live_response(builder: &mut Builder, path: &str, host: Option<&str>) -> Response {
    let mut request = builder.request();
    if request.base_url.is_empty() {
        if let Some(host) = host {
            request.base_url = format!("http://{}", host);
        }
    }

    let api = format!("/{}/", builder.config().api_prefix());
    if let Some(rest) = path.strip_prefix(&api) {
        let Some(rest) = rest.strip_suffix(".json") else {
            return not_found(builder);
        };
        return match builder.content_for_url(rest) {
            Ok(Some(content)) => match content.json(&request) {
                Ok(Some(data)) => Json(data).into_response(),
                Ok(None) => error_response(ContentError::Unsupported(
                    content.content_type().to_string(),
                )),
                Err(e) => error_response(e),
            },
            Ok(None) => not_found(builder),
            Err(e) => error_response(e),
        };
    }

    match builder.content_for_url(path) {
        Ok(Some(content)) if content.is_html() => match builder.page(&content, &request) {
            Ok(page) => Html(page).into_response(),
            Err(e) => error_response(e),
        },
        Ok(Some(content)) => match content.render(Some(builder.site_context())) {
            Ok(body) => {
                let bytes = match body {
                    ContentBody::Text(text) => text.into_bytes(),
                    ContentBody::Binary(bytes) => bytes,
                };
                (
                    [(header::CONTENT_TYPE, content.content_type().to_string())],
                    bytes,
                )
                    .into_response()
            }
            Err(e) => error_response(e),
        },
        Ok(None) => not_found(builder),
        Err(e) => error_response(e),
    }
}

/// The `404` page when the site has one, plain text otherwise
fn not_found(builder: &mut Builder) -> Response {
    let request = builder.request();
    let page = builder
        .content_for_url("404")
        .ok()
        .flatten()
        .and_then(|content| builder.page(&content, &request).ok());
    match page {
        Some(page) => (StatusCode::NOT_FOUND, Html(page)).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn error_response(error: ContentError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!("{}", error);
    }
    (status, error.to_string()).into_response()
}

/// Serve files from the static location
async fn static_handler(State(state): State<Arc<StaticState>>, request: Request<Body>) -> Response {
    let path = percent_decode_str(request.uri().path())
        .decode_utf8_lossy()
        .into_owned();

    if resolve_file(&state.location, &path).is_some() {
        let mut service = ServeDir::new(&state.location).append_index_html_on_directories(true);
        let request = if needs_html_suffix(&state.location, &path) {
            let (mut parts, body) = request.into_parts();
            match format!("{}.html", parts.uri.path()).parse() {
                Ok(uri) => parts.uri = uri,
                Err(_) => return (StatusCode::BAD_REQUEST, "Bad request").into_response(),
            }
            Request::from_parts(parts, body)
        } else {
            request
        };
        return match service.try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        };
    }

    if state.has_404 {
        if let Ok(page) = tokio::fs::read_to_string(state.location.join("404.html")).await {
            return (StatusCode::NOT_FOUND, Html(page)).into_response();
        }
    }
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// File answering `path`: the file itself, the directory index or the
/// `.html` page
fn resolve_file(location: &Path, path: &str) -> Option<PathBuf> {
    let clean = path.trim_start_matches('/');
    if clean.split('/').any(|part| part == "..") {
        return None;
    }
    let candidate = location.join(clean);
    if candidate.is_dir() {
        let index = candidate.join("index.html");
        return index.is_file().then_some(index);
    }
    if candidate.is_file() {
        return Some(candidate);
    }
    let page = location.join(format!("{}.html", clean));
    page.is_file().then_some(page)
}

/// Whether `path` names a page stored with the `.html` suffix
fn needs_html_suffix(location: &Path, path: &str) -> bool {
    let clean = path.trim_start_matches('/');
    !clean.is_empty()
        && !location.join(clean).exists()
        && location.join(format!("{}.html", clean)).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;

    fn site(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        dir
    }

    #[test]
    fn test_resolve_file() {
        let dir = site(&[
            ("index.html", "home"),
            ("blog/hello.html", "hello"),
            ("docs/index.html", "docs"),
            ("media/site.css", "a{}"),
        ]);
        let root = dir.path();
        assert_eq!(resolve_file(root, "/"), Some(root.join("index.html")));
        assert_eq!(
            resolve_file(root, "/blog/hello"),
            Some(root.join("blog/hello.html"))
        );
        assert_eq!(resolve_file(root, "/docs/"), Some(root.join("docs/index.html")));
        assert_eq!(
            resolve_file(root, "/media/site.css"),
            Some(root.join("media/site.css"))
        );
        assert_eq!(resolve_file(root, "/missing"), None);
        assert_eq!(resolve_file(root, "/../etc/passwd"), None);

        assert!(needs_html_suffix(root, "/blog/hello"));
        assert!(!needs_html_suffix(root, "/media/site.css"));
        assert!(!needs_html_suffix(root, "/"));
    }

    #[test]
    fn test_live_responses() {
        let dir = site(&[
            ("content/index.md", "title: Home\n\n# Home\n"),
            ("content/media/site.css", "a{}"),
            ("content/macros.tera", "{% macro x() %}{% endmacro %}"),
        ]);
        let mut builder = Builder::new(SiteConfig::default(), dir.path()).unwrap();

        let response = live_response(&mut builder, "/", Some("localhost:4000"));
        assert_eq!(response.status(), StatusCode::OK);

        let response = live_response(&mut builder, "/api/index.json", Some("localhost:4000"));
        assert_eq!(response.status(), StatusCode::OK);

        let response = live_response(&mut builder, "/media/site.css", None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

        // JSON is only available for HTML contents
        let response = live_response(&mut builder, "/api/media/site.css.json", None);
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = live_response(&mut builder, "/macros", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = live_response(&mut builder, "/missing", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
