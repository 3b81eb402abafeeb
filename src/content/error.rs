//! Errors raised while reading and rendering contents

/// Outcome of a content operation that did not produce a result.
///
/// `Skip` is not a failure: the file is intentionally left out of the
/// output. `Unsupported` is raised when an HTML-only operation is asked of
/// non-HTML content.
#[derive(thiserror::Error, Debug)]
pub enum ContentError {
    #[error("skipped: {0}")]
    Skip(String),

    #[error("build error: {0}")]
    Build(String),

    #[error("missing dependencies for {0}")]
    MissingDependency(String),

    #[error("unsupported media type {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContentError {
    /// Create a build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a skip signal
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }

    /// HTTP status equivalent of this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Skip(_) => 404,
            Self::Unsupported(_) => 415,
            _ => 500,
        }
    }
}

pub type Result<T, E = ContentError> = std::result::Result<T, E>;
