//! Content module - metadata processing and the content model

mod error;
pub mod frontmatter;
mod markdown;
pub mod metadata;
mod model;
mod request;

pub use error::{ContentError, Result};
pub use markdown::{html_escape, MarkdownRenderer};
pub use metadata::{MetaValue, RawMetadata, ResolvedMetadata, UrlWrapper, WrapperKind};
pub use model::{content_type_for_suffix, is_html, suffix_for, Body, Content};
pub use request::RequestContext;
