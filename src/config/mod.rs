//! Configuration module

mod site;

pub use site::HighlightConfig;
pub use site::LinkTarget;
pub use site::SiteConfig;
