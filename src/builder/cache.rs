//! In-memory content cache
//!
//! Contents are kept for the lifetime of a builder and re-read only when
//! the modification stamp of their source changes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::content::Content;

/// Modification stamp of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    modified: SystemTime,
    len: u64,
}

impl Stamp {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            modified: metadata.modified()?,
            len: metadata.len(),
        })
    }
}

struct CacheEntry {
    stamp: Stamp,
    content: Arc<Content>,
}

/// Contents by source path
#[derive(Default)]
pub struct ContentCache {
    entries: HashMap<String, CacheEntry>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached content for `source`, if its stamp is unchanged
    pub fn get(&self, source: &str, stamp: Stamp) -> Option<Arc<Content>> {
        self.entries
            .get(source)
            .filter(|entry| entry.stamp == stamp)
            .map(|entry| entry.content.clone())
    }

    pub fn insert(&mut self, source: &str, stamp: Stamp, content: Arc<Content>) {
        self.entries
            .insert(source.to_string(), CacheEntry { stamp, content });
    }

    /// Drop entries whose source is not in `sources`
    pub fn retain<'a>(&mut self, sources: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = sources.into_iter().collect();
        self.entries.retain(|source, _| keep.contains(source.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_changes_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "one").unwrap();
        let first = Stamp::of(&file).unwrap();
        assert_eq!(first, Stamp::of(&file).unwrap());

        fs::write(&file, "two, longer").unwrap();
        assert_ne!(first, Stamp::of(&file).unwrap());

        assert!(Stamp::of(&dir.path().join("missing")).is_err());
    }
}
