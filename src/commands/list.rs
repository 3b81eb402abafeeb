//! List site content

use anyhow::Result;
use std::collections::BTreeMap;

use crate::builder::Builder;
use crate::content::{Content, MetaValue};
use crate::Lux;

/// Print contents, tags or categories
pub fn run(lux: &Lux, kind: &str) -> Result<()> {
    let mut builder = Builder::new(lux.config.clone(), &lux.base_dir)?;
    let mut contents = builder.scan();
    contents.sort_by(|a, b| b.reldate().cmp(&a.reldate()));

    match kind {
        "content" | "contents" | "page" | "pages" => {
            println!("Contents ({}):", contents.len());
            for content in &contents {
                println!(
                    "  {} - {} [{}]{}",
                    content.reldate().format("%Y-%m-%d"),
                    content.title().unwrap_or(content.path()),
                    content.content_type(),
                    if content.is_draft() { " (draft)" } else { "" }
                );
            }
        }
        "tag" | "tags" => print_counts("Tags", &count(&contents, "keywords")),
        "category" | "categories" => print_counts("Categories", &count(&contents, "category")),
        "author" | "authors" => print_counts("Authors", &count(&contents, "author")),
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: content, tag, category, author",
                kind
            );
        }
    }

    Ok(())
}

/// Number of contents per name of a wrapped field
fn count(contents: &[std::sync::Arc<Content>], field: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for content in contents {
        if let Some(MetaValue::List(items)) = content.get(field) {
            for item in items {
                if let MetaValue::Link(link) = item {
                    *counts.entry(link.name.clone()).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("{} ({}):", title, counts.len());
    let mut counts: Vec<_> = counts.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1));
    for (name, count) in counts {
        println!("  {} ({})", name, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_count_tags() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(
            dir.path().join("content/a.md"),
            "title: A\nkeywords: rust, web\n\nA\n",
        )
        .unwrap();
        fs::write(dir.path().join("content/b.md"), "title: B\nkeywords: rust\n\nB\n").unwrap();

        let lux = Lux::new(dir.path()).unwrap();
        let mut builder = Builder::new(lux.config.clone(), &lux.base_dir).unwrap();
        let contents = builder.scan();
        let tags = count(&contents, "keywords");
        assert_eq!(tags["rust"], 2);
        assert_eq!(tags["web"], 1);

        assert!(run(&lux, "tags").is_ok());
        assert!(run(&lux, "bogus").is_err());
    }
}
