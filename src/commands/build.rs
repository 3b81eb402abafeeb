//! Build the static site

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use crate::builder::{BuildReport, Builder};
use crate::Lux;

/// Build the site once
pub fn run(lux: &Lux) -> Result<BuildReport> {
    let mut builder = Builder::new(lux.config.clone(), &lux.base_dir)?;
    builder.build()
}

/// What a batch of file changes calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rebuild {
    /// Only sources changed, the builder and its cache are reused
    Sources,
    /// Templates or configuration changed, start over
    Reload,
}

/// Rebuild needed for the changed `paths`, `None` when every path is
/// irrelevant or inside the static location
fn rebuild_for(lux: &Lux, paths: &[PathBuf]) -> Option<Rebuild> {
    let relevant: Vec<&PathBuf> = paths
        .iter()
        .filter(|p| {
            let path_str = p.to_string_lossy();
            !path_str.contains(".git")
                && !path_str.contains(".DS_Store")
                && !path_str.ends_with('~')
                && !is_under(p, &lux.output_dir)
        })
        .collect();

    if relevant.is_empty() {
        None
    } else if relevant.iter().all(|p| is_under(p, &lux.source_dir)) {
        Some(Rebuild::Sources)
    } else {
        Some(Rebuild::Reload)
    }
}

/// Watch the sources and rebuild on changes.
///
/// Changes are batched by the debouncer; a batch arriving while a build runs
/// is handled once the build is over.
pub async fn watch(lux: &Lux) -> Result<()> {
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    debouncer
        .watcher()
        .watch(&lux.source_dir, RecursiveMode::Recursive)?;
    tracing::debug!("Watching: {:?}", lux.source_dir);
    for dir in &lux.config.template_dirs {
        let dir = lux.base_dir.join(dir);
        if dir.is_dir() {
            debouncer.watcher().watch(&dir, RecursiveMode::Recursive)?;
            tracing::debug!("Watching: {:?}", dir);
        }
    }
    let config_path = lux.base_dir.join(crate::CONFIG_FILE);
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    let mut lux = lux.clone();
    let mut builder = Builder::new(lux.config.clone(), &lux.base_dir)?;

    loop {
        let events = match rx.recv() {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
            Err(_) => break,
        };
        let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
        let Some(rebuild) = rebuild_for(&lux, &paths) else {
            continue;
        };

        for path in &paths {
            tracing::info!("File changed: {}", path.display());
        }
        if rebuild == Rebuild::Reload {
            tracing::info!("Templates or configuration changed, reloading");
            match Lux::new(&lux.base_dir)
                .and_then(|l| Ok((Builder::new(l.config.clone(), &l.base_dir)?, l)))
            {
                Ok((fresh, l)) => {
                    builder = fresh;
                    lux = l;
                }
                Err(e) => {
                    tracing::error!("Reload failed: {}", e);
                    continue;
                }
            }
        }

        tracing::info!("Rebuilding...");
        match builder.build() {
            Ok(report) if !report.is_success() => {
                tracing::warn!("{} files failed", report.failed.len())
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Build failed: {}", e),
        }
    }

    Ok(())
}

fn is_under(path: &Path, dir: &Path) -> bool {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    path.starts_with(dir)
}
