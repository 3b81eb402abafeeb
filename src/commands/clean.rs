//! Clean the static location

use anyhow::Result;
use std::fs;

use crate::Lux;

/// Remove the static location
pub fn run(lux: &Lux) -> Result<()> {
    if lux.output_dir.exists() {
        fs::remove_dir_all(&lux.output_dir)?;
        tracing::info!("Deleted: {:?}", lux.output_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/api")).unwrap();
        fs::write(dir.path().join("build/index.html"), "x").unwrap();

        let lux = Lux::new(dir.path()).unwrap();
        run(&lux).unwrap();
        assert!(!dir.path().join("build").exists());
        // nothing to clean is fine
        run(&lux).unwrap();
    }
}
