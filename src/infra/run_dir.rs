// ============================================================
// Layer 6 — Run Directory
// ============================================================
// Every training run writes into `<out_root>/<exp_name>-itrOut`.
// A previous run with the same name is wiped first.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn run_dir_path(out_root: impl AsRef<Path>, exp_name: &str) -> PathBuf {
    out_root.as_ref().join(format!("{exp_name}-itrOut"))
}

/// Remove any existing run directory of this name and create it empty.
pub fn recreate(out_root: impl AsRef<Path>, exp_name: &str) -> Result<PathBuf> {
    let dir = run_dir_path(out_root, exp_name);
    if dir.is_dir() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Cannot clear old run directory '{}'", dir.display()))?;
    }
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
    Ok(dir)
}
