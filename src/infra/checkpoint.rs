// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores network weights using Burn's CompactRecorder.
//
// Files in a run directory:
//   <exp>-it00000.mpk        ← generator snapshot at epoch 0
//   <exp>-it00500.mpk        ← generator snapshot at epoch 500
//   disc-it00500.mpk         ← discriminator (only with --save-disc)
//   latest_snapshot.json     ← name of the newest generator snapshot
//   train_config.json        ← everything needed to rebuild the networks
//
// Snapshots hold weights only; optimizer state is never written.
// The recorder appends its own file extension.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;

const LATEST_SNAPSHOT: &str = "latest_snapshot.json";
const CONFIG_FILE:     &str = "train_config.json";

/// Name of the generator snapshot written at `epoch`.
pub fn snapshot_name(exp_name: &str, epoch: usize) -> String {
    format!("{exp_name}-it{epoch:05}")
}

/// Reads and writes weight records and the run config in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// The directory must already exist.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a module's record under `name` without touching the
    /// latest-snapshot pointer.
    pub fn save_module<B: Backend, M: Module<B>>(&self, module: &M, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        CompactRecorder::new()
            .record(module.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;
        tracing::debug!("Saved weights: '{}'", path.display());
        Ok(path)
    }

    /// Write a generator snapshot and point `latest_snapshot.json` at it.
    pub fn save_snapshot<B: Backend, M: Module<B>>(&self, module: &M, name: &str) -> Result<PathBuf> {
        let path = self.save_module(module, name)?;
        fs::write(self.dir.join(LATEST_SNAPSHOT), serde_json::to_string(name)?)
            .with_context(|| format!("Failed to write {LATEST_SNAPSHOT}"))?;
        Ok(path)
    }

    /// Load the record `name` into a freshly initialised module of the
    /// same architecture.
    pub fn load_module<B: Backend, M: Module<B>>(
        &self,
        module: M,
        name:   &str,
        device: &B::Device,
    ) -> Result<M> {
        load_record(module, self.dir.join(name), device)
    }

    /// Name of the newest generator snapshot in this directory.
    pub fn latest_snapshot(&self) -> Result<String> {
        let path = self.dir.join(LATEST_SNAPSHOT);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Has this run emitted a checkpoint?", path.display())
        })?;
        Ok(serde_json::from_str::<String>(&s)?)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read config from '{}'. Is this a training run directory?", path.display())
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}

/// Load a pretrained record (e.g. the perceptual feature extractor)
/// from an explicit path.
pub fn load_pretrained<B: Backend, M: Module<B>>(
    module: M,
    path:   impl AsRef<Path>,
    device: &B::Device,
) -> Result<M> {
    load_record(module, path.as_ref().to_path_buf(), device)
}

fn load_record<B: Backend, M: Module<B>>(module: M, path: PathBuf, device: &B::Device) -> Result<M> {
    let record = CompactRecorder::new()
        .load(path.clone(), device)
        .with_context(|| format!("Cannot load weights from '{}'", path.display()))?;
    Ok(module.load_record(record))
}
