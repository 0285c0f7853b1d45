// ============================================================
// Layer 2 — Infer Use Case
// ============================================================
// Reads a finished (or running) training directory back:
//   1. Load train_config.json to rebuild the generator
//   2. Open the dataset (the run's own, unless overridden)
//   3. Denoise the evaluation sample with a generator snapshot
//   4. Write the prediction as a PNG

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::{dataset::TomoDataset, sampler::evaluation_sample};
use crate::infra::{checkpoint::CheckpointManager, preview::save_png};
use crate::ml::inferencer::{denoise_with_snapshot, Denoised};

pub struct InferUseCase {
    run_dir:  PathBuf,
    dataset:  Option<String>,
    snapshot: Option<String>,
    output:   Option<PathBuf>,
}

/// What `infer` produced
#[derive(Debug, Clone)]
pub struct InferOutcome {
    pub output:   PathBuf,
    pub denoised: Denoised,
}

impl InferUseCase {
    pub fn new(
        run_dir:  impl Into<PathBuf>,
        dataset:  Option<String>,
        snapshot: Option<String>,
        output:   Option<PathBuf>,
    ) -> Self {
        Self { run_dir: run_dir.into(), dataset, snapshot, output }
    }

    pub fn execute(&self) -> Result<InferOutcome> {
        let ckpt = CheckpointManager::new(&self.run_dir);
        let cfg  = ckpt.load_config()?;

        let dataset_path = self.dataset.clone().unwrap_or_else(|| cfg.dataset_path.clone());
        let dataset = TomoDataset::open(&dataset_path)
            .with_context(|| format!("Cannot open dataset '{dataset_path}'"))?;
        let eval = evaluation_sample(&dataset.test, cfg.depth, cfg.size_multiple())?;

        let denoised = denoise_with_snapshot(&ckpt, &cfg, self.snapshot.as_deref(), &eval)?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.run_dir.join(format!("{}-denoised.png", denoised.snapshot)));
        save_png(&denoised.image, &output)?;

        tracing::info!("Denoised evaluation sample written to '{}'", output.display());
        Ok(InferOutcome { output, denoised })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{tests::tiny_cpu_config, TrainUseCase};

    #[test]
    fn test_infer_reads_back_latest_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let train = TrainUseCase::prepare(tiny_cpu_config(root.path(), "readback")).unwrap();
        train.execute().unwrap();

        let outcome = InferUseCase::new(train.run_dir(), None, None, None).execute().unwrap();

        assert_eq!(outcome.denoised.snapshot, "readback-it00002");
        assert!(outcome.output.exists());
        // evaluation frame is 10x10, already a multiple of 2
        assert_eq!((outcome.denoised.image.width, outcome.denoised.image.height), (10, 10));
        assert!(outcome.denoised.denoised_mse.is_some());
    }

    #[test]
    fn test_infer_without_run_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = InferUseCase::new(root.path().join("missing-itrOut"), None, None, None).execute();
        assert!(result.is_err());
    }
}
