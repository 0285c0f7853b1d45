// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in two phases so the CLI can
// install file logging between them:
//
//   prepare():
//     Step 1: Validate the config              (no side effects)
//     Step 2: Recreate <out_root>/<exp>-itrOut (Layer 6 - infra)
//
//   execute():
//     Step 3: Open the dataset file            (Layer 4 - data)
//     Step 4: Build the evaluation sample      (Layer 4 - data)
//     Step 5: Start the background generator   (Layer 4 - data)
//     Step 6: Save train_config.json           (Layer 6 - infra)
//     Step 7: Run the GAN training loop        (Layer 5 - ml)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::data::{
    dataset::TomoDataset,
    prefetch::BackgroundGenerator,
    sampler::{evaluation_sample, BatchSampler, SamplerSettings},
};
use crate::domain::losses::LossWeights;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    run_dir,
};
use crate::ml::trainer::{extractor_config, generator_config, run_training, RunSummary};

/// Which Burn backend the networks run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Autodiff<Wgpu>
    Gpu,
    /// Autodiff<NdArray>
    Cpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved to train_config.json so `infer` can
// rebuild the generator with the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub exp_name:     String,
    pub out_root:     String,
    pub dataset_path: String,
    pub vgg_weights:  String,
    pub backend:      BackendKind,
    /// Comma-separated GPU indices; only the first is used
    pub gpus:         String,

    pub lambda_mse:  f64,
    pub lambda_adv:  f64,
    pub lambda_perc: f64,

    /// Generator down/up-sampling levels
    pub unet_levels: usize,
    /// Adjacent slices stacked into one input
    pub depth:       usize,
    pub crop_size:   usize,
    pub batch_size:  usize,
    pub gen_iters:   usize,
    pub disc_iters:  usize,
    pub max_iters:   usize,
    pub lr:          f64,

    pub checkpoint_period: usize,
    pub prefetch_factor:   usize,
    pub producer_timeout_secs: u64,
    pub seed:              u64,
    pub augment:           bool,
    pub save_disc:         bool,
    pub print_to_console:  bool,

    pub gen_channels:       usize,
    pub disc_channels:      usize,
    pub disc_blocks:        usize,
    pub extractor_convs:    Vec<usize>,
    pub extractor_channels: Vec<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            exp_name:     "debug".to_string(),
            out_root:     ".".to_string(),
            dataset_path: String::new(),
            vgg_weights:  "vgg19_weights_notop".to_string(),
            backend:      BackendKind::Gpu,
            gpus:         "0".to_string(),

            lambda_mse:  0.5,
            lambda_adv:  20.0,
            lambda_perc: 2.0,

            unet_levels: 3,
            depth:       1,
            crop_size:   256,
            batch_size:  16,
            gen_iters:   1,
            disc_iters:  2,
            max_iters:   8000,
            lr:          1e-4,

            checkpoint_period: 500,
            prefetch_factor:   4,
            producer_timeout_secs: 300,
            seed:              42,
            augment:           true,
            save_disc:         false,
            print_to_console:  false,

            gen_channels:       32,
            disc_channels:      64,
            disc_blocks:        4,
            extractor_convs:    vec![2, 2, 4, 4, 4],
            extractor_channels: vec![64, 128, 256, 512, 512],
        }
    }
}

impl TrainConfig {
    pub fn loss_weights(&self) -> LossWeights {
        LossWeights { mse: self.lambda_mse, adv: self.lambda_adv, perc: self.lambda_perc }
    }

    /// Spatial sizes fed to the generator must be multiples of this.
    pub fn size_multiple(&self) -> usize {
        generator_config(self).size_multiple()
    }

    pub fn queue_capacity(&self) -> usize {
        self.batch_size * self.prefetch_factor
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            batch_size: self.batch_size,
            depth:      self.depth,
            crop_size:  self.crop_size,
            augment:    self.augment,
            seed:       self.seed,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        run_dir::run_dir_path(&self.out_root, &self.exp_name)
    }

    /// First entry of `gpus`, or None for the default device.
    pub fn gpu_index(&self) -> Result<Option<usize>> {
        match self.gpus.split(',').map(str::trim).find(|s| !s.is_empty()) {
            None      => Ok(None),
            Some(idx) => idx
                .parse()
                .map(Some)
                .with_context(|| format!("Invalid GPU index '{idx}' in --gpus '{}'", self.gpus)),
        }
    }

    /// Reject settings that could never train. Runs before any file
    /// or device is touched.
    pub fn validate(&self) -> Result<()> {
        if self.exp_name.trim().is_empty() {
            bail!("Experiment name must not be empty");
        }
        if self.dataset_path.is_empty() {
            bail!("A dataset file is required");
        }
        for (name, v) in [
            ("mini-batch size", self.batch_size),
            ("depth", self.depth),
            ("crop size", self.crop_size),
            ("generator iterations", self.gen_iters),
            ("discriminator iterations", self.disc_iters),
            ("max iterations", self.max_iters),
            ("checkpoint period", self.checkpoint_period),
            ("prefetch factor", self.prefetch_factor),
            ("producer timeout", self.producer_timeout_secs as usize),
        ] {
            if v == 0 {
                bail!("{name} must be positive");
            }
        }
        if self.unet_levels > 8 {
            bail!("U-Net levels must be at most 8 (got {})", self.unet_levels);
        }
        if self.crop_size % self.size_multiple() != 0 {
            bail!(
                "Crop size {} must be divisible by 2^{} = {}",
                self.crop_size, self.unet_levels, self.size_multiple()
            );
        }
        if self.extractor_convs.len() != self.extractor_channels.len() || self.extractor_convs.is_empty() {
            bail!("Feature extractor layout needs one channel count per block");
        }
        let min_extractor = extractor_config(self).min_input_size();
        if self.crop_size < min_extractor {
            bail!("Crop size {} is smaller than the feature extractor's minimum {}", self.crop_size, min_extractor);
        }
        for (name, v) in [("lmse", self.lambda_mse), ("ladv", self.lambda_adv), ("lperc", self.lambda_perc)] {
            if !v.is_finite() || v < 0.0 {
                bail!("Loss weight {name} must be finite and non-negative (got {v})");
            }
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            bail!("Learning rate must be positive (got {})", self.lr);
        }
        self.gpu_index()?;
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  TrainConfig,
    run_dir: PathBuf,
}

impl TrainUseCase {
    /// Validate the config and create a fresh run directory.
    pub fn prepare(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let run_dir = run_dir::recreate(&config.out_root, &config.exp_name)?;
        Ok(Self { config, run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Run the whole training pipeline end to end
    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 3: Open the paired dataset ───────────────────────────────────
        let dataset = TomoDataset::open(&cfg.dataset_path)
            .with_context(|| format!("Cannot open dataset '{}'", cfg.dataset_path))?;

        // ── Step 4: Fixed evaluation pair for previews ────────────────────────
        let eval = evaluation_sample(&dataset.test, cfg.depth, cfg.size_multiple())
            .context("Cannot build the evaluation sample")?;
        tracing::info!("Evaluation sample: {}x{}", eval.height, eval.width);

        // ── Step 5: Background batch producer ─────────────────────────────────
        // The sampler is validated here, on the main thread, so a crop
        // that cannot fit fails before training starts.
        let mut sampler = BatchSampler::new(Arc::new(dataset.train), cfg.sampler_settings())
            .context("Invalid sampling settings for the training split")?;
        let batches = BackgroundGenerator::spawn(
            move || sampler.sample(),
            cfg.queue_capacity(),
            Duration::from_secs(cfg.producer_timeout_secs),
        )?;

        // ── Step 6: Persist the config next to the snapshots ──────────────────
        let ckpt = CheckpointManager::new(&self.run_dir);
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(&self.run_dir)?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let summary = run_training(cfg, batches, &eval, &ckpt, &metrics)?;
        tracing::info!(
            "Training finished: {} epochs, {} generator / {} discriminator updates",
            summary.epochs, summary.gen_steps, summary.disc_steps
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::dataset::fixtures::write_dataset;
    use crate::ml::trainer::tests::write_tiny_extractor;

    /// A CPU run small enough for unit tests, with its dataset and
    /// extractor weights written under `root`.
    pub(crate) fn tiny_cpu_config(root: &Path, exp_name: &str) -> TrainConfig {
        let data = root.join("tiny.safetensors");
        write_dataset(&data, [4, 12, 12], [3, 10, 10]);
        let vgg = root.join("tiny_vgg");
        write_tiny_extractor(&vgg);

        TrainConfig {
            exp_name:     exp_name.into(),
            out_root:     root.to_string_lossy().into_owned(),
            dataset_path: data.to_string_lossy().into_owned(),
            vgg_weights:  vgg.to_string_lossy().into_owned(),
            backend:      BackendKind::Cpu,
            unet_levels:  1,
            crop_size:    8,
            batch_size:   2,
            max_iters:    3,
            checkpoint_period: 2,
            producer_timeout_secs: 30,
            gen_channels:       2,
            disc_channels:      2,
            disc_blocks:        1,
            extractor_convs:    vec![1],
            extractor_channels: vec![2],
            ..TrainConfig::default()
        }
    }

    fn valid() -> TrainConfig {
        TrainConfig { dataset_path: "data.safetensors".into(), ..TrainConfig::default() }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(valid().validate().is_ok());
        let w = valid().loss_weights();
        assert_eq!((w.mse, w.adv, w.perc), (0.5, 20.0, 2.0));
    }

    #[test]
    fn test_rejects_bad_settings() {
        let bad = [
            TrainConfig { batch_size: 0, ..valid() },
            TrainConfig { crop_size: 100, ..valid() },
            TrainConfig { lambda_adv: -1.0, ..valid() },
            TrainConfig { lambda_perc: f64::NAN, ..valid() },
            TrainConfig { gpus: "x".into(), ..valid() },
            TrainConfig { dataset_path: String::new(), ..valid() },
            TrainConfig { extractor_convs: vec![2], ..valid() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn test_size_limits_follow_network_configs() {
        let cfg = TrainConfig { unet_levels: 2, crop_size: 64, ..valid() };
        assert_eq!(cfg.size_multiple(), 4);
        assert!(cfg.validate().is_ok());

        // default VGG19 trunk pools five times
        let too_small = TrainConfig { unet_levels: 1, crop_size: 16, ..valid() };
        assert!(too_small.validate().is_err());
        let tiny_trunk = TrainConfig {
            extractor_convs:    vec![1, 1],
            extractor_channels: vec![4, 4],
            ..too_small
        };
        assert!(tiny_trunk.validate().is_ok());
    }

    #[test]
    fn test_gpu_index() {
        assert_eq!(valid().gpu_index().unwrap(), Some(0));
        assert_eq!(TrainConfig { gpus: "2,3".into(), ..valid() }.gpu_index().unwrap(), Some(2));
        assert_eq!(TrainConfig { gpus: "".into(), ..valid() }.gpu_index().unwrap(), None);
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            out_root: root.path().to_string_lossy().into_owned(),
            batch_size: 0,
            ..valid()
        };
        assert!(TrainUseCase::prepare(cfg.clone()).is_err());
        assert!(!cfg.run_dir().exists());
    }

    #[test]
    fn test_end_to_end_on_cpu() {
        let root = tempfile::tempdir().unwrap();
        let cfg  = tiny_cpu_config(root.path(), "e2e");

        let use_case = TrainUseCase::prepare(cfg).unwrap();
        let summary = use_case.execute().unwrap();

        assert_eq!(summary.epochs, 3);
        assert_eq!(summary.gen_steps, 3);
        assert_eq!(summary.disc_steps, 6);
        assert_eq!(summary.checkpoint_epochs, vec![0, 2]);

        let dir = use_case.run_dir();
        for name in ["train_config.json", "metrics.csv", "gt.png", "ns.png", "it00000.png", "it00002.png"] {
            assert!(dir.join(name).exists(), "missing {name}");
        }
        let ckpt = CheckpointManager::new(dir);
        assert_eq!(ckpt.latest_snapshot().unwrap(), "e2e-it00002");
        assert_eq!(ckpt.load_config().unwrap().crop_size, 8);
    }
}
