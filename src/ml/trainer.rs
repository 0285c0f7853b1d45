// ============================================================
// Layer 5 — GAN Training Loop
// ============================================================
// One epoch = `gen_iters` generator updates followed by
// `disc_iters` discriminator updates, each on a fresh batch.
//
//   generator step:
//     G in training mode, D frozen, F frozen
//     loss = λ_adv·bce(D(G(x)),1) + λ_mse·mse(G(x),y) + λ_perc·mse(F(G(x)),F(y))
//     only G's parameters are stepped
//
//   discriminator step:
//     G in inference mode (x → constant fake images)
//     loss = bce(D(y),1) + bce(D(G(x)),0)
//     only D's parameters are stepped
//
// Key Burn insight:
//   - F(G(x)) stays on the autodiff graph so the perceptual term
//     sends gradients back into G; F's own weights are no_grad
//   - F(y) and G(x) in the D step run through module.valid() on
//     the inner backend and re-enter as constants
//
// Every `checkpoint_period / gen_iters` epochs (starting at 0) the
// loop writes a preview of the evaluation sample and a generator
// snapshot. gt.png / ns.png are written once, at epoch 0.

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{path::PathBuf, time::Instant};

use crate::application::train_use_case::{BackendKind, TrainConfig};
use crate::data::batcher::{plane_from_tensor, TensorPair};
use crate::domain::{
    batch::MiniBatch,
    losses::{DiscriminatorLossTerms, GeneratorLossTerms, LossWeights},
    traits::BatchSource,
};
use crate::infra::{
    checkpoint::{load_pretrained, snapshot_name, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger},
    preview::save_png,
};
use crate::ml::{
    discriminator::{Discriminator, DiscriminatorConfig},
    feature_extractor::{FeatureExtractor, FeatureExtractorConfig},
    generator::{Generator, GeneratorConfig},
    losses::{adversarial_loss, compose_generator_loss, discriminator_loss, mse_loss, perceptual_loss},
    network::{infer, ImageNetwork},
};

// ─── Settings ─────────────────────────────────────────────────────────────────
/// The part of TrainConfig the loop itself needs
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub gen_iters:         usize,
    pub disc_iters:        usize,
    pub max_epochs:        usize,
    pub checkpoint_period: usize,
    pub lr:                f64,
    pub weights:           LossWeights,
    pub exp_name:          String,
    pub save_disc:         bool,
}

impl From<&TrainConfig> for LoopSettings {
    fn from(cfg: &TrainConfig) -> Self {
        Self {
            gen_iters:         cfg.gen_iters,
            disc_iters:        cfg.disc_iters,
            max_epochs:        cfg.max_iters,
            checkpoint_period: cfg.checkpoint_period,
            lr:                cfg.lr,
            weights:           cfg.loss_weights(),
            exp_name:          cfg.exp_name.clone(),
            save_disc:         cfg.save_disc,
        }
    }
}

pub fn generator_config(cfg: &TrainConfig) -> GeneratorConfig {
    GeneratorConfig::new(cfg.depth)
        .with_levels(cfg.unet_levels)
        .with_base_channels(cfg.gen_channels)
}

pub fn discriminator_config(cfg: &TrainConfig) -> DiscriminatorConfig {
    DiscriminatorConfig::new()
        .with_base_channels(cfg.disc_channels)
        .with_blocks(cfg.disc_blocks)
}

pub fn extractor_config(cfg: &TrainConfig) -> FeatureExtractorConfig {
    FeatureExtractorConfig::new()
        .with_convs_per_block(cfg.extractor_convs.clone())
        .with_channels(cfg.extractor_channels.clone())
}

/// Checkpoints fall on every `max(period / gen_iters, 1)`-th epoch, starting at 0.
pub fn is_checkpoint_epoch(epoch: usize, period: usize, gen_iters: usize) -> bool {
    let interval = (period / gen_iters.max(1)).max(1);
    epoch % interval == 0
}

/// What a finished run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub epochs:            usize,
    pub gen_steps:         usize,
    pub disc_steps:        usize,
    pub checkpoint_epochs: Vec<usize>,
    pub written:           Vec<PathBuf>,
    pub last:              Option<EpochMetrics>,
}

// ─── TrainingSession ──────────────────────────────────────────────────────────
/// Owns both trainable networks, their optimizer state, the frozen
/// feature extractor and the batch stream for one run.
pub struct TrainingSession<B, S, OG, OD>
where
    B:  AutodiffBackend,
    S:  BatchSource,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Discriminator<B>, B>,
{
    generator:     Generator<B>,
    discriminator: Discriminator<B>,
    extractor:     FeatureExtractor<B>,
    gen_optim:     OG,
    disc_optim:    OD,
    batches:       S,
    settings:      LoopSettings,
    device:        B::Device,
    gen_steps:     usize,
    disc_steps:    usize,
}

impl<B, S, OG, OD> TrainingSession<B, S, OG, OD>
where
    B:  AutodiffBackend,
    S:  BatchSource,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Discriminator<B>, B>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator:     Generator<B>,
        discriminator: Discriminator<B>,
        extractor:     FeatureExtractor<B>,
        gen_optim:     OG,
        disc_optim:    OD,
        batches:       S,
        settings:      LoopSettings,
        device:        B::Device,
    ) -> Self {
        Self {
            generator,
            discriminator,
            extractor: extractor.frozen(),
            gen_optim,
            disc_optim,
            batches,
            settings,
            device,
            gen_steps:  0,
            disc_steps: 0,
        }
    }

    /// One generator update on a fresh batch.
    pub fn generator_step(&mut self) -> Result<GeneratorLossTerms> {
        let batch = self.batches.next_batch()?;
        let pair  = TensorPair::<B>::from_batch(&batch, &self.device);

        let generated   = self.generator.forward(pair.inputs);
        let critic      = self.discriminator.clone().no_grad();
        let fake_logits = critic.forward(generated.clone());

        let gen_features    = self.extractor.forward(generated.clone());
        let target_features = infer::<B, _, 4>(&self.extractor, pair.targets.clone());

        let loss = compose_generator_loss(
            &self.settings.weights,
            mse_loss(generated, pair.targets),
            adversarial_loss(fake_logits),
            perceptual_loss(gen_features, target_features),
        );
        let terms = loss.terms();

        let grads = loss.total.backward();
        let grads = GradientsParams::from_grads(grads, &self.generator);
        self.generator = self.gen_optim.step(self.settings.lr, self.generator.clone(), grads);
        self.gen_steps += 1;

        Ok(terms)
    }

    /// One discriminator update on a fresh batch.
    pub fn discriminator_step(&mut self) -> Result<DiscriminatorLossTerms> {
        let batch = self.batches.next_batch()?;
        let pair  = TensorPair::<B>::from_batch(&batch, &self.device);

        let fake = infer::<B, _, 4>(&self.generator, pair.inputs);

        let real_logits = self.discriminator.forward(pair.targets);
        let fake_logits = self.discriminator.forward(fake);
        let loss  = discriminator_loss(real_logits, fake_logits);
        let terms = loss.terms();

        let grads = loss.total.backward();
        let grads = GradientsParams::from_grads(grads, &self.discriminator);
        self.discriminator = self.disc_optim.step(self.settings.lr, self.discriminator.clone(), grads);
        self.disc_steps += 1;

        Ok(terms)
    }

    /// All generator steps, then all discriminator steps.
    pub fn run_epoch(&mut self, epoch: usize) -> Result<EpochMetrics> {
        let gen_start = Instant::now();
        let mut gen = GeneratorLossTerms::default();
        for _ in 0..self.settings.gen_iters {
            gen = self.generator_step()?;
        }
        let gen_secs = gen_start.elapsed().as_secs_f64();

        let disc_start = Instant::now();
        let mut disc = DiscriminatorLossTerms::default();
        for _ in 0..self.settings.disc_iters {
            disc = self.discriminator_step()?;
        }
        let disc_secs = disc_start.elapsed().as_secs_f64();

        Ok(EpochMetrics {
            epoch,
            gen,
            weights: self.settings.weights,
            disc,
            gen_secs_per_itr:  gen_secs / self.settings.gen_iters.max(1) as f64,
            disc_secs_per_itr: disc_secs / self.settings.disc_iters.max(1) as f64,
            epoch_secs:        gen_start.elapsed().as_secs_f64(),
        })
    }

    /// Preview of the evaluation sample plus a generator snapshot.
    /// Returns every file written.
    pub fn emit_checkpoint(
        &self,
        epoch: usize,
        eval:  &MiniBatch,
        ckpt:  &CheckpointManager,
    ) -> Result<Vec<PathBuf>> {
        let dir = ckpt.dir();
        let mut written = Vec::new();

        let pair       = TensorPair::<B::InnerBackend>::from_batch(eval, &self.device);
        let prediction = self.generator.valid().forward(pair.inputs);
        let preview    = dir.join(format!("it{epoch:05}.png"));
        save_png(&plane_from_tensor(prediction, 0, 0)?, &preview)?;
        written.push(preview);

        if epoch == 0 {
            let gt = dir.join("gt.png");
            save_png(&eval.target_plane(0), &gt)?;
            written.push(gt);

            let ns = dir.join("ns.png");
            save_png(&eval.input_plane(0, eval.depth / 2), &ns)?;
            written.push(ns);
        }

        let name = snapshot_name(&self.settings.exp_name, epoch);
        written.push(ckpt.save_snapshot(&self.generator, &name)?);

        if self.settings.save_disc {
            written.push(ckpt.save_module(&self.discriminator, &format!("disc-it{epoch:05}"))?);
        }

        tracing::info!("Checkpoint at epoch {}: '{}'", epoch, name);
        Ok(written)
    }

    /// Drive `max_epochs` epochs, logging every one and emitting
    /// checkpoints on schedule.
    pub fn run(
        &mut self,
        eval:    &MiniBatch,
        ckpt:    &CheckpointManager,
        metrics: &MetricsLogger,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for epoch in 0..self.settings.max_epochs {
            let m = self.run_epoch(epoch)?;
            if !m.is_finite() {
                tracing::warn!("Non-finite loss at epoch {}", epoch);
            }
            tracing::info!("{}", m);
            metrics.log(&m)?;

            if is_checkpoint_epoch(epoch, self.settings.checkpoint_period, self.settings.gen_iters) {
                summary.written.extend(self.emit_checkpoint(epoch, eval, ckpt)?);
                summary.checkpoint_epochs.push(epoch);
            }

            summary.epochs = epoch + 1;
            summary.last   = Some(m);
        }

        summary.gen_steps  = self.gen_steps;
        summary.disc_steps = self.disc_steps;
        Ok(summary)
    }
}

// ─── Entry Point ──────────────────────────────────────────────────────────────
/// Build the networks on the configured backend and run the loop.
pub fn run_training<S: BatchSource>(
    cfg:     &TrainConfig,
    batches: S,
    eval:    &MiniBatch,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<RunSummary> {
    match cfg.backend {
        BackendKind::Gpu => {
            let device = match cfg.gpu_index()? {
                Some(idx) => WgpuDevice::DiscreteGpu(idx),
                None      => WgpuDevice::default(),
            };
            tracing::info!("Using WGPU device: {:?}", device);
            train_on::<Autodiff<Wgpu>, S>(cfg, batches, eval, ckpt, metrics, device)
        }
        BackendKind::Cpu => {
            tracing::info!("Using NdArray CPU backend");
            train_on::<Autodiff<NdArray>, S>(cfg, batches, eval, ckpt, metrics, Default::default())
        }
    }
}

fn train_on<B: AutodiffBackend, S: BatchSource>(
    cfg:     &TrainConfig,
    batches: S,
    eval:    &MiniBatch,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
    device:  B::Device,
) -> Result<RunSummary> {
    B::seed(&device, cfg.seed);

    let generator: Generator<B>         = generator_config(cfg).init(&device);
    let discriminator: Discriminator<B> = discriminator_config(cfg).init(&device);
    let extractor = load_pretrained(extractor_config(cfg).init::<B>(&device), &cfg.vgg_weights, &device)
        .context("Pretrained feature-extractor weights are required")?;

    tracing::info!(
        "Networks ready: generator {} params, discriminator {} params, extractor frozen",
        generator.trainable_params(),
        discriminator.trainable_params(),
    );

    let gen_optim  = AdamConfig::new().with_epsilon(1e-7).init::<B, Generator<B>>();
    let disc_optim = AdamConfig::new().with_epsilon(1e-7).init::<B, Discriminator<B>>();

    let mut session = TrainingSession::new(
        generator,
        discriminator,
        extractor,
        gen_optim,
        disc_optim,
        batches,
        LoopSettings::from(cfg),
        device,
    );
    session.run(eval, ckpt, metrics)
}
