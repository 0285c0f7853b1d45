// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the generator from train_config.json, loads one of
// its snapshots and denoises an evaluation pair. Runs on the
// plain (non-autodiff) backend.

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};

use crate::application::train_use_case::{BackendKind, TrainConfig};
use crate::data::batcher::{plane_from_tensor, TensorPair};
use crate::domain::batch::{ImagePlane, MiniBatch};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    generator::Generator,
    network::ImageNetwork,
    trainer::generator_config,
};

/// A loaded generator snapshot
pub struct Denoiser<B: Backend> {
    generator: Generator<B>,
    device:    B::Device,
}

impl<B: Backend> Denoiser<B> {
    pub fn from_snapshot(
        ckpt:     &CheckpointManager,
        cfg:      &TrainConfig,
        snapshot: &str,
        device:   B::Device,
    ) -> Result<Self> {
        let generator = ckpt.load_module(generator_config(cfg).init::<B>(&device), snapshot, &device)?;
        tracing::info!("Generator loaded from snapshot '{}'", snapshot);
        Ok(Self { generator, device })
    }

    /// Denoised image for the first sample of `batch`.
    pub fn denoise(&self, batch: &MiniBatch) -> Result<ImagePlane> {
        let pair = TensorPair::<B>::from_batch(batch, &self.device);
        plane_from_tensor(self.generator.forward(pair.inputs), 0, 0)
    }
}

/// Prediction plus how it compares to the noisy input.
#[derive(Debug, Clone)]
pub struct Denoised {
    pub snapshot: String,
    pub image:    ImagePlane,
    /// MSE of the centre input slice against the ground truth
    pub noisy_mse:    Option<f64>,
    /// MSE of the prediction against the ground truth
    pub denoised_mse: Option<f64>,
}

/// Load `snapshot` (or the newest one) and denoise `eval` on the
/// backend the run was trained with.
pub fn denoise_with_snapshot(
    ckpt:     &CheckpointManager,
    cfg:      &TrainConfig,
    snapshot: Option<&str>,
    eval:     &MiniBatch,
) -> Result<Denoised> {
    let snapshot = match snapshot {
        Some(name) => name.to_string(),
        None       => ckpt.latest_snapshot()?,
    };

    let image = match cfg.backend {
        BackendKind::Gpu => {
            let device = match cfg.gpu_index()? {
                Some(idx) => WgpuDevice::DiscreteGpu(idx),
                None      => WgpuDevice::default(),
            };
            Denoiser::<Wgpu>::from_snapshot(ckpt, cfg, &snapshot, device)?.denoise(eval)?
        }
        BackendKind::Cpu => {
            Denoiser::<NdArray>::from_snapshot(ckpt, cfg, &snapshot, Default::default())?.denoise(eval)?
        }
    };

    let truth = eval.target_plane(0);
    Ok(Denoised {
        noisy_mse:    eval.input_plane(0, eval.depth / 2).mse(&truth),
        denoised_mse: image.mse(&truth),
        snapshot,
        image,
    })
}
