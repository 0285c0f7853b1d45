// ============================================================
// Layer 4 — Tensor Batcher
// ============================================================
// Turns a host-side MiniBatch into device tensors, and pulls
// single image planes back out of a tensor for preview images.
//
//   MiniBatch.inputs  (flat Vec<f32>) → Tensor [batch, depth, H, W]
//   MiniBatch.targets (flat Vec<f32>) → Tensor [batch, 1,     H, W]
//
// B is the Burn backend, so the same code feeds the autodiff
// backend during training and the plain backend at inference.

use anyhow::{anyhow, ensure, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::domain::batch::{ImagePlane, MiniBatch};

// ─── TensorPair ───────────────────────────────────────────────────────────────
/// A mini-batch pair on the device.
#[derive(Debug, Clone)]
pub struct TensorPair<B: Backend> {
    /// Noisy input stack — shape: [batch, depth, height, width]
    pub inputs: Tensor<B, 4>,

    /// Clean target — shape: [batch, 1, height, width]
    pub targets: Tensor<B, 4>,
}

impl<B: Backend> TensorPair<B> {
    /// Copy a host mini-batch onto `device`.
    pub fn from_batch(batch: &MiniBatch, device: &B::Device) -> Self {
        let inputs = Tensor::<B, 4>::from_data(
            TensorData::new(batch.inputs.clone(), batch.input_shape()),
            device,
        );
        let targets = Tensor::<B, 4>::from_data(
            TensorData::new(batch.targets.clone(), batch.target_shape()),
            device,
        );
        Self { inputs, targets }
    }

    #[cfg(test)]
    pub fn batch_size(&self) -> usize {
        self.inputs.dims()[0]
    }
}

/// Copy channel `channel` of sample `sample` back to the host.
pub fn plane_from_tensor<B: Backend>(
    images:  Tensor<B, 4>,
    sample:  usize,
    channel: usize,
) -> Result<ImagePlane> {
    let [n, c, h, w] = images.dims();
    ensure!(
        sample < n && channel < c,
        "plane ({sample}, {channel}) out of range for tensor [{n}, {c}, {h}, {w}]"
    );

    let pixels = images
        .slice([sample..sample + 1, channel..channel + 1, 0..h, 0..w])
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read image tensor: {e:?}"))?;

    Ok(ImagePlane::new(w, h, pixels))
}
