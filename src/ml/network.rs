// ============================================================
// Layer 5 — Network Capability
// ============================================================
// Generator, discriminator and feature extractor all look the
// same to the training loop: an image tensor goes in, something
// comes out.
//
// Training vs. inference mode maps onto Burn's backends:
//   training  → the module on the Autodiff backend (graph recorded)
//   inference → module.valid() on the inner backend (no graph)
//
// Persistence goes through Burn records (see infra::checkpoint).

use burn::{
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

pub trait ImageNetwork<B: Backend>: Module<B> {
    type Output;

    /// Forward pass over a [batch, channels, height, width] tensor.
    fn forward(&self, images: Tensor<B, 4>) -> Self::Output;

    /// Number of scalars the optimizer may update.
    fn trainable_params(&self) -> usize {
        self.num_params()
    }
}

/// Inference-mode forward pass: no gradient is tracked through
/// the network, and the result re-enters the autodiff backend as
/// a constant.
pub fn infer<B, N, const D: usize>(network: &N, images: Tensor<B, 4>) -> Tensor<B, D>
where
    B: AutodiffBackend,
    N: AutodiffModule<B>,
    N::InnerModule: ImageNetwork<B::InnerBackend, Output = Tensor<B::InnerBackend, D>>,
{
    Tensor::from_inner(network.valid().forward(images.inner()))
}
