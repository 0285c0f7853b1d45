// ============================================================
// Layer 5 — Discriminator Network
// ============================================================
// Scores [N, 1, H, W] images with one real/fake logit each.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::leaky_relu,
};

use crate::ml::network::ImageNetwork;

const LEAKY_SLOPE: f64 = 0.2;

/// Strided conv stack → global average pool → two dense layers.
/// Produces one unbounded real/fake logit per image.
#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    #[config(default = 64)]
    pub base_channels: usize,
    /// Number of stride-2 conv layers
    #[config(default = 4)]
    pub blocks: usize,
    #[config(default = 64)]
    pub hidden: usize,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        // Channel width doubles per block, capped at 8x base
        let width = |i: usize| self.base_channels << i.min(3);

        let mut in_ch = 1;
        let mut convs = Vec::with_capacity(self.blocks);
        for i in 0..self.blocks {
            convs.push(
                Conv2dConfig::new([in_ch, width(i)], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
            );
            in_ch = width(i);
        }

        Discriminator {
            convs,
            pool:   AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            hidden: LinearConfig::new(in_ch, self.hidden).init(device),
            logit:  LinearConfig::new(self.hidden, 1).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub convs:  Vec<Conv2d<B>>,
    pub pool:   AdaptiveAvgPool2d,
    pub hidden: Linear<B>,
    pub logit:  Linear<B>,
}

impl<B: Backend> ImageNetwork<B> for Discriminator<B> {
    type Output = Tensor<B, 2>;

    /// [N, 1, H, W] → [N, 1] logits
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for conv in &self.convs {
            x = leaky_relu(conv.forward(x), LEAKY_SLOPE);
        }
        let x = self.pool.forward(x).flatten::<2>(1, 3);
        let x = leaky_relu(self.hidden.forward(x), LEAKY_SLOPE);
        self.logit.forward(x)
    }
}
