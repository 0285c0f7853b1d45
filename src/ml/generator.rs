// ============================================================
// Layer 5 — Generator Network
// ============================================================
// U-Net mapping a [N, depth, H, W] noisy stack to a
// [N, 1, H, W] denoised slice.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::network::ImageNetwork;

/// U-Net generator: `levels` pooling steps down, the same number
/// of transposed-conv steps up, with skip connections between
/// matching resolutions. Height and width must be divisible by
/// 2^levels.
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Input channels (adjacent slices)
    pub in_depth: usize,
    #[config(default = 3)]
    pub levels: usize,
    #[config(default = 32)]
    pub base_channels: usize,
}

impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let width = |level: usize| self.base_channels << level;

        let stem = ConvBlock::new(self.in_depth, width(0), device);
        let down = (0..self.levels)
            .map(|l| ConvBlock::new(width(l), width(l + 1), device))
            .collect();
        // Deepest level first, mirroring the order skips are consumed
        let up = (0..self.levels)
            .rev()
            .map(|l| UpBlock::new(width(l + 1), width(l), device))
            .collect();
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let head = Conv2dConfig::new([width(0), 1], [1, 1]).init(device);

        Generator { stem, down, up, pool, head }
    }

    /// Spatial dimensions must be a multiple of this.
    pub fn size_multiple(&self) -> usize {
        1 << self.levels
    }
}

/// Two 3x3 same-padded convolutions, each followed by ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_ch: usize, out_ch: usize, device: &B::Device) -> Self {
        let conv = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };
        Self { conv1: conv(in_ch, out_ch), conv2: conv(out_ch, out_ch) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.conv2.forward(relu(self.conv1.forward(x))))
    }
}

/// 2x up-sampling, concatenation with the skip, then a ConvBlock.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    pub up:    ConvTranspose2d<B>,
    pub block: ConvBlock<B>,
}

impl<B: Backend> UpBlock<B> {
    fn new(in_ch: usize, out_ch: usize, device: &B::Device) -> Self {
        let up = ConvTranspose2dConfig::new([in_ch, out_ch], [2, 2])
            .with_stride([2, 2])
            .init(device);
        Self { up, block: ConvBlock::new(out_ch * 2, out_ch, device) }
    }

    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.up.forward(x));
        self.block.forward(Tensor::cat(vec![x, skip], 1))
    }
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    pub stem: ConvBlock<B>,
    pub down: Vec<ConvBlock<B>>,
    pub up:   Vec<UpBlock<B>>,
    pub pool: MaxPool2d,
    pub head: Conv2d<B>,
}

impl<B: Backend> ImageNetwork<B> for Generator<B> {
    type Output = Tensor<B, 4>;

    /// [N, depth, H, W] → [N, 1, H, W]
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x     = self.stem.forward(images);
        let mut skips = Vec::with_capacity(self.down.len());

        for block in &self.down {
            skips.push(x.clone());
            x = block.forward(self.pool.forward(x));
        }
        for (up, skip) in self.up.iter().zip(skips.into_iter().rev()) {
            x = up.forward(x, skip);
        }

        self.head.forward(x)
    }
}
