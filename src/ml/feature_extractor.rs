// ============================================================
// Layer 5 — Perceptual Feature Extractor
// ============================================================
// The convolutional trunk of VGG19 (no classifier head), used
// only inside the perceptual loss. Weights come from a
// pretrained record and are frozen for the whole run.
//
// Input handling:
//   gray [N,1,H,W] → replicate to 3 channels → subtract the
//   ImageNet BGR channel means → conv trunk → last pooled map
//
// The block layout is configurable so tests can run a small
// trunk; the default is the real VGG19 layout.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::network::ImageNetwork;

/// Caffe-style per-channel means (B, G, R order).
pub const CHANNEL_MEANS: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Config, Debug)]
pub struct FeatureExtractorConfig {
    /// Number of 3x3 convolutions in each block
    #[config(default = "vec![2, 2, 4, 4, 4]")]
    pub convs_per_block: Vec<usize>,
    /// Output channels of each block
    #[config(default = "vec![64, 128, 256, 512, 512]")]
    pub channels: Vec<usize>,
}

impl FeatureExtractorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        let mut in_ch  = 3;
        let mut blocks = Vec::with_capacity(self.channels.len());

        for (&n_convs, &out_ch) in self.convs_per_block.iter().zip(&self.channels) {
            let convs = (0..n_convs)
                .map(|i| {
                    let from = if i == 0 { in_ch } else { out_ch };
                    Conv2dConfig::new([from, out_ch], [3, 3])
                        .with_padding(PaddingConfig2d::Same)
                        .init(device)
                })
                .collect();
            blocks.push(VggBlock {
                convs,
                pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            });
            in_ch = out_ch;
        }

        FeatureExtractor { blocks }
    }

    /// Every block halves the resolution, so inputs must be at least this big.
    pub fn min_input_size(&self) -> usize {
        1 << self.channels.len().min(self.convs_per_block.len())
    }
}

#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    pub convs: Vec<Conv2d<B>>,
    pub pool:  MaxPool2d,
}

impl<B: Backend> VggBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.convs.iter().fold(x, |x, conv| relu(conv.forward(x)));
        self.pool.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub blocks: Vec<VggBlock<B>>,
}

impl<B: Backend> FeatureExtractor<B> {
    /// Mark every weight as constant. Gradients still flow through
    /// the extractor to its input, but never into its parameters.
    pub fn frozen(self) -> Self {
        self.no_grad()
    }
}

/// Replicate a single-channel image to three channels and apply
/// the mean subtraction the pretrained weights expect.
pub fn preprocess<B: Backend>(gray: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = gray.device();
    let rgb    = Tensor::cat(vec![gray.clone(), gray.clone(), gray], 1);
    let means  = Tensor::<B, 1>::from_floats(CHANNEL_MEANS, &device).reshape([1, 3, 1, 1]);
    rgb - means
}

impl<B: Backend> ImageNetwork<B> for FeatureExtractor<B> {
    type Output = Tensor<B, 4>;

    /// [N, 1, H, W] gray → [N, C, H/2^k, W/2^k] features
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(preprocess(images), |x, block| block.forward(x))
    }

    fn trainable_params(&self) -> usize {
        0
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn tiny() -> FeatureExtractorConfig {
        FeatureExtractorConfig::new()
            .with_convs_per_block(vec![1, 2])
            .with_channels(vec![4, 6])
    }

    #[test]
    fn test_default_layout_is_vgg19() {
        let cfg = FeatureExtractorConfig::new();
        assert_eq!(cfg.convs_per_block.iter().sum::<usize>(), 16);
        assert_eq!(cfg.min_input_size(), 32);
    }

    #[test]
    fn test_feature_shape() {
        let device = Default::default();
        let fx: FeatureExtractor<NdArray> = tiny().init(&device);
        let x = Tensor::<NdArray, 4>::ones([2, 1, 8, 8], &device);
        assert_eq!(fx.forward(x).dims(), [2, 6, 2, 2]);
        assert_eq!(fx.trainable_params(), 0);
    }

    #[test]
    fn test_preprocess_replicates_and_centres() {
        let device = Default::default();
        let gray = Tensor::<NdArray, 4>::full([1, 1, 1, 1], 200.0, &device);
        let out: Vec<f32> = preprocess(gray).into_data().to_vec().unwrap();
        let expected: Vec<f32> = CHANNEL_MEANS.iter().map(|m| 200.0 - m).collect();
        for (o, e) in out.iter().zip(&expected) {
            assert!((o - e).abs() < 1e-4);
        }
    }
}
