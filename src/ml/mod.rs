// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network and training code lives here:
//
//   network.rs           — ImageNetwork capability trait and the
//                          inference-mode helper
//   generator.rs         — U-Net denoiser
//   discriminator.rs     — real/fake critic, one logit per image
//   feature_extractor.rs — frozen VGG19 trunk for perceptual loss
//   losses.rs            — BCE / MSE / perceptual terms and the
//                          weighted generator objective
//   trainer.rs           — TrainingSession: alternating G/D
//                          updates, logging, checkpoints
//   inferencer.rs        — loads a generator snapshot and denoises
//
// Reference: Ledig et al. (2017) SRGAN, Ronneberger et al. (2015) U-Net,
//            Simonyan & Zisserman (2015) VGG

pub mod network;

pub mod generator;

pub mod discriminator;

/// Pretrained, frozen perceptual feature extractor
pub mod feature_extractor;

pub mod losses;

/// GAN training loop
pub mod trainer;

/// Generator snapshot inference
pub mod inferencer;
