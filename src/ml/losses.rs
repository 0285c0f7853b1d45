// ============================================================
// Layer 5 — Loss Composer
// ============================================================
// Tensor-level loss terms. The scalar view used for logging
// lives in domain::losses.
//
//   discriminator : bce(real, 1) + bce(fake, 0)   (summed)
//   adversarial   : bce(D(G(x)), 1)
//   mse           : mean((G(x) - y)²)
//   perceptual    : mean((F(G(x)) - F(y))²) over flattened features
//   generator     : λ_adv·adv + λ_mse·mse + λ_perc·perc
//
// All BCE terms take raw logits. No clipping is applied.

use burn::{
    nn::loss::BinaryCrossEntropyLossConfig,
    prelude::*,
};

use crate::domain::losses::{DiscriminatorLossTerms, GeneratorLossTerms, LossWeights};

fn bce_with_label<B: Backend>(logits: Tensor<B, 2>, label: bool) -> Tensor<B, 1> {
    let device = logits.device();
    let dims   = logits.dims();
    let targets = if label {
        Tensor::<B, 2, Int>::ones(dims, &device)
    } else {
        Tensor::<B, 2, Int>::zeros(dims, &device)
    };
    BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device)
        .forward(logits, targets)
}

/// Discriminator loss on real logits (label 1) and fake logits (label 0).
pub fn discriminator_loss<B: Backend>(
    real_logits: Tensor<B, 2>,
    fake_logits: Tensor<B, 2>,
) -> DiscriminatorLoss<B> {
    let real_mean = real_logits.clone().mean();
    let fake_mean = fake_logits.clone().mean();
    let total     = bce_with_label(real_logits, true) + bce_with_label(fake_logits, false);
    DiscriminatorLoss { total, real_mean, fake_mean }
}

/// Generator-side adversarial loss: the fake logits scored against label 1.
pub fn adversarial_loss<B: Backend>(fake_logits: Tensor<B, 2>) -> Tensor<B, 1> {
    bce_with_label(fake_logits, true)
}

pub fn mse_loss<B: Backend>(generated: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    (generated - target).powf_scalar(2.0).mean()
}

/// Mean squared difference between flattened feature maps.
pub fn perceptual_loss<B: Backend>(
    generated_features: Tensor<B, 4>,
    target_features:    Tensor<B, 4>,
) -> Tensor<B, 1> {
    let batch = generated_features.dims()[0];
    let gen   = generated_features.reshape([batch as i32, -1]);
    let tgt   = target_features.reshape([batch as i32, -1]);
    (gen - tgt).powf_scalar(2.0).mean()
}

pub fn compose_generator_loss<B: Backend>(
    weights: &LossWeights,
    mse:     Tensor<B, 1>,
    adv:     Tensor<B, 1>,
    perc:    Tensor<B, 1>,
) -> GeneratorLoss<B> {
    let total = adv.clone().mul_scalar(weights.adv)
        + mse.clone().mul_scalar(weights.mse)
        + perc.clone().mul_scalar(weights.perc);
    GeneratorLoss { total, mse, adv, perc }
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

// ─── Loss Bundles ────────────────────────────────────────────────────────────
pub struct GeneratorLoss<B: Backend> {
    pub total: Tensor<B, 1>,
    pub mse:   Tensor<B, 1>,
    pub adv:   Tensor<B, 1>,
    pub perc:  Tensor<B, 1>,
}

impl<B: Backend> GeneratorLoss<B> {
    /// Unweighted terms read back to the host.
    pub fn terms(&self) -> GeneratorLossTerms {
        GeneratorLossTerms {
            mse:  scalar(self.mse.clone()),
            adv:  scalar(self.adv.clone()),
            perc: scalar(self.perc.clone()),
        }
    }
}

pub struct DiscriminatorLoss<B: Backend> {
    pub total:     Tensor<B, 1>,
    pub real_mean: Tensor<B, 1>,
    pub fake_mean: Tensor<B, 1>,
}

impl<B: Backend> DiscriminatorLoss<B> {
    pub fn terms(&self) -> DiscriminatorLossTerms {
        DiscriminatorLossTerms {
            total:           scalar(self.total.clone()),
            real_logit_mean: scalar(self.real_mean.clone()),
            fake_logit_mean: scalar(self.fake_mean.clone()),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn logits(values: [f32; 3]) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(values, &Default::default()).reshape([3, 1])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_disc_loss_symmetric_under_label_swap() {
        let a = logits([1.5, -0.3, 0.2]);
        let b = logits([-2.0, 0.7, 0.0]);

        // loss(real=A, fake=B) == loss(real=-B, fake=-A), since bce(x,1) == bce(-x,0)
        let lhs = discriminator_loss(a.clone(), b.clone()).terms().total;
        let rhs = discriminator_loss(b.neg(), a.neg()).terms().total;
        assert!(close(lhs, rhs), "{lhs} vs {rhs}");
    }

    #[test]
    fn test_disc_loss_is_sum_of_halves() {
        let real = logits([0.0, 0.0, 0.0]);
        let fake = logits([0.0, 0.0, 0.0]);
        // bce(0, y) = ln 2 for either label
        let total = discriminator_loss(real, fake).terms().total;
        assert!(close(total, 2.0 * std::f64::consts::LN_2));
    }

    #[test]
    fn test_adversarial_prefers_confident_fakes() {
        let fooled  = adversarial_loss(logits([5.0, 5.0, 5.0])).into_scalar().elem::<f64>();
        let caught  = adversarial_loss(logits([-5.0, -5.0, -5.0])).into_scalar().elem::<f64>();
        assert!(fooled < caught);
    }

    #[test]
    fn test_mse_and_perceptual_values() {
        let device = Default::default();
        let a = Tensor::<B, 4>::zeros([2, 1, 2, 2], &device);
        let b = Tensor::<B, 4>::full([2, 1, 2, 2], 2.0, &device);
        assert!(close(mse_loss(a.clone(), b.clone()).into_scalar().elem::<f64>(), 4.0));
        assert!(close(perceptual_loss(a, b).into_scalar().elem::<f64>(), 4.0));
    }

    #[test]
    fn test_composite_scales_one_term_linearly() {
        let device = Default::default();
        let term = |v: f32| Tensor::<B, 1>::from_floats([v], &device);
        let base = LossWeights { mse: 0.5, adv: 20.0, perc: 2.0 };
        let bumped = LossWeights { perc: 4.0, ..base };

        let t0 = compose_generator_loss(&base,   term(0.1), term(0.7), term(0.3)).total;
        let t1 = compose_generator_loss(&bumped, term(0.1), term(0.7), term(0.3)).total;

        let delta = t1.into_scalar().elem::<f64>() - t0.into_scalar().elem::<f64>();
        assert!(close(delta, 2.0 * 0.3));
    }

    #[test]
    fn test_composite_matches_scalar_formula() {
        let device = Default::default();
        let term = |v: f32| Tensor::<B, 1>::from_floats([v], &device);
        let weights = LossWeights::default();
        let loss = compose_generator_loss(&weights, term(0.25), term(0.5), term(1.5));
        let expected = weights.combine(&loss.terms());
        assert!(close(loss.total.into_scalar().elem::<f64>(), expected));
    }
}
