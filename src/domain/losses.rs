// ============================================================
// Layer 3 — Loss Scalars
// ============================================================
// Scalar views of the per-step losses. The tensor versions live
// in ml::losses; these are what gets logged and written to CSV.
//
// Composite generator objective:
//   gen_loss = λ_adv·adv + λ_mse·mse + λ_perc·perc

use serde::{Deserialize, Serialize};

/// The three externally configured lambda weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    pub mse:  f64,
    pub adv:  f64,
    pub perc: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self { mse: 0.5, adv: 20.0, perc: 2.0 }
    }
}

impl LossWeights {
    /// Weighted sum of the three generator terms.
    pub fn combine(&self, terms: &GeneratorLossTerms) -> f64 {
        self.adv * terms.adv + self.mse * terms.mse + self.perc * terms.perc
    }

    /// Each term multiplied by its own lambda, in (mse, adv, perc) order.
    pub fn weighted(&self, terms: &GeneratorLossTerms) -> GeneratorLossTerms {
        GeneratorLossTerms {
            mse:  self.mse * terms.mse,
            adv:  self.adv * terms.adv,
            perc: self.perc * terms.perc,
        }
    }
}

/// Unweighted generator-side losses from one step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorLossTerms {
    /// Pixel-wise mean squared error against the clean target
    pub mse:  f64,
    /// BCE of the discriminator's verdict on generated images vs. "real"
    pub adv:  f64,
    /// MSE between feature-extractor outputs
    pub perc: f64,
}

impl GeneratorLossTerms {
    pub fn is_finite(&self) -> bool {
        self.mse.is_finite() && self.adv.is_finite() && self.perc.is_finite()
    }
}

/// Discriminator-side loss from one step, plus the mean logits
/// on real and generated images.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscriminatorLossTerms {
    /// BCE(real, 1) + BCE(fake, 0), summed
    pub total:           f64,
    pub real_logit_mean: f64,
    pub fake_logit_mean: f64,
}

impl DiscriminatorLossTerms {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite()
    }
}
