// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// One EpochMetrics record per epoch, written twice:
//   - as a human-readable tracing line (iter-prints.log / stdout)
//   - as a CSV row in <run_dir>/metrics.csv for plotting
//
// Loss values are those of the last generator / discriminator
// step of the epoch. The generator terms are shown weighted by
// their λ, the same way they enter the composite loss.
//
// Example log line:
//   Epoch: 00012, gloss: 15.31 (mse0.004, adv13.877, perc:1.430),
//   gen_elapse: 0.21s/itr; dloss: 1.29 (r0.412, f-0.533),
//   disc_elapse: 0.08s/itr, gan_elapse: 0.37s/itr

use anyhow::{Context, Result};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::losses::{DiscriminatorLossTerms, GeneratorLossTerms, LossWeights};

const CSV_HEADER: &str =
    "epoch,gen_loss,mse,adv,perc,disc_loss,real_logit,fake_logit,gen_secs_per_itr,disc_secs_per_itr,epoch_secs";

/// Everything the training loop reports for one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Unweighted generator loss terms
    pub gen: GeneratorLossTerms,

    /// Weights the terms were combined with
    pub weights: LossWeights,

    pub disc: DiscriminatorLossTerms,

    /// Mean wall-clock seconds per generator step
    pub gen_secs_per_itr: f64,

    /// Mean wall-clock seconds per discriminator step
    pub disc_secs_per_itr: f64,

    /// Wall-clock seconds for the whole epoch
    pub epoch_secs: f64,
}

impl EpochMetrics {
    /// Composite generator loss λ_adv·adv + λ_mse·mse + λ_perc·perc
    pub fn gen_total(&self) -> f64 {
        self.weights.combine(&self.gen)
    }

    pub fn is_finite(&self) -> bool {
        self.gen.is_finite() && self.disc.is_finite()
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self.weights.weighted(&self.gen);
        write!(
            f,
            "Epoch: {:05}, gloss: {:.2} (mse{:.3}, adv{:.3}, perc:{:.3}), gen_elapse: {:.2}s/itr; \
             dloss: {:.2} (r{:.3}, f{:.3}), disc_elapse: {:.2}s/itr, gan_elapse: {:.2}s/itr",
            self.epoch,
            self.gen_total(),
            w.mse,
            w.adv,
            w.perc,
            self.gen_secs_per_itr,
            self.disc.total,
            self.disc.real_logit_mean,
            self.disc.fake_logit_mean,
            self.disc_secs_per_itr,
            self.epoch_secs,
        )
    }
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create `<dir>/metrics.csv` with a header row if it does not exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch as a CSV row
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.4},{:.4},{:.4}",
            m.epoch,
            m.gen_total(),
            m.gen.mse,
            m.gen.adv,
            m.gen.perc,
            m.disc.total,
            m.disc.real_logit_mean,
            m.disc.fake_logit_mean,
            m.gen_secs_per_itr,
            m.disc_secs_per_itr,
            m.epoch_secs,
        )?;

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
