// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to Layer 2. Logging is
// installed here because where it goes depends on the run:
//   train --print true  → stdout
//   train (default)     → <run_dir>/iter-prints.log
//   infer               → stdout

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, TrainArgs};

use crate::infra::logging::{self, LogSink};

#[derive(Parser, Debug)]
#[command(
    name = "tomogan",
    version,
    about = "Train a GAN that denoises tomographic images, then apply its snapshots."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Infer(args) => run_infer(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    // Validation happens before the run directory is touched.
    let use_case = TrainUseCase::prepare(args.into())?;

    if use_case.config().print_to_console {
        logging::init(LogSink::Console)?;
    } else {
        logging::init(LogSink::RunDirectory(use_case.run_dir()))?;
        println!("Logging to '{}'", use_case.run_dir().join(logging::LOG_FILE).display());
    }
    tracing::info!("Run directory: '{}'", use_case.run_dir().display());

    let summary = use_case.execute()?;
    println!(
        "Training complete: {} epochs, {} checkpoints in '{}'.",
        summary.epochs,
        summary.checkpoint_epochs.len(),
        use_case.run_dir().display()
    );
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    logging::init(LogSink::Console)?;

    let outcome = InferUseCase::new(args.run_dir, args.dsfn, args.snapshot, args.output).execute()?;
    let d = &outcome.denoised;
    println!("Snapshot: {}", d.snapshot);
    if let (Some(noisy), Some(denoised)) = (d.noisy_mse, d.denoised_mse) {
        println!("MSE vs ground truth: noisy {:.6}, denoised {:.6}", noisy, denoised);
    }
    println!("Wrote '{}'", outcome.output.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{BackendKind, TrainConfig};

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "tomogan", "train", "--dsfn", "d.safetensors", "--exp-name", "run1",
            "--lperc", "0", "--psz", "128", "--itd", "3", "--backend", "cpu", "--print", "true",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();

        assert_eq!(cfg.exp_name, "run1");
        assert_eq!(cfg.lambda_perc, 0.0);
        assert_eq!(cfg.lambda_adv, 20.0);
        assert_eq!(cfg.crop_size, 128);
        assert_eq!(cfg.disc_iters, 3);
        assert_eq!(cfg.backend, BackendKind::Cpu);
        assert!(cfg.print_to_console);
        assert!(cfg.augment);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["tomogan", "train", "--dsfn", "d", "--bogus", "1"]).is_err());
    }

    #[test]
    fn test_dataset_required() {
        assert!(Cli::try_parse_from(["tomogan", "train"]).is_err());
    }
}
