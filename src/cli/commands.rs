// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `infer`.
//
// Flag names follow the established TomoGAN driver (-lmse,
// -psz, -itg, ...) as long options. Boolean switches take an
// explicit value (`--print true`) so defaults can be flipped
// either way. clap rejects unknown flags before anything runs.

use clap::{ArgAction, Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::{BackendKind, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the denoising GAN on a paired dataset file
    Train(TrainArgs),

    /// Denoise the evaluation sample with a saved generator snapshot
    Infer(InferArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// wgpu (Vulkan / Metal / DX12)
    Gpu,
    /// ndarray on the CPU
    Cpu,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Gpu => BackendKind::Gpu,
            BackendArg::Cpu => BackendKind::Cpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// GPU indices, comma separated; only the first is used
    #[arg(long, default_value = "0")]
    pub gpus: String,

    #[arg(long, value_enum, default_value_t = BackendArg::Gpu)]
    pub backend: BackendArg,

    /// Experiment name; outputs go to <out-root>/<exp-name>-itrOut
    #[arg(long, default_value = "debug")]
    pub exp_name: String,

    #[arg(long, default_value = ".")]
    pub out_root: String,

    /// Weight of the pixel-wise MSE loss
    #[arg(long, default_value_t = 0.5)]
    pub lmse: f64,

    /// Weight of the adversarial loss
    #[arg(long, default_value_t = 20.0)]
    pub ladv: f64,

    /// Weight of the perceptual loss
    #[arg(long, default_value_t = 2.0)]
    pub lperc: f64,

    /// U-Net down/up-sampling levels
    #[arg(long, default_value_t = 3)]
    pub lunet: usize,

    /// Adjacent slices stacked as input channels
    #[arg(long, default_value_t = 1)]
    pub depth: usize,

    /// Training crop size (pixels)
    #[arg(long, default_value_t = 256)]
    pub psz: usize,

    /// Mini-batch size
    #[arg(long, default_value_t = 16)]
    pub mbsz: usize,

    /// Generator updates per epoch
    #[arg(long, default_value_t = 1)]
    pub itg: usize,

    /// Discriminator updates per epoch
    #[arg(long, default_value_t = 2)]
    pub itd: usize,

    /// Number of epochs
    #[arg(long, default_value_t = 8000)]
    pub maxiter: usize,

    /// Dataset file (safetensors: train_ns, train_gt, test_ns, test_gt)
    #[arg(long)]
    pub dsfn: String,

    /// true: log to the terminal; false: log to iter-prints.log
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub print: bool,

    /// Pretrained VGG19 trunk (Burn compact record, without extension)
    #[arg(long, default_value = "vgg19_weights_notop")]
    pub vgg_weights: String,

    /// Adam learning rate for both networks
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Preview / snapshot period, in generator updates
    #[arg(long, default_value_t = 500)]
    pub checkpoint_period: usize,

    /// Prefetch queue holds mbsz * prefetch-factor batches
    #[arg(long, default_value_t = 4)]
    pub prefetch_factor: usize,

    /// Seconds to wait for a batch before giving up on the producer
    #[arg(long, default_value_t = 300)]
    pub producer_timeout: u64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Random flips, applied to input and target together
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub augment: bool,

    /// Also snapshot the discriminator at every checkpoint
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub save_disc: bool,
}

/// Application config from CLI flags. Network widths keep their defaults.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            exp_name:     a.exp_name,
            out_root:     a.out_root,
            dataset_path: a.dsfn,
            vgg_weights:  a.vgg_weights,
            backend:      a.backend.into(),
            gpus:         a.gpus,

            lambda_mse:  a.lmse,
            lambda_adv:  a.ladv,
            lambda_perc: a.lperc,

            unet_levels: a.lunet,
            depth:       a.depth,
            crop_size:   a.psz,
            batch_size:  a.mbsz,
            gen_iters:   a.itg,
            disc_iters:  a.itd,
            max_iters:   a.maxiter,
            lr:          a.lr,

            checkpoint_period: a.checkpoint_period,
            prefetch_factor:   a.prefetch_factor,
            producer_timeout_secs: a.producer_timeout,
            seed:              a.seed,
            augment:           a.augment,
            save_disc:         a.save_disc,
            print_to_console:  a.print,

            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct InferArgs {
    /// Run directory written by `train` (<exp-name>-itrOut)
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Snapshot name, e.g. debug-it00500; defaults to the newest
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Dataset file; defaults to the one the run was trained on
    #[arg(long)]
    pub dsfn: Option<String>,

    /// Output PNG; defaults to <run-dir>/<snapshot>-denoised.png
    #[arg(long)]
    pub output: Option<PathBuf>,
}
