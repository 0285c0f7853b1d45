// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the training loop and the
// use cases:
//
//   run_dir.rs     — creates the per-run output directory
//   logging.rs     — tracing subscriber (console or log file)
//   checkpoint.rs  — weight records and train_config.json
//   metrics.rs     — per-epoch log line and metrics.csv
//   preview.rs     — grayscale PNG previews

/// Per-run output directory
pub mod run_dir;

/// Global tracing subscriber
pub mod logging;

/// Weight snapshots, pretrained weights and config persistence
pub mod checkpoint;

/// Epoch metrics: log line and CSV
pub mod metrics;

/// PNG preview writer
pub mod preview;
