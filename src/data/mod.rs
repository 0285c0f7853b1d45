// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the dataset file to tensors on the training device:
//
//   dataset.safetensors
//       │
//       ▼
//   TomoDataset        → paired noisy/clean volumes (train, test)
//       │
//       ▼
//   BatchSampler       → random stacks, shared crop, flips
//       │
//       ▼
//   BackgroundGenerator→ producer thread + bounded PrefetchQueue
//       │
//       ▼
//   TensorPair         → [B,depth,H,W] / [B,1,H,W] tensors
//
// Only batcher.rs knows about Burn; everything before it is
// plain host memory so it can cross threads.

/// Typed failures of the data layer
pub mod error;

/// Safetensors dataset reader
pub mod dataset;

/// Random mini-batch sampling and the evaluation sample
pub mod sampler;

/// Bounded queue and background producer thread
pub mod prefetch;

/// MiniBatch → Burn tensors
pub mod batcher;
