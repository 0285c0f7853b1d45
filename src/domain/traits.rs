// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop and the batch sampler only talk to these
// traits, so a synchronous sampler, the background prefetcher,
// or an in-memory test fixture can stand in for one another.

use anyhow::Result;
use crate::domain::batch::MiniBatch;

// ─── PairedSlices ─────────────────────────────────────────────────────────────
/// Read contract for one split of a paired dataset: a stack of
/// equally sized 2-D slices, each with a noisy and a clean version.
///
/// Implementations:
///   - PairedVolume → a split of the on-disk dataset file
pub trait PairedSlices: Send + Sync {
    /// Total number of slices in the stack
    fn slice_count(&self) -> usize;

    /// (height, width) shared by every slice
    fn slice_dims(&self) -> (usize, usize);

    /// Row-major noisy slice at `index`, or None when out of range
    fn noisy(&self, index: usize) -> Option<&[f32]>;

    /// Row-major clean slice at `index`, or None when out of range
    fn clean(&self, index: usize) -> Option<&[f32]>;
}

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// Anything that hands the training loop its next mini-batch.
///
/// Implementations:
///   - BatchSampler        → draws batches synchronously
///   - BackgroundGenerator → pops batches prefetched on another thread
pub trait BatchSource {
    /// Block until the next batch is available.
    /// Errors are fatal to the run.
    fn next_batch(&mut self) -> Result<MiniBatch>;
}
