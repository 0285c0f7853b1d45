// ============================================================
// Layer 4 — Mini-batch Sampler
// ============================================================
// Draws random (X, Y) mini-batch pairs from one dataset split.
//
// For every sample in a batch:
//   1. pick a stack start s uniformly from 0..=slices-depth
//   2. X = slices s..s+depth, Y = clean slice s + depth/2
//   3. crop both at the batch's shared origin
//   4. optionally flip X and Y together (horizontal / vertical)
//
// The sequence never ends: every call re-samples the split, so
// there is no epoch boundary to wrap around.

use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::error::DataError;
use crate::domain::batch::MiniBatch;
use crate::domain::traits::{BatchSource, PairedSlices};

/// Shape and randomness settings for one sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub batch_size: usize,
    pub depth:      usize,
    pub crop_size:  usize,
    pub augment:    bool,
    pub seed:       u64,
}

pub struct BatchSampler<S: PairedSlices> {
    source:   Arc<S>,
    settings: SamplerSettings,
    rng:      StdRng,
}

impl<S: PairedSlices> BatchSampler<S> {
    /// Build a sampler, rejecting any setting that could never
    /// produce a full-size batch from `source`.
    pub fn new(source: Arc<S>, settings: SamplerSettings) -> Result<Self, DataError> {
        if settings.batch_size == 0 || settings.depth == 0 || settings.crop_size == 0 {
            return Err(DataError::InvalidSetting(format!(
                "batch size, depth and crop size must be positive (got {}, {}, {})",
                settings.batch_size, settings.depth, settings.crop_size
            )));
        }

        let slices = source.slice_count();
        if settings.depth > slices {
            return Err(DataError::DepthTooLarge { depth: settings.depth, slices });
        }

        let (height, width) = source.slice_dims();
        if settings.crop_size > height || settings.crop_size > width {
            return Err(DataError::CropTooLarge { crop: settings.crop_size, height, width });
        }

        let rng = StdRng::seed_from_u64(settings.seed);
        Ok(Self { source, settings, rng })
    }

    /// Draw one mini-batch.
    pub fn sample(&mut self) -> Result<MiniBatch, DataError> {
        let SamplerSettings { batch_size, depth, crop_size, augment, .. } = self.settings;
        let (height, width) = self.source.slice_dims();
        let max_start       = self.source.slice_count() - depth;

        let row0 = self.rng.gen_range(0..=height - crop_size);
        let col0 = self.rng.gen_range(0..=width - crop_size);
        let window = CropWindow { row0, col0, rows: crop_size, cols: crop_size };

        let plane       = crop_size * crop_size;
        let mut inputs  = Vec::with_capacity(batch_size * depth * plane);
        let mut targets = Vec::with_capacity(batch_size * plane);

        for _ in 0..batch_size {
            let start = self.rng.gen_range(0..=max_start);
            let flips = if augment {
                Flips { horizontal: self.rng.gen(), vertical: self.rng.gen() }
            } else {
                Flips::default()
            };
            gather_pair(self.source.as_ref(), start, depth, width, window, flips, &mut inputs, &mut targets)?;
        }

        Ok(MiniBatch {
            inputs,
            targets,
            batch:  batch_size,
            depth,
            height: crop_size,
            width:  crop_size,
        })
    }
}

impl<S: PairedSlices> BatchSource for BatchSampler<S> {
    fn next_batch(&mut self) -> anyhow::Result<MiniBatch> {
        Ok(self.sample()?)
    }
}

/// The fixed evaluation pair used for preview images.
///
/// Takes the stack starting at the middle slice and center-crops
/// the full frame down to the largest multiple of `multiple` in
/// each dimension, so it fits the generator's down-sampling levels.
pub fn evaluation_sample<S: PairedSlices>(
    source:   &S,
    depth:    usize,
    multiple: usize,
) -> Result<MiniBatch, DataError> {
    let slices = source.slice_count();
    if depth == 0 || depth > slices {
        return Err(DataError::DepthTooLarge { depth, slices });
    }
    let multiple        = multiple.max(1);
    let (height, width) = source.slice_dims();
    let rows = height / multiple * multiple;
    let cols = width / multiple * multiple;
    if rows == 0 || cols == 0 {
        return Err(DataError::CropTooLarge { crop: multiple, height, width });
    }

    let window = CropWindow { row0: (height - rows) / 2, col0: (width - cols) / 2, rows, cols };
    let start  = (slices / 2).min(slices - depth);

    let mut inputs  = Vec::with_capacity(depth * rows * cols);
    let mut targets = Vec::with_capacity(rows * cols);
    gather_pair(source, start, depth, width, window, Flips::default(), &mut inputs, &mut targets)?;

    Ok(MiniBatch { inputs, targets, batch: 1, depth, height: rows, width: cols })
}

#[derive(Debug, Clone, Copy)]
struct CropWindow {
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Flips {
    horizontal: bool,
    vertical:   bool,
}

/// Append the `depth` noisy slices starting at `start` and the
/// matching clean center slice, cropped and flipped identically.
#[allow(clippy::too_many_arguments)]
fn gather_pair<S: PairedSlices + ?Sized>(
    source:      &S,
    start:       usize,
    depth:       usize,
    src_width:   usize,
    window:      CropWindow,
    flips:       Flips,
    inputs:      &mut Vec<f32>,
    targets:     &mut Vec<f32>,
) -> Result<(), DataError> {
    for channel in 0..depth {
        let slice = source.noisy(start + channel).ok_or(DataError::DepthTooLarge {
            depth,
            slices: source.slice_count(),
        })?;
        copy_window(slice, src_width, window, flips, inputs);
    }

    let center = source.clean(start + depth / 2).ok_or(DataError::DepthTooLarge {
        depth,
        slices: source.slice_count(),
    })?;
    copy_window(center, src_width, window, flips, targets);
    Ok(())
}

fn copy_window(src: &[f32], src_width: usize, window: CropWindow, flips: Flips, out: &mut Vec<f32>) {
    for r in 0..window.rows {
        let src_row = if flips.vertical { window.row0 + window.rows - 1 - r } else { window.row0 + r };
        let begin   = src_row * src_width + window.col0;
        let row     = &src[begin..begin + window.cols];
        if flips.horizontal {
            out.extend(row.iter().rev());
        } else {
            out.extend_from_slice(row);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::fixtures::paired;

    fn settings(batch_size: usize, depth: usize, crop_size: usize, augment: bool) -> SamplerSettings {
        SamplerSettings { batch_size, depth, crop_size, augment, seed: 7 }
    }

    #[test]
    fn test_batch_shapes_follow_settings() {
        let src = Arc::new(paired([5, 12, 10]));
        let mut s = BatchSampler::new(src, settings(4, 3, 8, true)).unwrap();
        let b = s.sample().unwrap();

        assert_eq!(b.input_shape(), [4, 3, 8, 8]);
        assert_eq!(b.target_shape(), [4, 1, 8, 8]);
        assert_eq!(b.inputs.len(), 4 * 3 * 64);
        assert_eq!(b.targets.len(), 4 * 64);
    }

    #[test]
    fn test_target_is_registered_with_center_input_slice() {
        // Fixture: clean = noisy + 0.5 at every voxel
        let src = Arc::new(paired([6, 9, 9]));
        for augment in [false, true] {
            let mut s = BatchSampler::new(src.clone(), settings(3, 3, 5, augment)).unwrap();
            for _ in 0..10 {
                let b = s.sample().unwrap();
                for i in 0..b.batch {
                    let center = b.input_plane(i, 1);
                    let target = b.target_plane(i);
                    for (x, y) in center.pixels.iter().zip(&target.pixels) {
                        assert!((y - x - 0.5).abs() < 1e-3);
                    }
                }
            }
        }
    }

    #[test]
    fn test_crop_larger_than_slice_fails() {
        let src = Arc::new(paired([3, 16, 12]));
        let err = BatchSampler::new(src.clone(), settings(1, 1, 13, false)).err().unwrap();
        assert!(matches!(err, DataError::CropTooLarge { crop: 13, height: 16, width: 12 }));

        // Exactly the smaller dimension is fine
        assert!(BatchSampler::new(src, settings(1, 1, 12, false)).is_ok());
    }

    #[test]
    fn test_depth_larger_than_stack_fails() {
        let src = Arc::new(paired([2, 8, 8]));
        let err = BatchSampler::new(src, settings(1, 3, 4, false)).err().unwrap();
        assert!(matches!(err, DataError::DepthTooLarge { depth: 3, slices: 2 }));
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let src = Arc::new(paired([2, 8, 8]));
        let err = BatchSampler::new(src, settings(0, 1, 4, false)).err().unwrap();
        assert!(matches!(err, DataError::InvalidSetting(_)));
    }

    #[test]
    fn test_same_seed_same_batches() {
        let src = Arc::new(paired([4, 10, 10]));
        let mut a = BatchSampler::new(src.clone(), settings(2, 1, 6, true)).unwrap();
        let mut b = BatchSampler::new(src, settings(2, 1, 6, true)).unwrap();
        for _ in 0..5 {
            assert_eq!(a.sample().unwrap(), b.sample().unwrap());
        }
    }

    #[test]
    fn test_sampling_never_runs_dry() {
        let src = Arc::new(paired([2, 4, 4]));
        let mut s = BatchSampler::new(src, settings(3, 1, 4, false)).unwrap();
        for _ in 0..200 {
            assert_eq!(s.sample().unwrap().batch, 3);
        }
    }

    #[test]
    fn test_full_frame_crop_keeps_everything() {
        let src = Arc::new(paired([1, 3, 3]));
        let mut s = BatchSampler::new(src.clone(), settings(1, 1, 3, false)).unwrap();
        let b = s.sample().unwrap();
        assert_eq!(b.inputs.as_slice(), src.noisy(0).unwrap());
    }

    #[test]
    fn test_evaluation_sample_center_crops_to_multiple() {
        let src = Arc::new(paired([5, 21, 18]));
        let b = evaluation_sample(src.as_ref(), 3, 8).unwrap();

        assert_eq!(b.input_shape(), [1, 3, 16, 16]);
        // stack starts at slice 2, so the target is clean slice 3
        let first = b.target_plane(0).pixels[0];
        let row0 = (21 - 16) / 2;
        let col0 = (18 - 16) / 2;
        let expected = src.clean(3).unwrap()[row0 * 18 + col0];
        assert_eq!(first, expected);
    }

    #[test]
    fn test_evaluation_sample_rejects_tiny_frames() {
        let src = Arc::new(paired([2, 4, 4]));
        assert!(matches!(
            evaluation_sample(src.as_ref(), 1, 8).unwrap_err(),
            DataError::CropTooLarge { .. }
        ));
    }
}
