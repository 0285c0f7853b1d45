// ============================================================
// Layer 3 — MiniBatch Domain Type
// ============================================================
// A mini-batch pair lives in host memory between the background
// producer and the training thread. Tensors are only built from
// it on the training thread, so it must stay Send and framework
// free.
//
// Layout is channel-first:
//   inputs  — [batch, depth, height, width]
//   targets — [batch, 1,     height, width]

/// A single 2-D image in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlane {
    pub width:  usize,
    pub height: usize,
    pub pixels: Vec<f32>,
}

impl ImagePlane {
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Self {
        debug_assert_eq!(pixels.len(), width * height);
        Self { width, height, pixels }
    }

    /// Smallest and largest pixel value, or None for an empty plane.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let mut iter = self.pixels.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Mean squared difference to another plane of the same size.
    pub fn mse(&self, other: &ImagePlane) -> Option<f64> {
        if self.width != other.width || self.height != other.height || self.pixels.is_empty() {
            return None;
        }
        let sum: f64 = self
            .pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| {
                let d = (*a - *b) as f64;
                d * d
            })
            .sum();
        Some(sum / self.pixels.len() as f64)
    }
}

/// One (X, Y) training pair. X and Y are spatially co-registered
/// crops of the same underlying sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatch {
    /// Noisy input stack — [batch, depth, height, width]
    pub inputs:  Vec<f32>,
    /// Clean target — [batch, 1, height, width]
    pub targets: Vec<f32>,
    pub batch:   usize,
    pub depth:   usize,
    pub height:  usize,
    pub width:   usize,
}

impl MiniBatch {
    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch, self.depth, self.height, self.width]
    }

    pub fn target_shape(&self) -> [usize; 4] {
        [self.batch, 1, self.height, self.width]
    }

    fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Channel `channel` of input sample `sample`.
    pub fn input_plane(&self, sample: usize, channel: usize) -> ImagePlane {
        let len   = self.plane_len();
        let start = (sample * self.depth + channel) * len;
        ImagePlane::new(self.width, self.height, self.inputs[start..start + len].to_vec())
    }

    /// The single-channel target of sample `sample`.
    pub fn target_plane(&self, sample: usize) -> ImagePlane {
        let len   = self.plane_len();
        let start = sample * len;
        ImagePlane::new(self.width, self.height, self.targets[start..start + len].to_vec())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn batch_2x2() -> MiniBatch {
        // 2 samples, depth 2, 1x2 planes
        MiniBatch {
            inputs:  vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            targets: vec![10.0, 20.0, 30.0, 40.0],
            batch:   2,
            depth:   2,
            height:  1,
            width:   2,
        }
    }

    #[test]
    fn test_shapes_share_batch_and_spatial_dims() {
        let b = batch_2x2();
        assert_eq!(b.input_shape(), [2, 2, 1, 2]);
        assert_eq!(b.target_shape(), [2, 1, 1, 2]);
    }

    #[test]
    fn test_plane_extraction() {
        let b = batch_2x2();
        assert_eq!(b.input_plane(1, 0).pixels, vec![5.0, 6.0]);
        assert_eq!(b.input_plane(0, 1).pixels, vec![3.0, 4.0]);
        assert_eq!(b.target_plane(1).pixels, vec![30.0, 40.0]);
    }

    #[test]
    fn test_value_range() {
        let p = ImagePlane::new(3, 1, vec![0.5, -2.0, 4.0]);
        assert_eq!(p.value_range(), Some((-2.0, 4.0)));
        assert_eq!(ImagePlane::new(0, 0, vec![]).value_range(), None);
    }

    #[test]
    fn test_plane_mse() {
        let a = ImagePlane::new(2, 1, vec![0.0, 1.0]);
        let b = ImagePlane::new(2, 1, vec![2.0, 1.0]);
        assert_eq!(a.mse(&b), Some(2.0));
        assert_eq!(a.mse(&ImagePlane::new(1, 2, vec![0.0, 1.0])), None);
    }
}
