//! Segmentation engine seam.

use sliceio_volume::Slice;
use thiserror::Error;

/// Error type for segmentation failures
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("slice has no voxel data")]
    EmptySlice,

    #[error("model error: {0}")]
    Model(String),
}

/// Binary segmentation mask over one slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceMask {
    pub width: u32,
    pub height: u32,
    data: Vec<bool>,
}

impl SliceMask {
    /// Build a mask; panics in debug builds if the buffer length is wrong.
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Whether the voxel at `(x, y)` is inside the segmented region.
    /// Out-of-bounds reads as background.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Number of foreground voxels.
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }
}

/// The segmentation model: slice in, binary mask out.
///
/// Implementations must be pure — the same slice always yields the same
/// mask — and safe to call from many request tasks concurrently.
pub trait SegmentationEngine: Send + Sync {
    fn segment(&self, slice: &Slice) -> Result<SliceMask, EngineError>;
}

/// Deterministic intensity-threshold engine.
///
/// Stands in behind the seam where a real model is not wired up
/// (development, tests). Marks every voxel above the threshold as
/// foreground.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdEngine {
    pub threshold: f32,
}

impl Default for ThresholdEngine {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl SegmentationEngine for ThresholdEngine {
    fn segment(&self, slice: &Slice) -> Result<SliceMask, EngineError> {
        if slice.data.is_empty() {
            return Err(EngineError::EmptySlice);
        }
        let data = slice.data.iter().map(|&v| v > self.threshold).collect();
        Ok(SliceMask::new(slice.width, slice.height, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_engine_is_deterministic() {
        let slice = Slice {
            width: 2,
            height: 2,
            data: vec![0.1, 0.9, 0.6, 0.4],
        };
        let engine = ThresholdEngine::default();
        let a = engine.segment(&slice).unwrap();
        let b = engine.segment(&slice).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.foreground_count(), 2);
        assert!(a.get(1, 0));
        assert!(!a.get(0, 0));
    }

    #[test]
    fn test_empty_slice_is_rejected() {
        let slice = Slice {
            width: 0,
            height: 0,
            data: vec![],
        };
        assert!(matches!(
            ThresholdEngine::default().segment(&slice),
            Err(EngineError::EmptySlice)
        ));
    }

    #[test]
    fn test_mask_out_of_bounds_is_background() {
        let mask = SliceMask::new(1, 1, vec![true]);
        assert!(mask.get(0, 0));
        assert!(!mask.get(-1, 0));
        assert!(!mask.get(0, 1));
    }
}
