//! SliceIO Engine - segmentation seam and artifact rendering
//!
//! The segmentation model is an external collaborator behind
//! [`SegmentationEngine`]: a slice goes in, a binary mask comes out.
//! Everything downstream of the mask — contour tracing and PNG rendering —
//! lives here and is deterministic, so repeated renders of the same slice
//! produce byte-identical artifacts.

mod contour;
mod engine;
mod render;

pub use contour::{ContourSet, trace_contours};
pub use engine::{EngineError, SegmentationEngine, SliceMask, ThresholdEngine};
pub use render::{RenderError, render_overlay, render_slice};
