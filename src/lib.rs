//! Selection mask rasterization and combination.
//!
//! Main features:
//!  - Scanline polygon conversion with oversampling
//!  - Analytic anti-aliased rounded rectangles and ellipses
//!  - Replace/Add/Subtract/Intersect combination of coverage masks
//!  - Stipple and ratchet partial accumulation
//!
mod combine;
mod ellipse;
mod error;
mod geometry;
mod image;
mod scan;
#[cfg(feature = "serde")]
mod script;
mod selection;
mod shape;
mod utils;

pub use combine::{
    Accumulate, CombineOp, accumulate_mask, combine_mask, combine_value, combine_values,
};
pub use ellipse::EllipseGeometry;
pub use error::MaskError;
pub use geometry::{EPSILON, Point, Rect, Scalar, scalar_fmt};
pub use image::{
    Coverage, CoverageBuffer, Format, Image, ImageIter, ImageMut, ImageMutRef,
    ImageOwned, ImageRef, MaskBuffer, MaskBufferMut, SampleFormat, Shape,
};
pub use scan::{PolygonScanConverter, ScanlineEdges};
#[cfg(feature = "serde")]
pub use script::{Operation, Script};
pub use selection::{DEFAULT_ANTIALIAS, Selection};
pub use shape::{RADIUS_EPSILON, ShapeSpec, ellipse, rect, rounded_rect};
