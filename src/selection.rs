//! Selection channel
use crate::{
    Accumulate, CombineOp, Coverage, CoverageBuffer, Image, ImageMut, MaskBuffer, MaskError,
    Point, PolygonScanConverter, Rect, Scalar, ShapeSpec,
    combine::{self, combine_value, update_view},
    shape,
};

/// Default oversampling factor used for antialiased polygons
pub const DEFAULT_ANTIALIAS: usize = 4;

/// Persistent selection mask
///
/// Unlike the raw rasterization functions, which only touch pixels covered by the new
/// shape, selection operations follow channel semantics: `Replace` drops the previous
/// selection completely and `Intersect` drops everything outside of the new shape.
#[derive(Debug, Clone)]
pub struct Selection<P = u8> {
    mask: CoverageBuffer<P>,
}

impl<P: Coverage> Selection<P> {
    /// Create empty selection
    pub fn new(width: usize, height: usize) -> Result<Self, MaskError> {
        Ok(Self {
            mask: CoverageBuffer::<P>::try_new(width, height)?,
        })
    }

    pub fn from_mask(mask: CoverageBuffer<P>) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> &CoverageBuffer<P> {
        &self.mask
    }

    pub fn mask_mut(&mut self) -> &mut CoverageBuffer<P> {
        &mut self.mask
    }

    pub fn into_mask(self) -> CoverageBuffer<P> {
        self.mask
    }

    pub fn width(&self) -> usize {
        self.mask.width()
    }

    pub fn height(&self) -> usize {
        self.mask.height()
    }

    /// Coverage at the pixel, zero outside of the selection
    pub fn value(&self, x: i32, y: i32) -> Scalar {
        if x < 0 || y < 0 {
            return 0.0;
        }
        self.mask
            .get(y as usize, x as usize)
            .map_or(0.0, |value| value.to_scalar())
    }

    /// Deselect everything
    pub fn clear(&mut self) {
        self.mask.fill(P::ZERO);
    }

    /// Select everything
    pub fn fill(&mut self) {
        self.mask.fill(P::ONE);
    }

    pub fn invert(&mut self) {
        update_view(&mut self.mask.as_mut(), |_, _, value| 1.0 - value);
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|value| *value == P::ZERO)
    }

    /// Smallest rectangle containing all partially selected pixels
    pub fn bounds(&self) -> Option<Rect> {
        let shape = self.mask.shape();
        let data = self.mask.data();
        let mut bounds: Option<Rect> = None;
        for row in 0..shape.height {
            let selected = |col: &usize| data[shape.offset(row, *col)] != P::ZERO;
            let Some(first) = (0..shape.width).find(selected) else {
                continue;
            };
            let last = (0..shape.width).rfind(selected).unwrap_or(first);
            let span = Rect::new(first as i32, row as i32, (last - first + 1) as i32, 1);
            bounds = Some(bounds.map_or(span, |bounds| bounds.union(span)));
        }
        bounds
    }

    /// Apply channel semantics of the operation for a contribution inside `bounds`,
    /// and return the operation to be used by the contribution itself
    fn prepare(&mut self, op: CombineOp, bounds: Rect) -> CombineOp {
        match op {
            CombineOp::Replace => {
                self.clear();
                CombineOp::Add
            }
            CombineOp::Intersect => {
                self.clear_outside(bounds);
                CombineOp::Intersect
            }
            CombineOp::Add | CombineOp::Subtract => op,
        }
    }

    fn clear_outside(&mut self, keep: Rect) {
        let extent = self.mask.extent();
        let Some(keep) = keep.intersect(extent) else {
            self.clear();
            return;
        };
        let bands = [
            Rect::from_corners(extent.x, extent.y, extent.x1(), keep.y),
            Rect::from_corners(extent.x, keep.y1(), extent.x1(), extent.y1()),
            Rect::from_corners(extent.x, keep.y, keep.x, keep.y1()),
            Rect::from_corners(keep.x1(), keep.y, extent.x1(), keep.y1()),
        ];
        for band in bands {
            combine_value(&mut self.mask, CombineOp::Replace, band, 0.0);
        }
    }

    pub fn combine_rect(&mut self, op: CombineOp, x: i32, y: i32, w: i32, h: i32) -> bool {
        let op = self.prepare(op, Rect::new(x, y, w, h));
        shape::rect(&mut self.mask, op, x, y, w, h)
    }

    pub fn combine_rounded_rect(&mut self, op: CombineOp, shape: ShapeSpec) -> bool {
        let op = self.prepare(op, shape.bounds());
        shape::rounded_rect(&mut self.mask, op, shape)
    }

    pub fn combine_ellipse(
        &mut self,
        op: CombineOp,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        antialias: bool,
    ) -> bool {
        self.combine_rounded_rect(op, ShapeSpec::ellipse(x, y, w, h, antialias))
    }

    /// Combine closed polygon rasterized with `antialias` sub-samples per axis
    pub fn combine_polygon(
        &mut self,
        op: CombineOp,
        points: &[Point],
        antialias: usize,
    ) -> Result<bool, MaskError> {
        let mut converter = PolygonScanConverter::new(self.width(), self.height(), antialias)?;
        converter.add_points(points);
        let extent = self.mask.extent();
        let op = self.prepare(op, extent);
        converter.bake_combine(&mut self.mask, op)
    }

    /// Combine secondary mask placed at `(off_x, off_y)`
    pub fn combine_mask<S>(&mut self, op: CombineOp, source: &S, off_x: i32, off_y: i32) -> bool
    where
        S: Image + ?Sized,
        S::Pixel: Coverage,
    {
        let bounds = source.shape().rect().translate(off_x, off_y);
        let op = self.prepare(op, bounds);
        combine::combine_mask(&mut self.mask, op, source, off_x, off_y)
    }

    /// Partially accumulate secondary mask placed at `(off_x, off_y)`
    pub fn accumulate_mask<S>(
        &mut self,
        mode: Accumulate,
        source: &S,
        off_x: i32,
        off_y: i32,
        opacity: Scalar,
    ) -> bool
    where
        S: Image + ?Sized,
        S::Pixel: Coverage,
    {
        combine::accumulate_mask(&mut self.mask, mode, source, off_x, off_y, opacity)
    }
}
