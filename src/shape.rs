//! Analytic rasterization of rectangles, rounded rectangles and ellipses
use crate::{
    CombineOp, EPSILON, EllipseGeometry, MaskBufferMut, Point, Rect, Scalar,
    combine::{combine_value, combine_with},
    utils::clamp,
};

/// Radii smaller than this produce square corners
pub const RADIUS_EPSILON: Scalar = 1e-4;

/// Rounded rectangle description
///
/// Corner radii are clamped to half of the corresponding side, `rx = w / 2` and
/// `ry = h / 2` describes an ellipse inscribed into the rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeSpec {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rx: Scalar,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ry: Scalar,
    #[cfg_attr(feature = "serde", serde(default))]
    pub antialias: bool,
}

impl ShapeSpec {
    /// Rectangle with square corners
    pub fn rect(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            rx: 0.0,
            ry: 0.0,
            antialias: false,
        }
    }

    /// Ellipse inscribed into the rectangle
    pub fn ellipse(x: i32, y: i32, w: i32, h: i32, antialias: bool) -> Self {
        Self {
            x,
            y,
            w,
            h,
            rx: w as Scalar / 2.0,
            ry: h as Scalar / 2.0,
            antialias,
        }
    }

    pub fn with_radius(self, rx: Scalar, ry: Scalar) -> Self {
        Self { rx, ry, ..self }
    }

    pub fn with_antialias(self, antialias: bool) -> Self {
        Self { antialias, ..self }
    }

    /// Bounding rectangle of the shape
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// Combine solid rectangle into the buffer
///
/// Returns `false` if the rectangle does not intersect the buffer.
pub fn rect<B>(buffer: &mut B, op: CombineOp, x: i32, y: i32, w: i32, h: i32) -> bool
where
    B: MaskBufferMut + ?Sized,
{
    let Some(region) = Rect::new(x, y, w, h).intersect(buffer.extent()) else {
        tracing::trace!(x, y, w, h, "[rect] empty after clipping");
        return false;
    };
    if let Some(value) = op.solid_value() {
        combine_value(buffer, CombineOp::Replace, region, value);
    }
    true
}

/// Combine ellipse inscribed into the rectangle
pub fn ellipse<B>(
    buffer: &mut B,
    op: CombineOp,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    antialias: bool,
) -> bool
where
    B: MaskBufferMut + ?Sized,
{
    rounded_rect(buffer, op, ShapeSpec::ellipse(x, y, w, h, antialias))
}

/// Combine rounded rectangle into the buffer
///
/// Returns `false` if nothing was combined, either because the shape does not
/// intersect the buffer or because its radii are invalid (negative or NaN).
pub fn rounded_rect<B>(buffer: &mut B, op: CombineOp, shape: ShapeSpec) -> bool
where
    B: MaskBufferMut + ?Sized,
{
    let ShapeSpec {
        x,
        y,
        w,
        h,
        rx,
        ry,
        antialias,
    } = shape;
    if !(rx >= 0.0 && ry >= 0.0) {
        tracing::trace!(rx, ry, "[rounded_rect] invalid radius");
        return false;
    }
    let rx = rx.min(w as Scalar / 2.0);
    let ry = ry.min(h as Scalar / 2.0);
    if rx <= RADIUS_EPSILON || ry <= RADIUS_EPSILON {
        return rect(buffer, op, x, y, w, h);
    }
    let Some(geometry) = EllipseGeometry::new(rx, ry) else {
        return rect(buffer, op, x, y, w, h);
    };
    let Some(clip) = shape.bounds().intersect(buffer.extent()) else {
        tracing::trace!(?shape, "[rounded_rect] empty after clipping");
        return false;
    };
    let _span = tracing::debug_span!("[rounded_rect]", ?shape, ?op).entered();

    let corners = Corners {
        shape,
        geometry,
        rx,
        ry,
    };
    for py in clip.y..clip.y1() {
        let row = Rect::new(clip.x, py, clip.width, 1);
        let (v_near, v_far) = corners.vertical_offsets(py);
        if v_near - 0.5 >= ry {
            // straight band between top and bottom corners
            if let Some(value) = op.solid_value() {
                combine_value(buffer, CombineOp::Replace, row, value);
            }
            continue;
        }
        combine_with(buffer, op, row, |_, col| {
            let px = clip.x + col as i32;
            if antialias {
                corners.coverage_aa(px, v_near, v_far)
            } else {
                corners.coverage(px, v_near)
            }
        });
    }
    true
}

/// Geometry of the corner bands of a rounded rectangle
///
/// Pixels are addressed by the distances from their centers to the nearest (`near`)
/// and the opposite (`far`) sides of the bounding rectangle, which keeps the result
/// exactly mirror symmetric.
struct Corners {
    shape: ShapeSpec,
    geometry: EllipseGeometry,
    rx: Scalar,
    ry: Scalar,
}

impl Corners {
    /// Distances from the center of the pixel column to the left and right sides
    fn horizontal_offsets(&self, px: i32) -> (Scalar, Scalar) {
        let (x, w, px) = (self.shape.x as Scalar, self.shape.w as Scalar, px as Scalar);
        let left = px - x + 0.5;
        let right = x + w - px - 0.5;
        if left <= right {
            (left, right)
        } else {
            (right, left)
        }
    }

    /// Distances from the center of the pixel row to the top and bottom sides
    fn vertical_offsets(&self, py: i32) -> (Scalar, Scalar) {
        let (y, h, py) = (self.shape.y as Scalar, self.shape.h as Scalar, py as Scalar);
        let top = py - y + 0.5;
        let bottom = y + h - py - 0.5;
        if top <= bottom {
            (top, bottom)
        } else {
            (bottom, top)
        }
    }

    /// Hard edged coverage, pixel is inside if its center is inside
    fn coverage(&self, px: i32, v_near: Scalar) -> Scalar {
        let (u_near, u_far) = self.horizontal_offsets(px);
        let v = (self.ry - v_near).max(0.0);
        // distance from the side of the rectangle to the curve at this row
        let inset = self.rx - self.geometry.v_to_u(v);
        if u_near >= inset && u_far >= inset {
            1.0
        } else {
            0.0
        }
    }

    /// Antialiased coverage
    ///
    /// Nearest corner is evaluated with the ellipse distance approximation, opposite
    /// sides only matter for shapes thinner than a couple of pixels, where both sides
    /// cut the same pixel and their coverages are combined as `c0 + c1 - 1`.
    fn coverage_aa(&self, px: i32, v_near: Scalar, v_far: Scalar) -> Scalar {
        let (u_near, u_far) = self.horizontal_offsets(px);
        let u = (self.rx - u_near).max(0.0);
        let v = (self.ry - v_near).max(0.0);
        let inset_h = self.rx - self.geometry.v_to_u(v);
        let inset_v = self.ry - self.geometry.u_to_v(u);

        // on an axis the nearest boundary is the straight side itself, even when
        // the radius is smaller than the distance to that side
        let mut coverage = if u < EPSILON {
            edge_coverage(v_near)
        } else if v < EPSILON {
            edge_coverage(u_near)
        } else {
            self.geometry.coverage(Point::new(u, v))
        };
        coverage += edge_coverage(u_far - inset_h) - 1.0;
        coverage += edge_coverage(v_far - inset_v) - 1.0;
        // ellipse distance along an axis accounts for only one of the near sides
        if u < EPSILON {
            coverage += edge_coverage(u_near - inset_h) - 1.0;
        } else if v < EPSILON {
            coverage += edge_coverage(v_near - inset_v) - 1.0;
        }
        clamp(coverage, 0.0, 1.0)
    }
}

/// Coverage of the pixel by a straight edge `dist` pixels away from its center
#[inline]
fn edge_coverage(dist: Scalar) -> Scalar {
    clamp(0.5 + dist, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoverageBuffer, Image, ImageMut, MaskError, assert_approx_eq};
    use std::f64::consts::PI;

    fn coverage_sum(buffer: &CoverageBuffer<f32>) -> Scalar {
        buffer.iter().map(|value| *value as Scalar).sum()
    }

    #[test]
    fn test_rect_scenario() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<u8>::try_new(10, 10)?;
        assert!(rect(&mut buffer, CombineOp::Replace, 2, 2, 4, 4));
        for row in 0..10 {
            for col in 0..10 {
                let inside = (2..6).contains(&row) && (2..6).contains(&col);
                let expected = if inside { 255 } else { 0 };
                assert_eq!(buffer.get(row, col), Some(&expected), "({}, {})", col, row);
            }
        }

        assert!(rect(&mut buffer, CombineOp::Subtract, 3, 3, 2, 2));
        for row in 0..10 {
            for col in 0..10 {
                let ring = (2..6).contains(&row) && (2..6).contains(&col);
                let hole = (3..5).contains(&row) && (3..5).contains(&col);
                let expected = if ring && !hole { 255 } else { 0 };
                assert_eq!(buffer.get(row, col), Some(&expected), "({}, {})", col, row);
            }
        }
        Ok(())
    }

    #[test]
    fn test_rect_clipping() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(4, 4)?;
        assert!(!rect(&mut buffer, CombineOp::Add, 4, 0, 2, 2));
        assert!(!rect(&mut buffer, CombineOp::Add, 1, 1, 0, 2));
        assert!(!rect(&mut buffer, CombineOp::Add, 1, 1, -2, 2));
        assert_eq!(coverage_sum(&buffer), 0.0);

        assert!(rect(&mut buffer, CombineOp::Add, -2, -2, 4, 4));
        assert_eq!(coverage_sum(&buffer), 4.0);

        // full coverage intersect keeps the mask as is
        let before = buffer.clone().to_vec();
        assert!(rect(&mut buffer, CombineOp::Intersect, 0, 0, 3, 3));
        assert_eq!(buffer.to_vec(), before);
        Ok(())
    }

    #[test]
    fn test_zero_radius_matches_rect() -> Result<(), MaskError> {
        for op in CombineOp::ALL {
            let mut expected = CoverageBuffer::<u8>::try_new(8, 8)?;
            rect(&mut expected, CombineOp::Replace, 1, 1, 5, 5);
            let mut result = expected.clone();

            rect(&mut expected, op, 3, 2, 6, 3);
            let shape = ShapeSpec::rect(3, 2, 6, 3).with_antialias(true);
            assert!(rounded_rect(&mut result, op, shape));
            assert_eq!(result.to_vec(), expected.to_vec(), "{:?}", op);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_radius() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<u8>::try_new(4, 4)?;
        let shape = ShapeSpec::rect(0, 0, 4, 4).with_radius(-1.0, 2.0);
        assert!(!rounded_rect(&mut buffer, CombineOp::Add, shape));
        let shape = ShapeSpec::rect(0, 0, 4, 4).with_radius(Scalar::NAN, 2.0);
        assert!(!rounded_rect(&mut buffer, CombineOp::Add, shape));
        assert!(buffer.iter().all(|value| *value == 0));
        Ok(())
    }

    #[test]
    fn test_ellipse_symmetry() -> Result<(), MaskError> {
        for antialias in [true, false] {
            for (w, h) in [(9, 7), (10, 6), (12, 12), (1, 6), (5, 2)] {
                let mut buffer = CoverageBuffer::<f32>::try_new(w as usize, h as usize)?;
                assert!(ellipse(&mut buffer, CombineOp::Replace, 0, 0, w, h, antialias));
                let (w, h) = (w as usize, h as usize);
                for row in 0..h {
                    for col in 0..w {
                        let value = buffer.get(row, col);
                        assert_eq!(value, buffer.get(row, w - 1 - col));
                        assert_eq!(value, buffer.get(h - 1 - row, col));
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_ellipse_antialias_area() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(24, 24)?;
        assert!(ellipse(&mut buffer, CombineOp::Replace, 2, 2, 20, 20, true));
        assert_approx_eq!(coverage_sum(&buffer), PI * 100.0, 2.0);
        assert_eq!(buffer.get(12, 12), Some(&1.0));
        assert_eq!(buffer.get(2, 2), Some(&0.0));
        assert_eq!(buffer.get(0, 12), Some(&0.0));
        // boundary pixels are partially covered
        let edge = *buffer.get(12, 2).unwrap();
        assert!(edge > 0.5 && edge <= 1.0, "{}", edge);
        let diagonal = *buffer.get(4, 4).unwrap();
        assert!(diagonal > 0.0 && diagonal < 1.0, "{}", diagonal);

        let mut buffer = CoverageBuffer::<f32>::try_new(30, 12)?;
        assert!(ellipse(&mut buffer, CombineOp::Replace, 0, 0, 30, 12, true));
        assert_approx_eq!(coverage_sum(&buffer), PI * 15.0 * 6.0, 2.0);
        Ok(())
    }

    #[test]
    fn test_thin_ellipse() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(1, 6)?;
        assert!(ellipse(&mut buffer, CombineOp::Replace, 0, 0, 1, 6, true));
        assert!(buffer.iter().all(|value| *value > 0.0 && *value <= 1.0));
        assert_approx_eq!(coverage_sum(&buffer), PI * 0.5 * 3.0, 0.3);
        Ok(())
    }

    #[test]
    fn test_ellipse_hard_edges() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<u8>::try_new(4, 4)?;
        assert!(ellipse(&mut buffer, CombineOp::Replace, 0, 0, 4, 4, false));
        #[rustfmt::skip]
        let expected = vec![
            0, 255, 255, 0,
            255, 255, 255, 255,
            255, 255, 255, 255,
            0, 255, 255, 0,
        ];
        assert_eq!(buffer.to_vec(), expected);
        Ok(())
    }

    #[test]
    fn test_rounded_rect_edges() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(20, 10)?;
        let shape = ShapeSpec::rect(0, 0, 20, 10)
            .with_radius(3.0, 3.0)
            .with_antialias(true);
        assert!(rounded_rect(&mut buffer, CombineOp::Replace, shape));
        // straight parts are pixel aligned
        for col in 3..17 {
            assert_eq!(buffer.get(0, col), Some(&1.0), "top {}", col);
            assert_eq!(buffer.get(9, col), Some(&1.0), "bottom {}", col);
        }
        for row in 3..7 {
            assert!((0..20).all(|col| buffer.get(row, col) == Some(&1.0)));
        }
        let corner = *buffer.get(0, 0).unwrap();
        assert!(corner < 0.5, "{}", corner);
        Ok(())
    }

    #[test]
    fn test_subpixel_radius() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(8, 4)?;
        let shape = ShapeSpec::rect(0, 0, 8, 4)
            .with_radius(0.3, 0.3)
            .with_antialias(true);
        assert!(rounded_rect(&mut buffer, CombineOp::Replace, shape));
        assert!(buffer.iter().all(|value| *value == 1.0));

        // area changes continuously as the radius leaves the square corner fallback
        for radius in [2.0 * RADIUS_EPSILON, 0.3, 0.45] {
            let mut buffer = CoverageBuffer::<f32>::try_new(20, 10)?;
            let shape = ShapeSpec::rect(0, 0, 20, 10)
                .with_radius(radius, radius)
                .with_antialias(true);
            assert!(rounded_rect(&mut buffer, CombineOp::Replace, shape));
            let area = 200.0 - (4.0 - PI) * radius * radius;
            assert_approx_eq!(coverage_sum(&buffer), area, 0.25);
        }
        Ok(())
    }

    #[test]
    fn test_extreme_coordinates() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(4, 4)?;
        assert!(!rect(&mut buffer, CombineOp::Add, i32::MAX - 1, 0, 4, 4));
        assert!(!rect(&mut buffer, CombineOp::Add, 0, i32::MIN, 4, 4));
        let shape = ShapeSpec::ellipse(i32::MAX - 2, i32::MAX - 2, 10, 10, true);
        assert!(!rounded_rect(&mut buffer, CombineOp::Add, shape));
        assert_eq!(coverage_sum(&buffer), 0.0);

        for antialias in [true, false] {
            let mut buffer = CoverageBuffer::<f32>::try_new(4, 4)?;
            let shape = ShapeSpec::rect(-(1 << 30), 0, i32::MAX, 4)
                .with_radius(2.0, 2.0)
                .with_antialias(antialias);
            assert!(rounded_rect(&mut buffer, CombineOp::Replace, shape));
            assert!(buffer.iter().all(|value| *value == 1.0));
        }
        Ok(())
    }

    #[test]
    fn test_replace_idempotent() -> Result<(), MaskError> {
        let shape = ShapeSpec::ellipse(1, 2, 13, 9, true);
        let mut once = CoverageBuffer::<u8>::try_new(16, 16)?;
        rounded_rect(&mut once, CombineOp::Replace, shape);
        let mut twice = once.clone();
        rounded_rect(&mut twice, CombineOp::Replace, shape);
        assert_eq!(once.to_vec(), twice.to_vec());
        Ok(())
    }

    #[test]
    fn test_subtract_and_intersect() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(12, 12)?;
        buffer.fill(1.0);
        assert!(ellipse(&mut buffer, CombineOp::Subtract, 0, 0, 12, 12, true));
        assert_eq!(buffer.get(6, 6), Some(&0.0));
        assert_eq!(buffer.get(0, 0), Some(&1.0));

        let mut buffer = CoverageBuffer::<f32>::try_new(12, 12)?;
        buffer.fill(0.5);
        assert!(ellipse(&mut buffer, CombineOp::Intersect, 0, 0, 8, 8, false));
        assert_eq!(buffer.get(4, 4), Some(&0.5));
        // outside of the curve but inside the bounds
        assert_eq!(buffer.get(0, 0), Some(&0.0));
        // outside of the bounds
        assert_eq!(buffer.get(10, 10), Some(&0.5));
        Ok(())
    }

    #[test]
    fn test_clipped_rounded_rect() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(8, 8)?;
        let shape = ShapeSpec::ellipse(4, 4, 8, 8, true);
        assert!(rounded_rect(&mut buffer, CombineOp::Add, shape));
        assert_eq!(buffer.get(7, 7), Some(&1.0));
        assert_eq!(buffer.get(0, 0), Some(&0.0));
        assert!(!rounded_rect(&mut buffer, CombineOp::Add, ShapeSpec::ellipse(8, 0, 4, 4, true)));
        Ok(())
    }
}
