//! Combination of new coverage with an existing mask
use crate::{
    Coverage, Image, ImageMut, ImageMutRef, MaskBuffer, MaskBufferMut, MaskError, Rect, Scalar,
    utils::clamp,
};
use std::fmt;

/// Set-like operation merging new coverage `n` into the mask value `m`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CombineOp {
    /// `m' = n`
    #[default]
    Replace,
    /// `m' = min(m + n, 1)`
    Add,
    /// `m' = max(m - n, 0)`
    Subtract,
    /// `m' = min(m, n)`
    Intersect,
}

impl fmt::Debug for CombineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CombineOp::Replace => "replace",
            CombineOp::Add => "add",
            CombineOp::Subtract => "subtract",
            CombineOp::Intersect => "intersect",
        };
        f.write_str(name)
    }
}

impl CombineOp {
    pub const ALL: [CombineOp; 4] = [
        CombineOp::Replace,
        CombineOp::Add,
        CombineOp::Subtract,
        CombineOp::Intersect,
    ];

    /// Combine mask value with new coverage
    #[inline]
    pub fn apply(self, mask: Scalar, value: Scalar) -> Scalar {
        match self {
            CombineOp::Replace => value,
            CombineOp::Add => (mask + value).min(1.0),
            CombineOp::Subtract => (mask - value).max(0.0),
            CombineOp::Intersect => mask.min(value),
        }
    }

    /// Value written by a fully covering shape, `None` if such shape does not change the mask
    pub fn solid_value(self) -> Option<Scalar> {
        match self {
            CombineOp::Replace | CombineOp::Add => Some(1.0),
            CombineOp::Subtract => Some(0.0),
            CombineOp::Intersect => None,
        }
    }
}

/// Partial accumulation used by tools applied repeatedly over the same area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Accumulate {
    /// `m' = m + (1 - m) * n * opacity`, approaches full coverage
    Stipple,
    /// Raises the mask towards `opacity` but never above it
    ///
    /// `m' = m + (opacity - m) * n * opacity` if `opacity > m`, otherwise `m' = m`.
    /// Opacity is used both as a blend factor and as the ceiling.
    Ratchet,
}

impl Accumulate {
    #[inline]
    pub fn apply(self, mask: Scalar, value: Scalar, opacity: Scalar) -> Scalar {
        match self {
            Accumulate::Stipple => mask + (1.0 - mask) * value * opacity,
            Accumulate::Ratchet => {
                if opacity > mask {
                    mask + (opacity - mask) * value * opacity
                } else {
                    mask
                }
            }
        }
    }
}

/// Replace every value of the view with `f(row, col, value)`
pub(crate) fn update_view<P, F>(view: &mut ImageMutRef<'_, P>, mut f: F)
where
    P: Coverage,
    F: FnMut(usize, usize, Scalar) -> Scalar,
{
    let shape = view.shape();
    let data = view.data_mut();
    for row in 0..shape.height {
        for col in 0..shape.width {
            let pixel = &mut data[shape.offset(row, col)];
            *pixel = P::from_scalar(f(row, col, pixel.to_scalar()));
        }
    }
}

/// Combine single coverage value over the whole region
///
/// Returns `false` if region does not intersect the buffer.
pub fn combine_value<B>(buffer: &mut B, op: CombineOp, rect: Rect, value: Scalar) -> bool
where
    B: MaskBufferMut + ?Sized,
{
    let Some(mut view) = buffer.read_write_rect(rect) else {
        tracing::trace!(?rect, "[combine_value] empty region");
        return false;
    };
    match op {
        CombineOp::Replace => view.fill(<B::Sample as Coverage>::from_scalar(value)),
        _ => update_view(&mut view, |_, _, mask| op.apply(mask, value)),
    }
    true
}

/// Combine row-major coverage values covering `rect` into the buffer
///
/// Parts of the region outside of the buffer are ignored.
pub fn combine_values<B>(
    buffer: &mut B,
    op: CombineOp,
    rect: Rect,
    values: &[Scalar],
) -> Result<bool, MaskError>
where
    B: MaskBufferMut + ?Sized,
{
    if values.len() != rect.area() {
        return Err(MaskError::DataSize {
            expected: rect.area(),
            actual: values.len(),
        });
    }
    let Some(clip) = rect.intersect(buffer.extent()) else {
        return Ok(false);
    };
    let stride = rect.width as usize;
    let dx = clip.x.abs_diff(rect.x) as usize;
    let dy = clip.y.abs_diff(rect.y) as usize;
    Ok(combine_with(buffer, op, clip, |row, col| {
        values[(row + dy) * stride + col + dx]
    }))
}

/// Combine `coverage(row, col)` into every pixel of the region
///
/// `row` and `col` are relative to the region clipped by the buffer.
pub(crate) fn combine_with<B, F>(buffer: &mut B, op: CombineOp, region: Rect, mut coverage: F) -> bool
where
    B: MaskBufferMut + ?Sized,
    F: FnMut(usize, usize) -> Scalar,
{
    let Some(mut view) = buffer.read_write_rect(region) else {
        return false;
    };
    update_view(&mut view, |row, col, mask| op.apply(mask, coverage(row, col)));
    true
}

/// Region of the `buffer` affected by the `source` translated by `(off_x, off_y)`,
/// together with the same region in source coordinates
fn overlap<B, S>(buffer: &B, source: &S, off_x: i32, off_y: i32) -> Option<(Rect, Rect)>
where
    B: MaskBuffer + ?Sized,
    S: Image + ?Sized,
{
    let region = source
        .shape()
        .rect()
        .translate(off_x, off_y)
        .intersect(buffer.extent())?;
    // both corners of a non-empty overlap lie inside the source
    let src = Rect::new(region.x - off_x, region.y - off_y, region.width, region.height);
    Some((region, src))
}

/// Combine secondary buffer into the buffer
///
/// Source pixel `(x, y)` is combined with the buffer pixel `(x + off_x, y + off_y)`,
/// buffer pixels not covered by the translated source are left untouched.
/// Returns `false` if buffers do not overlap.
pub fn combine_mask<B, S>(buffer: &mut B, op: CombineOp, source: &S, off_x: i32, off_y: i32) -> bool
where
    B: MaskBufferMut + ?Sized,
    S: Image + ?Sized,
    S::Pixel: Coverage,
{
    let Some((region, src_region)) = overlap(buffer, source, off_x, off_y) else {
        tracing::trace!(off_x, off_y, "[combine_mask] buffers do not overlap");
        return false;
    };
    let Some(src) = source.view(src_region) else {
        return false;
    };
    let Some(mut dst) = buffer.read_write_rect(region) else {
        return false;
    };
    let quantized = <B::Sample as Coverage>::FORMAT.is_quantized()
        || <S::Pixel as Coverage>::FORMAT.is_quantized();
    if op == CombineOp::Replace && quantized {
        copy_view(&mut dst, &src);
        return true;
    }
    let src_shape = src.shape();
    let src_data = src.data();
    update_view(&mut dst, |row, col, mask| {
        op.apply(mask, src_data[src_shape.offset(row, col)].to_scalar())
    });
    true
}

/// Accumulate secondary buffer into the buffer with the provided opacity
///
/// Positioning rules are the same as in [`combine_mask`].
pub fn accumulate_mask<B, S>(
    buffer: &mut B,
    mode: Accumulate,
    source: &S,
    off_x: i32,
    off_y: i32,
    opacity: Scalar,
) -> bool
where
    B: MaskBufferMut + ?Sized,
    S: Image + ?Sized,
    S::Pixel: Coverage,
{
    let opacity = clamp(opacity, 0.0, 1.0);
    let Some((region, src_region)) = overlap(buffer, source, off_x, off_y) else {
        return false;
    };
    let Some(src) = source.view(src_region) else {
        return false;
    };
    let Some(mut dst) = buffer.read_write_rect(region) else {
        return false;
    };
    let src_shape = src.shape();
    let src_data = src.data();
    update_view(&mut dst, |row, col, mask| {
        let value = src_data[src_shape.offset(row, col)].to_scalar();
        mode.apply(mask, value, opacity)
    });
    true
}

/// Copy samples of the same sized views without combining
fn copy_view<D, S>(dst: &mut ImageMutRef<'_, D>, src: &impl Image<Pixel = S>)
where
    D: Coverage,
    S: Coverage,
{
    let dst_shape = dst.shape();
    let src_shape = src.shape();
    let src_data = src.data();
    let dst_data = dst.data_mut();
    let contiguous = dst_shape.col_stride == 1 && src_shape.col_stride == 1;
    for row in 0..dst_shape.height {
        if D::FORMAT == S::FORMAT && contiguous {
            let width = dst_shape.width;
            let src_start = src_shape.offset(row, 0);
            let dst_start = dst_shape.offset(row, 0);
            let src_row: &[u8] = bytemuck::cast_slice(&src_data[src_start..src_start + width]);
            let dst_row: &mut [u8] =
                bytemuck::cast_slice_mut(&mut dst_data[dst_start..dst_start + width]);
            dst_row.copy_from_slice(src_row);
        } else {
            for col in 0..dst_shape.width {
                let value = src_data[src_shape.offset(row, col)].to_scalar();
                dst_data[dst_shape.offset(row, col)] = D::from_scalar(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoverageBuffer, assert_approx_eq};

    const SAMPLES: [Scalar; 6] = [0.0, 0.1, 0.25, 0.5, 0.9, 1.0];

    #[test]
    fn test_combine_formulas() {
        assert_approx_eq!(CombineOp::Replace.apply(0.3, 0.6), 0.6);
        assert_approx_eq!(CombineOp::Add.apply(0.3, 0.6), 0.9);
        assert_approx_eq!(CombineOp::Add.apply(0.7, 0.6), 1.0);
        assert_approx_eq!(CombineOp::Subtract.apply(0.3, 0.6), 0.0);
        assert_approx_eq!(CombineOp::Subtract.apply(0.9, 0.6), 0.3, 1e-12);
        assert_approx_eq!(CombineOp::Intersect.apply(0.3, 0.6), 0.3);
    }

    #[test]
    fn test_combine_algebra() {
        for a in SAMPLES {
            for b in SAMPLES {
                let ab = CombineOp::Intersect.apply(a, b);
                assert_eq!(CombineOp::Intersect.apply(ab, b), ab);
            }
            assert_eq!(CombineOp::Subtract.apply(a, 0.0), a);
            assert_eq!(CombineOp::Add.apply(a, 0.0), a);
            assert_eq!(CombineOp::Intersect.apply(a, 1.0), a);
        }
        // saturation makes add followed by subtract lossy
        let a = CombineOp::Add.apply(0.75, 0.5);
        assert_eq!(CombineOp::Subtract.apply(a, 0.5), 0.5);
    }

    #[test]
    fn test_accumulate_stipple() {
        let mut mask = 0.0;
        let mut prev = mask;
        for _ in 0..20 {
            mask = Accumulate::Stipple.apply(mask, 1.0, 0.3);
            assert!(mask > prev && mask <= 1.0);
            prev = mask;
        }
        assert!(mask > 0.99);
        assert_approx_eq!(Accumulate::Stipple.apply(0.5, 0.5, 0.5), 0.625);
    }

    #[test]
    fn test_accumulate_ratchet_quirk() {
        // opacity acts as both the ceiling and the blend factor: a single full
        // coverage pass at opacity 0.5 only reaches 0.25, not 0.5
        assert_approx_eq!(Accumulate::Ratchet.apply(0.0, 1.0, 0.5), 0.25);
        assert_approx_eq!(Accumulate::Ratchet.apply(0.25, 1.0, 0.5), 0.375);
        // never raised above the ceiling, never lowered either
        assert_eq!(Accumulate::Ratchet.apply(0.5, 1.0, 0.5), 0.5);
        assert_eq!(Accumulate::Ratchet.apply(0.8, 1.0, 0.5), 0.8);
        let mut mask = 0.0;
        for _ in 0..100 {
            mask = Accumulate::Ratchet.apply(mask, 1.0, 0.7);
            assert!(mask <= 0.7);
        }
        assert_approx_eq!(mask, 0.7, 1e-6);
    }

    #[test]
    fn test_combine_value() {
        let mut buffer = CoverageBuffer::<f32>::try_new(4, 4).unwrap();
        assert!(combine_value(&mut buffer, CombineOp::Add, Rect::new(1, 1, 10, 1), 0.5));
        assert!(combine_value(&mut buffer, CombineOp::Add, Rect::new(2, 0, 1, 4), 0.75));
        assert_eq!(buffer.get(1, 1), Some(&0.5));
        assert_eq!(buffer.get(1, 2), Some(&1.0));
        assert_eq!(buffer.get(0, 2), Some(&0.75));
        assert_eq!(buffer.get(0, 0), Some(&0.0));
        assert!(!combine_value(&mut buffer, CombineOp::Add, Rect::new(4, 0, 3, 3), 1.0));
    }

    #[test]
    fn test_combine_values() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(3, 2)?;
        buffer.fill(0.5);
        let values = [1.0, 0.25, 0.0, 0.75];
        assert!(combine_values(
            &mut buffer,
            CombineOp::Intersect,
            Rect::new(-1, 0, 2, 2),
            &values
        )?);
        assert_eq!(buffer.get(0, 0), Some(&0.25));
        assert_eq!(buffer.get(1, 0), Some(&0.5));
        assert_eq!(buffer.get(0, 1), Some(&0.5));
        assert!(!combine_values(
            &mut buffer,
            CombineOp::Add,
            Rect::new(5, 5, 2, 2),
            &values
        )?);
        assert!(combine_values(&mut buffer, CombineOp::Add, Rect::new(0, 0, 1, 1), &values).is_err());
        Ok(())
    }

    #[test]
    fn test_combine_mask_offset() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(4, 4)?;
        buffer.fill(0.5);
        let source = CoverageBuffer::<f32>::from_vec(2, 2, vec![1.0, 0.0, 0.25, 0.5])?;
        assert!(combine_mask(&mut buffer, CombineOp::Subtract, &source, 3, -1));
        // only source row 1, col 0 lands inside the buffer at (col 3, row 0)
        assert_eq!(buffer.get(0, 3), Some(&0.25));
        assert_eq!(
            buffer.iter().filter(|value| **value == 0.5).count(),
            15,
            "untouched pixels"
        );
        assert!(!combine_mask(&mut buffer, CombineOp::Add, &source, 4, 0));
        assert!(!combine_mask(&mut buffer, CombineOp::Add, &source, -2, 0));
        Ok(())
    }

    #[test]
    fn test_combine_mask_extreme_offset() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(4, 4)?;
        let source = CoverageBuffer::<f32>::from_vec(2, 2, vec![1.0; 4])?;
        for (off_x, off_y) in [(i32::MAX, 0), (i32::MIN, 0), (0, i32::MAX), (i32::MIN, i32::MIN)] {
            assert!(!combine_mask(&mut buffer, CombineOp::Add, &source, off_x, off_y));
            assert!(!accumulate_mask(&mut buffer, Accumulate::Stipple, &source, off_x, off_y, 1.0));
        }
        assert!(buffer.iter().all(|value| *value == 0.0));
        let values = [1.0; 4];
        assert!(!combine_values(&mut buffer, CombineOp::Add, Rect::new(i32::MAX - 1, 0, 2, 2), &values)?);
        assert!(combine_values(&mut buffer, CombineOp::Add, Rect::new(-1, -1, 2, 2), &values)?);
        assert_eq!(buffer.get(0, 0), Some(&1.0));
        Ok(())
    }

    #[test]
    fn test_combine_mask_replace_copy() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<u8>::try_new(3, 3)?;
        buffer.fill(7);
        let source = CoverageBuffer::<u8>::from_vec(2, 2, vec![1, 2, 3, 4])?;
        assert!(combine_mask(&mut buffer, CombineOp::Replace, &source, 1, 1));
        assert_eq!(buffer.to_vec(), vec![7, 7, 7, 7, 1, 2, 7, 3, 4]);

        // mixed sample formats go through conversion
        let mut buffer = CoverageBuffer::<f32>::try_new(2, 1)?;
        let source = CoverageBuffer::<u8>::from_vec(2, 1, vec![255, 51])?;
        assert!(combine_mask(&mut buffer, CombineOp::Replace, &source, 0, 0));
        assert_eq!(buffer.get(0, 0), Some(&1.0));
        assert_approx_eq!(buffer.read_rect(Rect::new(1, 0, 1, 1))[0], 0.2, 1e-6);
        Ok(())
    }

    #[test]
    fn test_combine_mask_replace_idempotent() -> Result<(), MaskError> {
        let source = CoverageBuffer::<f32>::from_vec(2, 2, vec![0.3, 0.6, 0.9, 0.0])?;
        let mut once = CoverageBuffer::<f32>::try_new(3, 3)?;
        combine_mask(&mut once, CombineOp::Replace, &source, 1, 0);
        let mut twice = once.clone();
        combine_mask(&mut twice, CombineOp::Replace, &source, 1, 0);
        assert_eq!(once.to_vec(), twice.to_vec());
        Ok(())
    }

    #[test]
    fn test_accumulate_mask() -> Result<(), MaskError> {
        let mut buffer = CoverageBuffer::<f32>::try_new(2, 1)?;
        let source = CoverageBuffer::<f32>::from_vec(1, 1, vec![1.0])?;
        assert!(accumulate_mask(&mut buffer, Accumulate::Stipple, &source, 1, 0, 0.5));
        assert!(accumulate_mask(&mut buffer, Accumulate::Stipple, &source, 1, 0, 0.5));
        assert_eq!(buffer.get(0, 0), Some(&0.0));
        assert_eq!(buffer.get(0, 1), Some(&0.75));
        assert!(!accumulate_mask(&mut buffer, Accumulate::Ratchet, &source, 0, 3, 0.5));
        Ok(())
    }
}
