//! Scanline polygon conversion
//!
//! Polygon edges are converted into sorted lists of integer crossings, one list per
//! oversampled scanline. Baking pairs the crossings of every scanline (even-odd fill
//! rule) and averages `antialias x antialias` sub-samples into every output pixel.
use crate::{
    CombineOp, Coverage, CoverageBuffer, MaskBufferMut, MaskError, Point, Rect, Scalar,
    combine::combine_mask,
};
use smallvec::SmallVec;
use std::fmt;

/// Sorted x-crossings of a single oversampled scanline
pub type ScanlineEdges = SmallVec<[i32; 4]>;

/// Full coverage value of a single sub-sample
const SAMPLE_FULL: u32 = 255;

/// Converts polylines into a coverage mask
///
/// Points are appended in batches, consecutive points (including the last point of the
/// previous batch and the first point of the next one) are connected. The figure is
/// closed automatically when baking.
#[derive(Clone)]
pub struct PolygonScanConverter {
    width: usize,
    height: usize,
    antialias: usize,
    scanlines: Vec<ScanlineEdges>,
    first: Option<Point>,
    last: Option<Point>,
    anomalies: usize,
}

impl fmt::Debug for PolygonScanConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonScanConverter")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("antialias", &self.antialias)
            .field("first", &self.first)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl PolygonScanConverter {
    /// Create converter producing `width x height` mask with `antialias` sub-samples
    /// per pixel along each axis
    pub fn new(width: usize, height: usize, antialias: usize) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::InvalidSize { width, height });
        }
        if antialias == 0 {
            return Err(MaskError::InvalidAntialias(antialias));
        }
        Ok(Self {
            width,
            height,
            antialias,
            scanlines: vec![ScanlineEdges::new(); height * antialias],
            first: None,
            last: None,
            anomalies: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn antialias(&self) -> usize {
        self.antialias
    }

    /// Number of unpaired crossings dropped by the last bake
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    /// Crossings of the oversampled scanline
    pub fn scanline(&self, index: usize) -> Option<&[i32]> {
        self.scanlines.get(index).map(|edges| edges.as_slice())
    }

    /// Append batch of points to the polyline
    pub fn add_points(&mut self, points: &[Point]) {
        for point in points {
            self.push_point(*point);
        }
    }

    /// Append points produced by an iterator to the polyline
    pub fn add_polyline<I, P>(&mut self, points: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        for point in points {
            self.push_point(point.into());
        }
    }

    fn push_point(&mut self, point: Point) {
        match self.last {
            Some(last) => self.add_line(last, point),
            None => self.first = Some(point),
        }
        self.last = Some(point);
    }

    /// Rasterize single segment without making it a part of the polyline
    pub fn add_line(&mut self, p0: Point, p1: Point) {
        let (x0, y0) = self.to_grid(p0);
        let (x1, y1) = self.to_grid(p1);
        if y0 == y1 {
            let edges = &mut self.scanlines[y0 as usize];
            insert_sorted(edges, x0);
            insert_sorted(edges, x1);
            return;
        }
        let ((x0, y0), (x1, y1)) = if y0 < y1 {
            ((x0, y0), (x1, y1))
        } else {
            ((x1, y1), (x0, y0))
        };
        let xinc = (x1 - x0) as Scalar / (y1 - y0) as Scalar;
        let mut xstart = x0 as Scalar + 0.5 * xinc;
        for y in y0..y1 {
            insert_sorted(&mut self.scanlines[y as usize], xstart.round() as i32);
            xstart += xinc;
        }
    }

    /// Oversampled grid position of the point clamped to the grid
    fn to_grid(&self, point: Point) -> (i32, i32) {
        let scale = self.antialias as Scalar;
        let max_x = (self.width * self.antialias - 1) as i32;
        let max_y = (self.height * self.antialias - 1) as i32;
        let x = ((point.x() * scale).floor() as i32).clamp(0, max_x);
        let y = ((point.y() * scale).floor() as i32).clamp(0, max_y);
        (x, y)
    }

    /// Connect the last point with the first one if the polyline is open
    fn close(&mut self) {
        if let (Some(first), Some(last)) = (self.first, self.last) {
            if first != last {
                self.add_line(last, first);
                self.last = Some(first);
            }
        }
    }

    /// Bake into a new buffer
    pub fn bake<P: Coverage>(&mut self) -> Result<CoverageBuffer<P>, MaskError> {
        let mut buffer = CoverageBuffer::<P>::try_new(self.width, self.height)?;
        self.bake_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Bake and combine result into an existing mask
    ///
    /// Returns `false` if baked mask does not overlap the target.
    pub fn bake_combine<B>(&mut self, target: &mut B, op: CombineOp) -> Result<bool, MaskError>
    where
        B: MaskBufferMut + ?Sized,
    {
        let mask: CoverageBuffer<B::Sample> = self.bake()?;
        Ok(combine_mask(target, op, &mask, 0, 0))
    }

    /// Bake into the `width x height` region at the origin of the buffer
    ///
    /// Every row of the region is overwritten, parts outside of the buffer are dropped.
    pub fn bake_into<B>(&mut self, buffer: &mut B) -> Result<(), MaskError>
    where
        B: MaskBufferMut + ?Sized,
    {
        self.close();
        let _span = tracing::debug_span!(
            "[bake]",
            width = self.width,
            height = self.height,
            antialias = self.antialias
        )
        .entered();

        let n = self.antialias;
        let divisor = (n * n) as u32;
        let mut anomalies = 0;
        let mut cells = vec![0u32; self.width * n];
        let mut row = vec![0.0; self.width];
        for y in 0..self.height {
            if n == 1 {
                row.fill(0.0);
            } else {
                cells.fill(0);
            }
            for (index, edges) in self.scanlines[y * n..(y + 1) * n].iter().enumerate() {
                if edges.len() % 2 != 0 {
                    tracing::warn!(
                        scanline = y * n + index,
                        crossings = edges.len(),
                        "[bake] odd number of crossings, dropping the last one"
                    );
                    anomalies += 1;
                }
                for span in edges.chunks_exact(2) {
                    let x0 = span[0].clamp(0, cells.len() as i32) as usize;
                    let x1 = span[1].clamp(0, cells.len() as i32) as usize;
                    if n == 1 {
                        row[x0..x1].fill(1.0);
                    } else {
                        cells[x0..x1].iter_mut().for_each(|cell| *cell += SAMPLE_FULL);
                    }
                }
            }
            if n != 1 {
                for (value, samples) in row.iter_mut().zip(cells.chunks_exact(n)) {
                    let level = samples.iter().sum::<u32>() / divisor;
                    *value = level as Scalar / SAMPLE_FULL as Scalar;
                }
            }
            buffer.write_rect(Rect::new(0, y as i32, self.width as i32, 1), &row)?;
        }
        self.anomalies = anomalies;
        Ok(())
    }
}

/// Insert value keeping the list sorted, equal values are kept
fn insert_sorted(edges: &mut ScanlineEdges, x: i32) {
    let index = edges.partition_point(|edge| *edge <= x);
    edges.insert(index, x);
}
