use crate::{EPSILON, Point, Scalar, utils::clamp, utils::quadratic_solve};
use std::fmt;

/// Points closer than this to the boundary are considered to be on it
const BOUNDARY_EPSILON: Scalar = 1e-9;

/// Axis aligned ellipse centered at the origin
///
/// Coordinates are corner-local: `u` grows horizontally and `v` vertically away
/// from the interior of the shape, only the quadrant `u, v >= 0` is considered.
/// Boundary is `u^2 / rx^2 + v^2 / ry^2 = 1`.
#[derive(Clone, Copy, PartialEq)]
pub struct EllipseGeometry {
    rx: Scalar,
    ry: Scalar,
    rx2: Scalar,
    ry2: Scalar,
}

impl fmt::Debug for EllipseGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ellipse radius:{:?}", Point::new(self.rx, self.ry))
    }
}

impl EllipseGeometry {
    /// Create ellipse with the provided radii, `None` if any of the radii is not positive
    pub fn new(rx: Scalar, ry: Scalar) -> Option<Self> {
        if !(rx > EPSILON && ry > EPSILON) {
            return None;
        }
        Some(Self {
            rx,
            ry,
            rx2: rx * rx,
            ry2: ry * ry,
        })
    }

    /// Horizontal intercept of the boundary at height `v`, zero if `v` is above the ellipse
    pub fn v_to_u(&self, v: Scalar) -> Scalar {
        self.rx * (1.0 - v * v / self.ry2).max(0.0).sqrt()
    }

    /// Vertical intercept of the boundary at offset `u`, zero if `u` is beside the ellipse
    pub fn u_to_v(&self, u: Scalar) -> Scalar {
        self.ry * (1.0 - u * u / self.rx2).max(0.0).sqrt()
    }

    /// Implicit function value, negative inside and positive outside
    fn implicit(&self, p: Point) -> Scalar {
        let Point([u, v]) = p;
        u * u / self.rx2 + v * v / self.ry2 - 1.0
    }

    /// Approximation of the boundary point closest to `p`
    ///
    /// Boundary intercepts of the horizontal and vertical rays through `p` form a chord,
    /// the boundary point is found along the perpendicular dropped from `p` onto that chord.
    /// Returns the boundary point and unit direction from `p` to it.
    fn boundary(&self, p: Point) -> Option<(Point, Point)> {
        let Point([u, v]) = p;
        let va = v.min(self.ry);
        let ub = u.min(self.rx);
        let a = Point::new(self.v_to_u(va), va);
        let b = Point::new(ub, self.u_to_v(ub));

        // closest point on the chord
        let ab = b - a;
        let ab_len2 = ab.dot(ab);
        let c = if ab_len2 < BOUNDARY_EPSILON {
            a
        } else {
            a + clamp((p - a).dot(ab) / ab_len2, 0.0, 1.0) * ab
        };
        let dir = c - p;
        let dir_len = dir.length();
        if dir_len < BOUNDARY_EPSILON {
            // point lies on the boundary
            return None;
        }
        let dir = (1.0 / dir_len) * dir;

        // intersect ray `p + t * dir` with the ellipse
        let Point([du, dv]) = dir;
        let qa = du * du / self.rx2 + dv * dv / self.ry2;
        let qb = 2.0 * (u * du / self.rx2 + v * dv / self.ry2);
        let qc = self.implicit(p);
        let t = quadratic_solve(qa, qb, qc)
            .min_by(|t0, t1| t0.abs().total_cmp(&t1.abs()))
            .unwrap_or(dir_len);
        Some((p + t * dir, dir))
    }

    /// Signed distance from `p` to the boundary, positive inside the ellipse
    ///
    /// The distance is normalized by the pixel cross-section along the direction to the
    /// boundary, so that moving the boundary by one pixel changes the distance by one.
    pub fn signed_distance(&self, p: Point) -> Scalar {
        let Point([u, v]) = p;
        if u < EPSILON {
            return self.ry - v;
        }
        if v < EPSILON {
            return self.rx - u;
        }
        let Some((q, Point([du, dv]))) = self.boundary(p) else {
            return 0.0;
        };
        let dist = p.dist(q) / (du.abs() + dv.abs());
        if self.implicit(p) < 0.0 { dist } else { -dist }
    }

    /// Fraction of the unit pixel centered at `p` covered by the ellipse
    pub fn coverage(&self, p: Point) -> Scalar {
        clamp(0.5 + self.signed_distance(p), 0.0, 1.0)
    }
}
