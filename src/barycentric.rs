use crate::types::Point;

/// A triangle parametrized by the edge basis `(p1 - p0, p2 - p0)`.
///
/// A point is `p0 + u * (p1 - p0) + v * (p2 - p0)`; the weight of `p0` is
/// `1 - u - v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametrizedTriangle {
    p0: Point,
    e1: Point,
    e2: Point,
    det: f64,
}

impl Default for ParametrizedTriangle {
    fn default() -> Self {
        Self::new(Point::zero(), Point::zero(), Point::zero())
    }
}

impl ParametrizedTriangle {
    pub fn new(p0: Point, p1: Point, p2: Point) -> Self {
        let mut t = Self {
            p0,
            e1: Point::zero(),
            e2: Point::zero(),
            det: 0.0,
        };
        t.update_vertices(p0, p1, p2);
        t
    }

    /// Replace all three vertices.
    pub fn update_vertices(&mut self, p0: Point, p1: Point, p2: Point) {
        self.p0 = p0;
        self.e1 = p1 - p0;
        self.e2 = p2 - p0;
        self.det = self.e1.x * self.e2.y - self.e1.y * self.e2.x;
    }

    pub fn vertices(&self) -> [Point; 3] {
        [self.p0, self.p0 + self.e1, self.p0 + self.e2]
    }

    /// Twice the signed area; zero for collinear or coincident vertices.
    pub fn determinant(&self) -> f64 {
        self.det
    }

    /// Barycentric `(u, v)` of `p` relative to this triangle.
    ///
    /// Degenerate triangles divide by zero and return NaN or infinite
    /// coordinates, which [`Self::is_bary_inside`] rejects.
    #[inline]
    pub fn bary_at(&self, p: Point) -> (f64, f64) {
        let q = p - self.p0;
        let u = (q.x * self.e2.y - q.y * self.e2.x) / self.det;
        let v = (self.e1.x * q.y - self.e1.y * q.x) / self.det;
        (u, v)
    }

    /// Closed-triangle test: points on an edge count as inside.
    #[inline]
    pub fn is_bary_inside(u: f64, v: f64) -> bool {
        u >= 0.0 && v >= 0.0 && u + v <= 1.0
    }

    #[inline]
    pub fn point_at(&self, u: f64, v: f64) -> Point {
        self.p0 + self.e1 * u + self.e2 * v
    }
}
