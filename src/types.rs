use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 2D landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::SubAssign for Point {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Div<f64> for Point {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

/// An axis-aligned box defined by top-left corner, width, and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// An ordered collection of landmark points.
///
/// Point `i` of one shape corresponds to point `i` of every other shape in
/// the same family; alignment overwrites coordinates but never reorders or
/// resizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Point>,
}

impl Shape {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn num_landmarks(&self) -> usize {
        self.points.len()
    }

    /// Create a zeroed shape with n landmarks.
    pub fn zeros(n: usize) -> Self {
        Self {
            points: vec![Point::zero(); n],
        }
    }

    /// Flatten shape to interleaved [x0, y0, x1, y1, ...] coordinates.
    pub fn to_flat_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.points.len() * 2);
        for p in &self.points {
            v.push(p.x);
            v.push(p.y);
        }
        v
    }

    /// Create shape from interleaved [x0, y0, x1, y1, ...] coordinates.
    pub fn from_flat_vec(v: &[f64]) -> Self {
        debug_assert!(v.len() % 2 == 0);
        let points: Vec<Point> = v
            .chunks_exact(2)
            .map(|chunk| Point::new(chunk[0], chunk[1]))
            .collect();
        Self { points }
    }

    /// Mean of all landmark positions.
    pub fn centroid(&self) -> Point {
        if self.points.is_empty() {
            return Point::zero();
        }
        let sum = self
            .points
            .iter()
            .fold(Point::zero(), |acc, p| acc + *p);
        sum / self.points.len() as f64
    }

    /// Frobenius norm of the N x 2 coordinate matrix.
    pub fn frobenius_norm(&self) -> f64 {
        self.points
            .iter()
            .map(Point::norm_squared)
            .sum::<f64>()
            .sqrt()
    }

    /// Copy of this shape translated so that its centroid is at the origin.
    pub fn centered(&self) -> Self {
        let c = self.centroid();
        self.translated(Point::zero() - c)
    }

    pub fn translated(&self, offset: Point) -> Self {
        Self {
            points: self.points.iter().map(|p| *p + offset).collect(),
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            points: self.points.iter().map(|p| *p * factor).collect(),
        }
    }

    /// Euclidean distance between the interleaved coordinate vectors of two
    /// shapes with the same landmark count.
    pub fn distance(&self, other: &Shape) -> f64 {
        debug_assert_eq!(self.points.len(), other.points.len());
        self.points
            .iter()
            .zip(other.points.iter())
            .map(|(a, b)| (*a - *b).norm_squared())
            .sum::<f64>()
            .sqrt()
    }

    /// Tight axis-aligned bounds of the landmarks, `None` for an empty shape.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(BoundingBox::new(min.x, min.y, max.x - min.x, max.y - min.y))
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl std::ops::IndexMut<usize> for Shape {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.points[idx]
    }
}

/// A family of shapes that all share the same landmark count and ordering.
///
/// Serializes as a plain list of shapes; deserialization re-validates counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Shape>", into = "Vec<Shape>")]
pub struct ShapeSet {
    shapes: Vec<Shape>,
}

impl ShapeSet {
    /// Build a set, rejecting shapes whose landmark count differs from the first.
    pub fn new(shapes: Vec<Shape>) -> Result<Self> {
        if let Some(first) = shapes.first() {
            let expected = first.num_landmarks();
            if let Some(bad) = shapes.iter().find(|s| s.num_landmarks() != expected) {
                return Err(Error::ShapeMismatch {
                    expected,
                    actual: bad.num_landmarks(),
                });
            }
        }
        Ok(Self { shapes })
    }

    /// Build a set from a matrix with one interleaved shape per row.
    pub fn from_matrix(m: &DMatrix<f64>) -> Result<Self> {
        if m.ncols() % 2 != 0 {
            return Err(Error::OddCoordinateCount(m.ncols()));
        }
        let shapes = m
            .row_iter()
            .map(|row| Shape::from_flat_vec(&row.iter().copied().collect::<Vec<_>>()))
            .collect();
        Self::new(shapes)
    }

    /// One interleaved shape per row.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        let cols = self.num_landmarks() * 2;
        DMatrix::from_fn(self.shapes.len(), cols, |r, c| {
            let p = self.shapes[r].points[c / 2];
            if c % 2 == 0 {
                p.x
            } else {
                p.y
            }
        })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Landmark count shared by every shape (0 for an empty set).
    pub fn num_landmarks(&self) -> usize {
        self.shapes.first().map_or(0, Shape::num_landmarks)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Mutable access to the shapes. Landmark counts cannot be changed
    /// through a slice, so the set invariant is preserved.
    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shapes
    }

    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }

    /// Arithmetic mean of all shapes, landmark by landmark.
    pub fn mean_shape(&self) -> Shape {
        let mut mean = Shape::zeros(self.num_landmarks());
        if self.shapes.is_empty() {
            return mean;
        }
        for shape in &self.shapes {
            for (m, p) in mean.points.iter_mut().zip(shape.points.iter()) {
                *m += *p;
            }
        }
        let n = self.shapes.len() as f64;
        for m in &mut mean.points {
            *m = *m / n;
        }
        mean
    }
}

impl TryFrom<Vec<Shape>> for ShapeSet {
    type Error = Error;

    fn try_from(shapes: Vec<Shape>) -> Result<Self> {
        Self::new(shapes)
    }
}

impl From<ShapeSet> for Vec<Shape> {
    fn from(set: ShapeSet) -> Self {
        set.shapes
    }
}

impl std::ops::Index<usize> for ShapeSet {
    type Output = Shape;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.shapes[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);

        let sum = a + b;
        assert_eq!(sum.x, 4.0);
        assert_eq!(sum.y, 6.0);

        let diff = b - a;
        assert_eq!(diff.x, 2.0);
        assert_eq!(diff.y, 2.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.x, 2.0);
        assert_eq!(scaled.y, 4.0);
    }

    #[test]
    fn flat_vec_is_interleaved() {
        let shape = Shape::new(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        assert_eq!(shape.to_flat_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(Shape::from_flat_vec(&[1.0, 2.0, 3.0, 4.0]), shape);
    }

    #[test]
    fn centroid_and_norm() {
        let shape = Shape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        let c = shape.centroid();
        assert!((c.x - 1.0).abs() < 1e-12);
        assert!((c.y - 1.0).abs() < 1e-12);

        // Four corners at distance sqrt(2) from the center.
        let norm = shape.centered().frobenius_norm();
        assert!((norm - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_of_shape() {
        let shape = Shape::new(vec![
            Point::new(3.0, -1.0),
            Point::new(-2.0, 4.0),
            Point::new(1.0, 1.0),
        ]);
        let bbox = shape.bounding_box().unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 5.0, 5.0));
        assert!(Shape::zeros(0).bounding_box().is_none());
    }

    #[test]
    fn shape_set_rejects_mismatched_counts() {
        let err = ShapeSet::new(vec![Shape::zeros(3), Shape::zeros(4)]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn shape_set_matrix_layout() {
        let set = ShapeSet::new(vec![
            Shape::new(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]),
            Shape::new(vec![Point::new(5.0, 6.0), Point::new(7.0, 8.0)]),
        ])
        .unwrap();

        let m = set.to_matrix();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 4);
        assert_eq!(m[(1, 2)], 7.0);
        assert_eq!(ShapeSet::from_matrix(&m).unwrap(), set);

        let mean = set.mean_shape();
        assert_eq!(mean[0], Point::new(3.0, 4.0));
        assert_eq!(mean[1], Point::new(5.0, 6.0));
    }
}
