use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Point, Shape};

/// Triangles over a shape's landmarks, each named by three point indices.
///
/// The same triangulation is shared by every shape of a family, so it is
/// built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub fn new(triangles: Vec<[usize; 3]>) -> Self {
        Self { triangles }
    }

    /// Build from a flat `[a0, b0, c0, a1, b1, c1, ...]` index list.
    pub fn from_flat(indices: &[usize]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidTriangulation(indices.len()));
        }
        let triangles = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Ok(Self { triangles })
    }

    pub fn to_flat_vec(&self) -> Vec<usize> {
        self.triangles.iter().flatten().copied().collect()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Check every index against a shape with `num_points` landmarks.
    pub fn validate(&self, num_points: usize) -> Result<()> {
        for (triangle, ids) in self.triangles.iter().enumerate() {
            if let Some(&index) = ids.iter().find(|&&i| i >= num_points) {
                return Err(Error::TriangleIndexOutOfRange {
                    triangle,
                    index,
                    num_points,
                });
            }
        }
        Ok(())
    }

    /// Vertices of triangle `id` in `shape`, multiplied by `scale`.
    ///
    /// Indices must already be validated against the shape.
    pub(crate) fn vertices(&self, shape: &Shape, id: usize, scale: f64) -> [Point; 3] {
        let [a, b, c] = self.triangles[id];
        [shape[a] * scale, shape[b] * scale, shape[c] * scale]
    }
}
