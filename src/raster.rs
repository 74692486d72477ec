//! Triangle-mesh rasterization with barycentric sampling.
//!
//! [`rasterize_shape`] enumerates, once per reference shape, every raster
//! pixel center covered by each triangle as a [`BarycentricSample`]. The
//! same sample list is then replayed against any instance of the shape
//! family: [`write_shape_image`] scatters colors to the pixels under the
//! instance and [`read_shape_image`] gathers colors from an image.
//!
//! Samples are ordered triangle-major, then by row, then by column. Pixels
//! on a shared edge are emitted once per adjacent triangle, so when writing,
//! the triangle that comes later in that order wins.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::barycentric::ParametrizedTriangle;
use crate::error::{Error, Result};
use crate::pixel::{sample_bilinear, Color, ImageAccess, ImageAccessMut};
use crate::triangulation::Triangulation;
use crate::types::{Point, Shape};

/// A pixel expressed as barycentric coordinates within one triangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarycentricSample {
    /// Index into the triangulation.
    pub triangle: usize,
    pub u: f64,
    pub v: f64,
}

impl BarycentricSample {
    pub const fn new(triangle: usize, u: f64, v: f64) -> Self {
        Self { triangle, u, v }
    }
}

/// Vertices of the most recently used triangle, rebuilt only when the
/// triangle id changes between consecutive samples.
struct TriangleCache<'a> {
    shape: &'a Shape,
    triangulation: &'a Triangulation,
    scale: f64,
    last: Option<usize>,
    triangle: ParametrizedTriangle,
}

impl<'a> TriangleCache<'a> {
    fn new(shape: &'a Shape, triangulation: &'a Triangulation, scale: f64) -> Self {
        Self {
            shape,
            triangulation,
            scale,
            last: None,
            triangle: ParametrizedTriangle::default(),
        }
    }

    fn point_at(&mut self, sample: &BarycentricSample) -> Point {
        if self.last != Some(sample.triangle) {
            let [p0, p1, p2] = self
                .triangulation
                .vertices(self.shape, sample.triangle, self.scale);
            self.triangle.update_vertices(p0, p1, p2);
            self.last = Some(sample.triangle);
        }
        self.triangle.point_at(sample.u, sample.v)
    }
}

fn check_samples(samples: &[BarycentricSample], triangulation: &Triangulation) -> Result<()> {
    let num_triangles = triangulation.num_triangles();
    match samples
        .iter()
        .enumerate()
        .find(|(_, s)| s.triangle >= num_triangles)
    {
        Some((sample, s)) => Err(Error::SampleTriangleOutOfRange {
            sample,
            triangle: s.triangle,
            num_triangles,
        }),
        None => Ok(()),
    }
}

/// Samples of one triangle against the `width` x `height` pixel-center grid.
fn rasterize_triangle(
    id: usize,
    triangle: &ParametrizedTriangle,
    width: u32,
    height: u32,
    out: &mut Vec<BarycentricSample>,
) {
    for y in 0..height {
        for x in 0..width {
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let (u, v) = triangle.bary_at(p);
            if ParametrizedTriangle::is_bary_inside(u, v) {
                out.push(BarycentricSample::new(id, u, v));
            }
        }
    }
}

fn scaled_triangles(
    shape: &Shape,
    triangulation: &Triangulation,
    scale: f64,
) -> Result<Vec<ParametrizedTriangle>> {
    triangulation.validate(shape.num_landmarks())?;
    Ok((0..triangulation.num_triangles())
        .map(|id| {
            let [p0, p1, p2] = triangulation.vertices(shape, id, scale);
            ParametrizedTriangle::new(p0, p1, p2)
        })
        .collect())
}

/// Enumerate the pixels of a `width` x `height` raster covered by each
/// triangle of `shape` (landmarks multiplied by `scale`).
///
/// A pixel is covered when its center `(x + 0.5, y + 0.5)` lies inside the
/// closed triangle. Degenerate triangles contribute nothing.
pub fn rasterize_shape(
    shape: &Shape,
    triangulation: &Triangulation,
    width: u32,
    height: u32,
    scale: f64,
) -> Result<Vec<BarycentricSample>> {
    let triangles = scaled_triangles(shape, triangulation, scale)?;

    let mut samples = Vec::new();
    for (id, triangle) in triangles.iter().enumerate() {
        rasterize_triangle(id, triangle, width, height, &mut samples);
    }

    debug!(
        "Rasterized {} triangles into {} samples on a {}x{} grid",
        triangles.len(),
        samples.len(),
        width,
        height
    );
    if samples.is_empty() && !triangles.is_empty() {
        warn!("No triangle covers any pixel center of the {}x{} raster", width, height);
    }
    Ok(samples)
}

/// Parallel [`rasterize_shape`]; triangles are rasterized independently and
/// concatenated in triangle order, so the output is identical.
pub fn rasterize_shape_par(
    shape: &Shape,
    triangulation: &Triangulation,
    width: u32,
    height: u32,
    scale: f64,
) -> Result<Vec<BarycentricSample>> {
    let triangles = scaled_triangles(shape, triangulation, scale)?;

    let per_triangle: Vec<Vec<BarycentricSample>> = triangles
        .par_iter()
        .enumerate()
        .map(|(id, triangle)| {
            let mut out = Vec::new();
            rasterize_triangle(id, triangle, width, height, &mut out);
            out
        })
        .collect();

    let samples: Vec<_> = per_triangle.into_iter().flatten().collect();
    debug!(
        "Rasterized {} triangles into {} samples on a {}x{} grid (parallel)",
        triangles.len(),
        samples.len(),
        width,
        height
    );
    Ok(samples)
}

/// Write `colors[i]` to the pixel that sample `i` lands on in `shape`.
///
/// Positions are shifted by half a pixel and truncated to integers; pixels
/// outside `dest` and non-finite positions are skipped. Returns the number
/// of pixels written.
pub fn write_shape_image<I>(
    shape: &Shape,
    triangulation: &Triangulation,
    samples: &[BarycentricSample],
    scale: f64,
    colors: &[I::Pixel],
    dest: &mut I,
) -> Result<usize>
where
    I: ImageAccessMut + ?Sized,
{
    if colors.len() != samples.len() {
        return Err(Error::ColorCountMismatch {
            expected: samples.len(),
            actual: colors.len(),
        });
    }
    triangulation.validate(shape.num_landmarks())?;
    check_samples(samples, triangulation)?;

    let (width, height) = (dest.width() as i64, dest.height() as i64);
    let mut cache = TriangleCache::new(shape, triangulation, scale);
    let mut written = 0;

    for (sample, color) in samples.iter().zip(colors.iter()) {
        let p = cache.point_at(sample);
        if !(p.x.is_finite() && p.y.is_finite()) {
            continue;
        }
        // Truncation toward zero, not floor: (-0.4, y) lands on column 0.
        let x = (p.x - 0.5) as i64;
        let y = (p.y - 0.5) as i64;
        if x >= 0 && y >= 0 && x < width && y < height {
            dest.set_pixel(x as u32, y as u32, *color);
            written += 1;
        }
    }

    Ok(written)
}

/// Read one bilinearly interpolated color per sample from `source` at the
/// sample's position in `shape`.
pub fn read_shape_image<I>(
    shape: &Shape,
    triangulation: &Triangulation,
    samples: &[BarycentricSample],
    scale: f64,
    source: &I,
) -> Result<Vec<I::Pixel>>
where
    I: ImageAccess + ?Sized,
    I::Pixel: Color,
{
    triangulation.validate(shape.num_landmarks())?;
    check_samples(samples, triangulation)?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if source.is_empty() {
        return Err(Error::EmptyImage {
            width: source.width(),
            height: source.height(),
        });
    }

    let mut cache = TriangleCache::new(shape, triangulation, scale);
    let colors = samples
        .iter()
        .map(|sample| {
            let p = cache.point_at(sample);
            sample_bilinear(source, p.x, p.y).ok_or(Error::EmptyImage {
                width: source.width(),
                height: source.height(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(colors)
}
