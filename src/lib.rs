//! # aam-shape
//!
//! Geometric building blocks for active appearance models over landmarked
//! 2D shapes.
//!
//! This crate provides:
//! - **Procrustes alignment**: optimal rotation + scale superimposition of a
//!   shape onto a reference (never a reflection), and Generalized Procrustes
//!   Analysis to align a whole shape set to its mean
//! - **Barycentric rasterization**: enumerate every pixel of a reference
//!   raster as `(triangle, u, v)` over a triangulated mean shape
//! - **Texture warping**: replay those samples on any shape instance to read
//!   (bilinear) or write pixel colors
//!
//! ## Algorithm Overview
//!
//! 1. Align all training shapes with [`align_set`]; the result's mean shape
//!    defines the shape-normalized frame
//! 2. Rasterize the mean shape's triangulation once with [`rasterize_shape`]
//! 3. For each instance, evaluate the instance's triangles at the stored
//!    barycentric coordinates to gather ([`read_shape_image`]) or scatter
//!    ([`write_shape_image`]) texture values
//!
//! ## Quick Start
//!
//! ```rust
//! use aam_shape::{
//!     align_set, Point, Raster, Shape, ShapeFrameBuilder, ShapeSet, Triangulation,
//! };
//!
//! let square = |s: f64, dx: f64| {
//!     Shape::new(vec![
//!         Point::new(dx, 0.0),
//!         Point::new(dx + s, 0.0),
//!         Point::new(dx + s, s),
//!         Point::new(dx, s),
//!     ])
//! };
//! let mut shapes = ShapeSet::new(vec![square(1.0, 0.0), square(2.0, 5.0)]).unwrap();
//! let outcome = align_set(&mut shapes, 10).unwrap();
//!
//! let frame = ShapeFrameBuilder::new()
//!     .mean_shape(outcome.mean_shape)
//!     .triangulation(Triangulation::from_flat(&[0, 1, 2, 0, 2, 3]).unwrap())
//!     .scale(16.0)
//!     .fit_to_raster(1.0)
//!     .build()
//!     .unwrap();
//!
//! // Sample the texture under an instance and render it in the mean frame.
//! let image = Raster::from_fn(64, 64, |x, y| ((x + y) % 256) as u8);
//! let instance = square(20.0, 10.0);
//! let mut normalized = Raster::new(frame.width(), frame.height(), 0u8);
//! frame.warp_to_reference(&instance, &image, &mut normalized).unwrap();
//! ```
//!
//! ## Custom Image Types
//!
//! Implement [`ImageAccess`] (and [`ImageAccessMut`] to write) for your own
//! image types. `image::ImageBuffer` is supported out of the box:
//!
//! ```rust
//! use aam_shape::ImageAccess;
//!
//! struct MyImage { /* ... */ }
//!
//! impl ImageAccess for MyImage {
//!     type Pixel = f32;
//!
//!     fn get_pixel(&self, x: u32, y: u32) -> f32 {
//!         // Return the value at (x, y); always called in bounds
//!         0.0
//!     }
//!     fn width(&self) -> u32 { 640 }
//!     fn height(&self) -> u32 { 480 }
//! }
//! ```

mod barycentric;
mod error;
mod frame;
mod pixel;
mod procrustes;
mod raster;
mod triangulation;
mod types;

pub use barycentric::ParametrizedTriangle;
pub use error::{Error, Result};
pub use frame::{ShapeFrame, ShapeFrameBuilder};
pub use pixel::{sample_bilinear, Color, ImageAccess, ImageAccessMut, Raster};
pub use procrustes::{
    align_pair, align_set, find_similarity_transform, procrustes_fit, GpaOutcome, ProcrustesFit,
    SimilarityTransform2D, StopReason,
};
pub use raster::{
    rasterize_shape, rasterize_shape_par, read_shape_image, write_shape_image, BarycentricSample,
};
pub use triangulation::Triangulation;
pub use types::{BoundingBox, Point, Shape, ShapeSet};
