use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pixel::{Color, ImageAccess, ImageAccessMut};
use crate::raster::{rasterize_shape_par, read_shape_image, write_shape_image, BarycentricSample};
use crate::triangulation::Triangulation;
use crate::types::{Point, Shape};

/// The shape-normalized texture frame of a shape family.
///
/// A frame bundles the reference (mean) shape, its triangulation, the raster
/// it was sampled on and the resulting barycentric sample list. The sample
/// list is computed once and replayed against every shape instance to move
/// textures between image space and the reference frame.
///
/// # Usage
///
/// ```ignore
/// let frame = ShapeFrame::load("frame.bin")?;
/// let texture = frame.sample_texture(&instance, &image)?;
/// frame.render_texture(&instance, &texture, &mut canvas)?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeFrame {
    /// Reference shape in raster units (before `scale`).
    mean_shape: Shape,

    triangulation: Triangulation,

    width: u32,
    height: u32,

    /// Factor applied to the reference shape when it was rasterized.
    scale: f64,

    samples: Vec<BarycentricSample>,
}

impl ShapeFrame {
    /// Rasterize `mean_shape` on a `width` x `height` grid.
    pub fn new(
        mean_shape: Shape,
        triangulation: Triangulation,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Result<Self> {
        let samples = rasterize_shape_par(&mean_shape, &triangulation, width, height, scale)?;
        if samples.is_empty() {
            warn!("Shape frame {}x{} has no samples", width, height);
        }
        Ok(Self {
            mean_shape,
            triangulation,
            width,
            height,
            scale,
            samples,
        })
    }

    /// Load a frame from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let frame: Self = bincode::deserialize(&bytes)?;
        frame.triangulation.validate(frame.mean_shape.num_landmarks())?;
        Ok(frame)
    }

    /// Save the frame to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn mean_shape(&self) -> &Shape {
        &self.mean_shape
    }

    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn samples(&self) -> &[BarycentricSample] {
        &self.samples
    }

    /// Number of texture values per instance.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn check_instance(&self, instance: &Shape) -> Result<()> {
        if instance.num_landmarks() != self.mean_shape.num_landmarks() {
            return Err(Error::ShapeMismatch {
                expected: self.mean_shape.num_landmarks(),
                actual: instance.num_landmarks(),
            });
        }
        Ok(())
    }

    /// Gather the texture under `instance` (in image coordinates) from `image`.
    pub fn sample_texture<I>(&self, instance: &Shape, image: &I) -> Result<Vec<I::Pixel>>
    where
        I: ImageAccess + ?Sized,
        I::Pixel: Color,
    {
        self.check_instance(instance)?;
        read_shape_image(instance, &self.triangulation, &self.samples, 1.0, image)
    }

    /// Scatter `texture` onto `dest` at the pixels under `instance`.
    pub fn render_texture<I>(&self, instance: &Shape, texture: &[I::Pixel], dest: &mut I) -> Result<usize>
    where
        I: ImageAccessMut + ?Sized,
    {
        self.check_instance(instance)?;
        write_shape_image(instance, &self.triangulation, &self.samples, 1.0, texture, dest)
    }

    /// Render `texture` into the frame's own reference raster.
    pub fn render_reference<I>(&self, texture: &[I::Pixel], dest: &mut I) -> Result<usize>
    where
        I: ImageAccessMut + ?Sized,
    {
        write_shape_image(
            &self.mean_shape,
            &self.triangulation,
            &self.samples,
            self.scale,
            texture,
            dest,
        )
    }

    /// Shape-normalize the texture of `instance` in `image` into `dest`, an
    /// image laid out like the reference raster.
    pub fn warp_to_reference<S, D>(&self, instance: &Shape, image: &S, dest: &mut D) -> Result<usize>
    where
        S: ImageAccess + ?Sized,
        S::Pixel: Color,
        D: ImageAccessMut<Pixel = S::Pixel> + ?Sized,
    {
        let texture = self.sample_texture(instance, image)?;
        self.render_reference(&texture, dest)
    }
}

/// Builder for creating a [`ShapeFrame`].
pub struct ShapeFrameBuilder {
    mean_shape: Option<Shape>,
    triangulation: Option<Triangulation>,
    size: Option<(u32, u32)>,
    scale: f64,
    margin: f64,
    fit_to_raster: bool,
}

impl ShapeFrameBuilder {
    pub fn new() -> Self {
        Self {
            mean_shape: None,
            triangulation: None,
            size: None,
            scale: 1.0,
            margin: 0.0,
            fit_to_raster: false,
        }
    }

    /// Set the reference shape.
    pub fn mean_shape(mut self, shape: Shape) -> Self {
        self.mean_shape = Some(shape);
        self
    }

    pub fn triangulation(mut self, triangulation: Triangulation) -> Self {
        self.triangulation = Some(triangulation);
        self
    }

    /// Raster size. When omitted, the size is derived from the (scaled)
    /// bounding box of the mean shape plus margin.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Translate the mean shape so its bounding box starts at `margin`
    /// pixels from the raster origin.
    pub fn fit_to_raster(mut self, margin: f64) -> Self {
        self.fit_to_raster = true;
        self.margin = margin;
        self
    }

    /// Build the ShapeFrame.
    pub fn build(self) -> Result<ShapeFrame> {
        let mut mean_shape = self
            .mean_shape
            .ok_or_else(|| Error::InvalidFrame("Missing mean shape".into()))?;
        let triangulation = self
            .triangulation
            .ok_or_else(|| Error::InvalidFrame("Missing triangulation".into()))?;

        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::InvalidFrame(format!(
                "Scale must be positive, got {}",
                self.scale
            )));
        }
        if triangulation.is_empty() {
            return Err(Error::InvalidFrame(
                "Triangulation must have at least one triangle".into(),
            ));
        }

        let bbox = mean_shape
            .bounding_box()
            .ok_or_else(|| Error::InvalidFrame("Mean shape has no landmarks".into()))?;

        if self.fit_to_raster {
            // Offset in unscaled units so that scaled coordinates start at `margin`.
            let offset = Point::new(self.margin / self.scale, self.margin / self.scale)
                - bbox.top_left();
            mean_shape = mean_shape.translated(offset);
        }

        let (width, height) = match self.size {
            Some(size) => size,
            None => {
                let bbox = mean_shape
                    .scaled(self.scale)
                    .bounding_box()
                    .ok_or_else(|| Error::InvalidFrame("Mean shape has no landmarks".into()))?;
                (
                    (bbox.x + bbox.width + self.margin).ceil().max(0.0) as u32,
                    (bbox.y + bbox.height + self.margin).ceil().max(0.0) as u32,
                )
            }
        };

        debug!(
            "Building shape frame: {} landmarks, {} triangles, {}x{} raster, scale {}",
            mean_shape.num_landmarks(),
            triangulation.num_triangles(),
            width,
            height,
            self.scale
        );

        ShapeFrame::new(mean_shape, triangulation, width, height, self.scale)
    }
}

impl Default for ShapeFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
