use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba};

use crate::error::{Error, Result};

/// Read access to a 2D pixel grid.
///
/// Implement this for your own image type to sample textures from it.
pub trait ImageAccess {
    type Pixel: Copy;

    /// Pixel at column `x`, row `y`. Callers only pass in-bounds coordinates.
    fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel;

    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Write access to a 2D pixel grid.
pub trait ImageAccessMut: ImageAccess {
    /// Overwrite the pixel at column `x`, row `y`. Coordinates are in bounds.
    fn set_pixel(&mut self, x: u32, y: u32, value: Self::Pixel);
}

/// Pixel values that can be blended by bilinear interpolation.
pub trait Color: Copy {
    /// Blend the 2x2 neighbourhood `c00 (x0, y0)`, `c10 (x1, y0)`,
    /// `c01 (x0, y1)`, `c11 (x1, y1)` at fractional offsets `fx`, `fy` in `[0, 1]`.
    fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self;
}

#[inline]
fn blend(c00: f64, c10: f64, c01: f64, c11: f64, fx: f64, fy: f64) -> f64 {
    let top = c00 * (1.0 - fx) + c10 * fx;
    let bottom = c01 * (1.0 - fx) + c11 * fx;
    top * (1.0 - fy) + bottom * fy
}

impl Color for f64 {
    fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
        blend(c00, c10, c01, c11, fx, fy)
    }
}

impl Color for f32 {
    fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
        blend(c00 as f64, c10 as f64, c01 as f64, c11 as f64, fx, fy) as f32
    }
}

impl Color for u8 {
    fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
        blend(c00 as f64, c10 as f64, c01 as f64, c11 as f64, fx, fy)
            .round()
            .clamp(0.0, 255.0) as u8
    }
}

impl Color for u16 {
    fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
        blend(c00 as f64, c10 as f64, c01 as f64, c11 as f64, fx, fy)
            .round()
            .clamp(0.0, u16::MAX as f64) as u16
    }
}

// Channel-wise blending for the `image` crate pixel types.
macro_rules! impl_color_for_pixel {
    ($($pixel:ident<$sub:ty>),* $(,)?) => {
        $(
            impl Color for $pixel<$sub> {
                fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
                    let mut out = c00;
                    for (i, o) in out.0.iter_mut().enumerate() {
                        *o = <$sub as Color>::bilinear(c00.0[i], c10.0[i], c01.0[i], c11.0[i], fx, fy);
                    }
                    out
                }
            }
        )*
    };
}

impl_color_for_pixel!(
    Luma<u8>, Rgb<u8>, Rgba<u8>,
    Luma<u16>, Rgb<u16>, Rgba<u16>,
    Luma<f32>, Rgb<f32>, Rgba<f32>,
);

/// An owned row-major pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<C> {
    data: Vec<C>,
    width: u32,
    height: u32,
}

impl<C: Copy> Raster<C> {
    /// A `width` x `height` buffer filled with `value`.
    pub fn new(width: u32, height: u32, value: C) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
        }
    }

    pub fn from_vec(data: Vec<C>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> C,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<C> {
        self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl<C: Copy> ImageAccess for Raster<C> {
    type Pixel = C;

    fn get_pixel(&self, x: u32, y: u32) -> C {
        self.data[self.index(x, y)]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl<C: Copy> ImageAccessMut for Raster<C> {
    fn set_pixel(&mut self, x: u32, y: u32, value: C) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }
}

impl<P: Pixel> ImageAccess for ImageBuffer<P, Vec<P::Subpixel>> {
    type Pixel = P;

    fn get_pixel(&self, x: u32, y: u32) -> P {
        *ImageBuffer::get_pixel(self, x, y)
    }

    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }
}

impl<P: Pixel> ImageAccessMut for ImageBuffer<P, Vec<P::Subpixel>> {
    fn set_pixel(&mut self, x: u32, y: u32, value: P) {
        self.put_pixel(x, y, value);
    }
}

/// Sample `image` at a continuous position with bilinear interpolation.
///
/// Pixel `(i, j)` covers `[i, i + 1) x [j, j + 1)` and its value lives at the
/// pixel center `(i + 0.5, j + 0.5)`, matching the raster sampling grid.
/// Positions outside the image replicate the nearest edge pixel. Returns
/// `None` for an empty image.
///
/// Non-finite positions are not rejected; they blend with non-finite weights.
pub fn sample_bilinear<I>(image: &I, x: f64, y: f64) -> Option<I::Pixel>
where
    I: ImageAccess + ?Sized,
    I::Pixel: Color,
{
    if image.is_empty() {
        return None;
    }

    let max_x = (image.width() - 1) as f64;
    let max_y = (image.height() - 1) as f64;

    // Shift to center-addressed coordinates and clamp onto the edge pixels.
    let cx = (x - 0.5).clamp(0.0, max_x);
    let cy = (y - 0.5).clamp(0.0, max_y);

    let x0 = cx.floor() as u32;
    let y0 = cy.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let fx = cx - x0 as f64;
    let fy = cy - y0 as f64;

    Some(I::Pixel::bilinear(
        image.get_pixel(x0, y0),
        image.get_pixel(x1, y0),
        image.get_pixel(x0, y1),
        image.get_pixel(x1, y1),
        fx,
        fy,
    ))
}
