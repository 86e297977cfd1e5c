use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};

/// Bytes per pixel of the RGBA8 layout every frame uses.
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured image sample. The pixel buffer is shared, so clones are
/// cheap and a frame can be handed to a decode task without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Frame {
    /// Wraps an RGBA8 buffer laid out row-major with no padding.
    pub fn new(
        width: u32,
        height: u32,
        pixels: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ModelError::EmptyFrame { width, height });
        }
        let pixels = pixels.into();
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(ModelError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        let pixels: Vec<u8> =
            rgba.iter().copied().cycle().take(count * BYTES_PER_PIXEL).collect();
        Self::new(width, height, pixels)
    }

    /// Builds an opaque RGBA frame from 8-bit luma samples.
    pub fn from_luma(width: u32, height: u32, luma: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(ModelError::BufferSize {
                expected,
                actual: luma.len(),
            });
        }
        let pixels: Vec<u8> =
            luma.iter().flat_map(|&l| [l, l, l, u8::MAX]).collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Luma of the pixel at `(x, y)` using BT.601 weights. Out of range
    /// coordinates read as black.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let offset =
            (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        luma_of(&self.pixels[offset..offset + 3])
    }

    /// Whole-frame luma plane, row-major.
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| luma_of(&px[..3]))
            .collect()
    }

    /// Copy with colour channels inverted and alpha preserved. Light-on-dark
    /// codes become dark-on-light.
    pub fn inverted(&self) -> Self {
        let pixels: Vec<u8> = self
            .pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .flat_map(|px| [!px[0], !px[1], !px[2], px[3]])
            .collect();
        Self {
            width: self.width,
            height: self.height,
            pixels: pixels.into(),
        }
    }
}

fn luma_of(rgb: &[u8]) -> u8 {
    let weighted = 299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32;
    (weighted / 1000) as u8
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(feature = "image")]
impl TryFrom<image::RgbaImage> for Frame {
    type Error = ModelError;

    fn try_from(img: image::RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Frame::new(width, height, img.into_raw())
    }
}

#[cfg(feature = "image")]
impl TryFrom<&image::DynamicImage> for Frame {
    type Error = ModelError;

    fn try_from(img: &image::DynamicImage) -> Result<Self> {
        Frame::try_from(img.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let err = Frame::new(2, 2, vec![0u8; 15]).unwrap_err();
        assert_eq!(
            err,
            ModelError::BufferSize {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = Frame::new(0, 4, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, ModelError::EmptyFrame { width: 0, height: 4 }));
    }

    #[test]
    fn inversion_keeps_alpha() {
        let frame = Frame::filled(1, 1, [10, 200, 0, 128]).expect("frame");
        assert_eq!(frame.inverted().pixels(), &[245, 55, 255, 128]);
    }

    #[test]
    fn luma_round_trips_through_rgba() {
        let frame = Frame::from_luma(2, 1, &[0, 255]).expect("frame");
        assert_eq!(frame.to_luma(), vec![0, 255]);
        assert_eq!(frame.luma(1, 0), 255);
        assert_eq!(frame.luma(5, 5), 0);
    }

    #[test]
    fn clones_share_the_buffer() {
        let frame = Frame::filled(8, 8, [0, 0, 0, 255]).expect("frame");
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels(), copy.pixels()));
    }
}
