//! Texture decoding and CPU-side pixel storage.

use std::io::Cursor;

use glam::UVec2;
use image::{ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

/// Decoded RGBA8 texture, ready for atlas packing.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    image: RgbaImage,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("image has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

impl TextureData {
    /// Wrap raw RGBA8 pixels. `None` unless `data` holds exactly
    /// `width * height` pixels and neither side is zero.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    /// Decode an encoded image (PNG, BMP, JPEG) into RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let image = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        log::debug!("Decoded texture {}x{}", width, height);
        Ok(Self { image })
    }

    /// Encode as PNG; handy for generated textures and fixtures.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Checkerboard of 8px white and grey cells.
    pub fn create_test_texture(width: u32, height: u32) -> Self {
        let image = RgbaImage::from_fn(width.max(1), height.max(1), |x, y| {
            if ((x / 8) + (y / 8)) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        });
        Self { image }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width(), self.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Tightly packed RGBA8 rows.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_decode_keeps_dimensions() {
        let src = TextureData::create_test_texture(16, 8);
        let png = src.encode_png().expect("encode");
        let decoded = TextureData::decode(&png).expect("decode");
        assert_eq!(decoded.size(), UVec2::new(16, 8));
        assert_eq!(decoded, src);
        assert_eq!(decoded.image().get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(decoded.image().get_pixel(8, 0).0, [128, 128, 128, 255]);
        assert_eq!(decoded.as_raw().len(), 16 * 8 * 4);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            TextureData::decode(b"definitely not an image"),
            Err(DecodeError::Image(_))
        ));
    }

    #[test]
    fn raw_pixels_must_match_size() {
        let px = [9u8, 8, 7, 255];
        let ok = TextureData::from_rgba8(2, 1, px.repeat(2)).expect("two pixels");
        assert_eq!(ok.image().get_pixel(1, 0).0, px);

        assert!(TextureData::from_rgba8(2, 2, px.repeat(3)).is_none());
        assert!(TextureData::from_rgba8(0, 4, Vec::new()).is_none());
        // Dimensions whose byte count overflows u32 are refused, not wrapped.
        assert!(TextureData::from_rgba8(65_536, 65_536, Vec::new()).is_none());
    }
}
