use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Reads image files into pixel buffers and writes buffers back out as JPEG.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbaImage, CodecError>;
    fn encode(&self, path: &Path, image: &RgbaImage) -> Result<(), CodecError>;
}

#[derive(Clone, Debug)]
pub struct ImageCrateCodec {
    quality: u8,
}

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self {
            quality: JPEG_QUALITY,
        }
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, path: &Path) -> Result<RgbaImage, CodecError> {
        // Staged uploads may have lost their extension during sanitization.
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(CodecError::Empty {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(image.to_rgba8())
    }

    fn encode(&self, path: &Path, image: &RgbaImage) -> Result<(), CodecError> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(&rgb)?;
        writer.flush()?;
        Ok(())
    }
}
