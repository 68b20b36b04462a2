//! Codec adapter: decode any supported input into a `DynamicImage`, encode a
//! `DynamicImage` to one of the output formats.

use crate::formats::OutputFormat;
use image::{DynamicImage, ImageReader};
use shared_utils::heic;
use shared_utils::img_errors::{CodecError, Result};
use std::borrow::Cow;
use std::path::Path;

/// Decode/encode seam used by conversion tasks. Shared across worker threads.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DynamicImage>;

    /// `heic_quality` is only consulted for [`OutputFormat::Heic`].
    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        path: &Path,
        heic_quality: i32,
    ) -> Result<()>;
}

/// Production codec: `image` for raster formats, libheif for HEIC/HEIF.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        if heic::is_heic_file(path) {
            return heic::decode_heic(path);
        }

        // Content sniffing first, extension as fallback
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        if reader.format().is_none() {
            return Err(CodecError::UnsupportedFormat(path.display().to_string()));
        }
        Ok(reader.decode()?)
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        path: &Path,
        heic_quality: i32,
    ) -> Result<()> {
        let Some(image_format) = format.image_format() else {
            heic::encode_heic(img, path, heic_quality)?;
            return Ok(());
        };

        encodable(img, format).save_with_format(path, image_format)?;
        Ok(())
    }
}

/// JPEG has no alpha and no high bit depth; anything but 8-bit gray or RGB
/// must be flattened first.
pub fn needs_rgb_flatten(img: &DynamicImage) -> bool {
    !matches!(img, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_))
}

/// Flatten to 8-bit RGB for JPEG output. Alpha is discarded, not composited.
pub fn flatten_for_jpeg(img: DynamicImage) -> DynamicImage {
    if needs_rgb_flatten(&img) {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    }
}

fn rgb_or_rgba8(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Narrow a buffer to a color type the target encoder accepts.
pub fn encodable(img: &DynamicImage, format: OutputFormat) -> Cow<'_, DynamicImage> {
    use DynamicImage::*;

    match format {
        OutputFormat::Jpg => match img {
            ImageLuma8(_) | ImageRgb8(_) => Cow::Borrowed(img),
            _ => Cow::Owned(ImageRgb8(img.to_rgb8())),
        },
        OutputFormat::Png => match img {
            ImageRgb32F(_) => Cow::Owned(ImageRgb16(img.to_rgb16())),
            ImageRgba32F(_) => Cow::Owned(ImageRgba16(img.to_rgba16())),
            _ => Cow::Borrowed(img),
        },
        OutputFormat::Bmp | OutputFormat::Webp => match img {
            ImageLuma8(_) | ImageRgb8(_) | ImageRgba8(_) => Cow::Borrowed(img),
            _ => Cow::Owned(rgb_or_rgba8(img)),
        },
        OutputFormat::Tiff => match img {
            ImageLuma8(_) | ImageRgb8(_) | ImageRgba8(_) | ImageLuma16(_) | ImageRgb16(_)
            | ImageRgba16(_) => Cow::Borrowed(img),
            _ => Cow::Owned(rgb_or_rgba8(img)),
        },
        // libheif path picks its own layout
        OutputFormat::Heic => Cow::Borrowed(img),
    }
}
