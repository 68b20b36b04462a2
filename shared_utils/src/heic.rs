//! HEIC/HEIF Codec Module
//!
//! Uses libheif-rs to decode HEIC/HEIF images into `image::DynamicImage` and
//! to encode pixel buffers back to HEIC.
//!
//! The encode path works on a [`HeicFrame`]: the pixel layout is decided from
//! the buffer shape (grayscale / 3-channel / 4-channel), rows are packed in
//! the channel order the encoder's interleaved plane expects, and quality is
//! clamped before libheif is invoked.

use crate::img_errors::{CodecError, Result};
use image::DynamicImage;
use libheif_rs::{
    Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
    RgbChroma,
};
use std::path::Path;

pub const HEIC_QUALITY_MIN: i32 = 0;
pub const HEIC_QUALITY_MAX: i32 = 100;
pub const HEIC_QUALITY_DEFAULT: i32 = 90;

/// Pixel layout handed to the HEIC encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeicLayout {
    /// Single luma plane
    Gray,
    /// Interleaved R, G, B
    Rgb,
    /// Interleaved R, G, B, A
    Rgba,
}

impl HeicLayout {
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(HeicLayout::Gray),
            3 => Some(HeicLayout::Rgb),
            4 => Some(HeicLayout::Rgba),
            _ => None,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            HeicLayout::Gray => 1,
            HeicLayout::Rgb => 3,
            HeicLayout::Rgba => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeicLayout::Gray => "L",
            HeicLayout::Rgb => "RGB",
            HeicLayout::Rgba => "RGBA",
        }
    }
}

pub fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(HEIC_QUALITY_MIN, HEIC_QUALITY_MAX) as u8
}

/// A decoded image prepared for the HEIC encoder.
#[derive(Debug, Clone)]
pub struct HeicFrame {
    pub layout: HeicLayout,
    pub width: u32,
    pub height: u32,
    /// Already clamped to 0..=100
    pub quality: u8,
    /// Tightly packed 8-bit rows, `width * layout.channels()` bytes each
    pub pixels: Vec<u8>,
}

impl HeicFrame {
    pub fn from_image(img: &DynamicImage, quality: i32) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        let channels = img.color().channel_count();

        let layout = HeicLayout::from_channel_count(channels).ok_or_else(|| {
            CodecError::UnsupportedShape(format!("({}, {}, {})", height, width, channels))
        })?;

        // 16-bit and float buffers are narrowed to 8 bits per channel here.
        let pixels = match layout {
            HeicLayout::Gray => img.to_luma8().into_raw(),
            HeicLayout::Rgb => img.to_rgb8().into_raw(),
            HeicLayout::Rgba => img.to_rgba8().into_raw(),
        };

        Ok(Self {
            layout,
            width,
            height,
            quality: clamp_quality(quality),
            pixels,
        })
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// Copy packed rows into an encoder plane whose rows are `stride` bytes apart.
    pub fn copy_rows_into(&self, dst: &mut [u8], stride: usize) -> Result<()> {
        let row_bytes = self.row_bytes();
        if row_bytes == 0 || self.height == 0 {
            return Ok(());
        }
        if stride < row_bytes || dst.len() < stride * (self.height as usize - 1) + row_bytes {
            return Err(CodecError::Heif(format!(
                "encoder plane too small: stride {} for {} bytes per row",
                stride, row_bytes
            )));
        }

        for (y, row) in self.pixels.chunks_exact(row_bytes).enumerate() {
            let start = y * stride;
            dst[start..start + row_bytes].copy_from_slice(row);
        }
        Ok(())
    }
}

fn heif_err(context: &str) -> impl Fn(libheif_rs::HeifError) -> CodecError + '_ {
    move |e| CodecError::Heif(format!("{}: {}", context, e))
}

/// Encode `img` to a HEIC file at `path`. Returns the layout that was used.
pub fn encode_heic(img: &DynamicImage, path: &Path, quality: i32) -> Result<HeicLayout> {
    let frame = HeicFrame::from_image(img, quality)?;

    let (color_space, channel) = match frame.layout {
        HeicLayout::Gray => (ColorSpace::Monochrome, Channel::Y),
        HeicLayout::Rgb => (ColorSpace::Rgb(RgbChroma::Rgb), Channel::Interleaved),
        HeicLayout::Rgba => (ColorSpace::Rgb(RgbChroma::Rgba), Channel::Interleaved),
    };

    let mut image = Image::new(frame.width, frame.height, color_space)
        .map_err(heif_err("Failed to allocate HEIF image"))?;
    image
        .create_plane(channel, frame.width, frame.height, 8)
        .map_err(heif_err("Failed to create HEIF plane"))?;

    {
        let planes = image.planes_mut();
        let plane = match frame.layout {
            HeicLayout::Gray => planes.y,
            HeicLayout::Rgb | HeicLayout::Rgba => planes.interleaved,
        }
        .ok_or_else(|| CodecError::Heif("No writable plane found".to_string()))?;
        frame.copy_rows_into(plane.data, plane.stride)?;
    }

    let lib_heif = LibHeif::new();
    let mut ctx = HeifContext::new().map_err(heif_err("Failed to create HEIF context"))?;
    let mut encoder = lib_heif
        .encoder_for_format(CompressionFormat::Hevc)
        .map_err(heif_err("No HEVC encoder available"))?;
    encoder
        .set_quality(EncoderQuality::Lossy(frame.quality))
        .map_err(heif_err("Failed to set HEIC quality"))?;
    ctx.encode_image(&image, &mut encoder, None)
        .map_err(heif_err("Failed to encode HEIC"))?;
    ctx.write_to_file(path.to_string_lossy().as_ref())
        .map_err(heif_err("Failed to write HEIC"))?;

    tracing::debug!(
        path = %path.display(),
        layout = frame.layout.as_str(),
        quality = frame.quality,
        "HEIC encoded"
    );

    Ok(frame.layout)
}

/// Decode the primary image of a HEIC/HEIF file.
///
/// Images with an alpha channel decode to RGBA, everything else to RGB.
pub fn decode_heic(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(CodecError::NotFound(path.to_path_buf()));
    }

    let lib_heif = LibHeif::new();

    let ctx = HeifContext::read_from_file(path.to_string_lossy().as_ref()).map_err(|e| {
        let error_msg = format!("{}", e);
        if error_msg.contains("SecurityLimitExceeded") || error_msg.contains("ipco") {
            CodecError::ImageRead(format!(
                "HEIC security limit exceeded (ipco box limit): {}",
                e
            ))
        } else {
            CodecError::ImageRead(format!("Failed to read HEIC: {}", e))
        }
    })?;

    let handle = ctx
        .primary_image_handle()
        .map_err(|e| CodecError::ImageRead(format!("Failed to get primary image: {}", e)))?;

    let has_alpha = handle.has_alpha_channel();
    let chroma = if has_alpha {
        RgbChroma::Rgba
    } else {
        RgbChroma::Rgb
    };

    let decoded_image = lib_heif
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(|e| CodecError::ImageRead(format!("Failed to decode HEIC: {}", e)))?;

    let planes = decoded_image.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| CodecError::ImageRead("No RGB plane found".to_string()))?;

    let (width, height) = (plane.width, plane.height);
    let channels = if has_alpha { 4 } else { 3 };
    let packed = pack_rows(plane.data, plane.stride, width as usize * channels, height as usize);

    let img = if has_alpha {
        image::RgbaImage::from_raw(width, height, packed).map(DynamicImage::ImageRgba8)
    } else {
        image::RgbImage::from_raw(width, height, packed).map(DynamicImage::ImageRgb8)
    };

    img.ok_or_else(|| CodecError::ImageRead("Failed to create RGB image".to_string()))
}

/// Drop row padding from a strided plane.
fn pack_rows(data: &[u8], stride: usize, row_bytes: usize, height: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..row_bytes * height].to_vec();
    }
    let mut packed = Vec::with_capacity(row_bytes * height);
    for y in 0..height {
        let start = y * stride;
        packed.extend_from_slice(&data[start..start + row_bytes]);
    }
    packed
}

/// Check if file is HEIC/HEIF format (extension or `ftyp` brand)
pub fn is_heic_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_lowercase();
        if matches!(ext.as_str(), "heic" | "heif" | "hif") {
            return true;
        }
    }

    if let Ok(mut file) = std::fs::File::open(path) {
        use std::io::Read;
        let mut buffer = [0u8; 12];
        if file.read_exact(&mut buffer).is_ok() && &buffer[4..8] == b"ftyp" {
            let brand = &buffer[8..12];
            if matches!(
                brand,
                b"heic" | b"heix" | b"heim" | b"heis" | b"mif1" | b"msf1"
            ) {
                return true;
            }
        }
    }

    false
}
