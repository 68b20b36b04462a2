//! Output formats and extension mapping

use clap::ValueEnum;
use image::ImageFormat;
use std::fmt;
use std::str::FromStr;

/// Target formats a batch can convert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum OutputFormat {
    #[value(alias = "jpeg")]
    Jpg,
    Png,
    Bmp,
    #[value(alias = "tif")]
    Tiff,
    Webp,
    #[value(alias = "heif")]
    Heic,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Jpg,
        OutputFormat::Png,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
        OutputFormat::Webp,
        OutputFormat::Heic,
    ];

    /// Lowercase extension written to output files.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Webp => "webp",
            OutputFormat::Heic => "heic",
        }
    }

    /// Extensions (including aliases) that belong to this format.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Jpg => &["jpg", "jpeg", "jpe", "jfif"],
            OutputFormat::Png => &["png"],
            OutputFormat::Bmp => &["bmp"],
            OutputFormat::Tiff => &["tiff", "tif"],
            OutputFormat::Webp => &["webp"],
            OutputFormat::Heic => &["heic", "heif", "hif"],
        }
    }

    /// Map a file extension (case-insensitive, without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.aliases().contains(&ext.as_str()))
    }

    /// `image` crate encoder for this format; `None` for HEIC, which goes
    /// through libheif.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            OutputFormat::Jpg => Some(ImageFormat::Jpeg),
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::Bmp => Some(ImageFormat::Bmp),
            OutputFormat::Tiff => Some(ImageFormat::Tiff),
            OutputFormat::Webp => Some(ImageFormat::WebP),
            OutputFormat::Heic => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "JPG",
            OutputFormat::Png => "PNG",
            OutputFormat::Bmp => "BMP",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Webp => "WEBP",
            OutputFormat::Heic => "HEIC",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        Self::from_extension(trimmed).ok_or_else(|| {
            format!(
                "unknown output format '{}' (expected one of: {})",
                s,
                Self::ALL.map(|f| f.extension()).join(", ")
            )
        })
    }
}
