//! SVG to PNG conversion for rendered monKeys.

use crate::errors::AppError;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};
use std::fmt;
use std::str::FromStr;

/// Size used for preview thumbnails.
pub const PREVIEW_SIZE: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    Png,
    #[default]
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            other => Err(AppError::Config(format!(
                "unsupported image format '{}', only svg or png supported",
                other
            ))),
        }
    }
}

/// Converts an SVG document into `format`. SVG passes through untouched;
/// PNG is rasterized so the longest side is `size` pixels.
pub fn convert_svg(svg: Vec<u8>, format: ImageFormat, size: u32) -> Result<Vec<u8>, AppError> {
    match format {
        ImageFormat::Svg => Ok(svg),
        ImageFormat::Png => rasterize_svg(&svg, size),
    }
}

pub fn rasterize_svg(svg: &[u8], size: u32) -> Result<Vec<u8>, AppError> {
    if size == 0 {
        return Err(AppError::ImageConversion("target size must be positive".to_string()));
    }

    let tree = Tree::from_data(svg, &Options::default())
        .map_err(|e| AppError::ImageConversion(format!("could not read svg: {}", e)))?;

    let source = tree.size();
    let longest = source.width().max(source.height());
    if longest <= 0.0 {
        return Err(AppError::ImageConversion("svg has no drawable area".to_string()));
    }
    let scale = size as f32 / longest;
    let width = ((source.width() * scale).round() as u32).max(1);
    let height = ((source.height() * scale).round() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        AppError::ImageConversion(format!("could not allocate {}x{} canvas", width, height))
    })?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| AppError::ImageConversion(format!("could not encode png: {}", e)))
}
