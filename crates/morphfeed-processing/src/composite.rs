//! Side-by-side composition of two generated images.
//!
//! The canvas is `max(wA, wB) x max(hA, hB)`. Each input is stretched (not
//! aspect-fit) into its half: left/right for [`Orientation::Vertical`],
//! top/bottom for [`Orientation::Horizontal`]. With an odd extent the first
//! half gets `floor(extent / 2)` and the second half the remainder, so the
//! canvas is always fully covered.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageReader, RgbaImage};
use morphfeed_core::{ErrorMetadata, FailureKind, LogLevel};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Cursor;
use std::str::FromStr;

/// JPEG quality used for composites (0.92 on a 0-1 scale).
pub const COMPOSITE_JPEG_QUALITY: u8 = 92;

pub const COMPOSITE_CONTENT_TYPE: &str = "image/jpeg";

/// Split direction of the composite.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// A on the left half, B on the right half
    #[default]
    Vertical,
    /// A on the top half, B on the bottom half
    Horizontal,
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Orientation::Vertical => write!(f, "vertical"),
            Orientation::Horizontal => write!(f, "horizontal"),
        }
    }
}

impl FromStr for Orientation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vertical" => Ok(Orientation::Vertical),
            "horizontal" => Ok(Orientation::Horizontal),
            _ => Err(anyhow::anyhow!("Invalid orientation: {}", s)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("Failed to decode image {which}: {message}")]
    Decode { which: &'static str, message: String },

    #[error("Failed to encode composite: {0}")]
    Encode(String),

    #[error("Canvas {width}x{height} is too small to split {orientation}")]
    TooSmall {
        width: u32,
        height: u32,
        orientation: Orientation,
    },
}

impl CompositionError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::Composition
    }
}

impl ErrorMetadata for CompositionError {
    fn error_code(&self) -> &'static str {
        match self {
            CompositionError::Decode { .. } => "COMPOSITE_DECODE_FAILED",
            CompositionError::Encode(_) => "COMPOSITE_ENCODE_FAILED",
            CompositionError::TooSmall { .. } => "COMPOSITE_TOO_SMALL",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }

    fn client_message(&self) -> String {
        "The two styles could not be combined into one image".to_string()
    }
}

/// Encoded composite ready for upload.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

impl CompositeImage {
    pub fn content_type(&self) -> &'static str {
        COMPOSITE_CONTENT_TYPE
    }
}

/// Compose two decoded images onto one canvas.
pub fn compose(
    a: &DynamicImage,
    b: &DynamicImage,
    orientation: Orientation,
) -> Result<RgbaImage, CompositionError> {
    let (wa, ha) = a.dimensions();
    let (wb, hb) = b.dimensions();
    let width = wa.max(wb);
    let height = ha.max(hb);

    // (x, y, w, h) of the first and second destination rectangles
    let (first, second) = match orientation {
        Orientation::Vertical => {
            let left = width / 2;
            ((0, 0, left, height), (left, 0, width - left, height))
        }
        Orientation::Horizontal => {
            let top = height / 2;
            ((0, 0, width, top), (0, top, width, height - top))
        }
    };

    if first.2 == 0 || first.3 == 0 || second.2 == 0 || second.3 == 0 {
        return Err(CompositionError::TooSmall {
            width,
            height,
            orientation,
        });
    }

    let mut canvas = RgbaImage::new(width, height);
    for (img, (x, y, w, h)) in [(a, first), (b, second)] {
        let stretched = stretch(img, w, h);
        imageops::replace(&mut canvas, &stretched, x as i64, y as i64);
    }

    Ok(canvas)
}

/// Decode both outputs, compose them and encode the result as JPEG.
pub fn compose_bytes(
    a: &[u8],
    b: &[u8],
    orientation: Orientation,
) -> Result<CompositeImage, CompositionError> {
    let img_a = decode(a, "A")?;
    let img_b = decode(b, "B")?;

    let canvas = compose(&img_a, &img_b, orientation)?;
    let (width, height) = canvas.dimensions();
    let data = encode_jpeg(canvas)?;

    tracing::debug!(
        width = width,
        height = height,
        orientation = %orientation,
        size_bytes = data.len(),
        "Composite encoded"
    );

    Ok(CompositeImage {
        data,
        width,
        height,
    })
}

fn stretch(img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let rgba = img.to_rgba8();
    if rgba.dimensions() == (width, height) {
        return rgba;
    }
    imageops::resize(&rgba, width, height, FilterType::Triangle)
}

fn decode(data: &[u8], which: &'static str) -> Result<DynamicImage, CompositionError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CompositionError::Decode {
            which,
            message: e.to_string(),
        })?;
    reader.decode().map_err(|e| CompositionError::Decode {
        which,
        message: e.to_string(),
    })
}

fn encode_jpeg(canvas: RgbaImage) -> Result<Bytes, CompositionError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, COMPOSITE_JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| CompositionError::Encode(e.to_string()))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn is_red(p: &Rgba<u8>) -> bool {
        p[0] > 200 && p[2] < 50
    }

    fn is_blue(p: &Rgba<u8>) -> bool {
        p[2] > 200 && p[0] < 50
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn test_vertical_split_uses_max_dimensions() {
        let a = solid(100, 100, RED);
        let b = solid(200, 100, BLUE);

        let canvas = compose(&a, &b, Orientation::Vertical).unwrap();
        assert_eq!(canvas.dimensions(), (200, 100));
        assert!(is_red(canvas.get_pixel(10, 50)));
        assert!(is_red(canvas.get_pixel(99, 50)));
        assert!(is_blue(canvas.get_pixel(100, 50)));
        assert!(is_blue(canvas.get_pixel(150, 50)));
    }

    #[test]
    fn test_horizontal_split_stretches_into_halves() {
        let a = solid(40, 300, RED);
        let b = solid(120, 80, BLUE);

        let canvas = compose(&a, &b, Orientation::Horizontal).unwrap();
        assert_eq!(canvas.dimensions(), (120, 300));
        assert!(is_red(canvas.get_pixel(60, 10)));
        assert!(is_red(canvas.get_pixel(119, 149)));
        assert!(is_blue(canvas.get_pixel(0, 150)));
        assert!(is_blue(canvas.get_pixel(60, 299)));
    }

    #[test]
    fn test_odd_width_covers_whole_canvas() {
        let a = solid(101, 10, RED);
        let b = solid(3, 10, BLUE);

        let canvas = compose(&a, &b, Orientation::Vertical).unwrap();
        assert_eq!(canvas.dimensions(), (101, 10));
        assert!(is_red(canvas.get_pixel(49, 5)));
        assert!(is_blue(canvas.get_pixel(50, 5)));
        // Last column belongs to B and is opaque
        assert!(is_blue(canvas.get_pixel(100, 5)));
        assert_eq!(canvas.get_pixel(100, 5)[3], 255);
    }

    #[test]
    fn test_single_pixel_canvas_is_too_small() {
        let a = solid(1, 1, RED);
        let b = solid(1, 1, BLUE);
        assert!(matches!(
            compose(&a, &b, Orientation::Vertical),
            Err(CompositionError::TooSmall { .. })
        ));
    }

    #[test]
    fn test_compose_bytes_produces_jpeg() {
        let a = png_bytes(&solid(64, 48, RED));
        let b = png_bytes(&solid(32, 64, BLUE));

        let composite = compose_bytes(&a, &b, Orientation::Vertical).unwrap();
        assert_eq!((composite.width, composite.height), (64, 64));
        assert_eq!(composite.content_type(), "image/jpeg");
        assert_eq!(
            image::guess_format(&composite.data).unwrap(),
            ImageFormat::Jpeg
        );

        let decoded = image::load_from_memory(&composite.data).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_compose_bytes_reports_which_input_failed() {
        let good = png_bytes(&solid(8, 8, RED));
        let err = compose_bytes(&good, b"not an image", Orientation::Vertical).unwrap_err();
        assert!(matches!(err, CompositionError::Decode { which: "B", .. }));
        assert_eq!(err.kind(), FailureKind::Composition);
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!(
            "Horizontal".parse::<Orientation>().unwrap(),
            Orientation::Horizontal
        );
        assert!("diagonal".parse::<Orientation>().is_err());
        assert_eq!(Orientation::default(), Orientation::Vertical);
    }
}
