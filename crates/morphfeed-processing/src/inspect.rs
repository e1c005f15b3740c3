use anyhow::{anyhow, Result};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Basic facts about an encoded image, read from its header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ImageInfo {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Detect format and dimensions without decoding pixel data.
pub fn inspect(data: &[u8]) -> Result<ImageInfo> {
    if data.is_empty() {
        return Err(anyhow!("Empty image data"));
    }

    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| anyhow!("Unrecognized image format"))?;
    let (width, height) = reader.into_dimensions()?;

    Ok(ImageInfo {
        width,
        height,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_inspect_png() {
        let img = RgbImage::from_pixel(30, 20, Rgb([10, 20, 30]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();

        let info = inspect(&buffer).unwrap();
        assert_eq!((info.width, info.height), (30, 20));
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.content_type(), "image/png");
        assert_eq!(info.extension(), "png");
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(inspect(&[]).is_err());
        assert!(inspect(b"plain text, not pixels").is_err());
    }
}
