use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, DynamicImage, RgbaImage};

use super::crop::CropError;
use super::preview::PixelRect;
use crate::state::data::ImagePayload;

/// Longest side of a stored thumbnail
pub const THUMBNAIL_CAP: u32 = 320;

/// Fixed lossy output encoding for every stored image
pub const THUMBNAIL_MIME: &str = "image/jpeg";
pub const JPEG_QUALITY: u8 = 85;

/// Size after capping the longer side at `cap`. Never enlarges.
pub fn capped_size(width: u32, height: u32, cap: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= cap {
        return (width, height);
    }

    let scale = cap as f64 / longest as f64;
    let scaled_width = ((width as f64 * scale).round() as u32).max(1);
    let scaled_height = ((height as f64 * scale).round() as u32).max(1);
    (scaled_width, scaled_height)
}

/// Cut `rect` out of the preview, cap it and encode it as a data URL
pub fn make_thumbnail(preview: &RgbaImage, rect: PixelRect) -> Result<ImagePayload, CropError> {
    if rect.is_empty() {
        return Err(CropError::EmptyRegion);
    }

    let cropped = image::imageops::crop_imm(preview, rect.x, rect.y, rect.width, rect.height).to_image();
    let (target_width, target_height) = capped_size(cropped.width(), cropped.height(), THUMBNAIL_CAP);

    let resized = if (target_width, target_height) == cropped.dimensions() {
        cropped
    } else {
        image::imageops::resize(&cropped, target_width, target_height, FilterType::Lanczos3)
    };

    let bytes = encode_jpeg(resized)?;
    tracing::debug!(
        "📸 Thumbnail {}x{} ({} bytes)",
        target_width,
        target_height,
        bytes.len()
    );

    Ok(ImagePayload::from_bytes(THUMBNAIL_MIME, &bytes))
}

/// JPEG carries no alpha channel, so transparency is dropped here
fn encode_jpeg(image: RgbaImage) -> Result<Vec<u8>, CropError> {
    let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
    let mut bytes = Vec::new();

    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8.into())
        .map_err(|e| CropError::Encode(e.to_string()))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_capped_size_keeps_small_regions() {
        assert_eq!(capped_size(100, 50, THUMBNAIL_CAP), (100, 50));
        assert_eq!(capped_size(320, 320, THUMBNAIL_CAP), (320, 320));
    }

    #[test]
    fn test_capped_size_shrinks_longer_side() {
        assert_eq!(capped_size(800, 300, THUMBNAIL_CAP), (320, 120));
        assert_eq!(capped_size(300, 600, THUMBNAIL_CAP), (160, 320));
        assert_eq!(capped_size(2000, 1, THUMBNAIL_CAP), (320, 1));
    }

    #[test]
    fn test_make_thumbnail_encodes_capped_jpeg() {
        let preview = RgbaImage::from_pixel(800, 400, Rgba([10, 200, 30, 255]));

        let payload = make_thumbnail(&preview, PixelRect::full(800, 400)).unwrap();

        let decoded = payload.decode().unwrap();
        assert_eq!(decoded.mime, THUMBNAIL_MIME);
        let thumbnail = image::load_from_memory(&decoded.bytes).unwrap();
        assert_eq!((thumbnail.width(), thumbnail.height()), (320, 160));
    }

    #[test]
    fn test_make_thumbnail_rejects_empty_rect() {
        let preview = RgbaImage::new(10, 10);
        let rect = PixelRect {
            x: 2,
            y: 2,
            width: 0,
            height: 5,
        };
        assert_eq!(make_thumbnail(&preview, rect), Err(CropError::EmptyRegion));
    }
}
