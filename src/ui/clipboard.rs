use image::{DynamicImage, RgbaImage};

/// Read an image from the system clipboard
pub fn read_image() -> Result<DynamicImage, String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| format!("Clipboard unavailable: {}", e))?;
    let data = clipboard
        .get_image()
        .map_err(|e| format!("No image on the clipboard: {}", e))?;

    let rgba = RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned())
        .ok_or_else(|| "Clipboard image has an unexpected size".to_string())?;

    Ok(DynamicImage::ImageRgba8(rgba))
}
