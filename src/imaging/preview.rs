/// Preview surface for the cropper
///
/// The source image is shown scaled down to fit the preview box. All
/// selection coordinates live in this preview pixel space.
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};

/// Largest preview size; bigger images are shrunk to fit, smaller ones are left alone
pub const PREVIEW_MAX_WIDTH: u32 = 800;
pub const PREVIEW_MAX_HEIGHT: u32 = 600;

/// Selection outline colour (#00ff41)
const OUTLINE: Rgba<u8> = Rgba([0x00, 0xFF, 0x41, 0xFF]);
/// Outline thickness in preview pixels, centred on the region edge
const OUTLINE_WIDTH: i64 = 2;

/// Axis-aligned rectangle in preview pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Size of the preview for a source of `width` x `height`.
/// Aspect ratio is preserved and the image is only ever shrunk.
pub fn preview_size(width: u32, height: u32) -> (u32, u32) {
    if width <= PREVIEW_MAX_WIDTH && height <= PREVIEW_MAX_HEIGHT {
        return (width, height);
    }

    let ratio = f64::min(
        PREVIEW_MAX_WIDTH as f64 / width as f64,
        PREVIEW_MAX_HEIGHT as f64 / height as f64,
    );
    let scaled_width = ((width as f64 * ratio) as u32).max(1);
    let scaled_height = ((height as f64 * ratio) as u32).max(1);
    (scaled_width, scaled_height)
}

/// Scale the decoded source into the preview surface
pub fn build_preview(source: &DynamicImage) -> RgbaImage {
    let rgba = source.to_rgba8();
    let (width, height) = preview_size(rgba.width(), rgba.height());

    if (width, height) == rgba.dimensions() {
        rgba
    } else {
        image::imageops::resize(&rgba, width, height, FilterType::Triangle)
    }
}

/// Redraw the preview with everything outside `region` dimmed by half
/// and the region outlined.
pub fn render_selection(preview: &RgbaImage, region: PixelRect) -> RgbaImage {
    let mut frame = preview.clone();

    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        if !region.contains(x, y) {
            let [r, g, b, a] = pixel.0;
            *pixel = Rgba([r / 2, g / 2, b / 2, a]);
        }
    }

    if !region.is_empty() {
        draw_outline(&mut frame, region);
    }

    frame
}

fn draw_outline(frame: &mut RgbaImage, region: PixelRect) {
    let half = OUTLINE_WIDTH / 2;
    let (left, top) = (region.x as i64, region.y as i64);
    let right = left + region.width as i64;
    let bottom = top + region.height as i64;

    let (frame_width, frame_height) = (frame.width() as i64, frame.height() as i64);

    for y in (top - half).max(0)..(bottom + half).min(frame_height) {
        for x in (left - half).max(0)..(right + half).min(frame_width) {
            let inner = x >= left + half && x < right - half && y >= top + half && y < bottom - half;
            if !inner {
                frame.put_pixel(x as u32, y as u32, OUTLINE);
            }
        }
    }
}
