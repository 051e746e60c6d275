/// Interactive crop state machine
///
/// One in-flight image at a time:
///
/// ```text
/// Idle ──load──▶ ImageLoaded ──pointer_down──▶ Selecting ──pointer_up──▶ RegionFinalized
///                     ▲                           │  ▲                          │
///                     │                           └──┘ pointer_move             │
///                     └─────────────────────────── reset ───────────────────────┘
/// ```
///
/// Every transition consumes the pipeline and returns the next one, so the
/// owner always holds exactly one state value. Nothing is persisted here;
/// `apply` only produces a thumbnail for the caller to store.
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use thiserror::Error;

use super::preview::{build_preview, render_selection, PixelRect};
use super::thumbnail::make_thumbnail;
use crate::state::data::ImagePayload;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("No image loaded")]
    NoImage,
    #[error("Please select an area to crop")]
    EmptyRegion,
    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),
}

/// A pointer position in preview pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropPoint {
    pub x: f32,
    pub y: f32,
}

impl CropPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Anchor and opposite corner of a drag selection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropRegion {
    pub start: CropPoint,
    pub end: CropPoint,
}

impl CropRegion {
    /// Nothing was dragged: both corners coincide
    pub fn is_unset(&self) -> bool {
        self.start == self.end
    }

    /// Rectangle with non-negative size, clamped to a `width` x `height` surface
    pub fn normalized(&self, width: u32, height: u32) -> PixelRect {
        let clamp_x = |v: f32| v.clamp(0.0, width as f32).round() as u32;
        let clamp_y = |v: f32| v.clamp(0.0, height as f32).round() as u32;

        let (x0, x1) = (clamp_x(self.start.x), clamp_x(self.end.x));
        let (y0, y1) = (clamp_y(self.start.y), clamp_y(self.end.y));

        PixelRect {
            x: x0.min(x1),
            y: y0.min(y1),
            width: x0.abs_diff(x1),
            height: y0.abs_diff(y1),
        }
    }
}

/// A decoded image and its preview surface
#[derive(Debug, Clone)]
pub struct LoadedImage {
    preview: Arc<RgbaImage>,
    source_size: (u32, u32),
}

impl LoadedImage {
    fn new(source: &DynamicImage) -> Self {
        Self {
            preview: Arc::new(build_preview(source)),
            source_size: (source.width(), source.height()),
        }
    }

    pub fn preview(&self) -> &RgbaImage {
        &self.preview
    }

    pub fn preview_size(&self) -> (u32, u32) {
        self.preview.dimensions()
    }

    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }
}

#[derive(Debug, Clone, Default)]
pub enum CropPipeline {
    #[default]
    Idle,
    ImageLoaded(LoadedImage),
    Selecting {
        image: LoadedImage,
        region: CropRegion,
    },
    RegionFinalized {
        image: LoadedImage,
        region: CropRegion,
    },
}

impl CropPipeline {
    /// Decode uploaded, dropped or pasted bytes.
    /// On failure the caller keeps whatever pipeline it already had.
    pub fn load(bytes: &[u8]) -> Result<Self, CropError> {
        let source = image::load_from_memory(bytes).map_err(|e| CropError::Decode(e.to_string()))?;
        Self::from_image(source)
    }

    /// Start from an already decoded image (clipboard paste)
    pub fn from_image(source: DynamicImage) -> Result<Self, CropError> {
        if source.width() == 0 || source.height() == 0 {
            return Err(CropError::Decode("image has no pixels".to_string()));
        }

        let image = LoadedImage::new(&source);
        tracing::debug!(
            "🖼️  Loaded {}x{} image, preview {}x{}",
            image.source_size.0,
            image.source_size.1,
            image.preview_size().0,
            image.preview_size().1
        );
        Ok(CropPipeline::ImageLoaded(image))
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        match self {
            CropPipeline::Idle => None,
            CropPipeline::ImageLoaded(image)
            | CropPipeline::Selecting { image, .. }
            | CropPipeline::RegionFinalized { image, .. } => Some(image),
        }
    }

    pub fn region(&self) -> Option<CropRegion> {
        match self {
            CropPipeline::Selecting { region, .. } | CropPipeline::RegionFinalized { region, .. } => {
                Some(*region)
            }
            _ => None,
        }
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self, CropPipeline::Selecting { .. })
    }

    /// Anchor a new selection
    pub fn pointer_down(self, at: CropPoint) -> Self {
        match self {
            CropPipeline::Idle => CropPipeline::Idle,
            CropPipeline::ImageLoaded(image)
            | CropPipeline::Selecting { image, .. }
            | CropPipeline::RegionFinalized { image, .. } => CropPipeline::Selecting {
                image,
                region: CropRegion { start: at, end: at },
            },
        }
    }

    /// Track the opposite corner while the button is held
    pub fn pointer_move(self, to: CropPoint) -> Self {
        match self {
            CropPipeline::Selecting { image, region } => CropPipeline::Selecting {
                image,
                region: CropRegion { end: to, ..region },
            },
            other => other,
        }
    }

    /// Freeze the selection
    pub fn pointer_up(self) -> Self {
        match self {
            CropPipeline::Selecting { image, region } => CropPipeline::RegionFinalized { image, region },
            other => other,
        }
    }

    /// Back to the plain preview, keeping the image
    pub fn reset(self) -> Self {
        match self {
            CropPipeline::Idle => CropPipeline::Idle,
            CropPipeline::ImageLoaded(image)
            | CropPipeline::Selecting { image, .. }
            | CropPipeline::RegionFinalized { image, .. } => CropPipeline::ImageLoaded(image),
        }
    }

    /// The rectangle `apply` would cut out.
    /// With no selection, or a click without drag, that is the whole preview.
    pub fn selection_rect(&self) -> Result<PixelRect, CropError> {
        let image = self.image().ok_or(CropError::NoImage)?;
        let (width, height) = image.preview_size();

        let rect = match self.region() {
            Some(region) if !region.is_unset() => region.normalized(width, height),
            _ => PixelRect::full(width, height),
        };

        if rect.is_empty() {
            return Err(CropError::EmptyRegion);
        }
        Ok(rect)
    }

    /// Crop, cap and encode the selection. The pipeline is left as it was,
    /// so a failed apply can be followed by a new selection.
    pub fn apply(&self) -> Result<ImagePayload, CropError> {
        let rect = self.selection_rect()?;
        let image = self.image().ok_or(CropError::NoImage)?;
        make_thumbnail(image.preview(), rect)
    }

    /// Current preview frame: plain image, or dimmed around the selection
    pub fn render_preview(&self) -> Option<RgbaImage> {
        let image = self.image()?;
        match self.region() {
            Some(region) if !region.is_unset() => {
                let (width, height) = image.preview_size();
                Some(render_selection(image.preview(), region.normalized(width, height)))
            }
            _ => Some(image.preview().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([120, 40, 200, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn thumbnail_size(payload: &ImagePayload) -> (u32, u32) {
        let decoded = payload.decode().unwrap();
        let image = image::load_from_memory(&decoded.bytes).unwrap();
        (image.width(), image.height())
    }

    fn select(pipeline: CropPipeline, from: (f32, f32), to: (f32, f32)) -> CropPipeline {
        pipeline
            .pointer_down(CropPoint::new(from.0, from.1))
            .pointer_move(CropPoint::new(to.0, to.1))
            .pointer_up()
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        let result = CropPipeline::load(b"definitely not an image");
        assert!(matches!(result, Err(CropError::Decode(_))));
    }

    #[test]
    fn test_load_scales_preview() {
        let pipeline = CropPipeline::load(&png_bytes(1600, 600)).unwrap();
        let image = pipeline.image().unwrap();
        assert_eq!(image.source_size(), (1600, 600));
        assert_eq!(image.preview_size(), (800, 300));
    }

    #[test]
    fn test_apply_without_selection_uses_full_image() {
        let pipeline = CropPipeline::load(&png_bytes(1600, 600)).unwrap();

        let payload = pipeline.apply().unwrap();

        assert_eq!(thumbnail_size(&payload), (320, 120));
    }

    #[test]
    fn test_click_without_drag_uses_full_image() {
        let pipeline = CropPipeline::load(&png_bytes(200, 100)).unwrap();
        let pipeline = pipeline.pointer_down(CropPoint::new(50.0, 50.0)).pointer_up();

        assert_eq!(pipeline.selection_rect().unwrap(), PixelRect::full(200, 100));
        assert_eq!(thumbnail_size(&pipeline.apply().unwrap()), (200, 100));
    }

    #[test]
    fn test_zero_width_region_is_rejected_and_state_kept() {
        let pipeline = CropPipeline::load(&png_bytes(200, 100)).unwrap();
        let pipeline = select(pipeline, (40.0, 10.0), (40.0, 80.0));

        assert_eq!(pipeline.apply(), Err(CropError::EmptyRegion));
        assert!(matches!(pipeline, CropPipeline::RegionFinalized { .. }));

        // a fresh selection on the same pipeline works
        let pipeline = select(pipeline, (10.0, 10.0), (60.0, 30.0));
        assert_eq!(thumbnail_size(&pipeline.apply().unwrap()), (50, 20));
    }

    #[test]
    fn test_zero_height_region_is_rejected() {
        let pipeline = CropPipeline::load(&png_bytes(200, 100)).unwrap();
        let pipeline = select(pipeline, (20.0, 30.0), (150.0, 30.0));

        assert_eq!(pipeline.selection_rect(), Err(CropError::EmptyRegion));
        assert_eq!(pipeline.apply(), Err(CropError::EmptyRegion));
        assert!(matches!(pipeline, CropPipeline::RegionFinalized { .. }));
    }

    #[test]
    fn test_reverse_drag_is_normalized() {
        let pipeline = CropPipeline::load(&png_bytes(200, 100)).unwrap();
        let pipeline = select(pipeline, (150.0, 90.0), (50.0, 40.0));

        assert_eq!(
            pipeline.selection_rect().unwrap(),
            PixelRect {
                x: 50,
                y: 40,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn test_selection_is_clamped_to_preview() {
        let pipeline = CropPipeline::load(&png_bytes(200, 100)).unwrap();
        let pipeline = select(pipeline, (-30.0, -30.0), (500.0, 500.0));
        assert_eq!(pipeline.selection_rect().unwrap(), PixelRect::full(200, 100));
    }

    #[test]
    fn test_large_selection_is_capped() {
        let pipeline = CropPipeline::load(&png_bytes(1600, 1200)).unwrap();
        let pipeline = select(pipeline, (0.0, 0.0), (700.0, 350.0));
        assert_eq!(thumbnail_size(&pipeline.apply().unwrap()), (320, 160));
    }

    #[test]
    fn test_apply_on_idle_reports_no_image() {
        assert_eq!(CropPipeline::Idle.apply(), Err(CropError::NoImage));
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        let pipeline = CropPipeline::Idle.pointer_down(CropPoint::new(1.0, 1.0));
        assert!(matches!(pipeline, CropPipeline::Idle));

        let pipeline = CropPipeline::load(&png_bytes(100, 100)).unwrap();
        let pipeline = pipeline.pointer_move(CropPoint::new(5.0, 5.0));
        assert!(matches!(pipeline, CropPipeline::ImageLoaded(_)));

        let pipeline = pipeline.pointer_down(CropPoint::new(10.0, 10.0));
        assert!(pipeline.is_selecting());
        let pipeline = pipeline.pointer_move(CropPoint::new(30.0, 20.0));
        assert_eq!(
            pipeline.region().unwrap().end,
            CropPoint::new(30.0, 20.0)
        );

        let pipeline = pipeline.pointer_up();
        assert!(matches!(pipeline, CropPipeline::RegionFinalized { .. }));
        // moves after release do not change the frozen region
        let pipeline = pipeline.pointer_move(CropPoint::new(90.0, 90.0));
        assert_eq!(pipeline.region().unwrap().end, CropPoint::new(30.0, 20.0));

        let pipeline = pipeline.reset();
        assert!(matches!(pipeline, CropPipeline::ImageLoaded(_)));
        assert!(pipeline.region().is_none());
        assert_eq!(pipeline.image().unwrap().preview_size(), (100, 100));
    }

    #[test]
    fn test_render_preview_dims_around_selection() {
        let pipeline = CropPipeline::load(&png_bytes(100, 100)).unwrap();
        let plain = pipeline.render_preview().unwrap();
        assert_eq!(plain.get_pixel(0, 0), &Rgba([120, 40, 200, 255]));

        let pipeline = select(pipeline, (20.0, 20.0), (80.0, 80.0));
        let frame = pipeline.render_preview().unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgba([60, 20, 100, 255]));
        assert_eq!(frame.get_pixel(50, 50), &Rgba([120, 40, 200, 255]));
    }
}
