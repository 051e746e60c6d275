/// Image crop pipeline
///
/// This module handles:
/// - Decoding uploaded, dropped and pasted images
/// - The scaled-down preview surface and its selection overlay
/// - The crop state machine
/// - Capped, re-encoded thumbnails stored as data URLs

pub mod crop;
pub mod preview;
pub mod thumbnail;

pub use crop::{CropError, CropPipeline, CropPoint};
