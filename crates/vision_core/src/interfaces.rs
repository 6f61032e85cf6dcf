use data_contracts::TrackingFrame;
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// One RGBA8 frame from a camera, video or test generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    /// Capture timestamp (seconds).
    pub timestamp: f64,
    /// Image dimensions (width, height).
    pub size: (u32, u32),
    /// Row-major RGBA8, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn from_rgba(id: u64, timestamp: f64, image: RgbaImage) -> Self {
        let size = image.dimensions();
        Self {
            id,
            timestamp,
            size,
            rgba: image.into_raw(),
        }
    }

    pub fn from_rgb(id: u64, timestamp: f64, image: &RgbImage) -> Self {
        let rgba = image::DynamicImage::ImageRgb8(image.clone()).to_rgba8();
        Self::from_rgba(id, timestamp, rgba)
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    /// `None` when the buffer length does not match `size`.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.size.0, self.size.1, self.rgba.clone())
    }

    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        self.to_rgba_image()
            .map(|img| image::DynamicImage::ImageRgba8(img).to_rgb8())
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == (self.size.0 as usize) * (self.size.1 as usize) * 4
    }
}

/// Pulls frames from some source (camera, decoded video, test generator).
/// `None` means end of stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Data passed to a recorder sink.
#[derive(Debug)]
pub struct FrameRecord<'a> {
    pub frame_id: u64,
    pub timestamp: f64,
    /// Annotated output frame.
    pub image: &'a RgbaImage,
    pub tracking: &'a TrackingFrame,
}

/// Persists annotated frames to a sink (disk, stream, etc).
pub trait Recorder: Send {
    fn record(&mut self, record: &FrameRecord) -> std::io::Result<()>;
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
