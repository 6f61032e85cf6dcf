use serde::{Deserialize, Serialize};

/// Output of any detector backend for one frame. All coordinates are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Center x in 0..1.
    pub x: f32,
    /// Center y in 0..1.
    pub y: f32,
    /// `[x_min, y_min, x_max, y_max]` in 0..1.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_label: String,
    /// Seconds, copied from the frame.
    pub timestamp: f64,
}

impl DetectionResult {
    /// Build from a normalized box; the center is derived and everything is clamped to 0..1.
    pub fn from_bbox(bbox: [f32; 4], confidence: f32, class_label: impl Into<String>, timestamp: f64) -> Self {
        let bbox = bbox.map(|v| v.clamp(0.0, 1.0));
        Self {
            x: (bbox[0] + bbox[2]) * 0.5,
            y: (bbox[1] + bbox[3]) * 0.5,
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            class_label: class_label.into(),
            timestamp,
        }
    }
}

/// HSV acceptance region; every component and the tolerance are in 0..1 (hue is `degrees / 360`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorThreshold {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
    pub tolerance: f32,
}

impl ColorThreshold {
    pub const fn new(hue: f32, saturation: f32, value: f32, tolerance: f32) -> Self {
        Self {
            hue,
            saturation,
            value,
            tolerance,
        }
    }

    pub const fn orange() -> Self {
        Self::new(30.0 / 360.0, 0.85, 0.9, 0.15)
    }

    pub const fn green() -> Self {
        Self::new(120.0 / 360.0, 0.7, 0.7, 0.15)
    }
}

/// A body landmark in normalized image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Visibility / presence score in 0..1.
    pub score: f32,
}

/// Centroid of one colored stick end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StickEndpoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// Per-frame tracking output. Recomputed every tick and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingFrame {
    pub frame_id: u64,
    pub timestamp: f64,
    pub pose_keypoints: Vec<Keypoint>,
    pub stick_endpoints: [Option<StickEndpoint>; 2],
    pub midpoint: Option<(f32, f32)>,
    pub frame_rate: f32,
}

impl TrackingFrame {
    /// Simple average of both endpoint centroids, when both were found.
    pub fn compute_midpoint(endpoints: &[Option<StickEndpoint>; 2]) -> Option<(f32, f32)> {
        match endpoints {
            [Some(a), Some(b)] => Some(((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)),
            _ => None,
        }
    }
}
