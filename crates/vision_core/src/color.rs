//! HSV threshold matching and centroid extraction for coloured stick ends.

use crate::interfaces::Frame;
use data_contracts::{ColorThreshold, StickEndpoint, TrackingFrame};

/// Match-fraction multiplier; a blob covering a tenth of the frame reads as 1.0.
pub const DEFAULT_CONFIDENCE_SCALE: f32 = 10.0;

/// RGB8 to HSV with all three components in 0..1 (hue is `degrees / 360`).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { delta / max };
    (hue_deg / 360.0, sat, max)
}

/// Distance on the hue circle, in 0..0.5.
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(1.0);
    d.min(1.0 - d)
}

pub fn matches_threshold(hsv: (f32, f32, f32), threshold: &ColorThreshold) -> bool {
    let tol = threshold.tolerance;
    hue_distance(hsv.0, threshold.hue) <= tol
        && (hsv.1 - threshold.saturation).abs() <= tol
        && (hsv.2 - threshold.value).abs() <= tol
}

/// Normalized centroid of matching pixels; `None` when nothing matches.
pub fn detect_color(frame: &Frame, threshold: &ColorThreshold) -> Option<StickEndpoint> {
    ColorEndpointDetector::new(*threshold).detect(frame)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorEndpointDetector {
    pub threshold: ColorThreshold,
    /// Sample every `stride`-th pixel in both axes.
    pub stride: u32,
    pub confidence_scale: f32,
}

impl ColorEndpointDetector {
    pub fn new(threshold: ColorThreshold) -> Self {
        Self {
            threshold,
            stride: 1,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn detect(&self, frame: &Frame) -> Option<StickEndpoint> {
        let (w, h) = frame.size;
        if w == 0 || h == 0 || !frame.is_well_formed() {
            return None;
        }
        let step = self.stride.max(1) as usize;
        let (mut sum_x, mut sum_y) = (0f64, 0f64);
        let mut matches = 0usize;
        let mut sampled = 0usize;
        for y in (0..h as usize).step_by(step) {
            let row = y * w as usize * 4;
            for x in (0..w as usize).step_by(step) {
                let i = row + x * 4;
                sampled += 1;
                let px = &frame.rgba[i..i + 3];
                if matches_threshold(rgb_to_hsv(px[0], px[1], px[2]), &self.threshold) {
                    // Pixel centres, so a full-frame match lands on 0.5.
                    sum_x += x as f64 + 0.5;
                    sum_y += y as f64 + 0.5;
                    matches += 1;
                }
            }
        }
        if matches == 0 {
            return None;
        }
        let confidence = (matches as f32 / sampled as f32 * self.confidence_scale).min(1.0);
        Some(StickEndpoint {
            x: (sum_x / matches as f64 / w as f64) as f32,
            y: (sum_y / matches as f64 / h as f64) as f32,
            confidence,
        })
    }
}

/// Two colour detectors, one per stick end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickDetector {
    pub ends: [ColorEndpointDetector; 2],
}

impl Default for StickDetector {
    fn default() -> Self {
        Self::new([ColorThreshold::orange(), ColorThreshold::green()])
    }
}

impl StickDetector {
    pub fn new(thresholds: [ColorThreshold; 2]) -> Self {
        Self {
            ends: thresholds.map(ColorEndpointDetector::new),
        }
    }

    pub fn with_stride(self, stride: u32) -> Self {
        Self {
            ends: self.ends.map(|d| d.with_stride(stride)),
        }
    }

    /// Both endpoints plus their midpoint (only when both are found).
    pub fn detect(&self, frame: &Frame) -> ([Option<StickEndpoint>; 2], Option<(f32, f32)>) {
        let endpoints = [self.ends[0].detect(frame), self.ends[1].detect(frame)];
        let midpoint = TrackingFrame::compute_midpoint(&endpoints);
        (endpoints, midpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_of_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0.0, 1.0, 1.0));
        let (h, s, v) = rgb_to_hsv(0, 255, 0);
        assert!((h - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!((s, v), (1.0, 1.0));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn hue_wraps_around() {
        assert!((hue_distance(0.02, 0.98) - 0.04).abs() < 1e-6);
        assert_eq!(hue_distance(0.25, 0.25), 0.0);
    }

    #[test]
    fn reds_near_zero_match_across_the_wrap() {
        let red = ColorThreshold::new(0.99, 1.0, 1.0, 0.05);
        assert!(matches_threshold(rgb_to_hsv(255, 0, 0), &red));
    }
}
