use crate::interfaces::Frame;
use data_contracts::{DetectionResult, TrackingFrame};
use image::{Rgba, RgbaImage};

/// Normalize a box from 0..1 space into pixel coordinates, clamped to image bounds.
pub fn normalize_box(bbox_norm: [f32; 4], dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let x0 = clamp(bbox_norm[0] * w as f32, w);
    let y0 = clamp(bbox_norm[1] * h as f32, h);
    let x1 = clamp(bbox_norm[2] * w as f32, w);
    let y1 = clamp(bbox_norm[3] * h as f32, h);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some([x0, y0, x1, y1])
}

/// Draw a rectangle border with given thickness.
pub fn draw_rect(img: &mut RgbaImage, bbox_px: [u32; 4], color: Rgba<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let [x0, y0, x1, y1] = bbox_px;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 >= w || yy0 >= h || xx1 >= w || yy1 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

/// Filled disc centred on a pixel position; parts outside the image are clipped.
pub fn fill_disc(img: &mut RgbaImage, center: (i64, i64), radius: i64, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let (x, y) = (center.0 + dx, center.1 + dy);
            if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Bresenham line between two pixel positions.
pub fn draw_line(img: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub keypoint: Rgba<u8>,
    pub endpoints: [Rgba<u8>; 2],
    pub line: Rgba<u8>,
    pub midpoint: Rgba<u8>,
    pub detection: Rgba<u8>,
    pub radius: i64,
    /// Keypoints scoring below this are not drawn.
    pub min_keypoint_score: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            keypoint: Rgba([0, 200, 255, 255]),
            endpoints: [Rgba([255, 140, 0, 255]), Rgba([0, 200, 0, 255])],
            line: Rgba([255, 255, 255, 255]),
            midpoint: Rgba([255, 0, 255, 255]),
            detection: Rgba([255, 0, 0, 255]),
            radius: 4,
            min_keypoint_score: 0.3,
        }
    }
}

fn to_px(norm: (f32, f32), dims: (u32, u32)) -> (i64, i64) {
    (
        (norm.0 * dims.0 as f32).round() as i64,
        (norm.1 * dims.1 as f32).round() as i64,
    )
}

/// Annotated copy of `frame`: keypoints, endpoint markers, connecting line and midpoint.
pub fn render_overlay(frame: &Frame, tracking: &TrackingFrame, style: &OverlayStyle) -> RgbaImage {
    let mut img = frame
        .to_rgba_image()
        .unwrap_or_else(|| RgbaImage::new(frame.width(), frame.height()));
    let dims = img.dimensions();

    for kp in &tracking.pose_keypoints {
        if kp.score >= style.min_keypoint_score {
            fill_disc(&mut img, to_px((kp.x, kp.y), dims), (style.radius / 2).max(1), style.keypoint);
        }
    }
    if let [Some(a), Some(b)] = &tracking.stick_endpoints {
        draw_line(&mut img, to_px((a.x, a.y), dims), to_px((b.x, b.y), dims), style.line);
    }
    for (end, color) in tracking.stick_endpoints.iter().zip(style.endpoints) {
        if let Some(e) = end {
            fill_disc(&mut img, to_px((e.x, e.y), dims), style.radius, color);
        }
    }
    if let Some(mid) = tracking.midpoint {
        fill_disc(&mut img, to_px(mid, dims), (style.radius / 2).max(1), style.midpoint);
    }
    img
}

/// Outline every detection box.
pub fn draw_detections(img: &mut RgbaImage, detections: &[DetectionResult], color: Rgba<u8>) {
    let dims = img.dimensions();
    for det in detections {
        if let Some(px) = normalize_box(det.bbox, dims) {
            draw_rect(img, px, color, 2);
        }
    }
}
