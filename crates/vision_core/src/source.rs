//! Frame sources backed by memory or by a directory of decoded video frames.

use crate::interfaces::{Frame, FrameSource};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::warn;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Plays back the image files of a directory in file-name order.
///
/// Frames that fail to decode are skipped with a warning.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    fps: f64,
    next_id: u64,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> std::io::Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        Ok(Self {
            paths: paths.into(),
            fps: if fps > 0.0 { fps } else { 30.0 },
            next_id: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<Frame> {
        while let Some(path) = self.paths.pop_front() {
            match image::open(&path) {
                Ok(img) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    return Some(Frame::from_rgba(id, id as f64 / self.fps, img.to_rgba8()));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping undecodable frame"),
            }
        }
        None
    }
}

/// In-memory frames, mainly for tests and synthetic streams.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<Frame>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn sequence_is_sorted_and_skips_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(tmp.path().join("b.png")).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])).save(tmp.path().join("a.png")).unwrap();
        std::fs::write(tmp.path().join("c.png"), b"nope").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();

        let mut src = ImageSequenceSource::open(tmp.path(), 10.0).unwrap();
        assert_eq!(src.remaining(), 3);
        let first = src.next_frame().unwrap();
        assert_eq!(first.rgba[0], 9);
        let second = src.next_frame().unwrap();
        assert_eq!((second.id, second.timestamp), (1, 0.1));
        assert!(src.next_frame().is_none());
    }
}
