//! Training-time augmentation.
//!
//! Every geometric change to the pixels is mirrored on the label in the same
//! call, so an augmented sample can never disagree with its own label.

use data_contracts::LabelVector;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct AugmentConfig {
    /// Probability of the horizontal-flip branch.
    pub flip_prob: f32,
    /// Max absolute brightness offset (0-1 range) for the photometric branch.
    pub brightness_delta: f32,
    /// Seed for reproducible augmentation; thread RNG when `None`.
    pub seed: Option<u64>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip_prob: 0.5,
            brightness_delta: 0.2,
            seed: None,
        }
    }
}

/// Which branch `Augmentor::augment` took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Augmentation {
    Flipped,
    Brightness(f32),
}

pub struct Augmentor {
    cfg: AugmentConfig,
    rng: StdRng,
}

impl Augmentor {
    pub fn new(cfg: AugmentConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self { cfg, rng }
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.cfg
    }

    /// Either flips image and label together, or shifts brightness.
    pub fn augment(&mut self, image: &RgbImage, label: &LabelVector) -> (RgbImage, LabelVector, Augmentation) {
        let mut img = image.clone();
        if self.rng.random_range(0.0..1.0) < self.cfg.flip_prob {
            let label = flip_horizontal(&mut img, label);
            return (img, label, Augmentation::Flipped);
        }
        let delta = if self.cfg.brightness_delta > 0.0 {
            self.rng
                .random_range(-self.cfg.brightness_delta..self.cfg.brightness_delta)
        } else {
            0.0
        };
        shift_brightness(&mut img, delta);
        (img, label.clone(), Augmentation::Brightness(delta))
    }
}

/// Mirror pixels in place and return the reflected label (`x -> 1 - x`).
pub fn flip_horizontal(img: &mut RgbImage, label: &LabelVector) -> LabelVector {
    image::imageops::flip_horizontal_in_place(img);
    label.flipped_horizontal()
}

/// Add `delta` (0-1 scale) to every channel, clipping back into range.
pub fn shift_brightness(img: &mut RgbImage, delta: f32) {
    if delta == 0.0 {
        return;
    }
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0 + delta;
            pixel[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}
