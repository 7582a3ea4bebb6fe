// Per-sample image transforms.
//
// Every transform takes a channel-first `[C, H, W]` f32 image. Randomness comes
// from the caller's rng so a seeded loader reproduces its augmentations.

use crate::error::{DataError, DataResult};
use netprune_core::{Tensor, TensorError};
use rand::rngs::StdRng;
use rand::Rng;

/// A transform applied to each image as it is retrieved.
pub trait Transform: Send + Sync {
    fn apply(&self, image: Tensor<f32>, rng: &mut StdRng) -> DataResult<Tensor<f32>>;
}

/// An ordered chain of transforms.
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new() -> Self {
        Compose { steps: Vec::new() }
    }

    /// Append a step to the chain.
    pub fn then<T: Transform + 'static>(mut self, step: T) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, image: Tensor<f32>, rng: &mut StdRng) -> DataResult<Tensor<f32>> {
        self.steps
            .iter()
            .try_fold(image, |img, step| step.apply(img, rng))
    }
}

// RandomCrop

/// Zero-pad by `padding` pixels on every side, then crop a `size × size`
/// window at a uniformly random offset.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    pub size: usize,
    pub padding: usize,
}

impl RandomCrop {
    pub fn new(size: usize, padding: usize) -> Self {
        Self { size, padding }
    }
}

impl Transform for RandomCrop {
    fn apply(&self, image: Tensor<f32>, rng: &mut StdRng) -> DataResult<Tensor<f32>> {
        let (c, h, w) = image.shape().chw()?;
        let pad = self.padding;
        let padded_h = h + 2 * pad;
        let padded_w = w + 2 * pad;
        if self.size > padded_h || self.size > padded_w {
            return Err(TensorError::DimensionMismatch(format!(
                "crop size {} exceeds padded image {}x{}",
                self.size, padded_h, padded_w
            ))
            .into());
        }

        let y0 = rng.gen_range(0..=padded_h - self.size);
        let x0 = rng.gen_range(0..=padded_w - self.size);

        // Read straight from the source; anything outside it is padding.
        let src = image.data();
        let s = self.size;
        let mut cropped = vec![0.0f32; c * s * s];
        for ch in 0..c {
            for row in 0..s {
                let py = y0 + row;
                if py < pad || py >= pad + h {
                    continue;
                }
                for col in 0..s {
                    let px = x0 + col;
                    if px < pad || px >= pad + w {
                        continue;
                    }
                    cropped[ch * s * s + row * s + col] =
                        src[ch * h * w + (py - pad) * w + (px - pad)];
                }
            }
        }
        Ok(Tensor::new(cropped, vec![c, s, s])?)
    }
}

// RandomHorizontalFlip

/// Mirror the image left-to-right with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    pub p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Self {
        Self { p }
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, mut image: Tensor<f32>, rng: &mut StdRng) -> DataResult<Tensor<f32>> {
        let (_, _, w) = image.shape().chw()?;
        if rng.gen::<f64>() >= self.p {
            return Ok(image);
        }
        for row in image.data_mut().chunks_mut(w) {
            row.reverse();
        }
        Ok(image)
    }
}

// ToTensor

/// Scale 8-bit pixel values into `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct ToTensor;

impl Transform for ToTensor {
    fn apply(&self, mut image: Tensor<f32>, _rng: &mut StdRng) -> DataResult<Tensor<f32>> {
        image.apply_mut(|x| x / 255.0);
        Ok(image)
    }
}

// Normalize

/// Per-channel standardization: `(x - mean[c]) / std[c]`.
#[derive(Debug, Clone)]
pub struct Normalize {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> DataResult<Self> {
        if mean.len() != std.len() {
            return Err(DataError::InvalidConfig(format!(
                "normalization has {} means but {} standard deviations",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|&s| s <= 0.0) {
            return Err(DataError::InvalidConfig(
                "standard deviations must be positive".into(),
            ));
        }
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }
}

impl Transform for Normalize {
    fn apply(&self, mut image: Tensor<f32>, _rng: &mut StdRng) -> DataResult<Tensor<f32>> {
        let (c, h, w) = image.shape().chw()?;
        if c != self.mean.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.mean.len(), h, w],
                got: vec![c, h, w],
            }
            .into());
        }
        for (ch, plane) in image.data_mut().chunks_mut(h * w).enumerate() {
            let (m, s) = (self.mean[ch], self.std[ch]);
            for x in plane {
                *x = (*x - m) / s;
            }
        }
        Ok(image)
    }
}
