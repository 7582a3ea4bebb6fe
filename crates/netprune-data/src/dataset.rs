use crate::error::{DataError, DataResult};
use netprune_core::{Tensor, TensorError};

/// A single labelled image.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Channel-first `[C, H, W]` pixels.
    pub image: Tensor<f32>,
    pub label: usize,
}

/// Trait for datasets.
///
/// Implementations are shared read-only between loader workers, hence `Send + Sync`.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn get(&self, index: usize) -> DataResult<Sample>;
    fn name(&self) -> &str {
        "dataset"
    }
}

/// A dataset wrapping an `[N, C, H, W]` image tensor and its labels.
pub struct TensorDataset {
    images: Tensor<f32>,
    labels: Vec<usize>,
}

impl TensorDataset {
    pub fn new(images: Tensor<f32>, labels: Vec<usize>) -> DataResult<Self> {
        if images.ndim() != 4 {
            return Err(TensorError::DimensionMismatch(format!(
                "expected [N, C, H, W] images, got shape {}",
                images.shape()
            ))
            .into());
        }
        let n = images.shape().dim(0)?;
        if n != labels.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![labels.len()],
                got: vec![n],
            }
            .into());
        }
        Ok(TensorDataset { images, labels })
    }
}

impl Dataset for TensorDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> DataResult<Sample> {
        let label = *self.labels.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        let item_dims = self.images.shape().dims()[1..].to_vec();
        let per_item: usize = item_dims.iter().product();
        let start = index * per_item;
        let image = Tensor::new(
            self.images.data()[start..start + per_item].to_vec(),
            item_dims,
        )?;
        Ok(Sample { image, label })
    }

    fn name(&self) -> &str {
        "tensor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> TensorDataset {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        TensorDataset::new(Tensor::new(data, vec![3, 2, 2, 2]).unwrap(), vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn test_get() {
        let ds = tiny();
        assert_eq!(ds.len(), 3);
        let s = ds.get(1).unwrap();
        assert_eq!(s.label, 1);
        assert_eq!(s.image.shape_vec(), vec![2, 2, 2]);
        assert_eq!(s.image.data()[0], 8.0);
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            tiny().get(3),
            Err(DataError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_label_count_must_match() {
        let images: Tensor<f32> = Tensor::zeros(vec![2, 1, 2, 2]);
        assert!(TensorDataset::new(images, vec![0]).is_err());
    }
}
