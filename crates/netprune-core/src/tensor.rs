use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use serde::{Deserialize, Serialize};

/// Dense N-dimensional tensor used for images and batches.
///
/// Stores data in a flat contiguous `Vec<T>` with row-major (C-order) layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        Tensor::full(shape, T::ZERO)
    }

    /// Create a tensor filled with a constant value.
    pub fn full(shape: Vec<usize>, value: T) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![value; s.numel()],
            shape: s,
        }
    }

    /// Widen raw bytes (e.g. 8-bit pixels) into a tensor, keeping their values.
    pub fn from_bytes(bytes: &[u8], shape: Vec<usize>) -> TensorResult<Self> {
        Tensor::new(bytes.iter().map(|&b| T::from_u8(b)).collect(), shape)
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    // ─── Batching ───────────────────────────────────────────────────────────

    /// Stack equally-shaped tensors along a new leading axis.
    pub fn stack(tensors: &[Tensor<T>]) -> TensorResult<Tensor<T>> {
        let first = tensors.first().ok_or(TensorError::EmptyTensor)?;
        let item_shape = first.shape().clone();
        let mut data = Vec::with_capacity(tensors.len() * first.numel());
        for t in tensors {
            if t.shape != item_shape {
                return Err(TensorError::ShapeMismatch {
                    expected: item_shape.to_vec(),
                    got: t.shape_vec(),
                });
            }
            data.extend_from_slice(&t.data);
        }
        Ok(Tensor {
            data,
            shape: item_shape.with_leading(tensors.len()),
        })
    }

    // ─── Element-wise ───────────────────────────────────────────────────────

    /// Apply a function to every element in place.
    pub fn apply_mut<F: Fn(T) -> T>(&mut self, f: F) {
        for x in self.data.iter_mut() {
            *x = f(*x);
        }
    }
}

impl<T: Float> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation() {
        let t: Tensor<f32> = Tensor::zeros(vec![3, 4]);
        assert_eq!(t.shape_vec(), vec![3, 4]);
        assert_eq!(t.numel(), 12);
        assert_eq!(t.data()[0], 0.0);

        let bad: TensorResult<Tensor<f32>> = Tensor::new(vec![1.0, 2.0], vec![3]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_from_bytes() {
        let t: Tensor<f32> = Tensor::from_bytes(&[0, 128, 255], vec![3]).unwrap();
        assert_eq!(t.data(), &[0.0, 128.0, 255.0]);
    }

    #[test]
    fn test_stack() {
        let a: Tensor<f32> = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 2, 2]).unwrap();
        let b: Tensor<f32> = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![1, 2, 2]).unwrap();
        let s = Tensor::stack(&[a, b]).unwrap();
        assert_eq!(s.shape_vec(), vec![2, 1, 2, 2]);
        assert_eq!(s.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_stack_rejects_mismatch() {
        let a: Tensor<f32> = Tensor::zeros(vec![2]);
        let b: Tensor<f32> = Tensor::zeros(vec![3]);
        assert!(Tensor::stack(&[a, b]).is_err());
        assert_eq!(Tensor::<f32>::stack(&[]), Err(TensorError::EmptyTensor));
    }

    #[test]
    fn test_full_and_apply_mut() {
        let mut t: Tensor<f64> = Tensor::full(vec![2, 2], 2.0);
        t.apply_mut(|x| x / 4.0);
        assert_eq!(t.ndim(), 2);
        approx::assert_relative_eq!(t.data()[3], 0.5);
    }
}
