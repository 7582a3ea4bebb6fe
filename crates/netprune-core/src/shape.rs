use crate::error::{TensorError, TensorResult};
use serde::{Deserialize, Serialize};

/// Dimensions of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Size along a specific axis.
    pub fn dim(&self, axis: usize) -> TensorResult<usize> {
        self.dims.get(axis).copied().ok_or(TensorError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.clone()
    }

    /// The same shape with a new outermost axis of size `n`, e.g. a batch axis.
    pub fn with_leading(&self, n: usize) -> Shape {
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        dims.push(n);
        dims.extend_from_slice(&self.dims);
        Shape::new(dims)
    }

    /// Interpret the shape as a non-empty channel-first image `[C, H, W]`.
    pub fn chw(&self) -> TensorResult<(usize, usize, usize)> {
        match self.dims.as_slice() {
            &[c, h, w] if c > 0 && h > 0 && w > 0 => Ok((c, h, w)),
            &[_, _, _] => Err(TensorError::EmptyTensor),
            _ => Err(TensorError::DimensionMismatch(format!(
                "expected a [C, H, W] image, got shape {}",
                self
            ))),
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let s = Shape::new(vec![3, 32, 32]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 3072);
        assert_eq!(s.dim(0).unwrap(), 3);
        assert_eq!(s.dim(2).unwrap(), 32);
        assert!(s.dim(3).is_err());
    }

    #[test]
    fn test_with_leading() {
        let s = Shape::new(vec![3, 32, 32]).with_leading(128);
        assert_eq!(s.dims(), &[128, 3, 32, 32]);
    }

    #[test]
    fn test_chw() {
        assert_eq!(Shape::new(vec![3, 8, 6]).chw().unwrap(), (3, 8, 6));
        assert!(Shape::new(vec![8, 6]).chw().is_err());
        assert_eq!(Shape::new(vec![3, 0, 6]).chw(), Err(TensorError::EmptyTensor));
        assert_eq!(Shape::new(vec![3, 8, 0]).chw(), Err(TensorError::EmptyTensor));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::new(vec![2, 3])), "(2, 3)");
        assert_eq!(Shape::new(vec![]).numel(), 1);
    }
}
