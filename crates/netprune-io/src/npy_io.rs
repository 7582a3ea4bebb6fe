use crate::error::{IoError, IoResult};
use ndarray::Array1;
use ndarray_npy::{read_npy, write_npy, ReadNpyError};
use std::path::Path;

/// Write indices as a 1-D little-endian `int64` `.npy` array.
///
/// The parent directory must already exist.
pub fn write_indices(path: &Path, indices: &[usize]) -> IoResult<()> {
    let array: Array1<i64> = indices.iter().map(|&i| i as i64).collect();
    write_npy(path, &array).map_err(|source| IoError::WriteNpy {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a 1-D `.npy` array of non-negative integer indices.
///
/// Accepts `int64` and `int32` element types.
pub fn read_indices(path: &Path) -> IoResult<Vec<usize>> {
    let values: Vec<i64> = match read_npy::<_, Array1<i64>>(path) {
        Ok(array) => array.iter().copied().collect(),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, Array1<i32>>(path)
            .map_err(|source| IoError::ReadNpy {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(|&v| v as i64)
            .collect(),
        Err(source) => {
            return Err(IoError::ReadNpy {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    values
        .into_iter()
        .map(|value| {
            usize::try_from(value).map_err(|_| IoError::NegativeIndex {
                path: path.to_path_buf(),
                value,
            })
        })
        .collect()
}
