//! Train/validation index splits and their on-disk cache.
//!
//! [`resolve_split`] holds the reuse-or-regenerate decision and talks to
//! storage only through [`SplitStore`], so it can be exercised without a disk.

use crate::error::PrepareResult;
use log::{info, warn};
use netprune_data::DataError;
use netprune_preprocessing::{train_test_split, ValidSize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Disjoint train and validation indices covering `0..num_train`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the two halves are disjoint and together cover `0..num_train`.
    pub fn validate(&self, num_train: usize) -> Result<(), DataError> {
        if self.len() != num_train {
            return Err(DataError::InvalidSplit(format!(
                "{} + {} indices for {} samples",
                self.train.len(),
                self.valid.len(),
                num_train
            )));
        }
        let mut seen = vec![false; num_train];
        for &i in self.train.iter().chain(&self.valid) {
            match seen.get_mut(i) {
                None => {
                    return Err(DataError::InvalidSplit(format!(
                        "index {} outside 0..{}",
                        i, num_train
                    )))
                }
                Some(true) => {
                    return Err(DataError::InvalidSplit(format!("index {} appears twice", i)))
                }
                Some(slot) => *slot = true,
            }
        }
        Ok(())
    }
}

/// Storage for splits, keyed by dataset identifier.
pub trait SplitStore {
    /// The stored split, or `None` when it is absent or unreadable.
    fn load(&self, name: &str) -> Option<Split>;

    fn persist(&self, name: &str, split: &Split) -> PrepareResult<()>;
}

/// Splits stored as `<dir>/<name>_train_idx.npy` and `<dir>/<name>_valid_idx.npy`.
#[derive(Debug, Clone)]
pub struct NpySplitCache {
    dir: PathBuf,
}

impl NpySplitCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        NpySplitCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the train and validation index files for `name`.
    pub fn paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{name}_train_idx.npy")),
            self.dir.join(format!("{name}_valid_idx.npy")),
        )
    }
}

impl SplitStore for NpySplitCache {
    fn load(&self, name: &str) -> Option<Split> {
        let (train_path, valid_path) = self.paths(name);
        if !(train_path.exists() && valid_path.exists()) {
            return None;
        }
        let read = || -> PrepareResult<Split> {
            Ok(Split {
                train: netprune_io::read_indices(&train_path)?,
                valid: netprune_io::read_indices(&valid_path)?,
            })
        };
        match read() {
            Ok(split) => Some(split),
            Err(e) => {
                warn!("Ignoring unreadable split cache for {}: {}", name, e);
                None
            }
        }
    }

    fn persist(&self, name: &str, split: &Split) -> PrepareResult<()> {
        fs::create_dir_all(&self.dir).map_err(netprune_io::IoError::from)?;
        let (train_path, valid_path) = self.paths(name);
        netprune_io::write_indices(&train_path, &split.train)?;
        netprune_io::write_indices(&valid_path, &split.valid)?;
        Ok(())
    }
}

/// Splits kept in memory, for callers that must not touch the disk.
#[derive(Debug, Default)]
pub struct MemorySplitStore {
    splits: RefCell<HashMap<String, Split>>,
}

impl MemorySplitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, split: Split) {
        self.splits.borrow_mut().insert(name.to_string(), split);
    }

    pub fn remove(&self, name: &str) -> Option<Split> {
        self.splits.borrow_mut().remove(name)
    }
}

impl SplitStore for MemorySplitStore {
    fn load(&self, name: &str) -> Option<Split> {
        self.splits.borrow().get(name).cloned()
    }

    fn persist(&self, name: &str, split: &Split) -> PrepareResult<()> {
        self.insert(name, split.clone());
        Ok(())
    }
}

/// Reuse the stored split for `name` if there is a valid one, otherwise draw a
/// fresh split of `0..num_train` and store it.
///
/// A stored split is reused even when `valid_size` has changed since it was made.
pub fn resolve_split<S: SplitStore + ?Sized>(
    store: &S,
    name: &str,
    num_train: usize,
    valid_size: ValidSize,
    seed: Option<u64>,
) -> PrepareResult<Split> {
    if let Some(split) = store.load(name) {
        match split.validate(num_train) {
            Ok(()) => {
                info!(
                    "Using fixed split for {}: {} train / {} valid",
                    name,
                    split.train.len(),
                    split.valid.len()
                );
                return Ok(split);
            }
            Err(e) => warn!("Ignoring stored split for {}: {}", name, e),
        }
    }

    info!("Creating a split for {}", name);
    let (train, valid) = train_test_split((0..num_train).collect(), valid_size, seed)?;
    let split = Split { train, valid };
    store.persist(name, &split)?;
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepareError;

    #[test]
    fn test_validate() {
        let ok = Split {
            train: vec![3, 0, 2],
            valid: vec![1],
        };
        assert!(ok.validate(4).is_ok());
        assert!(ok.validate(5).is_err());

        let overlap = Split {
            train: vec![0, 1],
            valid: vec![1],
        };
        assert!(overlap.validate(3).is_err());

        let outside = Split {
            train: vec![0, 7],
            valid: vec![1],
        };
        assert!(outside.validate(3).is_err());
    }

    #[test]
    fn test_creates_then_reuses() {
        let store = MemorySplitStore::new();
        let first = resolve_split(&store, "c10", 1000, ValidSize::Fraction(0.1), None).unwrap();
        assert_eq!(first.valid.len(), 100);
        assert_eq!(first.train.len(), 900);
        assert!(first.validate(1000).is_ok());

        let second = resolve_split(&store, "c10", 1000, ValidSize::Fraction(0.1), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stale_valid_size_is_reused() {
        let store = MemorySplitStore::new();
        let first = resolve_split(&store, "c10", 200, ValidSize::Fraction(0.1), Some(1)).unwrap();
        let second = resolve_split(&store, "c10", 200, ValidSize::Fraction(0.5), Some(1)).unwrap();
        assert_eq!(second, first);
        assert_eq!(second.valid.len(), 20);
    }

    #[test]
    fn test_regenerates_after_removal() {
        let store = MemorySplitStore::new();
        let first = resolve_split(&store, "c100", 500, ValidSize::Count(50), None).unwrap();
        store.remove("c100");
        let second = resolve_split(&store, "c100", 500, ValidSize::Count(50), None).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.load("c100"), Some(second));
    }

    #[test]
    fn test_invalid_stored_split_is_replaced() {
        let store = MemorySplitStore::new();
        store.insert(
            "c10",
            Split {
                train: vec![0, 1],
                valid: vec![2],
            },
        );
        let split = resolve_split(&store, "c10", 10, ValidSize::Count(2), Some(0)).unwrap();
        assert_eq!(split.len(), 10);
        assert_eq!(store.load("c10"), Some(split));
    }

    #[test]
    fn test_names_are_independent() {
        let store = MemorySplitStore::new();
        resolve_split(&store, "c10", 50, ValidSize::Count(5), Some(2)).unwrap();
        assert!(store.load("c100").is_none());
    }

    #[test]
    fn test_empty_training_set() {
        let store = MemorySplitStore::new();
        let result = resolve_split(&store, "c10", 0, ValidSize::Fraction(0.1), None);
        assert!(matches!(result, Err(PrepareError::Split(_))));
        assert!(store.load("c10").is_none());
    }

    #[test]
    fn test_npy_cache_layout() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NpySplitCache::new(dir.path().join("nested").join("data_splits"));
        let (train_path, valid_path) = cache.paths("c10");
        assert!(train_path.ends_with("c10_train_idx.npy"));
        assert!(valid_path.ends_with("c10_valid_idx.npy"));

        assert!(cache.load("c10").is_none());
        let split = resolve_split(&cache, "c10", 300, ValidSize::Fraction(0.2), None).unwrap();
        assert!(train_path.exists() && valid_path.exists());
        assert_eq!(cache.load("c10"), Some(split));
    }

    #[test]
    fn test_npy_cache_needs_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NpySplitCache::new(dir.path());
        resolve_split(&cache, "c10", 100, ValidSize::Count(10), Some(4)).unwrap();
        fs::remove_file(cache.paths("c10").1).unwrap();
        assert!(cache.load("c10").is_none());
    }

    #[test]
    fn test_corrupt_cache_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NpySplitCache::new(dir.path());
        let (train_path, valid_path) = cache.paths("c10");
        fs::write(&train_path, b"garbage").unwrap();
        fs::write(&valid_path, b"garbage").unwrap();

        assert!(cache.load("c10").is_none());
        let split = resolve_split(&cache, "c10", 40, ValidSize::Count(4), None).unwrap();
        assert_eq!(cache.load("c10"), Some(split));
    }

    #[test]
    fn test_unwritable_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data_splits");
        fs::write(&blocker, b"a file, not a directory").unwrap();

        let cache = NpySplitCache::new(&blocker);
        let result = resolve_split(&cache, "c10", 10, ValidSize::Count(1), None);
        assert!(matches!(result, Err(PrepareError::Io(_))));
    }
}
