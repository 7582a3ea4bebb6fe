//! # netprune
//!
//! Reproducible CIFAR data preparation for image-classification training runs.
//!
//! [`DataManager`] loads CIFAR-10 or CIFAR-100, holds out a validation subset of
//! the training partition and returns train, validation and test
//! [`DataLoader`](data::DataLoader)s. The train/validation split is written to
//! `split_dir` as a pair of `.npy` index files the first time it is drawn, and
//! read back on every later run so that experiments share the same held-out set.
//!
//! ## Modules
//!
//! - **core**: `Tensor` storage and shapes
//! - **data**: Dataset trait, transforms, samplers, prefetching DataLoader
//! - **datasets**: CIFAR-10/100 binary decoding and the dataset registry
//! - **preprocessing**: train/validation splitting
//! - **io**: `.npy` index files and JSON configuration

/// Tensor storage.
pub use netprune_core as core;

/// Datasets, transforms, samplers and loaders.
pub use netprune_data as data;

/// CIFAR datasets.
pub use netprune_datasets as datasets;

/// Index splitting.
pub use netprune_preprocessing as preprocessing;

/// File formats.
pub use netprune_io as io;

pub mod config;
pub mod error;
pub mod manager;
pub mod split;

pub use config::DataConfig;
pub use error::{PrepareError, PrepareResult};
pub use manager::{DataLoaders, DataManager};
pub use split::{resolve_split, MemorySplitStore, NpySplitCache, Split, SplitStore};
