//! Building blocks for feeding image batches to a training loop.
//!
//! - [`Dataset`]: indexed access to `(image, label)` samples
//! - [`Transform`]: per-sample augmentation and normalization, chained with [`Compose`]
//! - [`Sampler`]: which indices a pass visits, and in what order
//! - [`DataLoader`]: batches samples, optionally prefetching on worker threads

pub mod dataloader;
pub mod dataset;
pub mod error;
pub mod sampler;
pub mod transform;

pub use dataloader::{Batch, Batches, DataLoader, LoaderConfig};
pub use dataset::{Dataset, Sample, TensorDataset};
pub use error::{DataError, DataResult};
pub use sampler::{Sampler, SequentialSampler, SubsetRandomSampler};
pub use transform::{Compose, Normalize, RandomCrop, RandomHorizontalFlip, ToTensor, Transform};
