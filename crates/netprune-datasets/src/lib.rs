pub mod cifar;
pub mod download;
pub mod registry;

pub use cifar::{CifarConfig, CifarDataset};
pub use download::{ArchiveSource, HttpArchive};
pub use registry::{CifarKind, DatasetName, DatasetSpec, PartitionSizes};
