use crate::download::{ArchiveSource, HttpArchive};
use crate::registry::{CifarKind, PartitionSizes};
use log::{debug, info, warn};
use netprune_core::Tensor;
use netprune_data::{DataError, DataResult, Dataset, Sample};
use std::fs;
use std::path::{Path, PathBuf};

/// Channels, height and width of every CIFAR image.
pub const IMAGE_DIMS: [usize; 3] = [3, 32, 32];
const IMAGE_BYTES: usize = 3 * 32 * 32;

/// Configuration for loading one CIFAR partition.
#[derive(Debug, Clone)]
pub struct CifarConfig {
    /// Root directory holding (or receiving) the extracted archive.
    pub root: PathBuf,
    /// Training partition (true) or held-out test partition (false).
    pub train: bool,
    /// Fetch the archive when its files are missing or damaged.
    pub download: bool,
    /// Record counts to expect; the official release sizes when `None`.
    pub sizes: Option<PartitionSizes>,
}

impl Default for CifarConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            train: true,
            download: true,
            sizes: None,
        }
    }
}

/// Why the files of a partition cannot be used as they are.
enum Unusable {
    Missing,
    Damaged { path: PathBuf, reason: String },
}

/// One partition of CIFAR-10 or CIFAR-100, decoded from the binary release.
///
/// Pixels stay as bytes in memory; [`Dataset::get`] widens one image at a time
/// to an `f32` `[3, 32, 32]` tensor with values in `0..=255`.
pub struct CifarDataset {
    kind: CifarKind,
    train: bool,
    images: Vec<u8>,
    labels: Vec<u8>,
}

impl CifarDataset {
    pub fn new(kind: CifarKind, config: &CifarConfig) -> DataResult<Self> {
        Self::with_source(kind, config, &HttpArchive)
    }

    /// Like [`new`](Self::new), fetching missing or damaged files from `source`.
    pub fn with_source(
        kind: CifarKind,
        config: &CifarConfig,
        source: &dyn ArchiveSource,
    ) -> DataResult<Self> {
        let dir = config.root.join(kind.dir_name());
        let expected = config
            .sizes
            .unwrap_or_else(|| kind.published_sizes())
            .get(config.train);

        match Self::check_files(kind, &dir, config.train, expected) {
            Ok(()) => {}
            Err(unusable) if config.download => {
                if let Unusable::Damaged { path, reason } = &unusable {
                    warn!(
                        "{:?} is damaged ({}), fetching {} again",
                        path,
                        reason,
                        kind.display_name()
                    );
                }
                source.fetch(kind, &config.root)?;
                if let Err(unusable) = Self::check_files(kind, &dir, config.train, expected) {
                    let detail = match unusable {
                        Unusable::Missing => "is missing files".to_string(),
                        Unusable::Damaged { path, reason } => {
                            format!("has {:?}: {}", path, reason)
                        }
                    };
                    return Err(DataError::Download(format!(
                        "fetched {} archive {}",
                        kind.display_name(),
                        detail
                    )));
                }
            }
            Err(Unusable::Missing) => {
                return Err(DataError::MissingFiles {
                    dataset: kind.display_name().to_string(),
                    path: dir,
                })
            }
            Err(Unusable::Damaged { path, reason }) => {
                return Err(DataError::Corrupt { path, reason })
            }
        }

        let mut images = Vec::with_capacity(expected * IMAGE_BYTES);
        let mut labels = Vec::with_capacity(expected);
        for file in kind.files(config.train) {
            let path = dir.join(file);
            let bytes = fs::read(&path)?;
            Self::decode_records(kind, &bytes, &path, &mut images, &mut labels)?;
            debug!("Decoded {:?}", path);
        }

        info!(
            "Loaded {} {} split: {} images",
            kind.display_name(),
            if config.train { "train" } else { "test" },
            labels.len()
        );

        Ok(CifarDataset {
            kind,
            train: config.train,
            images,
            labels,
        })
    }

    /// Check from file sizes alone that every record file exists and that
    /// together they hold exactly `expected` records.
    fn check_files(
        kind: CifarKind,
        dir: &Path,
        train: bool,
        expected: usize,
    ) -> Result<(), Unusable> {
        let record = kind.label_bytes() + IMAGE_BYTES;
        let mut total = 0;
        for file in kind.files(train) {
            let path = dir.join(file);
            let len = match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta.len() as usize,
                _ => return Err(Unusable::Missing),
            };
            if len == 0 || len % record != 0 {
                return Err(Unusable::Damaged {
                    path,
                    reason: format!(
                        "size {} is not a positive multiple of the {}-byte record",
                        len, record
                    ),
                });
            }
            total += len / record;
        }
        if total != expected {
            return Err(Unusable::Damaged {
                path: dir.to_path_buf(),
                reason: format!("{} records, expected {}", total, expected),
            });
        }
        Ok(())
    }

    /// Split a record file into pixel bytes and fine labels.
    fn decode_records(
        kind: CifarKind,
        bytes: &[u8],
        path: &Path,
        images: &mut Vec<u8>,
        labels: &mut Vec<u8>,
    ) -> DataResult<()> {
        let label_bytes = kind.label_bytes();
        let record = label_bytes + IMAGE_BYTES;
        if bytes.is_empty() || bytes.len() % record != 0 {
            return Err(DataError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "size {} is not a positive multiple of the {}-byte record",
                    bytes.len(),
                    record
                ),
            });
        }

        let num_classes = kind.num_classes();
        for chunk in bytes.chunks_exact(record) {
            let label = chunk[label_bytes - 1];
            if usize::from(label) >= num_classes {
                return Err(DataError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("label {} out of range for {} classes", label, num_classes),
                });
            }
            labels.push(label);
            images.extend_from_slice(&chunk[label_bytes..]);
        }
        Ok(())
    }

    pub fn kind(&self) -> CifarKind {
        self.kind
    }

    pub fn is_train(&self) -> bool {
        self.train
    }

    pub fn label(&self, index: usize) -> Option<usize> {
        self.labels.get(index).map(|&l| usize::from(l))
    }
}

impl Dataset for CifarDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> DataResult<Sample> {
        let label = self.label(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        let start = index * IMAGE_BYTES;
        let pixels = &self.images[start..start + IMAGE_BYTES];
        let image = Tensor::from_bytes(pixels, IMAGE_DIMS.to_vec())?;
        Ok(Sample { image, label })
    }

    fn name(&self) -> &str {
        match (self.kind, self.train) {
            (CifarKind::Cifar10, true) => "cifar10-train",
            (CifarKind::Cifar10, false) => "cifar10-test",
            (CifarKind::Cifar100, true) => "cifar100-train",
            (CifarKind::Cifar100, false) => "cifar100-test",
        }
    }
}

/// Synthetic CIFAR record files for tests.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use super::*;
    use crate::download::install_dir;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Build `n` records whose pixels all equal `(i % 251)` and whose label is `i % classes`.
    pub fn records(kind: CifarKind, n: usize, offset: usize) -> Vec<u8> {
        let classes = kind.num_classes();
        let mut out = Vec::with_capacity(n * (kind.label_bytes() + IMAGE_BYTES));
        for i in offset..offset + n {
            if kind == CifarKind::Cifar100 {
                out.push((i % 20) as u8); // coarse label
            }
            out.push((i % classes) as u8);
            out.extend(std::iter::repeat((i % 251) as u8).take(IMAGE_BYTES));
        }
        out
    }

    /// Write a full extracted-archive layout under `root`, with `per_file`
    /// records in each training file and `test` records in the test file.
    pub fn write_layout(
        root: &Path,
        kind: CifarKind,
        per_file: usize,
        test: usize,
    ) -> std::io::Result<()> {
        let dir = root.join(kind.dir_name());
        fs::create_dir_all(&dir)?;
        let mut offset = 0;
        for file in kind.files(true) {
            fs::write(dir.join(file), records(kind, per_file, offset))?;
            offset += per_file;
        }
        for file in kind.files(false) {
            fs::write(dir.join(file), records(kind, test, 0))?;
        }
        Ok(())
    }

    /// Partition sizes of a [`write_layout`] tree.
    pub fn layout_sizes(kind: CifarKind, per_file: usize, test: usize) -> PartitionSizes {
        PartitionSizes {
            train: per_file * kind.files(true).len(),
            test: test * kind.files(false).len(),
        }
    }

    /// An [`ArchiveSource`] that installs a [`write_layout`] tree and counts fetches.
    #[derive(Debug)]
    pub struct FixtureArchive {
        pub per_file: usize,
        pub test: usize,
        fetches: AtomicUsize,
    }

    impl FixtureArchive {
        pub fn new(per_file: usize, test: usize) -> Self {
            FixtureArchive {
                per_file,
                test,
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ArchiveSource for FixtureArchive {
        fn fetch(&self, kind: CifarKind, root: &Path) -> DataResult<()> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            install_dir(root, kind.dir_name(), |staging| {
                Ok(write_layout(staging, kind, self.per_file, self.test)?)
            })
        }
    }
}
