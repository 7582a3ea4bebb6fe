use netprune_data::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which CIFAR release backs a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CifarKind {
    Cifar10,
    Cifar100,
}

impl CifarKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            CifarKind::Cifar10 => "CIFAR-10",
            CifarKind::Cifar100 => "CIFAR-100",
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            CifarKind::Cifar10 => 10,
            CifarKind::Cifar100 => 100,
        }
    }

    /// Directory the binary archive unpacks into.
    pub fn dir_name(&self) -> &'static str {
        match self {
            CifarKind::Cifar10 => "cifar-10-batches-bin",
            CifarKind::Cifar100 => "cifar-100-binary",
        }
    }

    pub fn archive_url(&self) -> &'static str {
        match self {
            CifarKind::Cifar10 => "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz",
            CifarKind::Cifar100 => "https://www.cs.toronto.edu/~kriz/cifar-100-binary.tar.gz",
        }
    }

    /// Record files of the training or test partition.
    pub fn files(&self, train: bool) -> &'static [&'static str] {
        match (self, train) {
            (CifarKind::Cifar10, true) => &[
                "data_batch_1.bin",
                "data_batch_2.bin",
                "data_batch_3.bin",
                "data_batch_4.bin",
                "data_batch_5.bin",
            ],
            (CifarKind::Cifar10, false) => &["test_batch.bin"],
            (CifarKind::Cifar100, true) => &["train.bin"],
            (CifarKind::Cifar100, false) => &["test.bin"],
        }
    }

    /// Record counts of the official release.
    pub fn published_sizes(&self) -> PartitionSizes {
        PartitionSizes {
            train: 50_000,
            test: 10_000,
        }
    }

    /// Leading label bytes per record. CIFAR-100 stores the coarse label
    /// first, then the fine label.
    pub fn label_bytes(&self) -> usize {
        match self {
            CifarKind::Cifar10 => 1,
            CifarKind::Cifar100 => 2,
        }
    }
}

/// Number of records expected in each partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSizes {
    pub train: usize,
    pub test: usize,
}

impl PartitionSizes {
    pub fn get(&self, train: bool) -> usize {
        if train {
            self.train
        } else {
            self.test
        }
    }
}

/// Static metadata for one named dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub num_classes: usize,
    /// Side length of the square input images.
    pub image_size: usize,
    pub channels: usize,
    /// Per-channel normalization constants.
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub kind: CifarKind,
}

const CIFAR_MEAN: [f32; 3] = [0.49139968, 0.48215827, 0.44653124];
const CIFAR_STD: [f32; 3] = [0.24703233, 0.24348505, 0.26158768];

static C10: DatasetSpec = DatasetSpec {
    num_classes: 10,
    image_size: 32,
    channels: 3,
    mean: CIFAR_MEAN,
    std: CIFAR_STD,
    kind: CifarKind::Cifar10,
};

static C100: DatasetSpec = DatasetSpec {
    num_classes: 100,
    image_size: 32,
    channels: 3,
    mean: CIFAR_MEAN,
    std: CIFAR_STD,
    kind: CifarKind::Cifar100,
};

/// Dataset identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetName {
    C10,
    C100,
}

impl DatasetName {
    pub const ALL: [DatasetName; 2] = [DatasetName::C10, DatasetName::C100];

    pub fn spec(&self) -> &'static DatasetSpec {
        match self {
            DatasetName::C10 => &C10,
            DatasetName::C100 => &C100,
        }
    }

    /// Identifier used in cache file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::C10 => "c10",
            DatasetName::C100 => "c100",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DataError::UnknownDataset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let c10: DatasetName = "c10".parse().unwrap();
        assert_eq!(c10.spec().num_classes, 10);
        assert_eq!(c10.spec().image_size, 32);

        let c100: DatasetName = "c100".parse().unwrap();
        assert_eq!(c100.spec().num_classes, 100);
        assert_eq!(c100.spec().kind, CifarKind::Cifar100);
        assert_eq!(c100.to_string(), "c100");
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            "svhn".parse::<DatasetName>(),
            Err(DataError::UnknownDataset(name)) if name == "svhn"
        ));
        assert!("C10".parse::<DatasetName>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let name: DatasetName = serde_json::from_str("\"c100\"").unwrap();
        assert_eq!(name, DatasetName::C100);
        assert_eq!(serde_json::to_string(&DatasetName::C10).unwrap(), "\"c10\"");
    }

    #[test]
    fn test_partition_files() {
        assert_eq!(CifarKind::Cifar10.files(true).len(), 5);
        assert_eq!(CifarKind::Cifar100.files(false), &["test.bin"]);
        assert_eq!(CifarKind::Cifar10.published_sizes().get(true), 50_000);
        assert_eq!(CifarKind::Cifar100.published_sizes().get(false), 10_000);
    }
}
