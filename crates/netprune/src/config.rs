use crate::error::{PrepareError, PrepareResult};
use netprune_datasets::{DatasetName, PartitionSizes};
use netprune_preprocessing::ValidSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the [`DataManager`](crate::DataManager) needs to know.
///
/// Missing fields take their defaults when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dataset: DatasetName,
    pub batch_size: usize,
    /// Loader worker threads; 0 loads batches on the consuming thread.
    pub workers: usize,
    /// Share (or count) of the training partition held out for validation.
    pub valid_size: ValidSize,
    /// Where raw datasets are stored and downloaded to.
    pub data_root: PathBuf,
    /// Where the split index files live.
    pub split_dir: PathBuf,
    pub download: bool,
    /// Seeds split generation, sampling and augmentation.
    pub seed: Option<u64>,
    pub prefetch_factor: usize,
    /// Record counts the raw partitions must have; the official release
    /// sizes when unset. Anything else counts as a damaged download.
    pub partition_sizes: Option<PartitionSizes>,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            dataset: DatasetName::C10,
            batch_size: 128,
            workers: 4,
            valid_size: ValidSize::default(),
            data_root: PathBuf::from("./data"),
            split_dir: PathBuf::from("data_splits"),
            download: true,
            seed: None,
            prefetch_factor: 2,
            partition_sizes: None,
        }
    }
}

impl DataConfig {
    /// Defaults for the dataset named `dataset` (e.g. `"c10"`).
    pub fn new(dataset: &str) -> PrepareResult<Self> {
        Ok(DataConfig {
            dataset: dataset.parse()?,
            ..DataConfig::default()
        })
    }

    pub fn from_json_file(path: &Path) -> PrepareResult<Self> {
        Ok(netprune_io::load_json(path)?)
    }

    pub fn save_json_file(&self, path: &Path) -> PrepareResult<()> {
        Ok(netprune_io::save_json(self, path)?)
    }

    pub fn validate(&self) -> PrepareResult<()> {
        if self.batch_size == 0 {
            return Err(PrepareError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }
        self.valid_size.check().map_err(|reason| {
            PrepareError::InvalidConfig(format!("valid_size {}: {}", self.valid_size, reason))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprune_data::DataError;

    #[test]
    fn test_new_parses_name() {
        let config = DataConfig::new("c100").unwrap();
        assert_eq!(config.dataset, DatasetName::C100);
        assert_eq!(config.split_dir, PathBuf::from("data_splits"));

        assert!(matches!(
            DataConfig::new("imagenet"),
            Err(PrepareError::Data(DataError::UnknownDataset(_)))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DataConfig =
            serde_json::from_str(r#"{ "dataset": "c100", "batch_size": 64, "valid_size": 5000 }"#)
                .unwrap();
        assert_eq!(config.dataset, DatasetName::C100);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.valid_size, ValidSize::Count(5000));
        assert_eq!(config.workers, 4);
        assert!(config.download);
        assert_eq!(config.partition_sizes, None);
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let config = DataConfig {
            seed: Some(3),
            ..DataConfig::default()
        };
        config.save_json_file(&path).unwrap();
        assert_eq!(DataConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate() {
        assert!(DataConfig::default().validate().is_ok());

        let zero_batch = DataConfig {
            batch_size: 0,
            ..DataConfig::default()
        };
        assert!(matches!(zero_batch.validate(), Err(PrepareError::InvalidConfig(_))));

        let bad_fraction = DataConfig {
            valid_size: ValidSize::Fraction(1.5),
            ..DataConfig::default()
        };
        assert!(bad_fraction.validate().is_err());
    }
}
