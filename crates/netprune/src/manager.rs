use std::sync::Arc;

use log::info;
use netprune_data::{
    Compose, DataLoader, Dataset, LoaderConfig, Normalize, RandomCrop, RandomHorizontalFlip,
    SequentialSampler, SubsetRandomSampler, ToTensor,
};
use netprune_datasets::{CifarConfig, CifarDataset, DatasetName, DatasetSpec};

use crate::config::DataConfig;
use crate::error::{PrepareError, PrepareResult};
use crate::split::{resolve_split, NpySplitCache, Split, SplitStore};

/// Zero padding added on every side before the training crop.
pub const CROP_PADDING: usize = 4;
/// Probability of mirroring a training image.
pub const FLIP_PROBABILITY: f64 = 0.5;

/// The three loaders produced by [`DataManager::prepare`].
pub struct DataLoaders {
    /// Augmented, shuffled batches from the training indices.
    pub train: DataLoader,
    /// Un-augmented, shuffled batches from the validation indices.
    pub valid: DataLoader,
    /// Un-augmented batches over the test partition, in file order.
    pub test: DataLoader,
}

/// Prepares CIFAR loaders with a train/validation split that is created once
/// and then reused from `split_dir` on every later run.
///
/// # Example
///
/// ```no_run
/// use netprune::{DataConfig, DataManager};
///
/// let mut manager = DataManager::new(DataConfig::new("c10")?)?;
/// let mut loaders = manager.prepare()?;
/// for batch in loaders.train.iter()? {
///     let batch = batch?;
///     assert_eq!(batch.inputs.shape_vec()[1..], [3, 32, 32]);
/// }
/// # Ok::<(), netprune::PrepareError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DataManager {
    config: DataConfig,
    spec: &'static DatasetSpec,
    num_train: Option<usize>,
}

impl DataManager {
    pub fn new(config: DataConfig) -> PrepareResult<Self> {
        config.validate()?;
        let spec = config.dataset.spec();
        Ok(DataManager {
            config,
            spec,
            num_train: None,
        })
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn dataset_name(&self) -> DatasetName {
        self.config.dataset
    }

    pub fn num_classes(&self) -> usize {
        self.spec.num_classes
    }

    /// Side length of the square network input.
    pub fn image_size(&self) -> usize {
        self.spec.image_size
    }

    /// Size of the training partition, known once [`prepare`](Self::prepare) has run.
    pub fn num_train(&self) -> Option<usize> {
        self.num_train
    }

    /// Crop, flip, scale to `[0, 1]`, normalize.
    pub fn train_transform(&self) -> PrepareResult<Compose> {
        Ok(Compose::new()
            .then(RandomCrop::new(self.spec.image_size, CROP_PADDING))
            .then(RandomHorizontalFlip::new(FLIP_PROBABILITY))
            .then(ToTensor)
            .then(Normalize::new(&self.spec.mean, &self.spec.std)?))
    }

    /// Scale to `[0, 1]`, normalize.
    pub fn eval_transform(&self) -> PrepareResult<Compose> {
        Ok(Compose::new()
            .then(ToTensor)
            .then(Normalize::new(&self.spec.mean, &self.spec.std)?))
    }

    /// Load both partitions (downloading them if allowed and needed), resolve
    /// the split and build the train, validation and test loaders.
    pub fn prepare(&mut self) -> PrepareResult<DataLoaders> {
        info!("... Preparing data ...");

        let kind = self.spec.kind;
        let cifar = |train| CifarConfig {
            root: self.config.data_root.clone(),
            train,
            download: self.config.download,
            sizes: self.config.partition_sizes,
        };
        let train_data: Arc<dyn Dataset> = Arc::new(CifarDataset::new(kind, &cifar(true))?);
        let test_data: Arc<dyn Dataset> = Arc::new(CifarDataset::new(kind, &cifar(false))?);

        self.num_train = Some(train_data.len());
        let Split { train, valid } = self.split()?;

        let train_transform = Arc::new(self.train_transform()?);
        let eval_transform = Arc::new(self.eval_transform()?);

        let seed = |offset: u64| self.config.seed.map(|s| s.wrapping_add(offset));
        let loader_config = |offset: u64, pin: bool| {
            LoaderConfig::default()
                .batch_size(self.config.batch_size)
                .workers(self.config.workers)
                .prefetch_factor(self.config.prefetch_factor)
                .pin_memory(pin)
                .seed(seed(offset))
        };

        let train = DataLoader::new(
            train_data.clone(),
            train_transform,
            Box::new(SubsetRandomSampler::new(train, seed(0))),
            loader_config(2, true),
        )?;
        let valid = DataLoader::new(
            train_data,
            eval_transform.clone(),
            Box::new(SubsetRandomSampler::new(valid, seed(1))),
            loader_config(3, true),
        )?;
        let test = DataLoader::new(
            test_data.clone(),
            eval_transform,
            Box::new(SequentialSampler::new(test_data.len())),
            loader_config(4, false),
        )?;

        info!(
            "{}: {} train / {} valid / {} test samples, batch size {}, {} workers",
            self.config.dataset,
            train.num_samples(),
            valid.num_samples(),
            test.num_samples(),
            self.config.batch_size,
            self.config.workers
        );

        Ok(DataLoaders { train, valid, test })
    }

    /// The split for this dataset, from `split_dir` if present there.
    pub fn split(&self) -> PrepareResult<Split> {
        self.split_with(&NpySplitCache::new(&self.config.split_dir))
    }

    /// Like [`split`](Self::split), against any [`SplitStore`].
    pub fn split_with<S: SplitStore + ?Sized>(&self, store: &S) -> PrepareResult<Split> {
        let num_train = self.num_train.ok_or_else(|| {
            PrepareError::InvalidConfig("training partition size unknown before prepare".into())
        })?;
        resolve_split(
            store,
            self.config.dataset.as_str(),
            num_train,
            self.config.valid_size,
            self.config.seed,
        )
    }
}
