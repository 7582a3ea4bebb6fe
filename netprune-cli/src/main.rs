use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use log::info;

use netprune::data::DataLoader;
use netprune::datasets::DatasetName;
use netprune::preprocessing::ValidSize;
use netprune::{DataConfig, DataLoaders, DataManager};

/// Prepare CIFAR train/validation/test loaders with a cached validation split.
#[derive(Debug, Parser)]
#[command(name = "netprune", version)]
struct Args {
    /// JSON file with a `DataConfig`; flags given on the command line win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset identifier (c10 or c100).
    #[arg(long)]
    dataset: Option<DatasetName>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Loader worker threads (0 loads on the main thread).
    #[arg(long)]
    workers: Option<usize>,

    /// Validation share (e.g. 0.1) or sample count (e.g. 5000).
    #[arg(long)]
    valid_size: Option<ValidSize>,

    #[arg(long)]
    data_root: Option<PathBuf>,

    #[arg(long)]
    split_dir: Option<PathBuf>,

    /// Fail instead of downloading a missing dataset.
    #[arg(long)]
    no_download: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Iterate every loader this many times and report throughput.
    #[arg(long, default_value_t = 0)]
    epochs: usize,
}

impl Args {
    fn into_config(self) -> Result<(DataConfig, usize), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => DataConfig::from_json_file(path)?,
            None => DataConfig::default(),
        };
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(valid_size) = self.valid_size {
            config.valid_size = valid_size;
        }
        if let Some(data_root) = self.data_root {
            config.data_root = data_root;
        }
        if let Some(split_dir) = self.split_dir {
            config.split_dir = split_dir;
        }
        if self.no_download {
            config.download = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok((config, self.epochs))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, epochs) = Args::parse().into_config()?;
    let mut manager = DataManager::new(config)?;
    let mut loaders = manager.prepare()?;

    let mut stdout = stdout();
    print_summary(&mut stdout, &manager, &loaders)?;

    for epoch in 1..=epochs {
        for (name, loader) in [
            ("train", &mut loaders.train),
            ("valid", &mut loaders.valid),
            ("test", &mut loaders.test),
        ] {
            let (batches, samples, secs) = drain(loader)?;
            info!("epoch {epoch} {name}: {batches} batches");
            execute!(
                stdout,
                SetForegroundColor(Color::Cyan),
                Print(format!("Epoch {:3}/{} ", epoch, epochs)),
                SetForegroundColor(Color::White),
                Print(format!("{:<6}", name)),
                SetForegroundColor(Color::DarkGrey),
                Print(format!("{:>6} batches {:>8} samples ", batches, samples)),
                SetForegroundColor(Color::Yellow),
                Print(format!("{:>10.1} samples/s\n", samples as f64 / secs.max(1e-9))),
                ResetColor
            )?;
        }
    }

    Ok(())
}

/// One full pass; returns batches, samples and elapsed seconds.
fn drain(loader: &mut DataLoader) -> Result<(usize, usize, f64), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut batches = 0;
    let mut samples = 0;
    for batch in loader.iter()? {
        let batch = batch?;
        batches += 1;
        samples += batch.len();
    }
    Ok((batches, samples, start.elapsed().as_secs_f64()))
}

fn print_summary(
    stdout: &mut Stdout,
    manager: &DataManager,
    loaders: &DataLoaders,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = manager.config();
    execute!(
        stdout,
        SetForegroundColor(Color::Magenta),
        Print(format!(
            "--- {} ({} classes, {}x{} inputs) ---\n",
            config.dataset,
            manager.num_classes(),
            manager.image_size(),
            manager.image_size()
        )),
        SetForegroundColor(Color::DarkGrey),
        Print(format!(
            "split dir {:?}, valid size {}, batch size {}, {} workers\n",
            config.split_dir, config.valid_size, config.batch_size, config.workers
        )),
        ResetColor
    )?;

    for (name, loader) in [
        ("train", &loaders.train),
        ("valid", &loaders.valid),
        ("test", &loaders.test),
    ] {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print(format!("  {:<6}", name)),
            SetForegroundColor(Color::White),
            Print(format!(
                "{:>7} samples {:>5} batches",
                loader.num_samples(),
                loader.len()
            )),
            SetForegroundColor(Color::DarkGrey),
            Print(if loader.pin_memory() { "  pinned\n" } else { "\n" }),
            ResetColor
        )?;
    }
    Ok(())
}
