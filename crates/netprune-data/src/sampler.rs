//! Index-selection policies for [`DataLoader`](crate::DataLoader).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Produces the dataset indices visited in one full pass.
pub trait Sampler: Send {
    /// Number of indices per pass.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices for the next pass, in visiting order.
    fn epoch(&mut self) -> Vec<usize>;
}

/// Visits `0..len` in order, every pass.
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    len: usize,
}

impl SequentialSampler {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Sampler for SequentialSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn epoch(&mut self) -> Vec<usize> {
        (0..self.len).collect()
    }
}

/// Draws a fixed subset of indices uniformly at random without replacement,
/// reshuffling at the start of every pass.
pub struct SubsetRandomSampler {
    indices: Vec<usize>,
    rng: StdRng,
}

impl SubsetRandomSampler {
    /// With `seed = None` the shuffle order draws from entropy.
    pub fn new(indices: Vec<usize>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { indices, rng }
    }

    /// The subset this sampler draws from.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Sampler for SubsetRandomSampler {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn epoch(&mut self) -> Vec<usize> {
        self.indices.shuffle(&mut self.rng);
        self.indices.clone()
    }
}
