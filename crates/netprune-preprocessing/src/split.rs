use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    #[error("Cannot split an empty set of samples")]
    Empty,

    #[error("Held-out size {size} is invalid for {n_samples} samples: {reason}")]
    InvalidSize {
        size: ValidSize,
        n_samples: usize,
        reason: &'static str,
    },

    #[error("Cannot parse held-out size from {0:?}")]
    Parse(String),
}

/// How much of the data to hold out: a fraction in (0, 1) or an absolute count.
///
/// Deserializes from a JSON integer (count) or float (fraction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidSize {
    Count(usize),
    Fraction(f64),
}

impl ValidSize {
    /// Check the size on its own, independent of the sample count.
    pub fn check(&self) -> Result<(), &'static str> {
        match *self {
            ValidSize::Fraction(f) if !(f > 0.0 && f < 1.0) => {
                Err("a fraction must lie strictly between 0 and 1")
            }
            ValidSize::Count(0) => Err("a count must be at least 1"),
            _ => Ok(()),
        }
    }

    /// Number of held-out samples out of `n_samples`.
    ///
    /// Fractions round up, so a non-empty fraction never yields an empty hold-out.
    pub fn held_out(&self, n_samples: usize) -> Result<usize, SplitError> {
        if n_samples == 0 {
            return Err(SplitError::Empty);
        }
        let invalid = |reason| SplitError::InvalidSize {
            size: *self,
            n_samples,
            reason,
        };
        self.check().map_err(invalid)?;
        let n_held = match *self {
            ValidSize::Fraction(f) => (f * n_samples as f64).ceil() as usize,
            ValidSize::Count(k) => k,
        };
        if n_held >= n_samples {
            return Err(invalid("no samples would be left for training"));
        }
        Ok(n_held)
    }
}

impl Default for ValidSize {
    fn default() -> Self {
        ValidSize::Fraction(0.1)
    }
}

impl fmt::Display for ValidSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidSize::Count(k) => write!(f, "{}", k),
            ValidSize::Fraction(x) => write!(f, "{}", x),
        }
    }
}

impl FromStr for ValidSize {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(k) = s.parse::<usize>() {
            return Ok(ValidSize::Count(k));
        }
        s.parse::<f64>()
            .map(ValidSize::Fraction)
            .map_err(|_| SplitError::Parse(s.to_string()))
    }
}

/// Shuffle `items` and split them into training and held-out parts.
///
/// Returns `(train, held_out)`. With `seed = None` the shuffle draws from entropy.
pub fn train_test_split<T>(
    mut items: Vec<T>,
    test_size: ValidSize,
    seed: Option<u64>,
) -> Result<(Vec<T>, Vec<T>), SplitError> {
    let n_held = test_size.held_out(items.len())?;

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    items.shuffle(&mut rng);

    let held_out = items.split_off(items.len() - n_held);
    Ok((items, held_out))
}
