//! Stratified train/holdout splitting.

use crate::data::record::{Dataset, Partition};
use crate::data::strata::stratify;
use crate::error::{MlError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Disjoint train/holdout row indices covering a dataset. Both lists are ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

impl Split {
    pub fn train_partition<'a>(&self, dataset: &'a Dataset) -> Result<Partition<'a>> {
        dataset.partition("train", &self.train)
    }

    pub fn holdout_partition<'a>(&self, dataset: &'a Dataset) -> Result<Partition<'a>> {
        dataset.partition("holdout", &self.holdout)
    }
}

/// Splits a dataset within target quantile buckets so both sides keep the
/// target distribution.
#[derive(Debug, Clone)]
pub struct Splitter {
    train_fraction: f64,
    strata: usize,
    seed: u64,
}

impl Splitter {
    pub fn new(train_fraction: f64, strata: usize, seed: u64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(MlError::invalid_config(format!(
                "train_fraction must be in (0, 1), got {train_fraction}"
            )));
        }
        Ok(Self {
            train_fraction,
            strata: strata.max(1),
            seed,
        })
    }

    pub fn split(&self, dataset: &Dataset) -> Result<Split> {
        if dataset.len() < 2 {
            return Err(MlError::insufficient(
                "train/holdout split",
                format!("dataset has {} rows, need at least 2", dataset.len()),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(dataset.len());
        let mut holdout = Vec::new();

        for (bucket, mut rows) in stratify(&dataset.targets(), self.strata)
            .into_iter()
            .enumerate()
        {
            if rows.len() < 2 {
                return Err(MlError::insufficient(
                    "train/holdout split",
                    format!(
                        "stratum {bucket} has {} row(s), need at least 2",
                        rows.len()
                    ),
                ));
            }
            rows.shuffle(&mut rng);
            let n_train = ((rows.len() as f64 * self.train_fraction).round() as usize)
                .clamp(1, rows.len() - 1);
            holdout.extend_from_slice(&rows[n_train..]);
            rows.truncate(n_train);
            train.append(&mut rows);
        }

        train.sort_unstable();
        holdout.sort_unstable();
        tracing::debug!(
            train = train.len(),
            holdout = holdout.len(),
            "Stratified split complete"
        );
        Ok(Split { train, holdout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::Record;

    fn dataset(n: usize) -> Dataset {
        Dataset::new((0..n).map(|i| Record::new((i % 97) as f64 / 10.0)).collect()).unwrap()
    }

    #[test]
    fn test_split_is_exact_partition() {
        let data = dataset(200);
        let split = Splitter::new(0.75, 4, 1).unwrap().split(&data).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.holdout).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
        assert!((145..=155).contains(&split.train.len()));
    }

    #[test]
    fn test_split_preserves_target_distribution() {
        let data = dataset(400);
        let split = Splitter::new(0.75, 4, 3).unwrap().split(&data).unwrap();
        let mean = |idx: &[usize]| {
            idx.iter().map(|&i| data.records()[i].target()).sum::<f64>() / idx.len() as f64
        };
        assert!((mean(&split.train) - mean(&split.holdout)).abs() < 0.5);
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let data = dataset(120);
        let a = Splitter::new(0.75, 4, 9).unwrap().split(&data).unwrap();
        let b = Splitter::new(0.75, 4, 9).unwrap().split(&data).unwrap();
        let c = Splitter::new(0.75, 4, 10).unwrap().split(&data).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_rejects_tiny_stratum() {
        let data = Dataset::new(vec![Record::new(1.0), Record::new(1.0), Record::new(9.0)]).unwrap();
        let err = Splitter::new(0.5, 4, 0).unwrap().split(&data).unwrap_err();
        assert!(matches!(err, MlError::InsufficientData { .. }));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(Splitter::new(1.2, 4, 0).is_err());
        assert!(Splitter::new(0.0, 4, 0).is_err());
    }
}
