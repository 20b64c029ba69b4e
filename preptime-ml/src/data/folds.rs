//! Stratified k-fold assignment for cross-validation.

use crate::data::record::{Dataset, Record};
use crate::data::strata::stratify;
use crate::error::{MlError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One cross-validation fold: rows to fit on and rows to assess on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub analysis: Vec<usize>,
    pub assessment: Vec<usize>,
}

/// Assignment of every training row to exactly one of `k` folds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPlan {
    k: usize,
    /// Dataset row indices of the training subset.
    rows: Vec<usize>,
    /// Fold of `rows[i]`.
    fold_of: Vec<usize>,
}

impl FoldPlan {
    pub fn fold_count(&self) -> usize {
        self.k
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Held-out rows of `fold`, ascending.
    pub fn assessment(&self, fold: usize) -> Vec<usize> {
        self.select(|f| f == fold)
    }

    /// Rows of every other fold, ascending.
    pub fn analysis(&self, fold: usize) -> Vec<usize> {
        self.select(|f| f != fold)
    }

    pub fn folds(&self) -> Vec<Fold> {
        (0..self.k)
            .map(|index| Fold {
                index,
                analysis: self.analysis(index),
                assessment: self.assessment(index),
            })
            .collect()
    }

    fn select(&self, pred: impl Fn(usize) -> bool) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .rows
            .iter()
            .zip(&self.fold_of)
            .filter(|(_, f)| pred(**f))
            .map(|(&row, _)| row)
            .collect();
        out.sort_unstable();
        out
    }
}

/// Deals rows of each target quantile bucket round-robin across `k` folds, so
/// every held-out slice mirrors the training target distribution.
#[derive(Debug, Clone)]
pub struct FoldAssigner {
    k: usize,
    strata: usize,
    seed: u64,
}

impl FoldAssigner {
    pub fn new(k: usize, strata: usize, seed: u64) -> Result<Self> {
        if k < 2 {
            return Err(MlError::invalid_config(format!(
                "fold count must be at least 2, got {k}"
            )));
        }
        Ok(Self {
            k,
            strata: strata.max(1),
            seed,
        })
    }

    /// Assign the dataset rows listed in `train` to folds.
    pub fn assign(&self, dataset: &Dataset, train: &[usize]) -> Result<FoldPlan> {
        let targets = train
            .iter()
            .map(|&i| dataset.record(i).map(Record::target))
            .collect::<Result<Vec<f64>>>()?;
        let mut groups = stratify(&targets, self.strata);

        let smallest = groups.iter().map(Vec::len).min().unwrap_or(0);
        if smallest < self.k {
            return Err(MlError::insufficient(
                "fold plan",
                format!(
                    "k = {} exceeds the smallest stratum ({smallest} rows)",
                    self.k
                ),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity(train.len());
        let mut fold_of = Vec::with_capacity(train.len());
        // A running counter across strata keeps fold sizes within one row of each other.
        let mut next = 0usize;
        for group in &mut groups {
            group.shuffle(&mut rng);
            for &pos in group.iter() {
                rows.push(train[pos]);
                fold_of.push(next % self.k);
                next += 1;
            }
        }

        tracing::debug!(k = self.k, rows = rows.len(), "Fold plan assigned");
        Ok(FoldPlan {
            k: self.k,
            rows,
            fold_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Dataset {
        Dataset::new((0..n).map(|i| Record::new(((i * 31) % 113) as f64)).collect()).unwrap()
    }

    #[test]
    fn test_folds_partition_training_rows() {
        let data = dataset(250);
        let train: Vec<usize> = (0..250).filter(|i| i % 5 != 0).collect();
        let plan = FoldAssigner::new(5, 4, 11).unwrap().assign(&data, &train).unwrap();

        let mut union: Vec<usize> = (0..5).flat_map(|f| plan.assessment(f)).collect();
        union.sort_unstable();
        assert_eq!(union, train);

        for fold in plan.folds() {
            assert_eq!(fold.analysis.len() + fold.assessment.len(), train.len());
            assert!(fold.assessment.iter().all(|r| !fold.analysis.contains(r)));
        }
    }

    #[test]
    fn test_fold_sizes_balanced() {
        let data = dataset(103);
        let train: Vec<usize> = (0..103).collect();
        let plan = FoldAssigner::new(10, 4, 2).unwrap().assign(&data, &train).unwrap();
        let sizes: Vec<usize> = (0..10).map(|f| plan.assessment(f).len()).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "sizes {sizes:?}");
    }

    #[test]
    fn test_k_larger_than_smallest_stratum() {
        let data = dataset(20);
        let train: Vec<usize> = (0..20).collect();
        let err = FoldAssigner::new(10, 4, 0).unwrap().assign(&data, &train).unwrap_err();
        assert!(matches!(err, MlError::InsufficientData { .. }));
    }

    #[test]
    fn test_out_of_range_train_row() {
        let data = dataset(30);
        let train: Vec<usize> = (0..31).collect();
        let err = FoldAssigner::new(3, 2, 0).unwrap().assign(&data, &train).unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_single_fold_rejected() {
        assert!(FoldAssigner::new(1, 4, 0).is_err());
    }

    #[test]
    fn test_deterministic_per_seed() {
        let data = dataset(80);
        let train: Vec<usize> = (0..80).collect();
        let assigner = FoldAssigner::new(4, 4, 5).unwrap();
        assert_eq!(
            assigner.assign(&data, &train).unwrap(),
            assigner.assign(&data, &train).unwrap()
        );
    }
}
