//! Closed categorical domains frozen at fit time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A categorical level after rare-level collapsing and novel-level handling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Level {
    /// A level frequent enough on the fit partition to keep its own column.
    Known(String),
    /// Seen on the fit partition but below the rare-level threshold.
    Other,
    /// Never seen on the fit partition.
    Novel,
}

impl Level {
    /// Column suffix. Sentinels use a leading dot so they never collide with data.
    pub fn label(&self) -> &str {
        match self {
            Self::Known(value) => value,
            Self::Other => ".other",
            Self::Novel => ".novel",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The frozen level set of one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSet {
    field: String,
    retained: BTreeSet<String>,
    collapsed: BTreeSet<String>,
}

impl LevelSet {
    /// Count level frequencies on the fit partition; levels whose share is below
    /// `rare_threshold` are collapsed into [`Level::Other`].
    pub fn fit<'a>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = &'a str>,
        rare_threshold: Option<f64>,
    ) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut total = 0usize;
        for value in values {
            *counts.entry(value).or_insert(0) += 1;
            total += 1;
        }

        let threshold = rare_threshold.unwrap_or(0.0);
        let (retained, collapsed): (Vec<_>, Vec<_>) = counts
            .into_iter()
            .partition(|(_, count)| *count as f64 / total as f64 >= threshold);

        Self {
            field: field.into(),
            retained: retained.into_iter().map(|(v, _)| v.to_string()).collect(),
            collapsed: collapsed.into_iter().map(|(v, _)| v.to_string()).collect(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn collapsed(&self) -> &BTreeSet<String> {
        &self.collapsed
    }

    /// Map a raw value onto the closed set.
    pub fn resolve(&self, value: &str) -> Level {
        if self.retained.contains(value) {
            Level::Known(value.to_string())
        } else if self.collapsed.contains(value) {
            Level::Other
        } else {
            Level::Novel
        }
    }

    /// Every member of the closed set in encoding order: retained levels
    /// ascending, then `Other`, then `Novel`.
    pub fn levels(&self) -> Vec<Level> {
        self.retained
            .iter()
            .cloned()
            .map(Level::Known)
            .chain([Level::Other, Level::Novel])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(spec: &[(&'static str, usize)]) -> Vec<&'static str> {
        spec.iter()
            .flat_map(|(v, n)| std::iter::repeat_n(*v, *n))
            .collect()
    }

    #[test]
    fn test_rare_levels_collapse() {
        let set = LevelSet::fit("food", values(&[("A", 100), ("B", 100), ("C", 1)]), Some(0.02));
        assert_eq!(set.resolve("A"), Level::Known("A".into()));
        assert_eq!(set.resolve("C"), Level::Other);
        assert_eq!(set.resolve("D"), Level::Novel);
        assert_eq!(
            set.levels(),
            vec![
                Level::Known("A".into()),
                Level::Known("B".into()),
                Level::Other,
                Level::Novel
            ]
        );
    }

    #[test]
    fn test_no_threshold_keeps_everything() {
        let set = LevelSet::fit("day", values(&[("Mon", 1), ("Tue", 50)]), None);
        assert!(set.collapsed().is_empty());
        assert_eq!(set.resolve("Mon"), Level::Known("Mon".into()));
    }

    #[test]
    fn test_sentinel_labels_do_not_collide() {
        let set = LevelSet::fit("city", values(&[("other", 10)]), Some(0.1));
        assert_eq!(set.resolve("other"), Level::Known("other".into()));
        assert_ne!(Level::Known("other".into()).label(), Level::Other.label());
    }
}
