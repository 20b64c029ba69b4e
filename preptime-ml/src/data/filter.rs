//! Upstream outlier filter selecting the business variant.
//!
//! Both variants share one pipeline; they differ only in which orders are
//! admitted before the train/holdout split.

use crate::data::record::Record;
use serde::{Deserialize, Serialize};

/// Predicate applied to the dataset once, before the splitter runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum OutlierFilter {
    /// Admit every order.
    #[default]
    None,
    /// Drop next-day orders: ready on a later date than acknowledged and slower
    /// than the cutoff.
    SameDay {
        #[serde(default = "default_next_day_cutoff")]
        next_day_cutoff_hours: f64,
    },
    /// Drop orders whose preparation exceeded the cap.
    Asap {
        #[serde(default = "default_asap_max")]
        max_prep_hours: f64,
    },
}

fn default_next_day_cutoff() -> f64 {
    12.0
}

fn default_asap_max() -> f64 {
    2.0
}

impl OutlierFilter {
    pub fn same_day() -> Self {
        Self::SameDay {
            next_day_cutoff_hours: default_next_day_cutoff(),
        }
    }

    pub fn asap() -> Self {
        Self::Asap {
            max_prep_hours: default_asap_max(),
        }
    }

    pub fn keep(&self, record: &Record) -> bool {
        match self {
            Self::None => true,
            Self::SameDay {
                next_day_cutoff_hours,
            } => !(record.crosses_date() && record.target() > *next_day_cutoff_hours),
            Self::Asap { max_prep_hours } => record.target() <= *max_prep_hours,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SameDay { .. } => "same_day",
            Self::Asap { .. } => "asap",
        }
    }
}
