//! Order records, the dataset they form, and named partitions over it.

use crate::data::filter::OutlierFilter;
use crate::error::{MlError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field names of the joined order table.
pub mod fields {
    pub const RESTAURANT_ID: &str = "restaurant_id";
    pub const ORDER_VALUE: &str = "order_value";
    pub const NUMBER_OF_ITEMS: &str = "number_of_items";
    pub const TYPE_OF_FOOD: &str = "type_of_food";
    pub const CITY: &str = "city";
    pub const COUNTRY: &str = "country";
    pub const HOUR_OF_DAY: &str = "hour_of_day";
    pub const DAY_OF_WEEK: &str = "day_of_week";
    pub const PREP_TIME_HOURS: &str = "prep_time_hours";
}

/// One order observation: named numeric and categorical predictors plus the
/// continuous target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    numeric: BTreeMap<String, f64>,
    categorical: BTreeMap<String, String>,
    target: f64,
    /// Whether the order was ready on a later calendar date than it was acknowledged.
    #[serde(default)]
    crosses_date: bool,
}

impl Record {
    pub fn new(target: f64) -> Self {
        Self {
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
            target,
            crosses_date: false,
        }
    }

    pub fn with_numeric(mut self, field: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(field.into(), value);
        self
    }

    pub fn with_categorical(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(field.into(), value.into());
        self
    }

    pub fn with_crosses_date(mut self, crosses_date: bool) -> Self {
        self.crosses_date = crosses_date;
        self
    }

    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }

    pub fn categorical(&self, field: &str) -> Option<&str> {
        self.categorical.get(field).map(String::as_str)
    }

    /// Whether the record carries `field`, numeric or categorical.
    pub fn has_field(&self, field: &str) -> bool {
        self.numeric.contains_key(field) || self.categorical.contains_key(field)
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn crosses_date(&self) -> bool {
        self.crosses_date
    }

    fn check(&self, index: usize) -> Result<()> {
        if !self.target.is_finite() {
            return Err(MlError::InvalidRecord {
                index,
                reason: format!("target is not finite ({})", self.target),
            });
        }
        if let Some((field, value)) = self.numeric.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MlError::InvalidRecord {
                index,
                reason: format!("numeric field '{field}' is not finite ({value})"),
            });
        }
        Ok(())
    }
}

/// A row of the joined order table as delivered by upstream ingestion.
///
/// Timing fields are either supplied directly or derived from the
/// acknowledgement/ready timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub restaurant_id: String,
    pub order_value: f64,
    pub number_of_items: u32,
    pub type_of_food: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub hour_of_day: Option<u32>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub prep_time_hours: Option<f64>,
    #[serde(default)]
    pub crosses_date: Option<bool>,
    #[serde(default)]
    pub order_acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_ready_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    /// Fill target, hour, weekday and the date-crossing flag from the timestamps
    /// when both are present. Explicit values are overwritten.
    pub fn derive_timing(&mut self) {
        let (Some(ack), Some(ready)) = (self.order_acknowledged_at, self.order_ready_at) else {
            return;
        };
        let seconds = (ready - ack).num_seconds() as f64;
        self.prep_time_hours = Some(seconds / 3600.0);
        self.hour_of_day = Some(ack.hour());
        self.day_of_week = Some(ack.weekday().to_string());
        self.crosses_date = Some(ready.date_naive() != ack.date_naive());
    }

    /// Convert into a generic [`Record`], deriving timing first.
    pub fn into_record(mut self, index: usize) -> Result<Record> {
        self.derive_timing();
        let missing = |field: &str| MlError::InvalidRecord {
            index,
            reason: format!("missing '{field}'"),
        };
        let target = self
            .prep_time_hours
            .ok_or_else(|| missing(fields::PREP_TIME_HOURS))?;
        let hour = self.hour_of_day.ok_or_else(|| missing(fields::HOUR_OF_DAY))?;
        let weekday = self
            .day_of_week
            .ok_or_else(|| missing(fields::DAY_OF_WEEK))?;

        Ok(Record::new(target)
            .with_numeric(fields::ORDER_VALUE, self.order_value)
            .with_numeric(fields::NUMBER_OF_ITEMS, f64::from(self.number_of_items))
            .with_categorical(fields::RESTAURANT_ID, self.restaurant_id)
            .with_categorical(fields::TYPE_OF_FOOD, self.type_of_food)
            .with_categorical(fields::CITY, self.city)
            .with_categorical(fields::COUNTRY, self.country)
            .with_categorical(fields::HOUR_OF_DAY, hour.to_string())
            .with_categorical(fields::DAY_OF_WEEK, weekday)
            .with_crosses_date(self.crosses_date.unwrap_or(false)))
    }
}

/// An ordered collection of records sharing a schema. Every record has a
/// finite target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            record.check(index)?;
        }
        Ok(Self { records })
    }

    pub fn from_orders(orders: impl IntoIterator<Item = OrderRecord>) -> Result<Self> {
        let records = orders
            .into_iter()
            .enumerate()
            .map(|(i, order)| order.into_record(i))
            .collect::<Result<Vec<_>>>()?;
        Self::new(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn targets(&self) -> Vec<f64> {
        self.records.iter().map(Record::target).collect()
    }

    /// The record at `index`, or a shape error when it is out of range.
    pub fn record(&self, index: usize) -> Result<&Record> {
        self.records.get(index).ok_or_else(|| MlError::ShapeMismatch {
            expected: format!("row index below {}", self.records.len()),
            actual: index.to_string(),
        })
    }

    /// Keep only the records the filter accepts.
    pub fn filtered(&self, filter: &OutlierFilter) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| filter.keep(r))
                .cloned()
                .collect(),
        }
    }

    /// A named view over the rows at `indices`, in the order given.
    pub fn partition(&self, name: impl Into<String>, indices: &[usize]) -> Result<Partition<'_>> {
        Ok(Partition {
            name: name.into(),
            rows: indices
                .iter()
                .map(|&i| self.record(i))
                .collect::<Result<_>>()?,
        })
    }

    /// A named view over every row.
    pub fn all(&self, name: impl Into<String>) -> Partition<'_> {
        Partition {
            name: name.into(),
            rows: self.records.iter().collect(),
        }
    }
}

/// A named, borrowed subset of a dataset (training rows, a fold, the holdout).
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    name: String,
    rows: Vec<&'a Record>,
}

impl<'a> Partition<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[&'a Record] {
        &self.rows
    }

    pub fn targets(&self) -> Array1<f64> {
        self.rows.iter().map(|r| r.target()).collect()
    }
}
