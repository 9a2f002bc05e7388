use serde::Serialize;

use ofmetrics_controller::snapshot::{Category, CategoryRecord, MetricsSnapshot};

/// Message rate over the span between the first and last timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Throughput {
    NoData,
    /// One sample, or a span the clock could not resolve.
    Undefined { count: usize },
    Rate { count: usize, duration_secs: f64, per_sec: f64 },
}

impl Throughput {
    pub fn from_record(record: &CategoryRecord) -> Self {
        let count = record.timestamps.len();
        let (first, last) = match (record.timestamps.first(), record.timestamps.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Throughput::NoData,
        };
        let duration = last - first;
        if count < 2 || duration.is_nan() || duration <= 0.0 {
            return Throughput::Undefined { count };
        }
        Throughput::Rate { count, duration_secs: duration, per_sec: count as f64 / duration }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        match self {
            Throughput::Rate { duration_secs, .. } => Some(*duration_secs),
            _ => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Throughput::NoData)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSummary {
    /// Every category, in report order.
    pub categories: Vec<(Category, Throughput)>,
    /// Longest per-category span; `None` when no category has a rate.
    pub total_duration_secs: Option<f64>,
}

impl ThroughputSummary {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        let categories: Vec<_> = Category::ALL
            .iter()
            .map(|&category| (category, Throughput::from_record(snapshot.category(category))))
            .collect();
        let total_duration_secs = categories
            .iter()
            .filter_map(|(_, t)| t.duration_secs())
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
        Self { categories, total_duration_secs }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|(_, t)| t.is_no_data())
    }

    pub fn get(&self, category: Category) -> Option<&Throughput> {
        self.categories.iter().find(|(c, _)| *c == category).map(|(_, t)| t)
    }
}
