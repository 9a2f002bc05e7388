//! Numeric inputs for latency histograms and CDF curves.

use serde::Serialize;

use ofmetrics_controller::snapshot::{Category, MetricsSnapshot};

pub const DEFAULT_BINS: usize = 50;
pub const MAX_BINS: usize = 10_000;

/// Equal-width bins over `[low, high]`; the last bin is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub low: f64,
    pub high: f64,
    pub bin_width: f64,
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn from_samples(samples: &[f64], bins: usize) -> Option<Self> {
        let finite: Vec<f64> = samples.iter().copied().filter(|x| x.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let bins = bins.clamp(1, MAX_BINS);
        let mut low = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let mut high = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if low == high {
            low -= 0.5;
            high += 0.5;
        }
        let bin_width = (high - low) / bins as f64;

        let mut counts = vec![0u64; bins];
        for x in finite {
            let idx = ((x - low) / bin_width).floor() as usize;
            counts[idx.min(bins - 1)] += 1;
        }
        Some(Self { low, high, bin_width, counts })
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CdfPoint {
    pub latency: f64,
    pub fraction: f64,
}

/// Empirical CDF: the i-th smallest sample maps to `i / n`.
pub fn cdf(samples: &[f64]) -> Vec<CdfPoint> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, latency)| CdfPoint { latency, fraction: (i + 1) as f64 / n })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyDistribution {
    pub category: Category,
    pub histogram: Histogram,
    pub cdf: Vec<CdfPoint>,
}

/// One entry per latency category that has samples.
pub fn latency_distributions(snapshot: &MetricsSnapshot, bins: usize) -> Vec<LatencyDistribution> {
    Category::ALL
        .iter()
        .filter(|c| c.tracks_latency())
        .filter_map(|&category| {
            let samples = snapshot.category(category).latencies();
            Histogram::from_samples(samples, bins).map(|histogram| LatencyDistribution {
                category,
                histogram,
                cdf: cdf(samples),
            })
        })
        .collect()
}
