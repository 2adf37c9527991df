//! Latency sample aggregation for the workload report.

use statistical::median;

/// Summary of one operation type's latency samples, in microseconds.
#[derive(Debug, PartialEq)]
pub(crate) struct LatencySummary {
    pub(crate) count: usize,
    pub(crate) median: f64,
    pub(crate) p95: f64,
}

/// Summarizes latency samples in place. An empty sample list (e.g. a
/// zero-op or zero-client run) yields all-zero statistics.
pub(crate) fn summarize(samples: &mut [f64]) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary {
            count: 0,
            median: 0.0,
            p95: 0.0,
        };
    }

    samples.sort_by(f64::total_cmp);
    LatencySummary {
        count: samples.len(),
        median: median(samples),
        p95: percentile_sorted(samples, 0.95),
    }
}

/// Index-based percentile over an already-sorted slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let idx = (p * (sorted.len() - 1) as f64) as usize;
    sorted[idx]
}

#[cfg(test)]
mod stats_tests {
    use super::*;

    #[test]
    fn empty_samples_zeroed() {
        assert_eq!(
            summarize(&mut []),
            LatencySummary {
                count: 0,
                median: 0.0,
                p95: 0.0,
            }
        );
    }

    #[test]
    fn single_sample() {
        assert_eq!(
            summarize(&mut [42.0]),
            LatencySummary {
                count: 1,
                median: 42.0,
                p95: 42.0,
            }
        );
    }

    #[test]
    fn known_distribution() {
        // 1.0, 2.0, ..., 100.0 shuffled by construction
        let mut samples: Vec<f64> =
            (1..=100).rev().map(|v| v as f64).collect();
        let summary = summarize(&mut samples);
        assert_eq!(summary.count, 100);
        assert_eq!(summary.median, 50.5);
        assert_eq!(summary.p95, 95.0);
    }

    #[test]
    fn percentile_extremes() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), 10.0);
        assert_eq!(percentile_sorted(&sorted, 1.0), 40.0);
        assert_eq!(percentile_sorted(&sorted, 0.5), 20.0);
    }
}
