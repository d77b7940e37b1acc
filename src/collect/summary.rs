/*
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::types::MetricValue;

pub(super) struct TimerSummary {
    pub(super) lower: MetricValue,
    pub(super) mean: MetricValue,
    pub(super) upper: MetricValue,
    pub(super) upper_pct: MetricValue,
}

/// Summarize a timer's samples for one flush.
///
/// `upper_pct` and `mean` are taken over the lowest `threshold_count`
/// samples, where `threshold_count = n - round(((100 - p) / 100) * n)`;
/// `lower` and `upper` are the global extremes. An empty sample list
/// yields `None` and the caller emits nothing for that entry.
pub(super) fn summarize(samples: &mut [MetricValue], percentile: f64) -> Option<TimerSummary> {
    if samples.is_empty() {
        return None;
    }

    samples.sort_by(|a, b| a.as_f64().total_cmp(&b.as_f64()));
    let n = samples.len();

    if n == 1 {
        let v = samples[0];
        return Some(TimerSummary {
            lower: v,
            mean: v,
            upper: v,
            upper_pct: v,
        });
    }

    let threshold_index = ((100.0 - percentile) / 100.0) * n as f64;
    // f64::round is half-away-from-zero; the window keeps at least one
    // sample and an out-of-range percentile cannot underflow the count
    let threshold_count = n.saturating_sub(threshold_index.round() as usize).max(1);
    let valid = &samples[..threshold_count];

    let sum: f64 = valid.iter().map(|v| v.as_f64()).sum();
    let mean = MetricValue::Double(sum / valid.len() as f64);

    Some(TimerSummary {
        lower: samples[0],
        mean,
        upper: samples[n - 1],
        upper_pct: valid[valid.len() - 1],
    })
}
