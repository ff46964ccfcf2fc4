//! Per-epoch benchmark bookkeeping.
//!
//! Each epoch records its wall-clock latency plus the bytes that crossed
//! the bulletin board (`on_chain`) and the direct node-to-node links
//! (`off_chain`). After the final epoch the node logs the mean and
//! standard deviation of every series at WARN level so the numbers land
//! in the log file even under the default filter.

use std::{collections::BTreeMap, time::Duration};

use mpss_types::Epoch;

/// Traffic and latency counters for a single epoch.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EpochStats {
    pub(crate) latency: Duration,
    pub(crate) bytes_on_chain: usize,
    pub(crate) bytes_off_chain: usize,
}

/// All recorded epochs of one run.
#[derive(Debug, Default)]
pub(crate) struct Benchmark {
    entries: BTreeMap<Epoch, EpochStats>,
}

impl Benchmark {
    pub(crate) fn record(&mut self, epoch: Epoch, stats: EpochStats) {
        self.entries.insert(epoch, stats);
    }

    pub(crate) fn report(&self, degree: usize, group_size: usize) {
        let latency: Vec<f64> = self
            .entries
            .values()
            .map(|e| e.latency.as_secs_f64())
            .collect();
        let on_chain: Vec<f64> = self
            .entries
            .values()
            .map(|e| e.bytes_on_chain as f64)
            .collect();
        let off_chain: Vec<f64> = self
            .entries
            .values()
            .map(|e| e.bytes_off_chain as f64)
            .collect();

        let (latency_mean, latency_std) = mean_std(&latency);
        let (on_chain_mean, on_chain_std) = mean_std(&on_chain);
        let (off_chain_mean, off_chain_std) = mean_std(&off_chain);

        tracing::warn!(
            degree,
            group_size,
            latency_mean,
            latency_std,
            on_chain_mean,
            on_chain_std,
            off_chain_mean,
            off_chain_std,
            "benchmark"
        );
    }
}

fn mean_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_of_known_series() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
        assert_eq!(mean_std(&[]), (0.0, 0.0));
    }
}
