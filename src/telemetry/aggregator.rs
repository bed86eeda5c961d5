//! # Stage: Flow Statistics Aggregator
//!
//! ## Responsibility
//! Reduces per-flow counters into average delivery ratio, throughput and
//! delay. Called once per environment step, and once more at the end of the
//! run for the summary report.
//!
//! ## Guarantees
//! - Non-negative: every aggregate is `>= 0`; delivery ratio is in `[0, 100]`
//! - Degeneracy-safe: zero transmissions, zero flows, a non-positive window,
//!   and non-finite per-flow delays are guarded locally, never reported as errors
//! - Reconciled: a lost-packet pass runs on the source before every read

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FlowId, FlowRecord, SharedTelemetry};
use crate::sim::SimTime;

/// Bits in a megabit as the throughput figures count them (binary mega).
pub const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Measurement window the throughput formula divides by unless told
/// otherwise (seconds).
pub const DEFAULT_MEASUREMENT_WINDOW_SECS: f64 = 20.0;

// ---------------------------------------------------------------------------
// Window selection
// ---------------------------------------------------------------------------

/// Which counters each step's statistics are computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatsWindow {
    /// Everything since simulation start. Counters are never reset.
    #[default]
    Cumulative,
    /// Only the counter growth since the previous step.
    PerStep,
}

/// Denominator of the per-flow throughput formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ThroughputWindow {
    /// A constant number of seconds regardless of how long was measured.
    Fixed { secs: f64 },
    /// The simulated time actually covered by the counters.
    Elapsed,
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        ThroughputWindow::Fixed {
            secs: DEFAULT_MEASUREMENT_WINDOW_SECS,
        }
    }
}

impl ThroughputWindow {
    fn seconds(self, elapsed: SimTime) -> f64 {
        match self {
            ThroughputWindow::Fixed { secs } => secs,
            ThroughputWindow::Elapsed => elapsed.as_secs_f64(),
        }
    }
}

// ---------------------------------------------------------------------------
// AggregateStats
// ---------------------------------------------------------------------------

/// Network-wide averages for one measurement window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// `100 * Σrx / Σtx`, or 0 when nothing was sent.
    pub avg_delivery_ratio: f64,
    /// Mean per-flow throughput in Mb/s.
    pub avg_throughput_mbps: f64,
    /// Mean per-flow end-to-end delay in seconds over flows that received
    /// at least one packet.
    pub avg_delay_secs: f64,
    pub flow_count: usize,
}

impl AggregateStats {
    /// Reduce `records` measured over `window_secs` seconds.
    pub fn from_records<'a, I>(records: I, window_secs: f64) -> Self
    where
        I: IntoIterator<Item = &'a FlowRecord>,
    {
        let mut total_tx = 0.0_f64;
        let mut total_rx = 0.0_f64;
        let mut total_throughput = 0.0_f64;
        let mut total_delay = 0.0_f64;
        let mut valid_delay_count = 0_u32;
        let mut flow_count = 0_usize;

        for record in records {
            flow_count += 1;
            total_tx += record.tx_packets as f64;
            total_rx += record.rx_packets as f64;
            total_throughput += flow_throughput_mbps(record, window_secs);

            if let Some(delay) = flow_mean_delay(record) {
                total_delay += delay;
                valid_delay_count += 1;
            }
        }

        let avg_delivery_ratio = if total_tx > 0.0 {
            (total_rx / total_tx * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let avg_throughput_mbps = if flow_count > 0 {
            total_throughput / flow_count as f64
        } else {
            0.0
        };
        let avg_delay_secs = if valid_delay_count > 0 {
            total_delay / f64::from(valid_delay_count)
        } else {
            0.0
        };

        Self {
            avg_delivery_ratio,
            avg_throughput_mbps,
            avg_delay_secs,
            flow_count,
        }
    }
}

fn flow_throughput_mbps(record: &FlowRecord, window_secs: f64) -> f64 {
    if !(window_secs > 0.0) {
        return 0.0;
    }
    record.rx_bytes as f64 * 8.0 / window_secs / BITS_PER_MEGABIT
}

fn flow_mean_delay(record: &FlowRecord) -> Option<f64> {
    if record.rx_packets == 0 {
        return None;
    }
    let delay = record.delay_sum.as_secs_f64() / record.rx_packets as f64;
    delay.is_finite().then_some(delay)
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// End-of-run report. Unlike [`AggregateStats`], the delivery ratio here is
/// the mean of per-flow ratios, so every flow weighs the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub flow_count: usize,
    pub avg_throughput_mbps: f64,
    pub avg_delivery_ratio: f64,
    /// `None` when no flow received anything.
    pub avg_delay_secs: Option<f64>,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
}

impl RunSummary {
    pub fn from_records<'a, I>(records: I, window_secs: f64) -> Self
    where
        I: IntoIterator<Item = &'a FlowRecord>,
    {
        let mut summary = RunSummary::default();
        let mut pdr_sum = 0.0;
        let mut throughput_sum = 0.0;
        let mut delay_sum = 0.0;
        let mut valid_delay_count = 0_u32;

        for record in records {
            summary.flow_count += 1;
            summary.tx_packets += record.tx_packets;
            summary.rx_packets += record.rx_packets;
            summary.lost_packets += record.lost_packets;

            throughput_sum += flow_throughput_mbps(record, window_secs);
            if record.tx_packets > 0 {
                pdr_sum += record.rx_packets as f64 / record.tx_packets as f64 * 100.0;
            }
            if let Some(delay) = flow_mean_delay(record) {
                delay_sum += delay;
                valid_delay_count += 1;
            }
        }

        if summary.flow_count > 0 {
            summary.avg_throughput_mbps = throughput_sum / summary.flow_count as f64;
            summary.avg_delivery_ratio = pdr_sum / summary.flow_count as f64;
        }
        if valid_delay_count > 0 {
            summary.avg_delay_secs = Some(delay_sum / f64::from(valid_delay_count));
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// FlowStatsAggregator
// ---------------------------------------------------------------------------

/// Samples a [`TelemetrySource`](super::TelemetrySource) and reduces it.
pub struct FlowStatsAggregator {
    source: SharedTelemetry,
    window: StatsWindow,
    throughput_window: ThroughputWindow,
    baseline: BTreeMap<FlowId, FlowRecord>,
    last_sample: SimTime,
}

impl FlowStatsAggregator {
    pub fn new(source: SharedTelemetry) -> Self {
        Self {
            source,
            window: StatsWindow::default(),
            throughput_window: ThroughputWindow::default(),
            baseline: BTreeMap::new(),
            last_sample: SimTime::ZERO,
        }
    }

    pub fn with_window(mut self, window: StatsWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_throughput_window(mut self, window: ThroughputWindow) -> Self {
        self.throughput_window = window;
        self
    }

    pub fn window(&self) -> StatsWindow {
        self.window
    }

    /// Reconcile lost packets, read every flow and reduce for time `now`.
    pub fn compute(&mut self, now: SimTime) -> AggregateStats {
        let current = self.read_flows();

        let stats = match self.window {
            StatsWindow::Cumulative => {
                let secs = self.throughput_window.seconds(now);
                AggregateStats::from_records(current.values(), secs)
            }
            StatsWindow::PerStep => {
                let secs = self
                    .throughput_window
                    .seconds(now.saturating_sub(self.last_sample));
                let empty = FlowRecord::default();
                let deltas: Vec<FlowRecord> = current
                    .iter()
                    .map(|(id, r)| r.delta_since(self.baseline.get(id).unwrap_or(&empty)))
                    .collect();
                AggregateStats::from_records(deltas.iter(), secs)
            }
        };

        debug!(
            sim_time = %now,
            flows = stats.flow_count,
            pdr = stats.avg_delivery_ratio,
            throughput_mbps = stats.avg_throughput_mbps,
            delay_s = stats.avg_delay_secs,
            "flow stats computed"
        );

        self.baseline = current;
        self.last_sample = now;
        stats
    }

    /// Forget the per-step baseline, as at the start of an episode.
    pub fn reset(&mut self) {
        self.baseline.clear();
        self.last_sample = SimTime::ZERO;
    }

    /// Cumulative per-flow report at the end of a run that lasted `elapsed`.
    pub fn final_report(&mut self, elapsed: SimTime) -> RunSummary {
        let current = self.read_flows();
        RunSummary::from_records(current.values(), self.throughput_window.seconds(elapsed))
    }

    fn read_flows(&self) -> BTreeMap<FlowId, FlowRecord> {
        let mut source = self.source.borrow_mut();
        source.check_for_lost_packets();
        source.flow_stats()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::StaticTelemetry;
    use std::time::Duration;

    fn flow(tx: u64, rx: u64, rx_bytes: u64, delay_ms: u64) -> FlowRecord {
        FlowRecord {
            tx_packets: tx,
            rx_packets: rx,
            tx_bytes: tx * 1024,
            rx_bytes,
            delay_sum: Duration::from_millis(delay_ms),
            lost_packets: 0,
        }
    }

    // -----------------------------------------------------------------------
    // from_records
    // -----------------------------------------------------------------------

    #[test]
    fn no_flows_gives_all_zero() {
        let stats = AggregateStats::from_records(std::iter::empty::<&FlowRecord>(), 20.0);
        assert_eq!(stats, AggregateStats::default());
    }

    #[test]
    fn zero_tx_gives_zero_pdr() {
        let stats = AggregateStats::from_records(&[flow(0, 0, 0, 0)], 20.0);
        assert_eq!(stats.avg_delivery_ratio, 0.0);
        assert_eq!(stats.flow_count, 1);
    }

    #[test]
    fn pdr_pools_packets_across_flows() {
        // 90 of 100 and 10 of 100: pooled 50%, not the mean of ratios.
        let stats = AggregateStats::from_records(&[flow(100, 90, 0, 0), flow(100, 10, 0, 0)], 20.0);
        assert!((stats.avg_delivery_ratio - 50.0).abs() < 1e-9);
    }

    #[test]
    fn throughput_uses_window_and_binary_megabits() {
        // 1 MiB over 20 s = 8/20 Mb/s.
        let stats = AggregateStats::from_records(&[flow(1, 1, 1024 * 1024, 0)], 20.0);
        assert!((stats.avg_throughput_mbps - 0.4).abs() < 1e-12);
    }

    #[test]
    fn throughput_is_averaged_over_all_flows() {
        let stats =
            AggregateStats::from_records(&[flow(1, 1, 1024 * 1024, 0), flow(1, 0, 0, 0)], 20.0);
        assert!((stats.avg_throughput_mbps - 0.2).abs() < 1e-12);
    }

    #[test]
    fn non_positive_window_gives_zero_throughput() {
        let stats = AggregateStats::from_records(&[flow(1, 1, 4096, 0)], 0.0);
        assert_eq!(stats.avg_throughput_mbps, 0.0);
    }

    #[test]
    fn delay_excludes_flows_without_receptions() {
        let stats = AggregateStats::from_records(&[flow(10, 10, 0, 500), flow(10, 0, 0, 0)], 20.0);
        assert!((stats.avg_delay_secs - 0.05).abs() < 1e-12);
    }

    // -----------------------------------------------------------------------
    // RunSummary
    // -----------------------------------------------------------------------

    #[test]
    fn summary_averages_per_flow_ratios() {
        let summary = RunSummary::from_records(&[flow(100, 90, 0, 0), flow(10, 5, 0, 0)], 20.0);
        assert!((summary.avg_delivery_ratio - 70.0).abs() < 1e-9);
        assert_eq!(summary.tx_packets, 110);
        assert_eq!(summary.rx_packets, 95);
    }

    #[test]
    fn summary_delay_is_none_without_receptions() {
        let summary = RunSummary::from_records(&[flow(10, 0, 0, 0)], 20.0);
        assert_eq!(summary.avg_delay_secs, None);
    }

    // -----------------------------------------------------------------------
    // FlowStatsAggregator
    // -----------------------------------------------------------------------

    #[test]
    fn compute_runs_lost_packet_check_first() {
        let telemetry = StaticTelemetry::new([flow(100, 80, 0, 0)]).shared();
        let mut agg = FlowStatsAggregator::new(telemetry.clone());
        agg.compute(SimTime::from_millis(100));
        agg.compute(SimTime::from_millis(200));
        assert_eq!(telemetry.borrow().lost_packet_checks, 2);
    }

    #[test]
    fn cumulative_window_keeps_history() {
        let telemetry = StaticTelemetry::new([flow(100, 80, 0, 0)]).shared();
        let mut agg = FlowStatsAggregator::new(telemetry.clone());
        assert!((agg.compute(SimTime::from_millis(100)).avg_delivery_ratio - 80.0).abs() < 1e-9);
        telemetry.borrow_mut().flows.insert(1, flow(200, 80, 0, 0));
        assert!((agg.compute(SimTime::from_millis(200)).avg_delivery_ratio - 40.0).abs() < 1e-9);
    }

    #[test]
    fn per_step_window_only_sees_growth() {
        let telemetry = StaticTelemetry::new([flow(100, 80, 0, 0)]).shared();
        let mut agg = FlowStatsAggregator::new(telemetry.clone()).with_window(StatsWindow::PerStep);
        agg.compute(SimTime::from_millis(100));
        telemetry.borrow_mut().flows.insert(1, flow(200, 80, 0, 0));
        let stats = agg.compute(SimTime::from_millis(200));
        assert_eq!(stats.avg_delivery_ratio, 0.0);
    }

    #[test]
    fn elapsed_throughput_window_divides_by_step_length() {
        let telemetry = StaticTelemetry::new([flow(1, 1, 0, 0)]).shared();
        let mut agg = FlowStatsAggregator::new(telemetry.clone())
            .with_window(StatsWindow::PerStep)
            .with_throughput_window(ThroughputWindow::Elapsed);
        agg.compute(SimTime::from_secs_f64(1.0));
        telemetry.borrow_mut().flows.insert(1, flow(2, 2, 1024 * 1024, 0));
        // 1 MiB in 0.5 s = 16 Mb/s.
        let stats = agg.compute(SimTime::from_secs_f64(1.5));
        assert!((stats.avg_throughput_mbps - 16.0).abs() < 1e-9);
    }

    #[test]
    fn throughput_window_serde_shape() {
        let json = serde_json::to_value(ThroughputWindow::default()).unwrap();
        assert_eq!(json["kind"], "fixed");
        assert_eq!(json["secs"], 20.0);
        let back: ThroughputWindow = serde_json::from_str(r#"{"kind":"elapsed"}"#).unwrap();
        assert_eq!(back, ThroughputWindow::Elapsed);
    }
}
