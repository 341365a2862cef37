// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process- and per-device-level counters, and the shutdown summary.

use crate::registry::DeviceRegistry;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Per-process totals accumulated across the collector's lifetime.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub duplicates: u64,
    pub missing_positions: u64,
    pub decode_failures: u64,
    pub buffer_evictions: u64,
    total_cpu_time: Duration,
    start: Option<Instant>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_packet(&mut self, bytes: usize, processing_time: Duration) {
        self.packets_received += 1;
        self.bytes_received += bytes as u64;
        self.total_cpu_time += processing_time;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn record_missing(&mut self, count: u64) {
        self.missing_positions += count;
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    fn duplicate_rate(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.duplicates as f64 / self.packets_received as f64
        }
    }

    fn missing_fraction(&self) -> f64 {
        let denom = self.packets_received + self.missing_positions;
        if denom == 0 {
            0.0
        } else {
            self.missing_positions as f64 / denom as f64
        }
    }

    fn cpu_ms_per_packet(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.total_cpu_time.as_secs_f64() * 1000.0 / self.packets_received as f64
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// `true` if all three compliance checks pass: duplicate rate
    /// ≤ 1%, at least one packet received, missing-fraction < 5%.
    pub fn is_compliant(&self) -> bool {
        self.duplicate_rate() <= 0.01 && self.packets_received > 0 && self.missing_fraction() < 0.05
    }

    /// Render the shutdown summary block: a sentinel row, then
    /// `METRIC,VALUE,UNIT` rows, additional metrics, a per-device
    /// breakdown, and a compliance verdict. Matches the reference
    /// collector's report shape.
    pub fn render_summary(&self, registry: &DeviceRegistry) -> Vec<Vec<String>> {
        let mut lines = Vec::new();
        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();

        lines.push(row(&["", "", ""]));
        lines.push(row(&["=== PHASE 2 METRICS REPORT ===", "", ""]));
        lines.push(row(&["METRIC", "VALUE", "UNIT"]));
        lines.push(row(&[
            "bytes_per_report",
            &format!(
                "{:.2}",
                if self.packets_received == 0 {
                    0.0
                } else {
                    self.bytes_received as f64 / self.packets_received as f64
                }
            ),
            "bytes",
        ]));
        lines.push(row(&[
            "packets_received",
            &self.packets_received.to_string(),
            "count",
        ]));
        lines.push(row(&[
            "duplicate_rate",
            &format!("{:.4}", self.duplicate_rate() * 100.0),
            "percent",
        ]));
        lines.push(row(&[
            "sequence_gap_count",
            &self.missing_positions.to_string(),
            "count",
        ]));
        lines.push(row(&[
            "cpu_ms_per_report",
            &format!("{:.4}", self.cpu_ms_per_packet()),
            "ms",
        ]));

        lines.push(row(&["=== ADDITIONAL METRICS ===", "", ""]));
        let elapsed_secs = self.elapsed().as_secs_f64().max(1e-9);
        lines.push(row(&[
            "duration",
            &format!("{elapsed_secs:.2}"),
            "seconds",
        ]));
        lines.push(row(&[
            "packets_per_sec",
            &format!("{:.2}", self.packets_received as f64 / elapsed_secs),
            "count/s",
        ]));
        lines.push(row(&[
            "bytes_per_sec",
            &format!("{:.2}", self.bytes_received as f64 / elapsed_secs),
            "bytes/s",
        ]));
        lines.push(row(&[
            "total_bytes",
            &self.bytes_received.to_string(),
            "bytes",
        ]));

        lines.push(row(&["=== PER-DEVICE STATISTICS ===", "", ""]));
        lines.push(row(&[
            "Device_ID",
            "Packets",
            "Duplicates,Dup_Rate_%,Gaps,Bytes",
        ]));
        let mut per_device: BTreeMap<u16, _> = BTreeMap::new();
        for (&id, state) in registry.iter() {
            per_device.insert(id, state.counters);
        }
        for (device_id, counters) in per_device {
            let dup_rate = if counters.received == 0 {
                0.0
            } else {
                counters.duplicates as f64 / counters.received as f64 * 100.0
            };
            lines.push(vec![
                device_id.to_string(),
                counters.received.to_string(),
                counters.duplicates.to_string(),
                format!("{dup_rate:.2}"),
                counters.missing_positions.to_string(),
                counters.bytes.to_string(),
            ]);
        }

        lines.push(row(&["=== PHASE 2 COMPLIANCE ===", "", ""]));
        let dup_check = self.duplicate_rate() <= 0.01;
        let packets_check = self.packets_received > 0;
        let missing_check = self.missing_fraction() < 0.05;
        lines.push(row(&[
            "duplicate_rate_le_1pct",
            if dup_check { "PASS" } else { "FAIL" },
            "threshold=1%",
        ]));
        lines.push(row(&[
            "packets_received_gt_0",
            if packets_check { "PASS" } else { "FAIL" },
            "threshold=0",
        ]));
        lines.push(row(&[
            "missing_fraction_lt_5pct",
            if missing_check { "PASS" } else { "FAIL" },
            "threshold=5%",
        ]));
        lines.push(row(&[
            "overall",
            if self.is_compliant() {
                "COMPLIANT"
            } else {
                "NON-COMPLIANT"
            },
            "",
        ]));
        lines.push(row(&[
            "Report generated",
            &chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "",
        ]));

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliant_when_thresholds_met() {
        let mut m = MetricsAccumulator::new();
        for _ in 0..100 {
            m.record_packet(64, Duration::from_micros(10));
        }
        assert!(m.is_compliant());
    }

    #[test]
    fn non_compliant_when_duplicate_rate_too_high() {
        let mut m = MetricsAccumulator::new();
        for _ in 0..10 {
            m.record_packet(64, Duration::from_micros(10));
        }
        for _ in 0..5 {
            m.record_duplicate();
        }
        assert!(!m.is_compliant());
    }

    #[test]
    fn non_compliant_with_zero_packets() {
        let m = MetricsAccumulator::new();
        assert!(!m.is_compliant());
    }

    #[test]
    fn summary_contains_expected_banners() {
        let mut m = MetricsAccumulator::new();
        m.record_packet(100, Duration::from_micros(5));
        let registry = DeviceRegistry::new(16);
        let lines = m.render_summary(&registry);
        let flattened: Vec<String> = lines.into_iter().map(|row| row.join(",")).collect();
        assert!(flattened.iter().any(|l| l.contains("PHASE 2 METRICS REPORT")));
        assert!(flattened.iter().any(|l| l.contains("PER-DEVICE STATISTICS")));
        assert!(flattened.iter().any(|l| l.contains("PHASE 2 COMPLIANCE")));
    }
}
