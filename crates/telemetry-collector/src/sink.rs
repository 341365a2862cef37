// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSV row sinks: the primary per-emission log and the secondary
//! per-batch-sub-reading log.

use crate::error::PipelineError;
use crate::row::{BatchDetailRow, Row};
use std::fs::File;
use std::path::Path;

const NULL_MARKER: &str = "<null>";

fn fmt_opt(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => NULL_MARKER.to_string(),
    }
}

/// Appends rows to the primary telemetry CSV log.
pub struct RowSink {
    writer: csv::Writer<File>,
    pub rows_written: u64,
    pub write_errors: u64,
}

impl RowSink {
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        let file = File::create(path).map_err(|source| PipelineError::SinkOpen {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record([
                "Timestamp",
                "Precise_Time",
                "Device_ID",
                "Seq_Num",
                "Msg_Type",
                "Duplicate",
                "Gap_Synthesized",
                "Temp_C",
                "Humid_Pct",
                "Volt_V",
            ])
            .map_err(|e| PipelineError::SinkWrite(e.into()))?;
        writer
            .flush()
            .map_err(PipelineError::SinkWrite)?;
        Ok(Self {
            writer,
            rows_written: 0,
            write_errors: 0,
        })
    }

    pub fn record(&mut self, row: &Row) -> Result<(), PipelineError> {
        let result = self.writer.write_record([
            row.wall_clock.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.6}", row.precise_time),
            row.device_id.to_string(),
            row.sequence.to_string(),
            row.kind.as_str().to_string(),
            row.duplicate.to_string(),
            row.gap_synthesized.to_string(),
            fmt_opt(row.temperature),
            fmt_opt(row.humidity),
            fmt_opt(row.voltage),
        ]);

        match result.and_then(|_| self.writer.flush()) {
            Ok(()) => {
                self.rows_written += 1;
                Ok(())
            }
            Err(e) => {
                self.write_errors += 1;
                Err(PipelineError::SinkWrite(e.into()))
            }
        }
    }

    /// Append the shutdown metrics summary block as a run of non-data
    /// rows: a sentinel, then `METRIC,VALUE,UNIT` triples.
    pub fn append_summary_lines(&mut self, lines: &[Vec<String>]) -> Result<(), PipelineError> {
        for line in lines {
            self.writer
                .write_record(line)
                .map_err(|e| PipelineError::SinkWrite(e.into()))?;
        }
        self.writer.flush().map_err(PipelineError::SinkWrite)
    }
}

/// Appends per-sub-reading rows to the secondary batch-detail CSV log.
pub struct BatchDetailSink {
    writer: csv::Writer<File>,
    pub rows_written: u64,
}

impl BatchDetailSink {
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        let file = File::create(path).map_err(|source| PipelineError::SinkOpen {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record([
                "Batch_Timestamp",
                "Device_ID",
                "Seq_Num",
                "Batch_Size",
                "Reading_Index",
                "Sensor_Type",
                "Value",
                "Unit",
                "Batch_Avg",
                "Batch_Min",
                "Batch_Max",
            ])
            .map_err(|e| PipelineError::SinkWrite(e.into()))?;
        writer.flush().map_err(PipelineError::SinkWrite)?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn record(&mut self, row: &BatchDetailRow) -> Result<(), PipelineError> {
        let (label, unit) = match row.sensor_kind {
            telemetry_wire::SensorKind::Temperature => ("TEMPERATURE", "C"),
            telemetry_wire::SensorKind::Humidity => ("HUMIDITY", "pct"),
            telemetry_wire::SensorKind::Voltage => ("VOLTAGE", "V"),
        };
        self.writer
            .write_record([
                row.wall_clock.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                row.device_id.to_string(),
                row.sequence.to_string(),
                row.batch_size.to_string(),
                row.reading_index.to_string(),
                label.to_string(),
                format!("{:.2}", row.value),
                unit.to_string(),
                format!("{:.2}", row.batch_avg),
                format!("{:.2}", row.batch_min),
                format!("{:.2}", row.batch_max),
            ])
            .map_err(|e| PipelineError::SinkWrite(e.into()))?;
        self.writer.flush().map_err(PipelineError::SinkWrite)?;
        self.rows_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowKind;
    use telemetry_wire::SensorKind;

    #[test]
    fn row_sink_writes_header_and_null_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");
        let mut sink = RowSink::create(&path).unwrap();

        let row = Row::now(3001, 1, RowKind::Data, false, false, Some(21.5), None, None);
        sink.record(&row).unwrap();
        assert_eq!(sink.rows_written, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Duplicate,Gap_Synthesized"));
        assert!(contents.contains("21.50"));
        assert!(contents.contains(NULL_MARKER));
    }

    #[test]
    fn batch_detail_sink_writes_stats_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry_batch_details.csv");
        let mut sink = BatchDetailSink::create(&path).unwrap();

        let row = crate::row::BatchDetailRow {
            wall_clock: chrono::Utc::now(),
            device_id: 3001,
            sequence: 5,
            batch_size: 4,
            reading_index: 0,
            sensor_kind: SensorKind::Temperature,
            value: 21.6,
            batch_avg: 24.0,
            batch_min: 21.6,
            batch_max: 26.4,
        };
        sink.record(&row).unwrap();
        assert_eq!(sink.rows_written, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("TEMPERATURE"));
        assert!(contents.contains("24.00"));
    }
}
