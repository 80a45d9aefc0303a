use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{MonitorError, Result};
use crate::features::{self, FeatureRow};
use crate::schema;

pub const ERROR_LABEL: &str = "Error";

/// One row as it leaves the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub timestamp: DateTime<Local>,
    /// The row as computed, before alignment.
    pub features: FeatureRow,
    /// `None` when the classifier failed on this row.
    pub prediction: Option<u32>,
    pub label: String,
}

impl ClassifiedRow {
    pub fn is_attack(&self) -> bool {
        matches!(self.prediction, Some(id) if id != crate::labels::LEGITIMATE)
    }
}

/// Appends classified rows to a CSV file. The first row fixes the columns;
/// later rows are aligned to them.
pub struct CsvLog<W: Write> {
    writer: csv::Writer<W>,
    columns: Option<Vec<String>>,
}

impl CsvLog<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvLog<W> {
    pub fn from_writer(writer: W) -> Self {
        CsvLog {
            writer: csv::Writer::from_writer(writer),
            columns: None,
        }
    }

    pub fn append(&mut self, row: &ClassifiedRow) -> Result<()> {
        if self.columns.is_none() {
            let columns: Vec<String> = row.features.names().map(str::to_string).collect();
            let mut header = vec!["Timestamp".to_string()];
            header.extend(columns.iter().cloned());
            header.push("Prediction".to_string());
            header.push("Label".to_string());
            self.writer.write_record(&header)?;
            self.columns = Some(columns);
        }

        let aligned = match &self.columns {
            Some(columns) => schema::align(&row.features, columns),
            None => row.features.clone(),
        };
        let mut record = Vec::with_capacity(aligned.len() + 3);
        record.push(row.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string());
        record.extend(aligned.values().map(|value| value.to_string()));
        record.push(row.prediction.map(|id| id.to_string()).unwrap_or_default());
        record.push(row.label.clone());

        self.writer.write_record(&record)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| MonitorError::IoError(e.to_string()))
    }
}

/// Running count of predicted labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTally {
    counts: BTreeMap<String, u64>,
}

impl LabelTally {
    pub fn record(&mut self, label: &str) {
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }
}

/// Counters the operator sees at the top of every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleMetrics {
    pub cycle: u64,
    pub active_ports: usize,
    pub total_packets: u64,
    pub errors: u64,
}

pub fn format_cycle(metrics: &CycleMetrics, rows: &[ClassifiedRow], tally: &LabelTally) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("\x1b[36m=== Cycle {} ===\x1b[0m", metrics.cycle));
    lines.push(format!(
        "Active Ports: {} | Total Packets: {} | Processing Errors: {}",
        metrics.active_ports, metrics.total_packets, metrics.errors
    ));

    if rows.is_empty() {
        lines.push("No traffic in this window.".to_string());
    } else {
        lines.push(format!(
            "{:>6} {:>10} {:>12} {:>8}  {}",
            "Port", "Packets", "Bytes", "Delta", "Label"
        ));
        for row in rows {
            let value = |name: &str| row.features.get(name).unwrap_or(0.0);
            lines.push(format!(
                "{:>6} {:>10} {:>12} {:>8}  {}",
                value(features::PORT_NUMBER),
                value(features::RECEIVED_PACKETS),
                value(features::RECEIVED_BYTES),
                value(features::DELTA_RECEIVED_PACKETS),
                row.label
            ));
        }
    }

    for row in rows.iter().filter(|row| row.is_attack()) {
        lines.push(format!(
            "\x1b[31m⚠️  Intrusion detected on port {}: {}\x1b[0m",
            row.features.port().unwrap_or(0),
            row.label
        ));
    }

    if tally.total() > 0 {
        let summary: Vec<String> = tally
            .iter()
            .map(|(label, count)| {
                format!("{} {:.1}%", label, count as f64 * 100.0 / tally.total() as f64)
            })
            .collect();
        lines.push(format!("Label distribution: {}", summary.join(", ")));
    }
    lines
}

pub fn print_cycle(metrics: &CycleMetrics, rows: &[ClassifiedRow], tally: &LabelTally) {
    for line in format_cycle(metrics, rows, tally) {
        println!("{}", line);
    }
}
