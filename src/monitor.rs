use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::{debug, info, warn};

use crate::capture::PacketSource;
use crate::dataset::DatasetReplay;
use crate::error::{MonitorError, Result};
use crate::features::FeatureRow;
use crate::labels::LabelMap;
use crate::model_predictor::Classifier;
use crate::packet::PacketDescriptor;
use crate::port_stats::PortAggregator;
use crate::report::{ClassifiedRow, CycleMetrics, LabelTally, ERROR_LABEL};
use crate::schema;

/// Everything one capture cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub metrics: CycleMetrics,
    pub rows: Vec<ClassifiedRow>,
}

/// Drives the capture, aggregate, align and classify loop.
pub struct Monitor<C: Classifier> {
    classifier: C,
    labels: LabelMap,
    aggregator: PortAggregator,
    reset_each_cycle: bool,
    tally: LabelTally,
    cycle: u64,
}

impl<C: Classifier> Monitor<C> {
    pub fn new(classifier: C, labels: LabelMap, aggregator: PortAggregator) -> Self {
        Monitor {
            classifier,
            labels,
            aggregator,
            reset_each_cycle: false,
            tally: LabelTally::default(),
            cycle: 0,
        }
    }

    /// Forget every port once its cycle has been classified.
    pub fn reset_each_cycle(mut self, reset: bool) -> Self {
        self.reset_each_cycle = reset;
        self
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn aggregator(&self) -> &PortAggregator {
        &self.aggregator
    }

    pub fn tally(&self) -> &LabelTally {
        &self.tally
    }

    /// Captures one window, snapshots every tracked port and classifies each
    /// row. A window with no tracked ports never reaches the classifier.
    pub fn run_cycle<S: PacketSource + ?Sized>(
        &mut self,
        source: &mut S,
        window: Duration,
    ) -> Result<CycleReport> {
        let aggregator = &mut self.aggregator;
        let delivered = source.capture_window(window, &mut |packet: &PacketDescriptor| {
            aggregator.observe(packet);
        })?;

        let snapshot = self.aggregator.snapshot_and_advance();
        debug!(
            "Window closed: {} packets delivered, {} ports tracked",
            delivered,
            snapshot.len()
        );
        let rows: Vec<ClassifiedRow> = snapshot.into_iter().map(|row| self.classify(row)).collect();

        self.cycle += 1;
        let metrics = CycleMetrics {
            cycle: self.cycle,
            active_ports: self.aggregator.len(),
            total_packets: self.aggregator.total_packets(),
            errors: self.aggregator.totals().errors,
        };

        if self.reset_each_cycle {
            self.aggregator.reset();
        }

        Ok(CycleReport { metrics, rows })
    }

    /// Runs cycles until `running` is cleared or `cycles` have completed.
    /// Returns the number of completed cycles.
    pub fn run<S, F>(
        &mut self,
        source: &mut S,
        window: Duration,
        cycles: Option<u64>,
        running: &AtomicBool,
        mut on_cycle: F,
    ) -> Result<u64>
    where
        S: PacketSource + ?Sized,
        F: FnMut(&CycleReport, &LabelTally) -> Result<()>,
    {
        let mut completed = 0;
        while running.load(Ordering::SeqCst) && cycles.map_or(true, |max| completed < max) {
            let report = self.run_cycle(source, window)?;
            on_cycle(&report, &self.tally)?;
            completed += 1;
        }

        let totals = self.aggregator.totals();
        info!(
            "Stopped after {} cycles: {} packets recorded, {} skipped, {} errors",
            completed, totals.recorded, totals.skipped, totals.errors
        );
        Ok(completed)
    }

    /// Classifies the records of a dataset CSV one by one, pausing `delay`
    /// between records. Unreadable records are logged and skipped.
    pub fn replay<R, F>(
        &mut self,
        mut replay: DatasetReplay<R>,
        delay: Duration,
        running: &AtomicBool,
        mut on_row: F,
    ) -> Result<u64>
    where
        R: Read,
        F: FnMut(&ClassifiedRow, &LabelTally) -> Result<()>,
    {
        let mut classified = 0;
        for record in replay.by_ref() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let row = match record {
                Ok(row) => row,
                Err(MonitorError::IoError(msg)) => return Err(MonitorError::IoError(msg)),
                Err(e) => {
                    warn!("Skipping unreadable dataset record: {}", e);
                    continue;
                }
            };

            let row = self.classify(row);
            on_row(&row, &self.tally)?;
            classified += 1;

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        info!(
            "Replayed {} records, {} incomplete records dropped",
            classified,
            replay.skipped()
        );
        Ok(classified)
    }

    /// Aligns `row` to the model's features and classifies it. A failed
    /// prediction is reported under the error label and never stops the run.
    pub fn classify(&mut self, row: FeatureRow) -> ClassifiedRow {
        let expected = self.classifier.feature_names();

        let missing = schema::missing(&row, expected);
        if !missing.is_empty() {
            debug!("Filling {} absent features with 0: {:?}", missing.len(), missing);
        }
        let extra = schema::extra(&row, expected);
        if !extra.is_empty() {
            debug!("Dropping {} columns the model was not trained on", extra.len());
        }

        let aligned = schema::align(&row, expected);
        let (prediction, label) = match self.classifier.predict(&aligned) {
            Ok(id) => (Some(id), self.labels.name(id).to_string()),
            Err(e) => {
                warn!("Prediction failed for port {:?}: {}", row.port(), e);
                (None, ERROR_LABEL.to_string())
            }
        };
        self.tally.record(&label);

        ClassifiedRow {
            timestamp: Local::now(),
            features: row,
            prediction,
            label,
        }
    }
}
