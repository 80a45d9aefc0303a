use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::port_stats::PortAggregator;
use crate::synthetic::{FixedSynthetic, RandomSynthetic, SyntheticSource};

pub const DEFAULT_REPLAY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Interface name; the operator is prompted when `None`.
    pub interface: Option<String>,
    pub window: Duration,
    /// Stop after this many cycles; run until Ctrl+C when `None`.
    pub cycles: Option<u64>,
    /// Forget every port after each cycle instead of accumulating.
    pub reset_each_cycle: bool,
    pub tcp_only: bool,
    pub model_path: PathBuf,
    pub features_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    /// Pin the simulated port fields instead of drawing them at random.
    pub fixed_synthetic: Option<FixedSynthetic>,
    /// Classify the records of a dataset CSV instead of capturing.
    pub replay_path: Option<PathBuf>,
    pub replay_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            interface: None,
            window: Duration::from_secs(5),
            cycles: None,
            reset_each_cycle: false,
            tcp_only: false,
            model_path: PathBuf::from("model/model.pkl"),
            features_path: PathBuf::from("model/features1.pkl"),
            labels_path: None,
            output_path: Some(PathBuf::from("port_features_with_predictions.csv")),
            fixed_synthetic: None,
            replay_path: None,
            replay_delay: Duration::from_millis(DEFAULT_REPLAY_DELAY_MS),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err("capture window must be longer than zero".into());
        }
        if self.cycles == Some(0) {
            return Err("cycle count must be at least 1".into());
        }
        Ok(())
    }

    pub fn synthetic_source(&self) -> Box<dyn SyntheticSource> {
        match self.fixed_synthetic {
            Some(fixed) => Box::new(fixed),
            None => Box::new(RandomSynthetic::new()),
        }
    }

    pub fn aggregator(&self) -> PortAggregator {
        PortAggregator::new(self.synthetic_source()).tcp_only(self.tcp_only)
    }
}
