//! Per-port traffic counters built from live capture, shaped into the
//! port-statistics feature vector a pre-trained intrusion classifier expects.

pub mod capture;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod labels;
pub mod model_predictor;
pub mod monitor;
pub mod packet;
pub mod port_stats;
pub mod report;
pub mod schema;
pub mod synthetic;

pub use capture::{InterfaceCapture, PacketSource, ScriptedSource};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use features::FeatureRow;
pub use labels::LabelMap;
pub use model_predictor::{Classifier, ModelPredictor};
pub use monitor::{CycleReport, Monitor};
pub use packet::PacketDescriptor;
pub use port_stats::{ObserveOutcome, PortAggregator, PortKey, PortStats, SkipReason};
pub use report::{ClassifiedRow, CsvLog, LabelTally};
