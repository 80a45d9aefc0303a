use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;

use crate::error::{MonitorError, Result};

pub const LEGITIMATE: u32 = 0;
pub const UNKNOWN_LABEL: &str = "Unknown";

lazy_static! {
    static ref DEFAULT_LABELS: BTreeMap<u32, &'static str> = {
        let mut labels = BTreeMap::new();
        labels.insert(LEGITIMATE, "LEGITIMATE NETWORK TRAFFIC");
        labels.insert(1, "DDoS ATTACK DETECTED");
        labels.insert(2, "PROTOCOL EXPLOITATION DETECTED");
        labels.insert(3, "RECONNAISSANCE DETECTED");
        labels.insert(4, "TRAFFIC MANIPULATION DETECTED");
        labels.insert(5, "BUFFER OVERFLOW DETECTED");
        labels
    };
}

/// Classifier output id -> human readable category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: BTreeMap<u32, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        LabelMap {
            labels: DEFAULT_LABELS
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
        }
    }
}

impl LabelMap {
    /// Reads a JSON object such as `{"0": "Normal", "1": "DoS Attack"}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text)?;
        let mut labels = BTreeMap::new();
        for (id, name) in raw {
            labels.insert(id.trim().parse::<u32>()?, name);
        }
        if labels.is_empty() {
            return Err(MonitorError::ConfigError("label map is empty".to_string()));
        }
        Ok(LabelMap { labels })
    }

    pub fn name(&self, id: u32) -> &str {
        self.labels
            .get(&id)
            .map(|name| name.as_str())
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
