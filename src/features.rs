// Column names of the port-statistics intrusion dataset the classifier is
// trained on. They are spelled exactly as in the dataset header.
pub const PORT_NUMBER: &str = "Port Number";
pub const RECEIVED_PACKETS: &str = "Received Packets";
pub const RECEIVED_BYTES: &str = "Received Bytes";
pub const SENT_BYTES: &str = "Sent Bytes";
pub const SENT_PACKETS: &str = "Sent Packets";
pub const ALIVE_DURATION: &str = "Port alive Duration (S)";
pub const RX_DROPPED: &str = "Packets Rx Dropped";
pub const TX_DROPPED: &str = "Packets Tx Dropped";
pub const RX_ERRORS: &str = "Packets Rx Errors";
pub const TX_ERRORS: &str = "Packets Tx Errors";
pub const DELTA_RECEIVED_PACKETS: &str = "Delta Received Packets";
pub const DELTA_RECEIVED_BYTES: &str = "Delta Received Bytes";
pub const DELTA_SENT_BYTES: &str = "Delta Sent Bytes";
pub const DELTA_SENT_PACKETS: &str = "Delta Sent Packets";
pub const DELTA_ALIVE_DURATION: &str = "Delta Port alive Duration (S)";
pub const DELTA_RX_DROPPED: &str = "Delta Packets Rx Dropped";
// The dataset header carries a leading space on this one.
pub const DELTA_TX_DROPPED: &str = " Delta Packets Tx Dropped";
pub const DELTA_RX_ERRORS: &str = "Delta Packets Rx Errors";
pub const DELTA_TX_ERRORS: &str = "Delta Packets Tx Errors";
pub const CONNECTION_POINT: &str = "Connection Point";
pub const TOTAL_LOAD_RATE: &str = "Total Load/Rate";
pub const TOTAL_LOAD_LATEST: &str = "Total Load/Latest";
pub const UNKNOWN_LOAD_RATE: &str = "Unknown Load/Rate";
pub const UNKNOWN_LOAD_LATEST: &str = "Unknown Load/Latest";
pub const LATEST_BYTES: &str = "Latest bytes counter";
pub const IS_VALID: &str = "is_valid";
pub const TABLE_ID: &str = "Table ID";
pub const ACTIVE_FLOW_ENTRIES: &str = "Active Flow Entries";
pub const LOOKED_UP: &str = "Packets Looked Up";
pub const MATCHED: &str = "Packets Matched";
pub const MAX_SIZE: &str = "Max Size";

/// Column order of every row the aggregator produces.
pub const PORT_FEATURE_COLUMNS: [&str; 31] = [
    PORT_NUMBER,
    RECEIVED_PACKETS,
    RECEIVED_BYTES,
    SENT_BYTES,
    SENT_PACKETS,
    ALIVE_DURATION,
    RX_DROPPED,
    TX_DROPPED,
    RX_ERRORS,
    TX_ERRORS,
    DELTA_RECEIVED_PACKETS,
    DELTA_RECEIVED_BYTES,
    DELTA_SENT_BYTES,
    DELTA_SENT_PACKETS,
    DELTA_ALIVE_DURATION,
    DELTA_RX_DROPPED,
    DELTA_TX_DROPPED,
    DELTA_RX_ERRORS,
    DELTA_TX_ERRORS,
    CONNECTION_POINT,
    TOTAL_LOAD_RATE,
    TOTAL_LOAD_LATEST,
    UNKNOWN_LOAD_RATE,
    UNKNOWN_LOAD_LATEST,
    LATEST_BYTES,
    IS_VALID,
    TABLE_ID,
    ACTIVE_FLOW_ENTRIES,
    LOOKED_UP,
    MATCHED,
    MAX_SIZE,
];

/// Ordered feature name -> value mapping. Insertion order is kept; inserting
/// an existing name overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(String, f64)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        FeatureRow { columns: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FeatureRow {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        match self.columns.iter_mut().find(|(column, _)| column == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.columns.iter().map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Port this row describes, when it came from the aggregator.
    pub fn port(&self) -> Option<u16> {
        self.get(PORT_NUMBER).map(|port| port as u16)
    }
}

impl<'a> FromIterator<(&'a str, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut row = FeatureRow::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}
