use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::{MonitorError, Result};
use crate::features::FeatureRow;

pub const LABEL_COLUMN: &str = "Label";

// Cells pandas reads as NA by default.
const NA_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Empty, an NA token in any case, or a number that is not finite.
fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty()
        || NA_TOKENS.iter().any(|token| token.eq_ignore_ascii_case(cell))
        || matches!(cell.parse::<f64>(), Ok(value) if !value.is_finite())
}

/// Streams the records of a labelled dataset CSV as feature rows, so the
/// classifier can be exercised without live traffic.
///
/// Records with a missing cell (empty, NA, or a non-finite number) are
/// skipped. Non-numeric cells become 0, the code a lone categorical value
/// gets, and the label column is left out.
pub struct DatasetReplay<R: Read> {
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
    skipped: usize,
}

impl DatasetReplay<File> {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read> DatasetReplay<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::None)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        Ok(DatasetReplay {
            reader,
            headers,
            skipped: 0,
        })
    }

    /// Incomplete records dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn to_row(&self, record: &csv::StringRecord) -> FeatureRow {
        self.headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| *name != LABEL_COLUMN)
            .map(|(name, cell)| (name, cell.trim().parse::<f64>().unwrap_or(0.0)))
            .collect()
    }
}

impl<R: Read> Iterator for DatasetReplay<R> {
    type Item = Result<FeatureRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = csv::StringRecord::new();
        loop {
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    if record.iter().any(is_missing) {
                        self.skipped += 1;
                        debug!("Skipping incomplete dataset record {:?}", record.position());
                        continue;
                    }
                    return Some(Ok(self.to_row(&record)));
                }
                Ok(false) => return None,
                Err(e) if e.is_io_error() => return Some(Err(e.into())),
                Err(e) => return Some(Err(MonitorError::ParseError(e.to_string()))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Port Number,Received Packets, Delta Packets Tx Dropped,Switch ID,Label\n\
                          1,120,0,of:000000000000000c,Normal\n\
                          2,,3,of:000000000000000c,Normal\n\
                          3,7.5,1,of:000000000000000a,TCP-SYN\n";

    #[test]
    fn test_rows_from_csv() {
        let mut replay = DatasetReplay::from_reader(SAMPLE.as_bytes()).unwrap();

        let first = replay.next().unwrap().unwrap();
        assert_eq!(
            first.names().collect::<Vec<_>>(),
            vec!["Port Number", "Received Packets", " Delta Packets Tx Dropped", "Switch ID"]
        );
        assert_eq!(first.get("Received Packets"), Some(120.0));
        assert_eq!(first.get("Switch ID"), Some(0.0));
        assert!(!first.contains(LABEL_COLUMN));

        let second = replay.next().unwrap().unwrap();
        assert_eq!(second.port(), Some(3));
        assert_eq!(second.get("Received Packets"), Some(7.5));

        assert!(replay.next().is_none());
        assert_eq!(replay.skipped(), 1);
    }

    #[test]
    fn test_na_and_non_finite_records_are_dropped() {
        let data = "Port Number,Received Bytes,Label\n\
                    1,NaN,Normal\n\
                    2,NA,Normal\n\
                    3,inf,Normal\n\
                    4,null,Normal\n\
                    5,-Infinity,Normal\n\
                    6,n/a,Normal\n\
                    7,250,Normal\n";
        let mut replay = DatasetReplay::from_reader(data.as_bytes()).unwrap();

        let rows: Vec<FeatureRow> = replay.by_ref().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].port(), Some(7));
        assert_eq!(rows[0].get("Received Bytes"), Some(250.0));
        assert_eq!(replay.skipped(), 6);

        let expected = ["Received Bytes", "Port Number"];
        let aligned = crate::schema::align(&rows[0], &expected);
        assert_eq!(crate::schema::align(&aligned, &expected), aligned);
    }

    #[test]
    fn test_ragged_record_is_an_error() {
        let data = "a,b\n1,2\n3\n";
        let mut replay = DatasetReplay::from_reader(data.as_bytes()).unwrap();
        assert!(replay.next().unwrap().is_ok());
        assert!(matches!(replay.next(), Some(Err(MonitorError::ParseError(_)))));
    }

    #[test]
    fn test_missing_file() {
        assert!(DatasetReplay::open(Path::new("/nonexistent/portwatch/data.csv")).is_err());
    }
}
