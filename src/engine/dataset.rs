use std::io::Read;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use super::features::FeatureRow;

/// One labeled training row: the four classifier features plus the binary
/// `notify_now` ground truth.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingRecord {
    pub document_type: String,
    pub document_importance: String,
    pub has_late_renewal_before: String,
    pub days_to_expiry: i64,
    pub notify_now: u8,
}

impl TrainingRecord {
    pub fn feature_row(&self) -> FeatureRow<'_> {
        FeatureRow {
            document_type: &self.document_type,
            document_importance: &self.document_importance,
            has_late_renewal_before: &self.has_late_renewal_before,
            days_to_expiry: self.days_to_expiry as f64,
        }
    }
}

/// In-memory training dataset loaded from the configured CSV resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<TrainingRecord>,
}

impl Dataset {
    /// Load from the configured path; a missing file is the fatal
    /// dataset-unavailable case, a malformed row aborts the load eagerly.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::Unavailable {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (index, record) in csv_reader.deserialize::<TrainingRecord>().enumerate() {
            let row = record?;
            if row.notify_now > 1 {
                return Err(DatasetError::InvalidLabel {
                    row: index + 1,
                    value: row.notify_now,
                });
            }
            records.push(row);
        }

        if records.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split into train and holdout partitions, stratified by label so both
    /// sides keep the class mix. The shuffle is seeded, keeping the split (and
    /// the trained model) reproducible.
    pub fn stratified_split(&self, holdout_fraction: f64, seed: u64) -> (Dataset, Dataset) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut holdout = Vec::new();

        for label in [0u8, 1u8] {
            let mut class: Vec<TrainingRecord> = self
                .records
                .iter()
                .filter(|record| record.notify_now == label)
                .cloned()
                .collect();
            class.shuffle(&mut rng);

            let mut take = (class.len() as f64 * holdout_fraction).round() as usize;
            // Never strip a class entirely out of the training partition.
            if take >= class.len() {
                take = class.len().saturating_sub(1);
            }

            holdout.extend(class.drain(..take));
            train.extend(class);
        }

        (Dataset { records: train }, Dataset { records: holdout })
    }
}

/// Failure modes of the training dataset source.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("training dataset not found at {path}")]
    Unavailable { path: PathBuf },
    #[error("failed to read training dataset at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed training row: {0}")]
    Malformed(#[from] csv::Error),
    #[error("training row {row} has label {value}, expected 0 or 1")]
    InvalidLabel { row: usize, value: u8 },
    #[error("training dataset contains no rows")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "document_type,document_importance,has_late_renewal_before,days_to_expiry,notify_now\n";

    fn dataset(rows: &str) -> Result<Dataset, DatasetError> {
        Dataset::from_reader(Cursor::new(format!("{HEADER}{rows}")))
    }

    #[test]
    fn parses_labeled_rows() {
        let dataset = dataset("Passport,HIGH,NO,12,1\nNational ID,MEDIUM,NO,200,0\n")
            .expect("dataset parses");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[0].notify_now, 1);
        assert_eq!(dataset.records()[1].days_to_expiry, 200);
    }

    #[test]
    fn rejects_empty_dataset() {
        let err = dataset("").expect_err("empty dataset rejected");
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn rejects_non_binary_label() {
        let err = dataset("Passport,HIGH,NO,12,3\n").expect_err("bad label rejected");
        assert!(matches!(
            err,
            DatasetError::InvalidLabel { row: 1, value: 3 }
        ));
    }

    #[test]
    fn malformed_row_aborts_the_load() {
        let err = dataset("Passport,HIGH,NO,not-a-number,1\n").expect_err("row rejected");
        assert!(matches!(err, DatasetError::Malformed(_)));
    }

    #[test]
    fn missing_file_reports_unavailable() {
        let err = Dataset::from_path("data/does-not-exist.csv").expect_err("missing file");
        assert!(matches!(err, DatasetError::Unavailable { .. }));
    }

    #[test]
    fn stratified_split_keeps_both_classes_in_training() {
        let rows: String = (0..20)
            .map(|i| {
                let days = if i < 12 { 5 + i } else { 100 + i };
                let label = u8::from(i < 12);
                format!("Passport,HIGH,NO,{days},{label}\n")
            })
            .collect();
        let dataset = dataset(&rows).expect("dataset parses");

        let (train, holdout) = dataset.stratified_split(0.2, 42);
        assert_eq!(train.len() + holdout.len(), 20);
        assert!(train.records().iter().any(|r| r.notify_now == 1));
        assert!(train.records().iter().any(|r| r.notify_now == 0));
        // 20% of 12 positives and 20% of 8 negatives.
        assert_eq!(holdout.len(), 4);
    }
}
