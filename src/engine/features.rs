use super::domain::DocumentRecord;

/// The four classifier features projected from a document, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow<'a> {
    pub document_type: &'a str,
    pub document_importance: &'a str,
    pub has_late_renewal_before: &'a str,
    pub days_to_expiry: f64,
}

impl<'a> From<&'a DocumentRecord> for FeatureRow<'a> {
    fn from(record: &'a DocumentRecord) -> Self {
        FeatureRow {
            document_type: &record.document_type,
            document_importance: record.importance.as_category(),
            has_late_renewal_before: record.late_renewal.as_category(),
            days_to_expiry: record.days_to_expiry as f64,
        }
    }
}

/// One-hot encoder over the three categorical features plus the numeric
/// passthrough. The vocabulary is frozen at fit time; an unseen category at
/// inference encodes as all-zero for its column, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    document_types: Vec<String>,
    importances: Vec<String>,
    late_renewals: Vec<String>,
}

impl FeatureEncoder {
    pub fn fit(rows: &[FeatureRow<'_>]) -> Self {
        Self {
            document_types: vocabulary(rows.iter().map(|row| row.document_type)),
            importances: vocabulary(rows.iter().map(|row| row.document_importance)),
            late_renewals: vocabulary(rows.iter().map(|row| row.has_late_renewal_before)),
        }
    }

    /// Width of the encoded vector: one slot per known category plus the
    /// numeric feature.
    pub fn width(&self) -> usize {
        self.document_types.len() + self.importances.len() + self.late_renewals.len() + 1
    }

    pub fn encode(&self, row: &FeatureRow<'_>) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.width());
        one_hot(&mut encoded, &self.document_types, row.document_type);
        one_hot(&mut encoded, &self.importances, row.document_importance);
        one_hot(&mut encoded, &self.late_renewals, row.has_late_renewal_before);
        encoded.push(row.days_to_expiry);
        encoded
    }

    pub fn encode_batch(&self, rows: &[FeatureRow<'_>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.encode(row)).collect()
    }
}

fn vocabulary<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut vocab: Vec<String> = values.map(str::to_string).collect();
    vocab.sort();
    vocab.dedup();
    vocab
}

fn one_hot(encoded: &mut Vec<f64>, vocab: &[String], value: &str) {
    for category in vocab {
        encoded.push(if category == value { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row<'a>(kind: &'a str, importance: &'a str, late: &'a str, days: f64) -> FeatureRow<'a> {
        FeatureRow {
            document_type: kind,
            document_importance: importance,
            has_late_renewal_before: late,
            days_to_expiry: days,
        }
    }

    fn fitted() -> FeatureEncoder {
        FeatureEncoder::fit(&[
            row("Passport", "HIGH", "NO", 5.0),
            row("National ID", "MEDIUM", "YES", 120.0),
        ])
    }

    #[test]
    fn encodes_known_categories_and_numeric_passthrough() {
        let encoder = fitted();
        // Vocabularies are sorted: ["National ID", "Passport"], ["HIGH", "MEDIUM"], ["NO", "YES"].
        let encoded = encoder.encode(&row("Passport", "HIGH", "NO", 5.0));
        assert_eq!(encoded, vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 5.0]);
        assert_eq!(encoded.len(), encoder.width());
    }

    #[test]
    fn unseen_category_encodes_as_all_zero() {
        let encoder = fitted();
        let encoded = encoder.encode(&row("Residence Permit", "HIGH", "NO", 9.0));
        assert_eq!(&encoded[0..2], &[0.0, 0.0]);
        assert_eq!(encoded[6], 9.0);
    }

    #[test]
    fn batch_preserves_input_order() {
        let encoder = fitted();
        let rows = [
            row("National ID", "MEDIUM", "YES", 120.0),
            row("Passport", "HIGH", "NO", -2.0),
        ];
        let encoded = encoder.encode_batch(&rows);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0][6], 120.0);
        assert_eq!(encoded[1][6], -2.0);
    }
}
