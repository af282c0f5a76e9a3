use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Document categories fetched from upstream citizen-services endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Passport,
    NationalId,
    DrivingLicense,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Passport,
        DocumentKind::NationalId,
        DocumentKind::DrivingLicense,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Passport => "Passport",
            DocumentKind::NationalId => "National ID",
            DocumentKind::DrivingLicense => "Driving License",
        }
    }

    pub fn service_slug(&self) -> &'static str {
        match self {
            DocumentKind::Passport => "passport",
            DocumentKind::NationalId => "national-id",
            DocumentKind::DrivingLicense => "driving-license",
        }
    }
}

/// Urgency bucket derived from the expiry window, mirrored in the training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentImportance {
    High,
    Medium,
}

impl DocumentImportance {
    /// Documents inside a 30 day window count as high importance.
    pub fn from_days_to_expiry(days: i64) -> Self {
        if days <= 30 {
            DocumentImportance::High
        } else {
            DocumentImportance::Medium
        }
    }

    pub fn as_category(&self) -> &'static str {
        match self {
            DocumentImportance::High => "HIGH",
            DocumentImportance::Medium => "MEDIUM",
        }
    }
}

/// Whether the document is observed past its expiry date.
///
/// The upstream field name suggests renewal history, but the value has always
/// been derived from the current expiry delta; the training data encodes the
/// same rule, so the derivation is preserved as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LateRenewalFlag {
    Yes,
    No,
}

impl LateRenewalFlag {
    pub fn from_days_to_expiry(days: i64) -> Self {
        if days < 0 {
            LateRenewalFlag::Yes
        } else {
            LateRenewalFlag::No
        }
    }

    pub fn as_category(&self) -> &'static str {
        match self {
            LateRenewalFlag::Yes => "YES",
            LateRenewalFlag::No => "NO",
        }
    }
}

/// Fully derived per-document classifier input.
///
/// Built fresh on every request from the raw upstream payload and discarded
/// afterwards; the engine never persists these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_type: String,
    pub expiry_date: NaiveDate,
    pub days_to_expiry: i64,
    pub importance: DocumentImportance,
    pub late_renewal: LateRenewalFlag,
}

impl DocumentRecord {
    /// Derive the classifier features from an expiry date and the observation date.
    pub fn derive(document_type: impl Into<String>, expiry_date: NaiveDate, today: NaiveDate) -> Self {
        let days_to_expiry = (expiry_date - today).num_days();
        Self {
            document_type: document_type.into(),
            expiry_date,
            days_to_expiry,
            importance: DocumentImportance::from_days_to_expiry(days_to_expiry),
            late_renewal: LateRenewalFlag::from_days_to_expiry(days_to_expiry),
        }
    }
}

/// Untyped document payload as it arrives at the API boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

impl RawDocument {
    /// Validate required fields and derive a typed record.
    pub fn validate(&self, today: NaiveDate) -> Result<DocumentRecord, SchemaError> {
        let document_type = self
            .document_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SchemaError::MissingField {
                field: "document_type",
            })?;
        let raw_expiry = self
            .expiry_date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SchemaError::MissingField {
                field: "expiry_date",
            })?;

        let expiry_date = NaiveDate::parse_from_str(raw_expiry, "%Y-%m-%d").map_err(|_| {
            SchemaError::InvalidDate {
                value: raw_expiry.to_string(),
            }
        })?;

        Ok(DocumentRecord::derive(document_type, expiry_date, today))
    }
}

/// A document or training row is missing a required field or carries an
/// unparseable value. Document-level failures skip the single item; training
/// rows abort the load.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("required field '{field}' is missing or empty")]
    MissingField { field: &'static str },
    #[error("expiry date '{value}' is not a YYYY-MM-DD date")]
    InvalidDate { value: String },
}

/// Output unit of the engine, serialized with a discriminating `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Suggestion {
    Document {
        document_type: String,
        days_to_expiry: i64,
        message: String,
    },
    Location {
        location_type: String,
        message: String,
    },
}

/// The sole externally visible contract: a stable list shape regardless of
/// how many suggestion variants are present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<Suggestion>,
}
