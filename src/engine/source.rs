use chrono::NaiveDate;
use tracing::warn;

use super::domain::{DocumentKind, DocumentRecord};

/// Seam to the upstream services that hold the raw document records.
///
/// Implementations own their retries, auth, and timeouts; the engine only
/// sees an optional ISO expiry date per document kind. Upstream failures stay
/// behind this boundary as `SourceError` and surface to the engine as
/// "document absent".
pub trait DocumentSource: Send + Sync {
    fn fetch_expiry(&self, kind: DocumentKind, user_id: u64) -> Result<Option<String>, SourceError>;
}

/// Upstream fetch failed. Never crosses into the engine as an error; the
/// affected document simply contributes no suggestion.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("upstream fetch failed: {0}")]
    Upstream(String),
}

/// Fetch every known document kind for a user and derive classifier inputs.
/// Absent or malformed upstream responses are skipped, not propagated.
pub fn collect_documents(
    source: &dyn DocumentSource,
    user_id: u64,
    today: NaiveDate,
) -> Vec<DocumentRecord> {
    let mut documents = Vec::new();

    for kind in DocumentKind::ALL {
        let raw = match source.fetch_expiry(kind, user_id) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(err) => {
                warn!(%err, document = kind.label(), user_id, "document fetch failed, skipping");
                continue;
            }
        };

        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(expiry) => documents.push(DocumentRecord::derive(kind.label(), expiry, today)),
            Err(_) => {
                warn!(
                    document = kind.label(),
                    user_id,
                    value = raw.as_str(),
                    "malformed expiry date, skipping document"
                );
            }
        }
    }

    documents
}
