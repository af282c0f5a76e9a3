use std::sync::Arc;

use tracing::warn;

use super::classifier::{ModelCache, TrainError};
use super::domain::{DocumentRecord, Suggestion, SuggestionResponse};
use super::geofence::{GeoPoint, GeofenceTarget};

/// Merges classifier decisions with the geofence rule into one ordered list.
///
/// Pure given its inputs plus the cached classifier state: document
/// suggestions come first in input order, then at most one location
/// suggestion. Performs no I/O of its own.
pub struct SuggestionComposer {
    cache: Arc<ModelCache>,
    target: GeofenceTarget,
}

impl SuggestionComposer {
    pub fn new(cache: Arc<ModelCache>, target: GeofenceTarget) -> Self {
        Self { cache, target }
    }

    /// Build the suggestion list. The only propagated failure is an
    /// unproducible model; a bad user position skips the location suggestion
    /// and nothing else.
    pub fn build(
        &self,
        documents: &[DocumentRecord],
        user_position: Option<(f64, f64)>,
    ) -> Result<SuggestionResponse, TrainError> {
        let mut suggestions = Vec::new();

        if !documents.is_empty() {
            let model = self.cache.model()?;
            for (record, notify) in documents.iter().zip(model.predict(documents)) {
                if notify {
                    suggestions.push(Suggestion::Document {
                        document_type: record.document_type.clone(),
                        days_to_expiry: record.days_to_expiry,
                        message: format!(
                            "{} expires in {} days",
                            record.document_type, record.days_to_expiry
                        ),
                    });
                }
            }
        }

        if let Some((latitude, longitude)) = user_position {
            match self.evaluate_geofence(latitude, longitude) {
                Ok(true) => suggestions.push(Suggestion::Location {
                    location_type: self.target.location_type.clone(),
                    message: self.target.message.clone(),
                }),
                Ok(false) => {}
                Err(err) => {
                    warn!(%err, latitude, longitude, "skipping location suggestion");
                }
            }
        }

        Ok(SuggestionResponse { suggestions })
    }

    fn evaluate_geofence(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, super::geofence::GeofenceError> {
        let point = GeoPoint::new(latitude, longitude)?;
        self.target.contains(point)
    }
}
