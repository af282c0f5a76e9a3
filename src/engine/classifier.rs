use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use super::dataset::{Dataset, DatasetError};
use super::domain::DocumentRecord;
use super::features::{FeatureEncoder, FeatureRow};
use super::forest::{ForestConfig, RandomForest};

/// Fraction of the dataset held out for the diagnostic accuracy check.
const HOLDOUT_FRACTION: f64 = 0.2;

/// Immutable fitted transformer + model pair. Once constructed it never
/// mutates; retraining builds a replacement.
#[derive(Debug, Clone)]
pub struct NotifierModel {
    encoder: FeatureEncoder,
    forest: RandomForest,
    holdout_accuracy: Option<f64>,
}

impl NotifierModel {
    /// Fit the encoder and forest on a stratified 80% partition and score the
    /// remaining 20% as a diagnostic. The accuracy is logged, never a gate.
    pub fn train(dataset: &Dataset, config: &ForestConfig) -> Self {
        let (train, holdout) = dataset.stratified_split(HOLDOUT_FRACTION, config.seed);

        let rows: Vec<FeatureRow<'_>> = train
            .records()
            .iter()
            .map(|record| record.feature_row())
            .collect();
        let labels: Vec<u8> = train
            .records()
            .iter()
            .map(|record| record.notify_now)
            .collect();

        let encoder = FeatureEncoder::fit(&rows);
        let encoded = encoder.encode_batch(&rows);
        let forest = RandomForest::fit(&encoded, &labels, config);

        let holdout_accuracy = if holdout.is_empty() {
            None
        } else {
            let hits = holdout
                .records()
                .iter()
                .filter(|record| {
                    forest.predict(&encoder.encode(&record.feature_row())) == record.notify_now
                })
                .count();
            Some(hits as f64 / holdout.len() as f64)
        };

        if let Some(accuracy) = holdout_accuracy {
            info!(
                accuracy,
                trees = config.trees,
                rows = dataset.len(),
                "notification model trained"
            );
        } else {
            info!(
                trees = config.trees,
                rows = dataset.len(),
                "notification model trained without a holdout partition"
            );
        }

        Self {
            encoder,
            forest,
            holdout_accuracy,
        }
    }

    /// One notify-now decision per input document, order preserving.
    pub fn predict(&self, documents: &[DocumentRecord]) -> Vec<bool> {
        documents
            .iter()
            .map(|record| {
                let encoded = self.encoder.encode(&FeatureRow::from(record));
                self.forest.predict(&encoded) == 1
            })
            .collect()
    }

    pub fn holdout_accuracy(&self) -> Option<f64> {
        self.holdout_accuracy
    }
}

/// Training failed before a model could be produced.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Owned, lazily initialized model slot shared across request handlers.
///
/// First use trains from the configured dataset under a single-flight guard:
/// concurrent cold callers trigger exactly one training run and the rest wait
/// on the lock. After that, readers take the fast path and clone the Arc.
/// Retraining swaps the slot atomically, so in-flight predictions see either
/// the old model or the new one in full; predictions arriving during a
/// retrain are served the previous model.
#[derive(Debug)]
pub struct ModelCache {
    slot: RwLock<Option<Arc<NotifierModel>>>,
    train_lock: Mutex<()>,
    dataset_path: PathBuf,
    forest: ForestConfig,
}

impl ModelCache {
    pub fn new(dataset_path: impl Into<PathBuf>, forest: ForestConfig) -> Self {
        Self {
            slot: RwLock::new(None),
            train_lock: Mutex::new(()),
            dataset_path: dataset_path.into(),
            forest,
        }
    }

    /// Return the cached model, training it on first use.
    pub fn model(&self) -> Result<Arc<NotifierModel>, TrainError> {
        if let Some(model) = self.cached() {
            return Ok(model);
        }

        let _guard = self.train_lock.lock().expect("train mutex poisoned");
        // Another caller may have finished training while we waited.
        if let Some(model) = self.cached() {
            return Ok(model);
        }

        let model = self.train()?;
        *self.slot.write().expect("model slot poisoned") = Some(model.clone());
        Ok(model)
    }

    /// Train a replacement model and swap it in. Readers keep the previous
    /// model until the swap completes.
    pub fn retrain(&self) -> Result<Arc<NotifierModel>, TrainError> {
        let _guard = self.train_lock.lock().expect("train mutex poisoned");
        let model = self.train()?;
        *self.slot.write().expect("model slot poisoned") = Some(model.clone());
        Ok(model)
    }

    pub fn cached(&self) -> Option<Arc<NotifierModel>> {
        self.slot.read().expect("model slot poisoned").clone()
    }

    fn train(&self) -> Result<Arc<NotifierModel>, TrainError> {
        let dataset = Dataset::from_path(&self.dataset_path)?;
        Ok(Arc::new(NotifierModel::train(&dataset, &self.forest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::domain::DocumentRecord;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn training_csv() -> String {
        let mut csv = String::from(
            "document_type,document_importance,has_late_renewal_before,days_to_expiry,notify_now\n",
        );
        for days in [-20i64, -7, -1, 0, 2, 5, 9, 12, 16, 20, 24, 27, 29, 30] {
            let importance = if days <= 30 { "HIGH" } else { "MEDIUM" };
            let late = if days < 0 { "YES" } else { "NO" };
            csv.push_str(&format!("Passport,{importance},{late},{days},1\n"));
            csv.push_str(&format!("National ID,{importance},{late},{days},1\n"));
        }
        for days in [40i64, 55, 75, 100, 140, 190, 250, 320, 365] {
            csv.push_str(&format!("Passport,MEDIUM,NO,{days},0\n"));
            csv.push_str(&format!("Driving License,MEDIUM,NO,{days},0\n"));
        }
        csv
    }

    fn trained() -> NotifierModel {
        let dataset = Dataset::from_reader(Cursor::new(training_csv())).expect("dataset parses");
        let config = ForestConfig {
            trees: 30,
            ..ForestConfig::default()
        };
        NotifierModel::train(&dataset, &config)
    }

    fn document(days: i64) -> DocumentRecord {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let expiry = today + chrono::Duration::days(days);
        DocumentRecord::derive("Passport", expiry, today)
    }

    #[test]
    fn predicts_notify_for_imminent_expiry() {
        let model = trained();
        let decisions = model.predict(&[document(5), document(250)]);
        assert_eq!(decisions, vec![true, false]);
    }

    #[test]
    fn holdout_accuracy_is_reported() {
        let model = trained();
        let accuracy = model.holdout_accuracy().expect("holdout partition scored");
        assert!(accuracy >= 0.75, "accuracy {accuracy} unexpectedly low");
    }

    #[test]
    fn prediction_is_idempotent_for_a_cached_model() {
        let model = trained();
        let batch = [document(-3), document(10), document(120)];
        assert_eq!(model.predict(&batch), model.predict(&batch));
    }

    #[test]
    fn cache_trains_once_under_concurrent_first_use() {
        let path = std::env::temp_dir().join(format!(
            "notify-train-{}-{:?}.csv",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&path, training_csv()).expect("fixture written");

        let cache = Arc::new(ModelCache::new(
            &path,
            ForestConfig {
                trees: 10,
                ..ForestConfig::default()
            },
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.model().expect("model trains"))
            })
            .collect();
        let models: Vec<Arc<NotifierModel>> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread joins"))
            .collect();

        for model in &models[1..] {
            assert!(Arc::ptr_eq(&models[0], model), "single-flight violated");
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn retrain_swaps_the_cached_model() {
        let path = std::env::temp_dir().join(format!(
            "notify-retrain-{}-{:?}.csv",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&path, training_csv()).expect("fixture written");

        let cache = ModelCache::new(
            &path,
            ForestConfig {
                trees: 10,
                ..ForestConfig::default()
            },
        );
        let first = cache.model().expect("initial train");
        let second = cache.retrain().expect("retrain");

        assert!(!Arc::ptr_eq(&first, &second));
        let cached = cache.cached().expect("model cached");
        assert!(Arc::ptr_eq(&second, &cached));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_dataset_is_fatal_at_train_time() {
        let cache = ModelCache::new("data/nope.csv", ForestConfig::default());
        let err = cache.model().expect_err("dataset missing");
        assert!(matches!(
            err,
            TrainError::Dataset(DatasetError::Unavailable { .. })
        ));
    }
}
