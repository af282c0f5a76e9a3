pub mod classifier;
pub mod composer;
pub mod dataset;
pub mod domain;
pub mod features;
pub mod forest;
pub mod geofence;
pub mod source;

pub use classifier::{ModelCache, NotifierModel, TrainError};
pub use composer::SuggestionComposer;
pub use domain::{DocumentRecord, RawDocument, Suggestion, SuggestionResponse};
pub use geofence::GeofenceTarget;
