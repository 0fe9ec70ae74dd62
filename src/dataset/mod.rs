pub mod cache;
pub mod fetcher;
pub mod loader;
pub mod quality;
pub mod schema;

use serde::{Deserialize, Serialize};

pub use fetcher::{RawSheets, SheetPair, SheetProvider};
pub use loader::load_dataset;
pub use quality::{DataQualityWarning, QualityLog};
pub use schema::{ActivityEvent, Candidate, MissingDataError, Sheet, Stage};

/// Both input tables, parsed once and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub fingerprint: String,
    pub candidates: Vec<Candidate>,
    pub events: Vec<ActivityEvent>,
    pub quality: QualityLog,
}

impl Dataset {
    pub fn from_tables(candidates: Vec<Candidate>, events: Vec<ActivityEvent>) -> Self {
        Self {
            fingerprint: String::new(),
            candidates,
            events,
            quality: QualityLog::new(),
        }
    }
}
