//! Domain types, configuration and the pure parts of the pipeline

pub mod analytics;
pub mod cache;
pub mod category;
pub mod config;
pub mod error;
pub mod log;
pub mod record;
pub mod validation;
pub mod weights;

// Re-export main types for cleaner imports
pub use analytics::{NamedPeriod, RateOfChangeCalculator, RateOfChangeResult};
pub use error::{AcquisitionError, Result};
pub use record::{IndexObservation, Source, WeightRecord};
pub use weights::WeightsProvider;
