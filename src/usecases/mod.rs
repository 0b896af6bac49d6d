//! Orchestration between repositories, the rule engine and the analyzer.

pub mod sync_metadata;
pub mod validate_options;

pub use sync_metadata::SyncMetadata;
pub use validate_options::{FixSummary, ValidateOptionSets, ValidateOptionsRequest, ValidationResponse};
