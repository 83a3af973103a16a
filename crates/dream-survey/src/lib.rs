//! Survey configuration and trigger-based survey selection for the Dream widget.
//!
//! Surveys are loaded once from schema-validated YAML files into an immutable
//! [`SurveyCatalog`]. Each request evaluates trigger rules against the
//! client-reported [`ClientContext`] and draws at most one matching survey,
//! weighted by whole-percent probabilities, from an injected [`RandomSource`].

pub mod survey_config;
pub mod survey_loader;
pub mod survey_selector;

pub use survey_config::{ClientContext, SurveyConfig, SurveyConfigError, SurveyOption, TriggerRule};
pub use survey_loader::{
    load_survey_catalog, parse_survey_document, SurveyLoadOptions, SurveySchema,
};
pub use survey_selector::{
    allocate_survey_slots, find_survey, FixedFraction, RandomSource, SurveyCatalog,
    SURVEY_SLOT_COUNT,
};
