use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating survey configurations.
#[derive(Debug, Error)]
pub enum SurveyConfigError {
    #[error("survey '{id}' has with_probability {value}; expected a value in (0, 1]")]
    InvalidProbability { id: String, value: f64 },
    #[error("duplicate survey id '{0}'")]
    DuplicateId(String),
    #[error("survey '{id}' failed schema validation: {message}")]
    Schema { id: String, message: String },
    #[error("bundled survey schema is invalid: {0}")]
    InvalidSchema(String),
    #[error("survey '{id}' is not valid YAML: {source}")]
    Yaml {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("survey '{id}' could not be decoded: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read survey config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One answer a survey offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Conditions under which a survey may be shown. Absent conditions always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    /// Show when this user visits for the first time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_time_user: Option<bool>,
    /// Show once the user has sent at least this many messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_after_n_messages: Option<u32>,
    /// Declared by configs; session counters are not tracked yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_after_n_sessions: Option<u32>,
    /// Show only at the beginning of a new session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_session_start: Option<bool>,
    /// Show if the last reply came from this skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_skill_activated: Option<String>,
    /// Chance of showing once every other condition holds.
    pub with_probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_n_times_per_session: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_n_times_per_user: Option<u32>,
}

impl TriggerRule {
    /// Rule with only a probability and no conditions.
    pub fn with_probability(with_probability: f64) -> Self {
        Self {
            first_time_user: None,
            only_after_n_messages: None,
            only_after_n_sessions: None,
            after_session_start: None,
            when_skill_activated: None,
            with_probability,
            max_n_times_per_session: None,
            max_n_times_per_user: None,
        }
    }

    /// Returns true when every present condition holds for `context`.
    ///
    /// `only_after_n_sessions` and the `max_n_times_*` limits need per-user
    /// counters that clients do not report, so they are not evaluated.
    pub fn matches(&self, context: &ClientContext) -> bool {
        self.first_time_user
            .map_or(true, |expected| expected == context.first_time_user)
            && self
                .only_after_n_messages
                .map_or(true, |minimum| context.messages_so_far >= minimum)
            && self
                .after_session_start
                .map_or(true, |expected| expected == context.just_started_session)
            && self
                .when_skill_activated
                .as_deref()
                .map_or(true, |skill| skill == context.active_skill)
    }

    /// Rejects probabilities outside `(0, 1]`.
    pub fn validate(&self, survey_id: &str) -> Result<(), SurveyConfigError> {
        let value = self.with_probability;
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(SurveyConfigError::InvalidProbability {
                id: survey_id.to_string(),
                value,
            });
        }
        Ok(())
    }
}

/// A survey the widget can offer, keyed by the stem of its config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: String,
    pub options: BTreeMap<String, SurveyOption>,
    pub trigger: TriggerRule,
}

/// Client-reported facts used to evaluate trigger rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    pub first_time_user: bool,
    pub messages_so_far: u32,
    pub just_started_session: bool,
    pub active_skill: String,
}
