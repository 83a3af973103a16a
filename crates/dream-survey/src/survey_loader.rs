use std::path::{Path, PathBuf};

use jsonschema::{validator_for, Validator};
use serde_json::Value;

use crate::survey_config::{SurveyConfig, SurveyConfigError};
use crate::survey_selector::SurveyCatalog;

const SURVEY_CONFIG_SCHEMA: &str = include_str!("../schema/survey_config.schema.json");
const SURVEY_FILE_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Controls how invalid survey files are handled at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurveyLoadOptions {
    /// Fail the whole load on the first invalid file instead of skipping it.
    pub strict: bool,
}

/// Compiled JSON schema for survey config documents.
pub struct SurveySchema {
    validator: Validator,
}

impl SurveySchema {
    /// Compiles the schema bundled with this crate.
    pub fn bundled() -> Result<Self, SurveyConfigError> {
        let schema: Value = serde_json::from_str(SURVEY_CONFIG_SCHEMA)
            .map_err(|error| SurveyConfigError::InvalidSchema(error.to_string()))?;
        let validator = validator_for(&schema)
            .map_err(|error| SurveyConfigError::InvalidSchema(error.to_string()))?;
        Ok(Self { validator })
    }

    /// Validates one parsed document, reporting every violation.
    pub fn validate(&self, id: &str, document: &Value) -> Result<(), SurveyConfigError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|error| error.to_string())
            .collect();
        if violations.is_empty() {
            return Ok(());
        }
        Err(SurveyConfigError::Schema {
            id: id.to_string(),
            message: violations.join("; "),
        })
    }
}

/// Parses, schema-validates, and decodes one YAML survey document.
pub fn parse_survey_document(
    schema: &SurveySchema,
    id: &str,
    raw: &str,
) -> Result<SurveyConfig, SurveyConfigError> {
    let document: Value = serde_yaml::from_str(raw).map_err(|source| SurveyConfigError::Yaml {
        id: id.to_string(),
        source,
    })?;
    schema.validate(id, &document)?;
    let mut config: SurveyConfig =
        serde_json::from_value(document).map_err(|source| SurveyConfigError::Decode {
            id: id.to_string(),
            source,
        })?;
    config.id = id.to_string();
    config.trigger.validate(id)?;
    Ok(config)
}

/// Loads every `*.yml`/`*.yaml` survey in `dir`, ordered by file name.
///
/// The survey id is the file name without its extension.
pub fn load_survey_catalog(
    dir: &Path,
    options: SurveyLoadOptions,
) -> Result<SurveyCatalog, SurveyConfigError> {
    let schema = SurveySchema::bundled()?;
    let mut surveys = Vec::new();
    for path in survey_files(dir)? {
        let id = survey_id_for_path(&path);
        match load_survey_file(&schema, &path, &id) {
            Ok(config) => surveys.push(config),
            Err(error) if !options.strict => {
                tracing::error!(
                    survey_id = %id,
                    path = %path.display(),
                    %error,
                    "skipping invalid survey config"
                );
            }
            Err(error) => return Err(error),
        }
    }
    let catalog = SurveyCatalog::new(surveys)?;
    tracing::info!(
        dir = %dir.display(),
        survey_count = catalog.len(),
        "loaded survey catalog"
    );
    Ok(catalog)
}

fn load_survey_file(
    schema: &SurveySchema,
    path: &Path,
    id: &str,
) -> Result<SurveyConfig, SurveyConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SurveyConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_survey_document(schema, id, &raw)
}

fn survey_files(dir: &Path) -> Result<Vec<PathBuf>, SurveyConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SurveyConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SurveyConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_survey = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| SURVEY_FILE_EXTENSIONS.contains(&extension));
        if is_survey && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn survey_id_for_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
