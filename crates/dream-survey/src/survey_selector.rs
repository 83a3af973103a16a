use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::Rng;

use crate::survey_config::{ClientContext, SurveyConfig, SurveyConfigError};

/// Number of whole-percent slots the selection distribution is split into.
pub const SURVEY_SLOT_COUNT: usize = 100;

/// Source of uniform draws for survey selection.
pub trait RandomSource {
    /// Returns a value in `[0, 1)`.
    fn next_fraction(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_fraction(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Always returns the same fraction. Used to pin selections in tests and replays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFraction(pub f64);

impl RandomSource for FixedFraction {
    fn next_fraction(&mut self) -> f64 {
        self.0
    }
}

/// Allocates whole-percent slots to each probability, in order.
///
/// Probabilities are rescaled by their sum when it exceeds 1; otherwise the
/// unallocated remainder means "no survey".
pub fn allocate_survey_slots(probabilities: &[f64]) -> Vec<usize> {
    let total: f64 = probabilities.iter().sum();
    probabilities
        .iter()
        .map(|probability| {
            let fraction = if total > 1.0 {
                probability / total
            } else {
                *probability
            };
            ((fraction * SURVEY_SLOT_COUNT as f64).floor().max(0.0) as usize)
                .min(SURVEY_SLOT_COUNT)
        })
        .collect()
}

fn draw_slot<R: RandomSource + ?Sized>(rng: &mut R) -> usize {
    let fraction = rng.next_fraction();
    if !fraction.is_finite() {
        return 0;
    }
    ((fraction.clamp(0.0, 1.0) * SURVEY_SLOT_COUNT as f64).floor() as usize)
        .min(SURVEY_SLOT_COUNT - 1)
}

/// Picks at most one survey whose trigger matches `context`, weighted by probability.
pub fn find_survey<'a, R: RandomSource + ?Sized>(
    surveys: &'a [SurveyConfig],
    context: &ClientContext,
    rng: &mut R,
) -> Option<&'a SurveyConfig> {
    let matching: Vec<&SurveyConfig> = surveys
        .iter()
        .filter(|survey| survey.trigger.matches(context))
        .collect();
    if matching.is_empty() {
        return None;
    }

    let probabilities: Vec<f64> = matching
        .iter()
        .map(|survey| survey.trigger.with_probability)
        .collect();
    let slots = allocate_survey_slots(&probabilities);
    let drawn = draw_slot(rng);

    let mut upper_bound = 0usize;
    for (survey, slot_count) in matching.into_iter().zip(slots) {
        upper_bound += slot_count;
        if drawn < upper_bound {
            tracing::debug!(survey_id = %survey.id, slot = drawn, "survey selected");
            return Some(survey);
        }
    }
    tracing::debug!(slot = drawn, "no survey selected");
    None
}

/// Validated, immutable set of surveys consulted for every selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyCatalog {
    surveys: Vec<SurveyConfig>,
}

impl SurveyCatalog {
    /// Validates trigger probabilities and id uniqueness.
    pub fn new(surveys: Vec<SurveyConfig>) -> Result<Self, SurveyConfigError> {
        let mut seen = BTreeSet::new();
        for survey in &surveys {
            survey.trigger.validate(&survey.id)?;
            if !seen.insert(survey.id.as_str()) {
                return Err(SurveyConfigError::DuplicateId(survey.id.clone()));
            }
        }
        Ok(Self { surveys })
    }

    pub fn surveys(&self) -> &[SurveyConfig] {
        &self.surveys
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SurveyConfig> {
        self.surveys.iter().find(|survey| survey.id == id)
    }

    pub fn find<R: RandomSource + ?Sized>(
        &self,
        context: &ClientContext,
        rng: &mut R,
    ) -> Option<&SurveyConfig> {
        find_survey(&self.surveys, context, rng)
    }
}
