use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::inference::NamedOutput;
use super::labels::{LabelSet, ToxicityLabel};

/// Classification result for one input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    /// `true` where the text was classified positive for the category
    pub labels: BTreeMap<ToxicityLabel, bool>,
}

impl Prediction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn get(&self, label: ToxicityLabel) -> Option<bool> {
        self.labels.get(&label).copied()
    }

    /// Whether any reported category matched
    pub fn is_toxic(&self) -> bool {
        self.labels.values().any(|&matched| matched)
    }
}

/// Positive wins unless the negative score is strictly greater.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn is_positive(negative: f32, positive: f32) -> bool {
    !(negative > positive)
}

/// Returns the `(negative, positive)` scores of `example` from a flat head.
pub fn example_scores(data: &[f32], example: usize) -> Option<(f32, f32)> {
    let start = example.checked_mul(2)?;
    match data.get(start..start.checked_add(2)?) {
        Some(&[negative, positive]) => Some((negative, positive)),
        _ => None,
    }
}

/// Turns raw output heads into one [`Prediction`] per input.
///
/// Heads that `labels` does not recognize are skipped.
///
/// # Errors
/// - `InferenceError` if a recognized head does not hold exactly two scores per input
pub fn resolve_predictions(
    inputs: &[String],
    outputs: &[NamedOutput],
    labels: &LabelSet,
) -> Result<Vec<Prediction>, ClassifierError> {
    let mut predictions: Vec<Prediction> = inputs.iter().map(Prediction::new).collect();

    for output in outputs {
        let Some(label) = labels.resolve(&output.name) else {
            continue;
        };

        if output.data.len() != inputs.len() * 2 {
            return Err(ClassifierError::InferenceError(format!(
                "Output '{}' has {} scores, expected {} for {} inputs",
                output.name,
                output.data.len(),
                inputs.len() * 2,
                inputs.len()
            )));
        }

        for (example, prediction) in predictions.iter_mut().enumerate() {
            if let Some((negative, positive)) = example_scores(&output.data, example) {
                prediction.labels.insert(label, is_positive(negative, positive));
            }
        }
    }

    Ok(predictions)
}
