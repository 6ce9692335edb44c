use std::fmt;

use crate::model_manager::ModelError;

/// Represents the different types of errors that can occur in the toxicity classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// The model or tokenizer could not be fetched or loaded
    LoadError(String),
    /// An input string could not be encoded by the tokenizer
    TokenizerError(String),
    /// The inference runtime failed or produced malformed outputs
    InferenceError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError(msg) => write!(f, "Load error: {}", msg),
            Self::TokenizerError(msg) => write!(f, "Tokenizer error: {}", msg),
            Self::InferenceError(msg) => write!(f, "Inference error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<ModelError> for ClassifierError {
    fn from(err: ModelError) -> Self {
        ClassifierError::LoadError(err.to_string())
    }
}
