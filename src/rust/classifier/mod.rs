mod error;
mod encoding;
mod inference;
mod labels;
mod prediction;
#[allow(clippy::module_inception)]
mod classifier;
pub mod builder;

pub use error::ClassifierError;
pub use encoding::{IntoBatch, SparseBatch, TokenEncoder};
pub use inference::{InferenceRuntime, InputNames, NamedOutput, OnnxRuntime};
pub use labels::{resolve_head, LabelSet, ToxicityLabel};
pub use prediction::{example_scores, is_positive, resolve_predictions, Prediction};
pub use classifier::ToxicityClassifier;
pub use builder::ClassifierBuilder;

use crate::runtime::RuntimeConfig;

/// Everything needed to turn downloaded model files into a classifier
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    /// ONNX Runtime session settings
    pub runtime: RuntimeConfig,
    /// Categories to report
    pub labels: LabelSet,
    /// Graph inputs fed with the sparse batch
    pub input_names: InputNames,
}

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file, if loaded from disk
    pub model_path: Option<String>,
    /// Path to the tokenizer file, if loaded from disk
    pub tokenizer_path: Option<String>,
    /// Categories the classifier reports
    pub labels: Vec<ToxicityLabel>,
    /// Output heads the model produces
    pub output_names: Vec<String>,
}
