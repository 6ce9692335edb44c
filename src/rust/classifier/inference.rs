use std::collections::HashMap;
use std::path::Path;

use log::debug;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::encoding::SparseBatch;
use super::error::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// One output head of the model with its flat score data.
///
/// For a batch of `N` inputs `data` holds `2 * N` values: a
/// `(negative, positive)` pair per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedOutput {
    pub name: String,
    pub data: Vec<f32>,
}

impl NamedOutput {
    pub fn new(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Names of the graph inputs fed with the sparse batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputNames {
    pub indices: String,
    pub values: String,
}

impl Default for InputNames {
    fn default() -> Self {
        Self {
            indices: "indices".to_string(),
            values: "values".to_string(),
        }
    }
}

/// Executes the classification graph on a sparse batch.
pub trait InferenceRuntime: Send + Sync {
    /// Runs the graph and returns every output head, in graph order.
    ///
    /// # Errors
    /// - `InferenceError` if execution or output extraction fails
    fn execute(&self, batch: &SparseBatch) -> Result<Vec<NamedOutput>, ClassifierError>;

    /// Names of the output heads this runtime produces
    fn output_names(&self) -> Vec<String>;
}

/// [`InferenceRuntime`] backed by an ONNX Runtime session.
#[derive(Debug)]
pub struct OnnxRuntime {
    session: Session,
    input_names: InputNames,
}

impl OnnxRuntime {
    /// Wraps an existing session after checking it has the expected inputs.
    pub fn new(session: Session, input_names: InputNames) -> Result<Self, ClassifierError> {
        Self::validate_model(&session, &input_names)?;
        Ok(Self {
            session,
            input_names,
        })
    }

    /// Loads a model file into a new session.
    pub fn from_file<P: AsRef<Path>>(
        model_path: P,
        runtime_config: &RuntimeConfig,
        input_names: InputNames,
    ) -> Result<Self, ClassifierError> {
        let session = create_session_builder(runtime_config)?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| ClassifierError::LoadError(format!(
                "Failed to load model {:?}: {}", model_path.as_ref(), e
            )))?;
        Self::new(session, input_names)
    }

    pub fn input_names(&self) -> &InputNames {
        &self.input_names
    }

    /// Validates that the model has the expected input/output structure
    ///
    /// # Returns
    /// * `Result<(), ClassifierError>` - Ok if validation passes, or an error if:
    ///   - The model lacks one of the configured sparse inputs
    ///   - The model doesn't have any output tensors
    fn validate_model(session: &Session, input_names: &InputNames) -> Result<(), ClassifierError> {
        for expected in [&input_names.indices, &input_names.values] {
            if !session.inputs.iter().any(|input| &input.name == expected) {
                return Err(ClassifierError::LoadError(format!(
                    "Model has no input named '{}' (found: {:?})",
                    expected,
                    session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>()
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::LoadError(
                "Model must have at least 1 output head".to_string()
            ));
        }

        Ok(())
    }
}

impl InferenceRuntime for OnnxRuntime {
    fn execute(&self, batch: &SparseBatch) -> Result<Vec<NamedOutput>, ClassifierError> {
        debug!(
            "Running model on {} examples ({} tokens)",
            batch.batch_size,
            batch.total_tokens()
        );

        // Input tensors live only inside this block and are released once
        // the run returns, whichever way it went.
        let outputs = {
            let indices = Tensor::from_array(batch.indices.clone())
                .map_err(|e| ClassifierError::InferenceError(format!("Failed to create indices tensor: {}", e)))?;
            let values = Tensor::from_array(batch.values.clone())
                .map_err(|e| ClassifierError::InferenceError(format!("Failed to create values tensor: {}", e)))?;

            let mut input_tensors = HashMap::new();
            input_tensors.insert(self.input_names.indices.as_str(), indices);
            input_tensors.insert(self.input_names.values.as_str(), values);

            let result = self.session.run(input_tensors);
            debug!("Released input tensors");
            result.map_err(|e| ClassifierError::InferenceError(format!("Failed to run model: {}", e)))?
        };

        self.session.outputs.iter()
            .map(|output| {
                let name = output.name.as_str();
                let tensor = outputs[name].try_extract_tensor::<f32>()
                    .map_err(|e| ClassifierError::InferenceError(
                        format!("Failed to extract output '{}': {}", name, e)
                    ))?;
                Ok(NamedOutput::new(name, tensor.iter().copied().collect()))
            })
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.session.outputs.iter().map(|o| o.name.clone()).collect()
    }
}
