use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use log::{info, warn, error};

use super::classifier::ToxicityClassifier;
use super::encoding::TokenEncoder;
use super::error::ClassifierError;
use super::inference::{InferenceRuntime, InputNames, OnnxRuntime};
use super::labels::LabelSet;
use super::ClassifierConfig;
use crate::{BuiltinModel, ModelManager, runtime::RuntimeConfig};

/// Loads a `tokenizer.json` file.
pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer, ClassifierError> {
    let tokenizer = Tokenizer::from_file(path)
        .map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::LoadError(format!("Failed to load tokenizer {:?}: {}", path, e))
        })?;
    info!("Tokenizer loaded successfully");
    Ok(tokenizer)
}

/// A builder for constructing a [`ToxicityClassifier`] with a fluent interface.
///
/// Model files are only read in [`build`](Self::build), so the order of the
/// `with_*` calls does not matter.
pub struct ClassifierBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    encoder: Option<Arc<dyn TokenEncoder>>,
    runtime: Option<Arc<dyn InferenceRuntime>>,
    labels: LabelSet,
    input_names: InputNames,
    runtime_config: RuntimeConfig,
}

impl fmt::Debug for ClassifierBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierBuilder")
            .field("model_path", &self.model_path)
            .field("tokenizer_path", &self.tokenizer_path)
            .field("has_encoder", &self.encoder.is_some())
            .field("has_runtime", &self.runtime.is_some())
            .field("labels", &self.labels)
            .field("input_names", &self.input_names)
            .field("runtime_config", &self.runtime_config)
            .finish()
    }
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use toxicity::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            encoder: None,
            runtime: None,
            labels: LabelSet::default(),
            input_names: InputNames::default(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Applies every setting in `config`
    pub fn with_config(self, config: ClassifierConfig) -> Self {
        self.with_runtime_config(config.runtime)
            .with_labels(config.labels)
            .with_input_names(config.input_names)
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets which toxicity categories are reported
    ///
    /// # Example
    /// ```
    /// use toxicity::{ClassifierBuilder, LabelSet};
    ///
    /// // Report severe toxicity too
    /// let builder = ClassifierBuilder::new().with_labels(LabelSet::all());
    /// ```
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    /// Overrides the graph input names fed with the sparse batch
    pub fn with_input_names(mut self, input_names: InputNames) -> Self {
        self.input_names = input_names;
        self
    }

    /// Uses a built-in model from the default model cache.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - A model is already set
    ///   - The model is not downloaded
    pub fn with_model(self, model: BuiltinModel) -> Result<Self, ClassifierError> {
        let manager = ModelManager::new_default()
            .map_err(|e| ClassifierError::LoadError(format!("Failed to create model manager: {}", e)))?;
        self.with_managed_model(&manager, model)
    }

    /// Uses a built-in model from the cache held by `manager`.
    pub fn with_managed_model(self, manager: &ModelManager, model: BuiltinModel) -> Result<Self, ClassifierError> {
        if !manager.is_model_downloaded(model.name()) {
            return Err(ClassifierError::LoadError(format!(
                "Model '{:?}' is not downloaded. Please download it first using ModelManager::download_model()",
                model
            )));
        }

        let input_names = model.characteristics().input_names;
        let (model_path, tokenizer_path) = manager.require_downloaded(model.name())?;
        self.with_input_names(input_names)
            .with_custom_model(model_path, tokenizer_path)
    }

    /// Sets a custom model and tokenizer path for the classifier
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - The model or tokenizer paths are empty
    ///   - A model is already set
    ///   - The files don't exist
    ///
    /// # Example
    /// ```
    /// use toxicity::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_custom_model("path/to/model.onnx", "path/to/tokenizer.json");
    /// assert!(builder.is_err());
    /// ```
    pub fn with_custom_model(
        mut self,
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if model_path.as_os_str().is_empty() || tokenizer_path.as_os_str().is_empty() {
            return Err(ClassifierError::ValidationError("Model and tokenizer paths cannot be empty".to_string()));
        }
        self.ensure_model_unset()?;

        if !model_path.exists() {
            return Err(ClassifierError::LoadError(format!("Model file not found: {:?}", model_path)));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::LoadError(format!("Tokenizer file not found: {:?}", tokenizer_path)));
        }

        self.model_path = Some(model_path.to_path_buf());
        self.tokenizer_path = Some(tokenizer_path.to_path_buf());
        Ok(self)
    }

    /// Uses an already constructed tokenizer
    pub fn with_encoder(mut self, encoder: impl TokenEncoder + 'static) -> Self {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    /// Uses an already constructed inference runtime
    pub fn with_runtime(mut self, runtime: impl InferenceRuntime + 'static) -> Self {
        self.runtime = Some(Arc::new(runtime));
        self
    }

    /// Records where injected collaborators were loaded from.
    pub(crate) fn with_source_paths(mut self, model_path: PathBuf, tokenizer_path: PathBuf) -> Self {
        self.model_path = Some(model_path);
        self.tokenizer_path = Some(tokenizer_path);
        self
    }

    fn ensure_model_unset(&self) -> Result<(), ClassifierError> {
        if self.model_path.is_some() || self.tokenizer_path.is_some() || self.runtime.is_some() {
            return Err(ClassifierError::ValidationError("Model and tokenizer already set".to_string()));
        }
        Ok(())
    }

    /// Builds and returns the final classifier
    ///
    /// # Returns
    /// * `Result<ToxicityClassifier, ClassifierError>` - The classifier if successful, or an error if:
    ///   - Neither model paths nor collaborators were provided
    ///   - The model or tokenizer failed to load
    ///   - No label is enabled
    ///   - None of the model's output heads maps to an enabled label
    pub fn build(mut self) -> Result<ToxicityClassifier, ClassifierError> {
        if self.labels.is_empty() {
            return Err(ClassifierError::ValidationError("At least one label must be enabled".into()));
        }

        let encoder: Arc<dyn TokenEncoder> = match self.encoder.take() {
            Some(encoder) => encoder,
            None => {
                let path = self.tokenizer_path.as_deref()
                    .ok_or_else(|| ClassifierError::ValidationError("No tokenizer configured".into()))?;
                Arc::new(load_tokenizer(path)?)
            }
        };

        let runtime: Arc<dyn InferenceRuntime> = match self.runtime.take() {
            Some(runtime) => runtime,
            None => {
                let path = self.model_path.as_deref()
                    .ok_or_else(|| ClassifierError::ValidationError("No model configured".into()))?;
                let runtime = OnnxRuntime::from_file(path, &self.runtime_config, self.input_names.clone())?;
                info!("Model structure validated successfully");
                Arc::new(runtime)
            }
        };

        Self::validate_heads(runtime.as_ref(), &self.labels)?;

        Ok(ToxicityClassifier {
            model_path: self.model_path,
            tokenizer_path: self.tokenizer_path,
            encoder,
            runtime,
            labels: self.labels,
        })
    }

    /// Checks that the runtime reports on at least one enabled label
    fn validate_heads(runtime: &dyn InferenceRuntime, labels: &LabelSet) -> Result<(), ClassifierError> {
        let resolved: Vec<_> = runtime.output_names().iter()
            .filter_map(|name| labels.resolve(name))
            .collect();

        if resolved.is_empty() {
            return Err(ClassifierError::LoadError(format!(
                "None of the model outputs {:?} maps to an enabled label",
                runtime.output_names()
            )));
        }

        for label in labels.labels() {
            if !resolved.contains(&label) {
                warn!("Model has no output head for enabled label {}", label);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NamedOutput, SparseBatch, ToxicityLabel};

    struct NoopEncoder;

    impl TokenEncoder for NoopEncoder {
        fn encode(&self, _text: &str) -> Result<Vec<u32>, ClassifierError> {
            Ok(vec![1])
        }
    }

    struct HeadsOnly(Vec<&'static str>);

    impl InferenceRuntime for HeadsOnly {
        fn execute(&self, _batch: &SparseBatch) -> Result<Vec<NamedOutput>, ClassifierError> {
            Ok(Vec::new())
        }

        fn output_names(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_build_with_collaborators() {
        let classifier = ClassifierBuilder::new()
            .with_encoder(NoopEncoder)
            .with_runtime(HeadsOnly(vec!["insult/Sigmoid:0", "frac_very_neg/Sigmoid:0"]))
            .build()
            .unwrap();
        assert_eq!(classifier.labels().len(), 5);
        assert!(classifier.info().model_path.is_none());
    }

    #[test]
    fn test_build_without_model() {
        let result = ClassifierBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_build_rejects_unusable_heads() {
        let result = ClassifierBuilder::new()
            .with_encoder(NoopEncoder)
            .with_runtime(HeadsOnly(vec!["frac_very_neg/Sigmoid:0", "obscene/Sigmoid:0"]))
            .build();
        assert!(matches!(result, Err(ClassifierError::LoadError(_))));
    }

    #[test]
    fn test_severe_toxicity_head_usable_when_enabled() {
        let result = ClassifierBuilder::new()
            .with_labels(LabelSet::from_labels([ToxicityLabel::SevereToxicity]))
            .with_encoder(NoopEncoder)
            .with_runtime(HeadsOnly(vec!["frac_very_neg/Sigmoid:0"]))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_label_set() {
        let result = ClassifierBuilder::new()
            .with_labels(LabelSet::from_labels([]))
            .with_encoder(NoopEncoder)
            .with_runtime(HeadsOnly(vec!["insult/Sigmoid:0"]))
            .build();
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_custom_model_validation() {
        assert!(matches!(
            ClassifierBuilder::new().with_custom_model("", "tokenizer.json"),
            Err(ClassifierError::ValidationError(_))
        ));
        assert!(matches!(
            ClassifierBuilder::new().with_custom_model("/nonexistent/model.onnx", "/nonexistent/tokenizer.json"),
            Err(ClassifierError::LoadError(_))
        ));
    }

    #[test]
    fn test_model_cannot_be_set_twice() {
        let result = ClassifierBuilder::new()
            .with_runtime(HeadsOnly(vec!["insult/Sigmoid:0"]))
            .with_custom_model("model.onnx", "tokenizer.json");
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = load_tokenizer(Path::new("/nonexistent/tokenizer.json"));
        assert!(matches!(result, Err(ClassifierError::LoadError(_))));
    }
}
