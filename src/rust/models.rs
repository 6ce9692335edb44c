use std::env;

use crate::classifier::InputNames;

/// Environment variable naming the base URL the toxicity model is served from.
///
/// The directory must hold an ONNX export of the graph as `model.onnx` and a
/// matching Hugging Face `tokenizer.json`.
pub const MODEL_URL_ENV_VAR: &str = "TOXICITY_MODEL_URL";

/// Represents the available built-in models in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModel {
    /// Sparse-input toxicity model with one sigmoid head per category
    ///
    /// Characteristics:
    /// - Inputs: `indices` [tokens, 2] and `values` [tokens], both int32
    /// - Heads: `frac_neg`, `frac_very_neg`, `identity_hate`, `insult`,
    ///   `threat`, `sexual_explicit` and `obscene`, two scores per input
    ///
    /// No ONNX build of this model is published at a fixed location, so its
    /// files come from a caller-supplied base URL or an already populated cache.
    Toxicity,
}

/// Where a model's files live and how to check them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    pub tokenizer_url: String,
    /// SHA-256 of the model file, when pinned
    pub model_hash: Option<String>,
    /// SHA-256 of the tokenizer file, when pinned
    pub tokenizer_hash: Option<String>,
}

impl ModelInfo {
    /// Describes a model published as `model.onnx` and `tokenizer.json` under `base_url`.
    pub fn from_base_url(name: impl Into<String>, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            name: name.into(),
            model_url: format!("{}/model.onnx", base),
            tokenizer_url: format!("{}/tokenizer.json", base),
            model_hash: None,
            tokenizer_hash: None,
        }
    }

    pub fn with_hashes(mut self, model_hash: impl Into<String>, tokenizer_hash: impl Into<String>) -> Self {
        self.model_hash = Some(model_hash.into());
        self.tokenizer_hash = Some(tokenizer_hash.into());
        self
    }
}

/// Characteristics of a model including its inputs
#[derive(Debug, Clone)]
pub struct ModelCharacteristics {
    /// Names of the sparse graph inputs
    pub input_names: InputNames,
}

impl BuiltinModel {
    /// Get the characteristics of the model
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            Self::Toxicity => ModelCharacteristics {
                input_names: InputNames::default(),
            },
        }
    }

    /// Directory name the model is cached under
    pub fn name(&self) -> &'static str {
        match self {
            Self::Toxicity => "toxicity",
        }
    }

    /// Describes this model served from `base_url`.
    pub fn model_info(&self, base_url: &str) -> ModelInfo {
        ModelInfo::from_base_url(self.name(), base_url)
    }

    /// Reads the serving location from [`MODEL_URL_ENV_VAR`], if set and non-empty.
    pub fn model_info_from_env(&self) -> Option<ModelInfo> {
        env::var(MODEL_URL_ENV_VAR)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| self.model_info(url.trim()))
    }
}
