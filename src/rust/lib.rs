//! Batched text toxicity classification on top of ONNX Runtime.
//!
//! Texts are tokenized, laid out as a sparse `indices`/`values` pair and run
//! through a model with one sigmoid head per toxicity category. Each head is
//! turned back into a yes/no answer per input.
//!
//! # Basic Usage
//!
//! No ONNX build of the model is published at a fixed location. `load()`
//! fetches `model.onnx` and `tokenizer.json` from the base URL in
//! `TOXICITY_MODEL_URL` into the cache, or uses files already cached there.
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use toxicity::{ToxicityClassifier, ToxicityLabel};
//!
//! let classifier = ToxicityClassifier::load().await?;
//! let predictions = classifier
//!     .classify(vec!["You are quite astonishingly stupid.", "Thanks for the review!"])
//!     .await?;
//!
//! for prediction in predictions {
//!     println!("{} -> toxic: {:?}", prediction.text, prediction.get(ToxicityLabel::Toxicity));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Label Set
//!
//! Severe toxicity is not reported unless asked for:
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use toxicity::{BuiltinModel, ClassifierConfig, LabelSet, ModelManager, ToxicityClassifier};
//!
//! let manager = ModelManager::new_default()?;
//! let info = BuiltinModel::Toxicity.model_info("https://models.example.org/toxicity/");
//! let config = ClassifierConfig {
//!     labels: LabelSet::all(),
//!     ..ClassifierConfig::default()
//! };
//! let classifier = ToxicityClassifier::load_with(&manager, &info, config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The classifier is `Send + Sync`; share it with `Arc` and call `classify`
//! from as many tasks as needed.

pub mod classifier;
mod runtime;
pub mod model_manager;
pub mod models;

pub use classifier::{
    ClassifierBuilder, ClassifierConfig, ClassifierError, ClassifierInfo, InferenceRuntime, InputNames,
    IntoBatch, LabelSet, NamedOutput, OnnxRuntime, Prediction, SparseBatch, TokenEncoder, ToxicityClassifier,
    ToxicityLabel,
};
pub use runtime::{RuntimeConfig, create_session_builder};
pub use model_manager::{ModelManager, ModelError};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo, MODEL_URL_ENV_VAR};

pub fn init_logger() {
    env_logger::init();
}
