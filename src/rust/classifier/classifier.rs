use std::path::PathBuf;
use std::sync::Arc;
use log::{debug, error, info};
use tokio::task::JoinHandle;

use super::builder::{load_tokenizer, ClassifierBuilder};
use super::encoding::{IntoBatch, SparseBatch, TokenEncoder};
use super::error::ClassifierError;
use super::inference::{InferenceRuntime, NamedOutput, OnnxRuntime};
use super::labels::{LabelSet, ToxicityLabel};
use super::prediction::{resolve_predictions, Prediction};
use super::{ClassifierConfig, ClassifierInfo};
use crate::models::MODEL_URL_ENV_VAR;
use crate::{BuiltinModel, ModelInfo, ModelManager};

/// A thread-safe toxicity classifier.
///
/// The tokenizer and inference runtime are shared behind `Arc` and never
/// mutated after load, so one instance can serve concurrent `classify`
/// calls from any number of tasks.
///
/// ```no_run
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use toxicity::{ToxicityClassifier, ToxicityLabel};
///
/// let classifier = ToxicityClassifier::load().await?;
/// let predictions = classifier.classify(["you are a moron", "have a nice day"]).await?;
/// for prediction in &predictions {
///     println!("{}: insult={:?}", prediction.text, prediction.get(ToxicityLabel::Insult));
/// }
/// # Ok(())
/// # }
/// ```
pub struct ToxicityClassifier {
    pub(super) model_path: Option<PathBuf>,
    pub(super) tokenizer_path: Option<PathBuf>,
    pub(super) encoder: Arc<dyn TokenEncoder>,
    pub(super) runtime: Arc<dyn InferenceRuntime>,
    pub(super) labels: LabelSet,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ToxicityClassifier>();
    }
};

impl std::fmt::Debug for ToxicityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToxicityClassifier")
            .field("model_path", &self.model_path)
            .field("tokenizer_path", &self.tokenizer_path)
            .field("labels", &self.labels)
            .finish()
    }
}

impl ToxicityClassifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::new()
    }

    /// Loads the built-in toxicity model with the default configuration.
    ///
    /// When [`MODEL_URL_ENV_VAR`] is set the files are fetched from there into
    /// the default cache if missing; otherwise they must already be cached.
    pub async fn load() -> Result<Self, ClassifierError> {
        let manager = ModelManager::new_default()
            .map_err(|e| ClassifierError::LoadError(format!("Failed to create model manager: {}", e)))?;
        let model = BuiltinModel::Toxicity;
        match model.model_info_from_env() {
            Some(info) => Self::load_with(&manager, &info, ClassifierConfig::default()).await,
            None => Self::load_cached(&manager, model, ClassifierConfig::default()).await,
        }
    }

    /// Loads the model described by `info` from `manager`'s cache, fetching
    /// the graph and the tokenizer concurrently when they are missing.
    pub async fn load_with(
        manager: &ModelManager,
        info: &ModelInfo,
        config: ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        manager.ensure_model_downloaded(info).await?;
        let (model_path, tokenizer_path) = manager.require_downloaded(&info.name)?;
        Self::load_from_paths(model_path, tokenizer_path, config).await
    }

    /// Loads a built-in model that is already in `manager`'s cache.
    pub async fn load_cached(
        manager: &ModelManager,
        model: BuiltinModel,
        config: ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        if !manager.is_model_downloaded(model.name()) {
            error!("Model '{}' is not cached under {:?}", model.name(), manager.models_dir());
            return Err(ClassifierError::LoadError(format!(
                "Model '{}' is not cached under {:?}; set {} to the URL serving model.onnx and tokenizer.json",
                model.name(),
                manager.models_dir(),
                MODEL_URL_ENV_VAR
            )));
        }
        let (model_path, tokenizer_path) = manager.require_downloaded(model.name())?;
        Self::load_from_paths(model_path, tokenizer_path, config).await
    }

    /// Loads the tokenizer and the model session side by side.
    ///
    /// Both must succeed; if either fails no classifier is produced.
    pub async fn load_from_paths(
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        config: ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        let ClassifierConfig { runtime, labels, input_names } = config;
        info!("Loading toxicity model from {:?} and tokenizer from {:?}", model_path, tokenizer_path);

        let tokenizer_src = tokenizer_path.clone();
        let model_src = model_path.clone();
        let (tokenizer, session) = load_both(
            move || load_tokenizer(&tokenizer_src),
            move || OnnxRuntime::from_file(&model_src, &runtime, input_names),
        )
        .await?;

        Self::builder()
            .with_labels(labels)
            .with_encoder(tokenizer)
            .with_runtime(session)
            .with_source_paths(model_path, tokenizer_path)
            .build()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            tokenizer_path: self.tokenizer_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            labels: self.labels.labels(),
            output_names: self.runtime.output_names(),
        }
    }

    /// Categories this classifier reports, in reporting order
    pub fn labels(&self) -> Vec<ToxicityLabel> {
        self.labels.labels()
    }

    /// Classifies one or more texts.
    ///
    /// Tokenization and inference run on the blocking thread pool. Dropping
    /// the returned future abandons the result.
    ///
    /// # Errors
    /// - `ValidationError` for an empty batch
    /// - `TokenizerError` if any input cannot be encoded
    /// - `InferenceError` if the model fails or returns malformed heads
    pub async fn classify(&self, inputs: impl IntoBatch) -> Result<Vec<Prediction>, ClassifierError> {
        let inputs = inputs.into_batch();
        let encoder = Arc::clone(&self.encoder);
        let runtime = Arc::clone(&self.runtime);
        let labels = self.labels.clone();

        run_blocking(move || {
            let outputs = execute_batch(encoder.as_ref(), runtime.as_ref(), &inputs)?;
            resolve_predictions(&inputs, &outputs, &labels)
        })
        .await
    }

    /// Classifies texts and returns the raw output heads, unrecognized ones included.
    pub async fn classify_raw(&self, inputs: impl IntoBatch) -> Result<Vec<NamedOutput>, ClassifierError> {
        let inputs = inputs.into_batch();
        let encoder = Arc::clone(&self.encoder);
        let runtime = Arc::clone(&self.runtime);

        run_blocking(move || execute_batch(encoder.as_ref(), runtime.as_ref(), &inputs)).await
    }

    /// Synchronous [`classify`](Self::classify) for callers outside an async runtime.
    pub fn classify_blocking(&self, inputs: impl IntoBatch) -> Result<Vec<Prediction>, ClassifierError> {
        let inputs = inputs.into_batch();
        let outputs = execute_batch(self.encoder.as_ref(), self.runtime.as_ref(), &inputs)?;
        resolve_predictions(&inputs, &outputs, &self.labels)
    }
}

fn execute_batch(
    encoder: &dyn TokenEncoder,
    runtime: &dyn InferenceRuntime,
    inputs: &[String],
) -> Result<Vec<NamedOutput>, ClassifierError> {
    let batch = SparseBatch::encode(encoder, inputs)?;
    debug!("Encoded {} inputs into {} tokens", batch.batch_size, batch.total_tokens());
    runtime.execute(&batch)
}

async fn run_blocking<T, F>(work: F) -> Result<T, ClassifierError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ClassifierError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ClassifierError::InferenceError(format!("Inference task failed: {}", e)))?
}

/// Runs both loaders on the blocking pool and waits for the pair.
async fn load_both<A, B, FA, FB>(first: FA, second: FB) -> Result<(A, B), ClassifierError>
where
    A: Send + 'static,
    B: Send + 'static,
    FA: FnOnce() -> Result<A, ClassifierError> + Send + 'static,
    FB: FnOnce() -> Result<B, ClassifierError> + Send + 'static,
{
    tokio::try_join!(
        join_load(tokio::task::spawn_blocking(first)),
        join_load(tokio::task::spawn_blocking(second)),
    )
}

async fn join_load<T>(task: JoinHandle<Result<T, ClassifierError>>) -> Result<T, ClassifierError> {
    task.await
        .map_err(|e| ClassifierError::LoadError(format!("Load task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct WordEncoder;

    impl TokenEncoder for WordEncoder {
        fn encode(&self, text: &str) -> Result<Vec<u32>, ClassifierError> {
            text.split_whitespace()
                .map(|word| match word {
                    "idiot" => Ok(1),
                    "hello" => Ok(2),
                    "\u{0}" => Err(ClassifierError::TokenizerError("NUL is not in the vocabulary".into())),
                    _ => Ok(3),
                })
                .collect()
        }
    }

    /// Flags an example as insulting when it contains token 1.
    #[derive(Default)]
    struct InsultRuntime {
        calls: AtomicUsize,
    }

    impl InferenceRuntime for InsultRuntime {
        fn execute(&self, batch: &SparseBatch) -> Result<Vec<NamedOutput>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut insult = vec![0.9, 0.1].repeat(batch.batch_size);
            for (row, &value) in batch.indices.outer_iter().zip(batch.values.iter()) {
                if value == 1 {
                    let example = row[0] as usize;
                    insult[example * 2] = 0.2;
                    insult[example * 2 + 1] = 0.8;
                }
            }
            Ok(vec![
                NamedOutput::new("insult/Sigmoid:0", insult),
                NamedOutput::new("frac_very_neg/Sigmoid:0", vec![0.0, 1.0].repeat(batch.batch_size)),
            ])
        }

        fn output_names(&self) -> Vec<String> {
            vec!["insult/Sigmoid:0".into(), "frac_very_neg/Sigmoid:0".into()]
        }
    }

    fn classifier() -> ToxicityClassifier {
        ToxicityClassifier::builder()
            .with_encoder(WordEncoder)
            .with_runtime(InsultRuntime::default())
            .build()
            .expect("Failed to create classifier")
    }

    #[tokio::test]
    async fn test_classify_batch() {
        let predictions = classifier().classify(vec!["you idiot", "hello there"]).await.unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].text, "you idiot");
        assert_eq!(predictions[0].get(ToxicityLabel::Insult), Some(true));
        assert_eq!(predictions[1].get(ToxicityLabel::Insult), Some(false));
        assert_eq!(predictions[1].get(ToxicityLabel::SevereToxicity), None);
    }

    #[tokio::test]
    async fn test_classify_single_string() {
        let predictions = classifier().classify("idiot").await.unwrap();
        assert_eq!(predictions.len(), 1);
        assert!(predictions[0].is_toxic());
    }

    #[tokio::test]
    async fn test_raw_outputs_include_unrecognized_heads() {
        let outputs = classifier().classify_raw(["hello", "idiot"]).await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].name, "frac_very_neg/Sigmoid:0");
        assert_eq!(outputs[0].data, vec![0.9, 0.1, 0.2, 0.8]);
    }

    #[tokio::test]
    async fn test_tokenizer_error_aborts_batch() {
        let result = classifier().classify(vec!["hello", "\u{0}"]).await;
        assert!(matches!(result, Err(ClassifierError::TokenizerError(_))));
    }

    #[test]
    fn test_classify_blocking() {
        let predictions = classifier().classify_blocking(["idiot"]).unwrap();
        assert_eq!(predictions[0].get(ToxicityLabel::Insult), Some(true));
    }

    #[test]
    fn test_empty_batch() {
        let result = classifier().classify_blocking(Vec::<String>::new());
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_classify_with_block_on() {
        let classifier = classifier();
        let predictions = tokio_test::block_on(classifier.classify(["idiot", "hello"])).unwrap();
        assert_eq!(predictions[0].get(ToxicityLabel::Insult), Some(true));
        assert_eq!(predictions[1].get(ToxicityLabel::Insult), Some(false));
    }

    const WORD_LEVEL_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": {"[UNK]": 0, "idiot": 1, "hello": 2}, "unk_token": "[UNK]"}
    }"#;

    fn load_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("toxicity-load-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_both_requires_both() {
        let pair = load_both(|| Ok(1), || Ok("session")).await.unwrap();
        assert_eq!(pair, (1, "session"));

        let model_failed = load_both(
            || Ok(1),
            || Err::<(), _>(ClassifierError::LoadError("bad graph".into())),
        )
        .await;
        assert!(matches!(model_failed, Err(ClassifierError::LoadError(m)) if m == "bad graph"));

        let tokenizer_failed = load_both(
            || Err::<(), _>(ClassifierError::LoadError("bad vocabulary".into())),
            || Ok(1),
        )
        .await;
        assert!(matches!(tokenizer_failed, Err(ClassifierError::LoadError(m)) if m == "bad vocabulary"));
    }

    #[tokio::test]
    async fn test_load_from_paths_with_corrupt_model() {
        let dir = load_dir("corrupt-model");
        let tokenizer_path = dir.join("tokenizer.json");
        let model_path = dir.join("model.onnx");
        std::fs::write(&tokenizer_path, WORD_LEVEL_TOKENIZER).unwrap();
        std::fs::write(&model_path, b"not an onnx graph").unwrap();
        assert!(load_tokenizer(&tokenizer_path).is_ok());

        let result = ToxicityClassifier::load_from_paths(model_path, tokenizer_path, ClassifierConfig::default()).await;
        assert!(matches!(result, Err(ClassifierError::LoadError(_))));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_load_from_paths_with_corrupt_tokenizer() {
        let dir = load_dir("corrupt-tokenizer");
        let tokenizer_path = dir.join("tokenizer.json");
        std::fs::write(&tokenizer_path, "{ not json").unwrap();

        let result = ToxicityClassifier::load_from_paths(
            dir.join("model.onnx"),
            tokenizer_path,
            ClassifierConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(ClassifierError::LoadError(_))));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_info() {
        let info = classifier().info();
        assert_eq!(info.labels.len(), 5);
        assert_eq!(info.output_names.len(), 2);
        assert!(info.tokenizer_path.is_none());
    }
}
