use toxicity::{BuiltinModel, ClassifierConfig, LabelSet, ModelManager, Prediction, ToxicityClassifier, ToxicityLabel};
use log::info;
use clap::Parser;
use std::time::Instant;

const SAMPLES: [&str; 4] = [
    "We're dudes on computers, moron.  You are quite astonishingly stupid.",
    "Please stop. If you continue to vandalize Wikipedia, as you did to Kmart, you will be blocked from editing.",
    "I respect your point of view, and when this discussion originated on 8th April I would have tended to agree with you.",
    "now join the anti gay hitler rebellion now!",
];

const TEXT_WIDTH: usize = 48;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Also report severe toxicity
    #[arg(short, long)]
    severe: bool,

    /// Base URL serving model.onnx and tokenizer.json (overrides TOXICITY_MODEL_URL)
    #[arg(short, long)]
    model_url: Option<String>,

    /// Texts to classify (defaults to a few sample comments)
    texts: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Toxicity Classifier Demo ===");

    let manager = ModelManager::new_default()?;
    if args.fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(BuiltinModel::Toxicity.name())?;
    }

    let labels = if args.severe { LabelSet::all() } else { LabelSet::default() };
    let config = ClassifierConfig {
        labels,
        ..ClassifierConfig::default()
    };

    let start_time = Instant::now();
    let model = BuiltinModel::Toxicity;
    let source = args.model_url
        .map(|url| model.model_info(&url))
        .or_else(|| model.model_info_from_env());
    let classifier = match source {
        Some(info) => ToxicityClassifier::load_with(&manager, &info, config).await?,
        None => ToxicityClassifier::load_cached(&manager, model, config).await?,
    };
    info!("Classifier loaded in {:.2?}", start_time.elapsed());

    let texts = if args.texts.is_empty() {
        SAMPLES.iter().map(|s| s.to_string()).collect()
    } else {
        args.texts
    };

    let classify_start = Instant::now();
    let predictions = classifier.classify(texts).await?;
    info!("Classified {} texts in {:.2?}", predictions.len(), classify_start.elapsed());

    print!("{}", render_table(&classifier.labels(), &predictions));
    Ok(())
}

fn render_table(labels: &[ToxicityLabel], predictions: &[Prediction]) -> String {
    let mut out = format!("{:<width$}", "TEXT", width = TEXT_WIDTH);
    for label in labels {
        out.push_str(&format!(" | {}", label));
    }
    out.push('\n');

    for prediction in predictions {
        out.push_str(&format!("{:<width$}", truncate(&prediction.text, TEXT_WIDTH), width = TEXT_WIDTH));
        for label in labels {
            let cell = match prediction.get(*label) {
                Some(matched) => matched.to_string(),
                None => "-".to_string(),
            };
            out.push_str(&format!(" | {:<width$}", cell, width = label.as_str().len()));
        }
        out.push('\n');
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table() {
        let mut prediction = Prediction::new("you idiot");
        prediction.labels.insert(ToxicityLabel::Insult, true);
        let table = render_table(&[ToxicityLabel::Insult, ToxicityLabel::Threat], &[prediction]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| INSULT | THREAT"));
        assert!(lines[1].starts_with("you idiot"));
        assert!(lines[1].contains("| true "));
        assert!(lines[1].trim_end().ends_with("| -"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
