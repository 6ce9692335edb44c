use std::collections::{BTreeSet, HashMap};
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Toxicity categories the model can report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToxicityLabel {
    Toxicity,
    SevereToxicity,
    IdentityAttack,
    Insult,
    Threat,
    SexuallyExplicit,
}

impl ToxicityLabel {
    /// Every category, in reporting order.
    pub const ALL: [ToxicityLabel; 6] = [
        Self::Toxicity,
        Self::SevereToxicity,
        Self::IdentityAttack,
        Self::Insult,
        Self::Threat,
        Self::SexuallyExplicit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toxicity => "TOXICITY",
            Self::SevereToxicity => "SEVERE_TOXICITY",
            Self::IdentityAttack => "IDENTITY_ATTACK",
            Self::Insult => "INSULT",
            Self::Threat => "THREAT",
            Self::SexuallyExplicit => "SEXUALLY_EXPLICIT",
        }
    }
}

impl fmt::Display for ToxicityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref HEAD_LABELS: HashMap<&'static str, ToxicityLabel> = {
        let mut m = HashMap::new();
        m.insert("frac_neg", ToxicityLabel::Toxicity);
        m.insert("frac_very_neg", ToxicityLabel::SevereToxicity);
        m.insert("identity_hate", ToxicityLabel::IdentityAttack);
        m.insert("insult", ToxicityLabel::Insult);
        m.insert("threat", ToxicityLabel::Threat);
        m.insert("sexual_explicit", ToxicityLabel::SexuallyExplicit);
        m
    };
}

/// The set of categories a classifier reports.
///
/// The shipped model emits a `frac_very_neg` head for severe toxicity, but
/// the production configuration leaves it out. `LabelSet::default()` is
/// that five-label configuration; `LabelSet::all()` turns severe toxicity
/// back on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    enabled: BTreeSet<ToxicityLabel>,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::all().without(ToxicityLabel::SevereToxicity)
    }
}

impl LabelSet {
    pub fn all() -> Self {
        Self {
            enabled: ToxicityLabel::ALL.into_iter().collect(),
        }
    }

    pub fn from_labels(labels: impl IntoIterator<Item = ToxicityLabel>) -> Self {
        Self {
            enabled: labels.into_iter().collect(),
        }
    }

    pub fn with(mut self, label: ToxicityLabel) -> Self {
        self.enabled.insert(label);
        self
    }

    pub fn without(mut self, label: ToxicityLabel) -> Self {
        self.enabled.remove(&label);
        self
    }

    pub fn contains(&self, label: ToxicityLabel) -> bool {
        self.enabled.contains(&label)
    }

    /// Enabled labels in reporting order
    pub fn labels(&self) -> Vec<ToxicityLabel> {
        self.enabled.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Maps a raw output head name such as `insult/Sigmoid:0` to its category.
    ///
    /// Only the first `/`-delimited segment is looked at. Returns `None` for
    /// heads that are unknown or whose category is disabled in this set;
    /// those heads are skipped, not treated as failures.
    pub fn resolve(&self, head_name: &str) -> Option<ToxicityLabel> {
        resolve_head(head_name).filter(|label| self.contains(*label))
    }
}

/// Maps a head name to its category regardless of which labels are enabled.
pub fn resolve_head(head_name: &str) -> Option<ToxicityLabel> {
    let short_name = head_name.split('/').next().unwrap_or(head_name);
    HEAD_LABELS.get(short_name).copied()
}
