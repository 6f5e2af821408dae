use std::{collections::BTreeMap, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const NEUTRAL_LABEL: &str = "neutral";

/// Emotions the external model is known to emit, plus anything else verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emotion {
    Nervousness,
    Happiness,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Neutral,
    Passthrough(String),
}

impl Emotion {
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "nervousness" => Emotion::Nervousness,
            "happiness" => Emotion::Happiness,
            "sadness" => Emotion::Sadness,
            "anger" => Emotion::Anger,
            "fear" => Emotion::Fear,
            "surprise" => Emotion::Surprise,
            "neutral" => Emotion::Neutral,
            _ => Emotion::Passthrough(label.to_string()),
        }
    }

    pub fn display(&self) -> &str {
        match self {
            Emotion::Nervousness => "nervoso",
            Emotion::Happiness => "feliz",
            Emotion::Sadness => "triste",
            Emotion::Anger => "irritado",
            Emotion::Fear => "com medo",
            Emotion::Surprise => "surpreso",
            Emotion::Neutral => "neutra",
            Emotion::Passthrough(label) => label,
        }
    }
}

pub fn translate(label: &str) -> String {
    Emotion::from_label(label).display().to_string()
}

/// The model returns either one label or a ranked list of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassifierLabel {
    Single(String),
    Candidates(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    pub output: ClassifierLabel,
    #[serde(default)]
    pub probas: BTreeMap<String, f64>,
}

impl ClassifierOutput {
    pub fn primary_label(&self) -> &str {
        match &self.output {
            ClassifierLabel::Single(label) => label,
            ClassifierLabel::Candidates(labels) => {
                labels.first().map(String::as_str).unwrap_or(NEUTRAL_LABEL)
            }
        }
    }
}

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<ClassifierOutput>;
}

const POSITIVE_WORDS: [&str; 8] = [
    "feliz", "otimo", "bom", "alegre", "animado", "tranquilo", "bem", "content",
];
const NEGATIVE_WORDS: [&str; 12] = [
    "triste", "mal", "deprimido", "ansioso", "ansiosa", "chateado", "sofrendo", "sofrer",
    "cansado", "cansada", "nervoso", "stress",
];

/// Keyword classifier used when no inference service is configured.
#[derive(Debug, Default, Clone)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    fn count_matches(text: &str, words: &[&str]) -> usize {
        words.iter().filter(|word| text.contains(*word)).count()
    }
}

#[async_trait]
impl EmotionClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<ClassifierOutput> {
        let text = text.to_lowercase();
        let positive = Self::count_matches(&text, &POSITIVE_WORDS);
        let negative = Self::count_matches(&text, &NEGATIVE_WORDS);
        debug!(positive, negative, "Lexicon matches");

        let label = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => "happiness",
            std::cmp::Ordering::Less => "sadness",
            std::cmp::Ordering::Equal => NEUTRAL_LABEL,
        };

        let total = positive + negative;
        let mut probas = BTreeMap::new();
        if total == 0 {
            probas.insert(NEUTRAL_LABEL.to_string(), 1.0);
        } else {
            probas.insert("happiness".to_string(), positive as f64 / total as f64);
            probas.insert("sadness".to_string(), negative as f64 / total as f64);
        }

        Ok(ClassifierOutput {
            output: ClassifierLabel::Single(label.to_string()),
            probas,
        })
    }
}

/// Client for an HTTP inference service answering `{ output, probas }`.
pub struct RemoteClassifier {
    client: reqwest::Client,
    url: String,
}

impl RemoteClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build classifier HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl EmotionClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<ClassifierOutput> {
        let output = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text })
            .send()
            .await
            .with_context(|| format!("emotion classifier at {} unreachable", self.url))?
            .error_for_status()
            .context("emotion classifier returned an error status")?
            .json::<ClassifierOutput>()
            .await
            .context("emotion classifier returned an unexpected body")?;

        Ok(output)
    }
}
