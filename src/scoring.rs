use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordinal at or above which a questionnaire category counts as a tendency.
pub const TENDENCY_THRESHOLD: u8 = 3;

const ANXIETY_EMOTIONS: [&str; 4] = ["medo", "ansiedade", "nervosismo", "nervoso"];
const DEPRESSION_EMOTIONS: [&str; 3] = ["tristeza", "desânimo", "triste"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Attention,
    Anxiety,
    Depression,
}

impl Category {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "tdah" => Some(Category::Attention),
            "ansiedade" => Some(Category::Anxiety),
            "depressao" => Some(Category::Depression),
            _ => None,
        }
    }
}

/// Questionnaire answer scale, from "never" to "always".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnswerLevel {
    Never,
    Rarely,
    Sometimes,
    Often,
    Always,
}

impl AnswerLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "nunca" => Some(AnswerLevel::Never),
            "raramente" => Some(AnswerLevel::Rarely),
            "às vezes" | "as vezes" => Some(AnswerLevel::Sometimes),
            "frequentemente" => Some(AnswerLevel::Often),
            "sempre" => Some(AnswerLevel::Always),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            AnswerLevel::Never => 0,
            AnswerLevel::Rarely => 1,
            AnswerLevel::Sometimes => 2,
            AnswerLevel::Often => 3,
            AnswerLevel::Always => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreVector {
    #[serde(rename = "tdah")]
    pub attention: u8,
    #[serde(rename = "ansiedade")]
    pub anxiety: u8,
    #[serde(rename = "depressao")]
    pub depression: u8,
}

impl ScoreVector {
    pub fn get(&self, category: Category) -> u8 {
        match category {
            Category::Attention => self.attention,
            Category::Anxiety => self.anxiety,
            Category::Depression => self.depression,
        }
    }

    fn set(&mut self, category: Category, value: u8) {
        match category {
            Category::Attention => self.attention = value,
            Category::Anxiety => self.anxiety = value,
            Category::Depression => self.depression = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tendency {
    #[serde(rename = "Sem tendências significativas")]
    None,
    #[serde(rename = "Tendência a TDAH")]
    Attention,
    #[serde(rename = "Tendência a Ansiedade")]
    Anxiety,
    #[serde(rename = "Tendência à Depressão leve")]
    Depression,
}

impl Tendency {
    pub fn label(&self) -> &'static str {
        match self {
            Tendency::None => "Sem tendências significativas",
            Tendency::Attention => "Tendência a TDAH",
            Tendency::Anxiety => "Tendência a Ansiedade",
            Tendency::Depression => "Tendência à Depressão leve",
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            Tendency::None => "Nenhum comportamento preocupante detectado.",
            Tendency::Attention => {
                "O usuário demonstra sinais de desatenção e impulsividade frequente."
            }
            Tendency::Anxiety => "Há indicativos de tensão e preocupação elevada.",
            Tendency::Depression => {
                "O texto e respostas indicam sintomas de humor deprimido ou desmotivação."
            }
        }
    }
}

pub fn normalize_answers(answers: &BTreeMap<String, String>) -> ScoreVector {
    let mut scores = ScoreVector::default();

    for (key, value) in answers {
        let Some(category) = Category::from_key(key) else {
            continue;
        };
        let level = AnswerLevel::parse(value).unwrap_or_else(|| {
            debug!("Unrecognized answer {value:?} for {key}, scoring as 0");
            AnswerLevel::Never
        });
        scores.set(category, level.ordinal());
    }

    scores
}

pub fn classify_tendency(scores: &ScoreVector, emotion: &str) -> Tendency {
    let emotion = emotion.to_lowercase();

    let exceeds = |category| scores.get(category) >= TENDENCY_THRESHOLD;

    if exceeds(Category::Attention) {
        Tendency::Attention
    } else if exceeds(Category::Anxiety) || ANXIETY_EMOTIONS.contains(&emotion.as_str()) {
        Tendency::Anxiety
    } else if exceeds(Category::Depression) || DEPRESSION_EMOTIONS.contains(&emotion.as_str()) {
        Tendency::Depression
    } else {
        Tendency::None
    }
}
