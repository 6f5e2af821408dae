use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{ScoreVector, Tendency};

/// Identifier of the student an entry belongs to. Matches `UserAccount::id`.
pub type SubjectId = u64;

/// One diary submission as received from the client. Never persisted as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct DiaryEntry {
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "respostas", default)]
    pub answers: BTreeMap<String, String>,
    #[serde(rename = "aluno_id", default)]
    pub subject_id: Option<SubjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    #[serde(rename = "principal")]
    pub label: String,
    #[serde(rename = "probabilidades")]
    pub probabilities: BTreeMap<String, f64>,
}

/// Response body of a diary analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "emocao")]
    pub emotion: EmotionResult,
    #[serde(rename = "tendencia")]
    pub tendency: Tendency,
    #[serde(rename = "explicacao")]
    pub explanation: String,
    #[serde(rename = "pontuacao")]
    pub scores: ScoreVector,
}

/// A stored diary entry together with everything computed from it.
///
/// Files written before timestamps and probabilities were recorded still
/// load: missing fields fall back to their defaults. Missing ids are assigned
/// and written back by the store before records are decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    #[serde(rename = "aluno_id", default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "respostas", default)]
    pub answers: BTreeMap<String, String>,
    #[serde(rename = "emocao")]
    pub emotion: String,
    #[serde(rename = "probabilidades", default)]
    pub probabilities: BTreeMap<String, f64>,
    #[serde(rename = "tendencia")]
    pub tendency: Tendency,
    #[serde(rename = "explicacao", default)]
    pub explanation: String,
    #[serde(rename = "pontuacao")]
    pub scores: ScoreVector,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "aluno")]
    Student,
    #[serde(rename = "professor")]
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "aluno",
            Role::Teacher => "professor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(default)]
    pub id: SubjectId,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha_hash", default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Plaintext password left over from accounts created before hashing.
    #[serde(rename = "senha", default, skip_serializing_if = "Option::is_none")]
    pub legacy_password: Option<String>,
    #[serde(rename = "tipo")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(rename = "aluno_id")]
    pub subject: String,
    pub message: String,
    #[serde(rename = "tendencia")]
    pub tendency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registro_id: Option<Uuid>,
    #[serde(rename = "ocorrencias", skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<usize>,
}
