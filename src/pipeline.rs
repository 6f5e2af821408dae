use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::emotion::{self, EmotionClassifier};
use crate::history::HistoryStore;
use crate::models::{AnalysisResult, DiaryEntry, EmotionResult, HistoryRecord};
use crate::scoring;

/// Scores one diary entry and records it. The classifier is built once at
/// startup and only read afterwards.
#[derive(Clone)]
pub struct EntryPipeline {
    classifier: Arc<dyn EmotionClassifier>,
    history: Arc<dyn HistoryStore>,
}

impl EntryPipeline {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            classifier,
            history,
        }
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub async fn analyze(&self, entry: DiaryEntry) -> anyhow::Result<AnalysisResult> {
        let output = self.classifier.classify(&entry.text).await?;
        let emotion = EmotionResult {
            label: emotion::translate(output.primary_label()),
            probabilities: output.probas,
        };

        let scores = scoring::normalize_answers(&entry.answers);
        let tendency = scoring::classify_tendency(&scores, &emotion.label);

        let record = HistoryRecord {
            id: Uuid::new_v4(),
            subject_id: entry.subject_id,
            text: entry.text,
            answers: entry.answers,
            emotion: emotion.label.clone(),
            probabilities: emotion.probabilities.clone(),
            tendency,
            explanation: tendency.explanation().to_string(),
            scores,
            created_at: Some(Utc::now()),
        };
        self.history.append(record).await?;

        info!(
            subject = ?entry.subject_id,
            emotion = %emotion.label,
            tendency = tendency.label(),
            "Diary entry analysed"
        );

        Ok(AnalysisResult {
            emotion,
            tendency,
            explanation: tendency.explanation().to_string(),
            scores,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::emotion::{ClassifierLabel, ClassifierOutput};
    use crate::history::JsonHistoryStore;
    use crate::scoring::Tendency;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    /// Always answers with the same label.
    pub(crate) struct FixedClassifier(pub ClassifierLabel);

    #[async_trait]
    impl EmotionClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> anyhow::Result<ClassifierOutput> {
            Ok(ClassifierOutput {
                output: self.0.clone(),
                probas: BTreeMap::from([("sadness".to_string(), 0.7), ("joy".to_string(), 0.3)]),
            })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl EmotionClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> anyhow::Result<ClassifierOutput> {
            anyhow::bail!("model unavailable")
        }
    }

    fn entry(answers: &[(&str, &str)], subject_id: Option<u64>) -> DiaryEntry {
        DiaryEntry {
            text: "Não dormi direito".to_string(),
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            subject_id,
        }
    }

    #[tokio::test]
    async fn sad_entry_is_scored_and_recorded() {
        let dir = tempdir().unwrap();
        let history = Arc::new(JsonHistoryStore::new(dir.path().join("historico.json")));
        let pipeline = EntryPipeline::new(
            Arc::new(FixedClassifier(ClassifierLabel::Single("sadness".into()))),
            history.clone(),
        );

        let result = pipeline
            .analyze(entry(
                &[("tdah", "nunca"), ("ansiedade", "nunca"), ("depressao", "nunca")],
                Some(9),
            ))
            .await
            .unwrap();

        assert_eq!(result.emotion.label, "triste");
        assert_eq!(result.tendency, Tendency::Depression);
        assert_eq!(result.explanation, Tendency::Depression.explanation());
        assert_eq!(result.scores.depression, 0);

        let records = history.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_id, Some(9));
        assert_eq!(records[0].emotion, "triste");
        assert_eq!(records[0].probabilities.len(), 2);
        assert!(records[0].created_at.is_some());
    }

    #[tokio::test]
    async fn empty_candidate_list_is_neutral() {
        let dir = tempdir().unwrap();
        let pipeline = EntryPipeline::new(
            Arc::new(FixedClassifier(ClassifierLabel::Candidates(Vec::new()))),
            Arc::new(JsonHistoryStore::new(dir.path().join("historico.json"))),
        );

        let result = pipeline
            .analyze(entry(&[("ansiedade", "às vezes")], None))
            .await
            .unwrap();

        assert_eq!(result.emotion.label, "neutra");
        assert_eq!(result.tendency, Tendency::None);
        assert_eq!(result.scores.anxiety, 2);
    }

    #[tokio::test]
    async fn each_submission_appends_one_record() {
        let dir = tempdir().unwrap();
        let history = Arc::new(JsonHistoryStore::new(dir.path().join("historico.json")));
        let pipeline = EntryPipeline::new(
            Arc::new(FixedClassifier(ClassifierLabel::Single("happiness".into()))),
            history.clone(),
        );

        for n in 1..=4 {
            pipeline
                .analyze(entry(&[("tdah", "sempre")], Some(1)))
                .await
                .unwrap();
            assert_eq!(history.list().await.unwrap().len(), n);
        }
    }

    #[tokio::test]
    async fn classifier_failure_propagates_without_writing() {
        let dir = tempdir().unwrap();
        let history = Arc::new(JsonHistoryStore::new(dir.path().join("historico.json")));
        let pipeline = EntryPipeline::new(Arc::new(FailingClassifier), history.clone());

        assert!(pipeline.analyze(entry(&[], None)).await.is_err());
        assert!(history.list().await.unwrap().is_empty());
    }
}
