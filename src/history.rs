use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::models::{HistoryRecord, SubjectId};
use crate::scoring::ScoreVector;
use crate::storage;

/// Append-only log of analysed diary entries, oldest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> anyhow::Result<()>;
    async fn list(&self) -> anyhow::Result<Vec<HistoryRecord>>;

    async fn list_for(&self, subject: SubjectId) -> anyhow::Result<Vec<HistoryRecord>> {
        let records = self.list().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.subject_id == Some(subject))
            .collect())
    }
}

/// History kept in one JSON document that is rewritten on every append.
pub struct JsonHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the raw document, persisting ids for records stored without one.
    /// Callers must hold `write_lock`.
    async fn load_with_ids(&self) -> anyhow::Result<Vec<Value>> {
        let mut values = storage::load_document(&self.path).await?;

        let assigned = assign_missing_ids(&mut values);
        if assigned > 0 {
            storage::save_document(&self.path, &values).await?;
            info!("Assigned ids to {assigned} stored records");
        }

        Ok(values)
    }
}

fn assign_missing_ids(values: &mut [Value]) -> usize {
    let mut assigned = 0;

    for value in values.iter_mut() {
        let Value::Object(fields) = value else {
            continue;
        };
        if fields.get("id").map_or(true, Value::is_null) {
            fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            assigned += 1;
        }
    }

    assigned
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, record: HistoryRecord) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_with_ids().await?;
        values.push(storage::to_value(&record)?);
        storage::save_document(&self.path, &values).await
    }

    async fn list(&self) -> anyhow::Result<Vec<HistoryRecord>> {
        let _guard = self.write_lock.lock().await;
        let values = self.load_with_ids().await?;
        Ok(storage::decode_items(&self.path, &values))
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, record: HistoryRecord) -> anyhow::Result<()> {
        let subject_id = record
            .subject_id
            .map(i64::try_from)
            .transpose()
            .context("subject id out of range")?;

        sqlx::query(
            r#"
            INSERT INTO diary.history
            (id, aluno_id, texto, respostas, emocao, probabilidades,
             tendencia, explicacao, pontuacao, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(subject_id)
        .bind(&record.text)
        .bind(Json(&record.answers))
        .bind(&record.emotion)
        .bind(Json(&record.probabilities))
        .bind(record.tendency.label())
        .bind(&record.explanation)
        .bind(Json(&record.scores))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert history record")?;

        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, aluno_id, texto, respostas, emocao, probabilidades, \
             tendencia, explicacao, pontuacao, created_at \
             FROM diary.history \
             ORDER BY created_at, seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let subject_id: Option<i64> = row.get("aluno_id");
            let tendency: String = row.get("tendencia");
            let answers: Json<BTreeMap<String, String>> = row.get("respostas");
            let probabilities: Json<BTreeMap<String, f64>> = row.get("probabilidades");
            let scores: Json<ScoreVector> = row.get("pontuacao");

            records.push(HistoryRecord {
                id: row.get("id"),
                subject_id: subject_id.and_then(|id| SubjectId::try_from(id).ok()),
                text: row.get("texto"),
                answers: answers.0,
                emotion: row.get("emocao"),
                probabilities: probabilities.0,
                tendency: serde_json::from_value(serde_json::Value::String(tendency))
                    .context("unknown tendency label in history table")?,
                explanation: row.get("explicacao"),
                scores: scores.0,
                created_at: row.get("created_at"),
            });
        }

        Ok(records)
    }
}

pub fn export_csv(records: &[HistoryRecord], path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Serialize)]
    struct CsvRow<'a> {
        id: String,
        aluno_id: Option<SubjectId>,
        created_at: String,
        emocao: &'a str,
        tendencia: &'a str,
        tdah: u8,
        ansiedade: u8,
        depressao: u8,
        texto: &'a str,
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for record in records {
        writer.serialize(CsvRow {
            id: record.id.to_string(),
            aluno_id: record.subject_id,
            created_at: record
                .created_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            emocao: &record.emotion,
            tendencia: record.tendency.label(),
            tdah: record.scores.attention,
            ansiedade: record.scores.anxiety,
            depressao: record.scores.depression,
            texto: &record.text,
        })?;
    }

    writer.flush()?;
    Ok(records.len())
}
