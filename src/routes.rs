use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State as AxumState,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    accounts::NewAccount,
    error::AppError,
    models::{Alert, AnalysisResult, DiaryEntry, HistoryRecord, Role, SubjectId},
    report,
    state::State,
};

type AppState = AxumState<Arc<State>>;

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))
}

pub async fn home_handler() -> Json<Value> {
    Json(json!({ "mensagem": "Backend funcionando perfeitamente 🚀" }))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    nome: String,
    email: String,
    senha: String,
    tipo: Role,
}

pub async fn register_handler(
    AxumState(state): AppState,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = payload(body)?;

    let user = state
        .accounts
        .register(NewAccount {
            name: request.nome,
            email: request.email,
            password: request.senha,
            role: request.tipo,
        })
        .await?;

    Ok(Json(json!({
        "mensagem": "Usuário cadastrado com sucesso",
        "id": user.id,
    })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    senha: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub tipo: Role,
    pub nome: String,
    pub id: SubjectId,
}

pub async fn login_handler(
    AxumState(state): AppState,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let request = payload(body)?;

    let user = state
        .accounts
        .authenticate(&request.email, &request.senha)
        .await?;
    let access_token = state.tokens.issue(&user)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        tipo: user.role,
        nome: user.name,
        id: user.id,
    }))
}

fn bearer_subject(state: &State, headers: &HeaderMap) -> Option<SubjectId> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;

    let claims = state.tokens.decode(token.trim());
    if claims.is_none() {
        debug!("Ignoring invalid bearer token");
    }
    claims?.subject_id()
}

pub async fn analyze_handler(
    AxumState(state): AppState,
    headers: HeaderMap,
    body: Result<Json<DiaryEntry>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut entry = payload(body)?;

    if entry.subject_id.is_none() {
        entry.subject_id = bearer_subject(&state, &headers);
    }

    Ok(Json(state.pipeline.analyze(entry).await?))
}

#[derive(Deserialize)]
pub struct RecordsQuery {
    aluno_id: Option<SubjectId>,
}

pub async fn records_handler(
    AxumState(state): AppState,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryRecord>>, AppError> {
    let Query(query) =
        query.map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))?;
    let history = state.pipeline.history();
    let records = match query.aluno_id {
        Some(subject) => history.list_for(subject).await?,
        None => history.list().await?,
    };

    Ok(Json(records))
}

pub async fn alerts_handler(AxumState(state): AppState) -> Result<Json<Vec<Alert>>, AppError> {
    let records = state.pipeline.history().list().await?;
    Ok(Json(report::build_alerts(&records)))
}

pub async fn migrate_passwords_handler(
    AxumState(state): AppState,
) -> Result<Json<Value>, AppError> {
    let migrated = state.accounts.migrate_passwords().await?;

    let message = if migrated == 0 {
        "Nenhuma senha em texto puro encontrada"
    } else {
        "Senhas convertidas para hash"
    };

    Ok(Json(json!({ "mensagem": message, "corrigidos": migrated })))
}
