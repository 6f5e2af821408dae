use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{
    accounts::AccountDirectory,
    config::Config,
    emotion::{EmotionClassifier, LexiconClassifier, RemoteClassifier},
    history::{HistoryStore, JsonHistoryStore, PgHistoryStore},
    pipeline::EntryPipeline,
    token::TokenIssuer,
};

pub struct State {
    pub pipeline: EntryPipeline,
    pub accounts: AccountDirectory,
    pub tokens: TokenIssuer,
}

impl State {
    pub async fn new(config: &Config) -> anyhow::Result<Arc<Self>> {
        let classifier: Arc<dyn EmotionClassifier> = match &config.classifier_url {
            Some(url) => {
                info!("Using emotion classifier at {url}");
                Arc::new(RemoteClassifier::new(url.clone(), config.classifier_timeout)?)
            }
            None => {
                info!("DIARY_CLASSIFIER_URL not set, using the built-in lexicon classifier");
                Arc::new(LexiconClassifier)
            }
        };

        let history = open_history(config).await?;

        Ok(Arc::new(Self {
            pipeline: EntryPipeline::new(classifier, history),
            accounts: AccountDirectory::new(config.users_path()),
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_lifetime),
        }))
    }
}

pub async fn open_history(config: &Config) -> anyhow::Result<Arc<dyn HistoryStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;
            info!("Storing history in Postgres");
            Ok(Arc::new(PgHistoryStore::new(pool)))
        }
        None => {
            let store = JsonHistoryStore::new(config.history_path());
            info!("Storing history in {}", store.path().display());
            Ok(Arc::new(store))
        }
    }
}
