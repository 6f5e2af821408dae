use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::{SubjectId, UserAccount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tipo: String,
    pub nome: String,
    pub exp: i64,
}

impl Claims {
    pub fn subject_id(&self) -> Option<SubjectId> {
        self.sub.parse().ok()
    }
}

/// Signs and checks HS256 access tokens with a fixed lifetime.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn issue(&self, account: &UserAccount) -> anyhow::Result<String> {
        let exp = i64::try_from(self.lifetime.as_secs())
            .ok()
            .and_then(|lifetime| Utc::now().timestamp().checked_add(lifetime))
            .context("token lifetime out of range")?;

        let claims = Claims {
            sub: account.id.to_string(),
            tipo: account.role.as_str().to_string(),
            nome: account.name.clone(),
            exp,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn decode(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}
