//! Whole-document JSON persistence shared by the history and user stores.
//!
//! Each store is a single pretty-printed UTF-8 JSON array. The array is kept
//! as raw values so elements this version cannot decode survive rewrites
//! untouched. Only a document that is not a JSON array at all reads as empty.
//! Writes replace the document through a sibling temp file so readers never
//! observe a torn write.

use std::{io::ErrorKind, path::Path};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

pub async fn load_document(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(items) => Ok(items),
        Err(e) => {
            warn!("Discarding malformed {}: {e}", path.display());
            Ok(Vec::new())
        }
    }
}

/// Decodes every element that fits `T`, skipping the rest.
pub fn decode_items<T: DeserializeOwned>(path: &Path, values: &[Value]) -> Vec<T> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match T::deserialize(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping entry {index} of {}: {e}", path.display());
                None
            }
        })
        .collect()
}

pub async fn load_list<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let values = load_document(path).await?;
    Ok(decode_items(path, &values))
}

pub fn to_value<T: Serialize>(item: &T) -> anyhow::Result<Value> {
    serde_json::to_value(item).context("failed to encode entry")
}

pub async fn save_document(path: &Path, values: &[Value]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let body = serde_json::to_string_pretty(values)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}
