// src/history/mod.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::warn;

pub const LEDGER_FILE: &str = "uploads.jsonl";

/// Hex SHA-256 of a chunk file's bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// One upload attempt of a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadRecord {
    pub chunk: String,
    pub item_id: String,
    /// Fingerprint of the chunk contents that were sent.
    #[serde(default)]
    pub fingerprint: String,
    pub added: usize,
    pub failed: usize,
    /// Indices, within the chunk, of the features the service rejected.
    #[serde(default)]
    pub failed_features: Vec<usize>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(
        chunk: &str,
        item_id: &str,
        fingerprint: &str,
        added: usize,
        failed_features: Vec<usize>,
    ) -> Self {
        Self {
            chunk: chunk.to_string(),
            item_id: item_id.to_string(),
            fingerprint: fingerprint.to_string(),
            added,
            failed: failed_features.len(),
            failed_features,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
struct Progress {
    fingerprint: String,
    pending: Vec<usize>,
}

/// Append-only ledger of chunk uploads, one JSON object per line.
///
/// The latest record for an `(item_id, chunk)` pair wins. A record only
/// applies while the chunk file still has the fingerprint it was sent with,
/// so a rebuilt chunk under the same name is uploaded again.
#[derive(Debug)]
pub struct History {
    path: PathBuf,
    latest: HashMap<(String, String), Progress>,
}

impl History {
    /// Open the ledger under `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl AsRef<Path>) -> Result<Self> {
        let history_dir = history_dir.as_ref();
        fs::create_dir_all(history_dir)
            .with_context(|| format!("creating history directory {:?}", history_dir))?;
        let path = history_dir.join(LEDGER_FILE);

        let mut history = Self {
            path,
            latest: HashMap::new(),
        };
        if history.path.exists() {
            let file =
                File::open(&history.path).with_context(|| format!("opening {:?}", history.path))?;
            for (idx, line) in BufReader::new(file).lines().enumerate() {
                let line = line.with_context(|| format!("reading {:?}", history.path))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<UploadRecord>(&line) {
                    Ok(rec) => history.apply(rec),
                    Err(e) => warn!(line = idx + 1, "skipping corrupt ledger entry: {}", e),
                }
            }
        }

        Ok(history)
    }

    fn apply(&mut self, rec: UploadRecord) {
        self.latest.insert(
            (rec.item_id, rec.chunk),
            Progress {
                fingerprint: rec.fingerprint,
                pending: rec.failed_features,
            },
        );
    }

    /// Feature indices of `chunk` still waiting to be accepted by `item_id`.
    ///
    /// `None` when this exact chunk content was never sent; an empty slice when
    /// every feature is in.
    pub fn pending(&self, item_id: &str, chunk: &str, fingerprint: &str) -> Option<&[usize]> {
        self.latest
            .get(&(item_id.to_string(), chunk.to_string()))
            .filter(|p| !p.fingerprint.is_empty() && p.fingerprint == fingerprint)
            .map(|p| p.pending.as_slice())
    }

    pub fn record(&mut self, rec: UploadRecord) -> Result<()> {
        let mut line = serde_json::to_string(&rec).context("serializing upload record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {:?} for append", self.path))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {:?}", self.path))?;

        self.apply(rec);
        Ok(())
    }
}
