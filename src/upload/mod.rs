// src/upload/mod.rs

pub mod esri;
pub mod portal;

use anyhow::{Context, Result};
use std::{collections::HashSet, fs, future::Future, path::Path, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::export::ChunkFile;
use crate::history::{fingerprint, History, UploadRecord};
use crate::source::geojson::FeatureCollection;
use esri::{to_esri_features, ApplyEditsResponse, EditResult, EsriFeature, Projection};
use portal::Portal;

/// Parse a chunk and fingerprint its bytes.
pub fn read_chunk(path: &Path) -> Result<(FeatureCollection, String)> {
    let bytes = fs::read(path).with_context(|| format!("reading chunk {:?}", path))?;
    let collection =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing chunk {:?}", path))?;
    Ok((collection, fingerprint(&bytes)))
}

/// Something that accepts `applyEdits` adds.
pub trait EditSink {
    fn apply_adds(&self, adds: &[EsriFeature]) -> impl Future<Output = Result<ApplyEditsResponse>>;
}

/// The hosted feature layer.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    pub portal: Portal,
    pub url: Url,
}

impl EditSink for FeatureLayer {
    async fn apply_adds(&self, adds: &[EsriFeature]) -> Result<ApplyEditsResponse> {
        self.portal.apply_adds(&self.url, adds).await
    }
}

/// Logs the payload instead of sending it; every add "succeeds".
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl EditSink for DryRun {
    async fn apply_adds(&self, adds: &[EsriFeature]) -> Result<ApplyEditsResponse> {
        let bytes = serde_json::to_vec(adds).context("serializing adds")?.len();
        info!(features = adds.len(), bytes, "dry run, not sending");
        Ok(ApplyEditsResponse {
            add_results: adds.iter().map(|_| EditResult::ok(None)).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub item_id: String,
    pub projection: Projection,
    pub delay: Duration,
    /// Re-send whole chunks regardless of the ledger.
    pub force: bool,
    /// Skip writing the ledger.
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub chunks: usize,
    pub skipped: usize,
    pub added: usize,
    pub failed: usize,
}

/// Send each chunk in order, pausing `opts.delay` between requests.
#[tracing::instrument(level = "info", skip_all, fields(item = %opts.item_id, chunks = chunks.len()))]
pub async fn upload_chunks<S: EditSink>(
    sink: &S,
    chunks: &[ChunkFile],
    history: &mut History,
    opts: &UploadOptions,
) -> Result<UploadSummary> {
    let mut summary = UploadSummary::default();
    let mut sent_any = false;

    for chunk in chunks {
        let (collection, fingerprint) = read_chunk(&chunk.path)?;
        let adds = to_esri_features(&collection, &opts.projection);

        // indices within the chunk that go out in this request
        let (indices, adds): (Vec<usize>, Vec<EsriFeature>) =
            match history.pending(&opts.item_id, &chunk.name, &fingerprint) {
                Some([]) if !opts.force => {
                    info!(chunk = %chunk.name, "already uploaded, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Some(pending) if !opts.force => {
                    info!(chunk = %chunk.name, features = pending.len(), "re-sending rejected features");
                    let keep: HashSet<usize> = pending.iter().copied().collect();
                    adds.into_iter()
                        .enumerate()
                        .filter(|(i, _)| keep.contains(i))
                        .unzip()
                }
                _ => adds.into_iter().enumerate().unzip(),
            };
        if adds.is_empty() {
            debug!(chunk = %chunk.name, "nothing to send");
            continue;
        }

        if sent_any && !opts.delay.is_zero() {
            sleep(opts.delay).await;
        }
        let resp = sink
            .apply_adds(&adds)
            .await
            .with_context(|| format!("uploading {}", chunk.name))?;
        sent_any = true;

        if let Some(first) = resp.add_results.first() {
            info!(chunk = %chunk.name, result = ?first, "first add result");
        }
        for (r, i) in resp.add_results.iter().zip(&indices).filter(|(r, _)| !r.success) {
            match &r.error {
                Some(e) => error!(chunk = %chunk.name, feature = *i, "add failed: {}", e),
                None => error!(chunk = %chunk.name, feature = *i, "add failed"),
            }
        }
        if resp.add_results.len() != adds.len() {
            warn!(
                chunk = %chunk.name,
                sent = adds.len(),
                results = resp.add_results.len(),
                "result count does not match features sent"
            );
        }

        let failed_features: Vec<usize> = resp
            .failed_positions(adds.len())
            .into_iter()
            .map(|pos| indices[pos])
            .collect();
        let (added, failed) = (adds.len() - failed_features.len(), failed_features.len());
        info!(chunk = %chunk.name, added, failed, "uploaded chunk");
        summary.chunks += 1;
        summary.added += added;
        summary.failed += failed;

        if !opts.dry_run {
            history.record(UploadRecord::new(
                &chunk.name,
                &opts.item_id,
                &fingerprint,
                added,
                failed_features,
            ))?;
        }
    }

    info!(
        chunks = summary.chunks,
        skipped = summary.skipped,
        added = summary.added,
        failed = summary.failed,
        "upload finished"
    );
    Ok(summary)
}
