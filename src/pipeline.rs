// src/pipeline.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::export::{export_chunks, list_chunks, write_merged};
use crate::history::History;
use crate::process::{build_services, BuildReport};
use crate::source::load_layer;
use crate::upload::{
    portal::Portal, upload_chunks, DryRun, FeatureLayer, UploadOptions, UploadSummary,
};

#[derive(Debug)]
pub struct BuildOutcome {
    pub report: BuildReport,
    pub chunks: Vec<PathBuf>,
}

/// Load the three layers, merge them and write the GeoJSON chunks.
pub fn build(cfg: &Config) -> Result<BuildOutcome> {
    let start = Instant::now();
    let sources = cfg.sources()?;

    let layers = sources
        .layers()
        .into_iter()
        .map(|(kind, path)| load_layer(path, kind))
        .collect::<Result<Vec<_>>>()?;

    let (merged, report) = build_services(&layers);

    if let Some(path) = &cfg.output.merged {
        write_merged(&merged, path)?;
    }
    let chunks = export_chunks(
        &merged,
        &cfg.output.geojson_dir,
        &cfg.output.prefix,
        cfg.output.chunk_size,
    )?;

    info!(
        records = merged.len(),
        chunks = chunks.len(),
        elapsed = ?start.elapsed(),
        "build complete"
    );
    Ok(BuildOutcome { report, chunks })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadFlags {
    pub dry_run: bool,
    pub force: bool,
}

/// Send the exported chunks to the configured feature service.
pub async fn upload(cfg: &Config, flags: UploadFlags) -> Result<UploadSummary> {
    let start = Instant::now();
    let item_id = cfg.service.item_id()?.to_string();

    let chunks = list_chunks(&cfg.output.geojson_dir, &cfg.output.prefix)?;
    info!(
        chunks = chunks.len(),
        dir = %cfg.output.geojson_dir.display(),
        "found GeoJSON chunks"
    );
    if chunks.is_empty() {
        info!("nothing to upload");
        return Ok(UploadSummary::default());
    }

    let mut history = History::new(&cfg.history_dir)?;
    let opts = UploadOptions {
        item_id,
        projection: cfg.service.projection(),
        delay: cfg.service.delay(),
        force: flags.force,
        dry_run: flags.dry_run,
    };

    let summary = if flags.dry_run {
        upload_chunks(&DryRun, &chunks, &mut history, &opts).await?
    } else {
        let client = Client::builder()
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        let portal = Portal::connect(client, &cfg.service).await?;
        let url = portal.layer_url(&opts.item_id, cfg.service.layer).await?;
        let layer = FeatureLayer { portal, url };
        upload_chunks(&layer, &chunks, &mut history, &opts).await?
    };

    info!(elapsed = ?start.elapsed(), "upload complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, ServiceConfig, SourcesConfig};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn write_layer(path: &std::path::Path, features: serde_json::Value) -> Result<()> {
        fs::write(
            path,
            json!({"type": "FeatureCollection", "features": features}).to_string(),
        )?;
        Ok(())
    }

    fn point_feature(props: serde_json::Value) -> serde_json::Value {
        json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [-82.46, 27.95]},
               "properties": props})
    }

    #[tokio::test]
    async fn build_then_dry_run_upload() -> Result<()> {
        let dir = tempdir()?;
        let apt = dir.path().join("apt.geojson");
        let mh = dir.path().join("mh.geojson");
        let school = dir.path().join("school.geojson");
        write_layer(
            &apt,
            json!((1..=3)
                .map(|i| point_feature(json!({"Account_ID": format!("A{}", i), "Address": "1 Main St",
                                              "Utility_Status": "Non-Lead"})))
                .collect::<Vec<_>>()),
        )?;
        write_layer(
            &mh,
            json!([point_feature(json!({"Account_ID": "M1", "Address_1": "Lot 4",
                                        "Customer_Diameter": "1.0"}))]),
        )?;
        write_layer(&school, json!([]))?;

        let cfg = Config {
            sources: Some(SourcesConfig {
                apartments: apt,
                mobile_homes: mh,
                schools: school,
            }),
            output: OutputConfig {
                geojson_dir: dir.path().join("geojson"),
                chunk_size: 3,
                merged: Some(dir.path().join("merged.geojson")),
                ..OutputConfig::default()
            },
            service: ServiceConfig {
                item_id: Some("item".into()),
                delay_secs: 0.0,
                ..ServiceConfig::default()
            },
            history_dir: dir.path().join("history"),
        };

        let outcome = build(&cfg)?;
        assert_eq!(outcome.chunks.len(), 2);
        assert_eq!(outcome.report.rows["apartments"], 3);
        assert_eq!(outcome.report.rows["mobile_homes"], 1);
        assert!(dir.path().join("merged.geojson").exists());

        let summary = upload(
            &cfg,
            UploadFlags {
                dry_run: true,
                force: false,
            },
        )
        .await?;
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.added, 4);
        assert_eq!(summary.failed, 0);
        Ok(())
    }

    #[test]
    fn build_without_sources_fails() {
        let cfg = Config::from_yaml("{}").unwrap();
        assert!(build(&cfg).is_err());
    }
}
