// src/export/mod.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use regex::Regex;
use serde_json::{Map, Value};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    ops::RangeInclusive,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::process::{date_parser, ServiceLayer, ServiceLine};
use crate::schema::{column, FieldType, OBJECT_ID};
use crate::source::geojson::{Feature, FeatureCollection, Geometry};

pub const CHUNK_EXTENSION: &str = "geojson";

/// Inclusive object-id ranges of at most `size` ids covering `1..=max_id`.
pub fn id_ranges(max_id: u64, size: u64) -> Vec<RangeInclusive<u64>> {
    if size == 0 {
        return Vec::new();
    }
    (0..max_id)
        .step_by(size as usize)
        .map(|start| (start + 1)..=(start + size).min(max_id))
        .collect()
}

/// `<prefix>_<index>.geojson`
pub fn chunk_file_name(prefix: &str, index: usize) -> String {
    format!("{}_{}.{}", prefix, index, CHUNK_EXTENSION)
}

/// Matches `<prefix>_<index>.geojson`, capturing the index.
fn chunk_name_pattern(prefix: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"^{}_(\d+)\.{}$",
        regex::escape(prefix),
        CHUNK_EXTENSION
    ))
    .context("building chunk name pattern")
}

/// Glob matching every chunk file written for `prefix` under `dir`.
fn chunk_glob(dir: &Path, prefix: &str) -> String {
    format!(
        "{}/{}_*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(prefix),
        CHUNK_EXTENSION
    )
}

/// A GeoJSON chunk on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
}

/// Chunk files for `prefix` under `dir`, in increasing chunk order.
pub fn list_chunks(dir: &Path, prefix: &str) -> Result<Vec<ChunkFile>> {
    let name_re = chunk_name_pattern(prefix)?;

    let mut chunks = Vec::new();
    for entry in glob(&chunk_glob(dir, prefix)).context("invalid glob pattern for chunk files")? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read glob entry: {:?}", e);
                continue;
            }
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let index = name_re
            .captures(&name)
            .and_then(|c| c[1].parse::<usize>().ok());
        match index {
            Some(index) => chunks.push(ChunkFile { index, name, path }),
            None => debug!(file = %name, "not a chunk file, ignoring"),
        }
    }
    chunks.sort_by_key(|c| c.index);
    Ok(chunks)
}

/// GeoJSON form of a record: `OBJECTID` first, dates as ISO text.
pub fn to_feature(rec: &ServiceLine) -> Feature {
    let mut props = Map::with_capacity(rec.attributes.len() + 1);
    props.insert(OBJECT_ID.to_string(), Value::from(rec.object_id));
    for (name, value) in &rec.attributes {
        let is_date = column(name).map_or(false, |c| c.ty == FieldType::Date);
        let value = match value.as_i64() {
            Some(ms) if is_date => date_parser::format_millis(ms).map_or(Value::Null, Value::from),
            _ => value.clone(),
        };
        props.insert(name.clone(), value);
    }

    Feature {
        kind: Feature::TYPE.to_string(),
        id: Some(Value::from(rec.object_id)),
        geometry: rec.geometry.map(Geometry::point),
        properties: Some(props),
    }
}

/// Pretty-print a collection to `path` via a temporary file and rename.
fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path).with_context(|| format!("creating {:?}", tmp_path))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, collection)
            .with_context(|| format!("serializing {:?}", path))?;
        w.write_all(b"\n")?;
        w.flush()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    Ok(())
}

/// Delete chunk files left over from an earlier export. Other files sharing
/// the prefix, such as a merged layer, are left alone.
fn remove_stale_chunks(dir: &Path, prefix: &str) -> Result<usize> {
    let stale = list_chunks(dir, prefix)?;
    for chunk in &stale {
        fs::remove_file(&chunk.path).with_context(|| format!("removing stale {:?}", chunk.path))?;
    }
    Ok(stale.len())
}

/// Write the layer as `<prefix>_<n>.geojson` files of `chunk_size` object ids each.
/// Returns the written paths in chunk order.
#[tracing::instrument(level = "info", skip(layer), fields(rows = layer.len()))]
pub fn export_chunks(
    layer: &ServiceLayer,
    dir: &Path,
    prefix: &str,
    chunk_size: u64,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating GeoJSON directory {:?}", dir))?;
    let removed = remove_stale_chunks(dir, prefix)?;
    if removed > 0 {
        info!(removed, "removed stale chunk files");
    }

    let mut written = Vec::new();
    for (index, range) in id_ranges(layer.max_object_id(), chunk_size)
        .into_iter()
        .enumerate()
    {
        let index = index + 1;
        let features: Vec<Feature> = layer
            .records
            .iter()
            .filter(|r| range.contains(&r.object_id))
            .map(to_feature)
            .collect();
        if features.is_empty() {
            debug!(chunk = index, ?range, "no records in range, skipping");
            continue;
        }

        let path = dir.join(chunk_file_name(prefix, index));
        let rows = features.len();
        write_collection(&path, &FeatureCollection::new(features))?;
        debug!(chunk = index, rows, path = %path.display(), "wrote chunk");
        written.push(path);
    }

    info!(chunks = written.len(), dir = %dir.display(), "exported GeoJSON chunks");
    Ok(written)
}

/// Write the whole merged layer to a single GeoJSON file.
pub fn write_merged(layer: &ServiceLayer, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let features = layer.records.iter().map(to_feature).collect();
    write_collection(path, &FeatureCollection::new(features))?;
    info!(rows = layer.len(), path = %path.display(), "wrote merged layer");
    Ok(())
}
