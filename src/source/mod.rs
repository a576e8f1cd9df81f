// src/source/mod.rs

pub mod geojson;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

use crate::schema::SourceKind;
use geojson::{FeatureCollection, Point};

/// One feature of a source layer, before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub properties: Map<String, Value>,
    pub geometry: Option<Point>,
}

#[derive(Debug)]
pub struct SourceLayer {
    pub kind: SourceKind,
    pub rows: Vec<SourceRow>,
    /// Features dropped because their geometry was not a point.
    pub skipped: usize,
}

/// Read a GeoJSON `FeatureCollection` exported from one of the service layers.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display(), layer = kind.label()))]
pub fn load_layer<P: AsRef<Path>>(path: P, kind: SourceKind) -> Result<SourceLayer> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening source layer {:?}", path))?;
    let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing GeoJSON from {:?}", path))?;
    from_collection(collection, kind).with_context(|| format!("reading {:?}", path))
}

/// Convert an already-parsed collection into source rows.
pub fn from_collection(collection: FeatureCollection, kind: SourceKind) -> Result<SourceLayer> {
    if collection.kind != FeatureCollection::TYPE {
        bail!(
            "expected a {} but found type `{}`",
            FeatureCollection::TYPE,
            collection.kind
        );
    }

    let mut rows = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;

    for (idx, feature) in collection.features.into_iter().enumerate() {
        let geometry = match &feature.geometry {
            None => None,
            Some(g) => match g.as_point() {
                Some(p) => Some(p),
                None => {
                    warn!(feature = idx, geometry = %g.kind, "skipping non-point feature");
                    skipped += 1;
                    continue;
                }
            },
        };
        if geometry.is_none() {
            debug!(feature = idx, "feature has no geometry");
        }
        rows.push(SourceRow {
            properties: feature.properties.unwrap_or_default(),
            geometry,
        });
    }

    info!(rows = rows.len(), skipped, "loaded layer");
    Ok(SourceLayer {
        kind,
        rows,
        skipped,
    })
}
