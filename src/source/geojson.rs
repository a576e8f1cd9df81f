// src/source/geojson.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A GeoJSON `FeatureCollection` as exported from a feature layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub const TYPE: &'static str = "FeatureCollection";

    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: Self::TYPE.to_string(),
            features,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub const TYPE: &'static str = "Feature";
}

/// Geometry object. Only points are meaningful here; other kinds are kept
/// opaque so callers can report and skip them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
}

/// A 2D point, `x` = longitude / easting, `y` = latitude / northing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Geometry {
    pub fn point(p: Point) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: Value::from(vec![p.x, p.y]),
        }
    }

    /// `Some` when this is a `Point` with at least two numeric coordinates.
    pub fn as_point(&self) -> Option<Point> {
        if self.kind != "Point" {
            return None;
        }
        let coords = self.coordinates.as_array()?;
        let x = coords.first()?.as_f64()?;
        let y = coords.get(1)?.as_f64()?;
        Some(Point { x, y })
    }
}
