// src/upload/esri.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::f64::consts::PI;
use std::fmt;
use tracing::warn;

use crate::process::date_parser;
use crate::schema::{column, FieldType, OBJECT_ID};
use crate::source::geojson::{FeatureCollection, Point};

/// WGS84 semi-major axis, the sphere radius used by Web Mercator.
const EARTH_RADIUS: f64 = 6_378_137.0;
/// Web Mercator is undefined past this latitude.
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

pub const WEB_MERCATOR: u32 = 3857;
pub const WEB_MERCATOR_ESRI: u32 = 102_100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    pub wkid: u32,
    pub latest_wkid: u32,
}

impl SpatialReference {
    pub fn new(wkid: u32) -> Self {
        Self {
            wkid,
            latest_wkid: wkid,
        }
    }

    pub fn is_web_mercator(&self) -> bool {
        matches!(self.wkid, WEB_MERCATOR | WEB_MERCATOR_ESRI)
    }
}

/// How chunk geometries are prepared for the service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Spatial reference stamped on every geometry.
    pub spatial_reference: SpatialReference,
    /// Project WGS84 lon/lat into Web Mercator; otherwise only relabel.
    pub reproject: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            spatial_reference: SpatialReference::new(WEB_MERCATOR),
            reproject: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EsriPoint {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

/// A feature as `applyEdits` expects it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EsriFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<EsriPoint>,
    pub attributes: Map<String, Value>,
}

/// Spherical Web Mercator forward projection of a lon/lat point.
pub fn web_mercator(p: Point) -> Point {
    let lat = p.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    Point {
        x: EARTH_RADIUS * p.x.to_radians(),
        y: EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln(),
    }
}

fn to_esri_point(p: Point, projection: &Projection) -> EsriPoint {
    let p = if projection.reproject {
        web_mercator(p)
    } else {
        p
    };
    EsriPoint {
        x: p.x,
        y: p.y,
        spatial_reference: projection.spatial_reference,
    }
}

/// Attributes for the service: `OBJECTID` is left for the server to assign and
/// ISO dates go back to epoch millis.
fn to_esri_attributes(props: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(props.len());
    for (name, value) in props {
        if name == OBJECT_ID {
            continue;
        }
        let is_date = column(name).map_or(false, |c| c.ty == FieldType::Date);
        let value = match value {
            Value::String(s) if is_date => match date_parser::parse_date_millis(s) {
                Some(ms) => Value::from(ms),
                None => {
                    warn!(field = %name, value = %s, "unreadable date in chunk, sending null");
                    Value::Null
                }
            },
            other => other.clone(),
        };
        out.insert(name.clone(), value);
    }
    out
}

/// Convert a GeoJSON chunk into `applyEdits` adds.
pub fn to_esri_features(collection: &FeatureCollection, projection: &Projection) -> Vec<EsriFeature> {
    collection
        .features
        .iter()
        .map(|f| EsriFeature {
            geometry: f
                .geometry
                .as_ref()
                .and_then(|g| g.as_point())
                .map(|p| to_esri_point(p, projection)),
            attributes: f
                .properties
                .as_ref()
                .map(to_esri_attributes)
                .unwrap_or_default(),
        })
        .collect()
}

/// Error object returned by the REST API, either top-level or per edit.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EsriError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

impl fmt::Display for EsriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .message
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or("no message");
        write!(f, "{} (code {})", text, self.code)?;
        if !self.details.is_empty() {
            write!(f, ": {}", self.details.join("; "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    #[serde(default)]
    pub object_id: Option<i64>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<EsriError>,
}

impl EditResult {
    pub fn ok(object_id: Option<i64>) -> Self {
        Self {
            object_id,
            success: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEditsResponse {
    #[serde(default)]
    pub add_results: Vec<EditResult>,
}

impl ApplyEditsResponse {
    /// Positions among `sent` adds without a successful result. Missing results count as failed.
    pub fn failed_positions(&self, sent: usize) -> Vec<usize> {
        (0..sent)
            .filter(|&i| !self.add_results.get(i).is_some_and(|r| r.success))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> FeatureCollection {
        serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 1,
                 "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                 "properties": {"OBJECTID": 1, "accountid": "A1", "notifydate": "2024-12-05T00:00:00", "utilstatus": 2}},
                {"type": "Feature", "id": 2, "geometry": null,
                 "properties": {"OBJECTID": 2, "accountid": "A2", "notifydate": null}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn web_mercator_known_points() {
        let origin = web_mercator(Point { x: 0.0, y: 0.0 });
        assert!(origin.x.abs() < 1e-9 && origin.y.abs() < 1e-9);

        let edge = web_mercator(Point { x: 180.0, y: 0.0 });
        assert!((edge.x - 20_037_508.342_789_244).abs() < 1e-6);

        // Tampa
        let tampa = web_mercator(Point { x: -82.4572, y: 27.9506 });
        assert!((tampa.x - -9_179_093.516).abs() < 0.01, "x = {}", tampa.x);
        assert!((tampa.y - 3_242_747.006).abs() < 0.01, "y = {}", tampa.y);

        let pole = web_mercator(Point { x: 0.0, y: 90.0 });
        assert!(pole.y.is_finite());
    }

    #[test]
    fn converts_features_for_apply_edits() {
        let adds = to_esri_features(&collection(), &Projection::default());
        assert_eq!(adds.len(), 2);

        let first = &adds[0];
        assert!(first.attributes.get("OBJECTID").is_none());
        assert_eq!(first.attributes["notifydate"], json!(1_733_356_800_000i64));
        assert_eq!(first.attributes["utilstatus"], json!(2));
        let geom = first.geometry.as_ref().unwrap();
        assert_eq!(geom.spatial_reference, SpatialReference::new(3857));

        assert!(adds[1].geometry.is_none());
        assert!(adds[1].attributes["notifydate"].is_null());

        let wire = serde_json::to_value(first).unwrap();
        assert_eq!(wire["geometry"]["spatialReference"], json!({"wkid": 3857, "latestWkid": 3857}));
        assert!(serde_json::to_value(&adds[1]).unwrap().get("geometry").is_none());
    }

    #[test]
    fn relabel_keeps_coordinates() {
        let projection = Projection {
            spatial_reference: SpatialReference::new(3857),
            reproject: false,
        };
        let fc: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature",
                          "geometry": {"type": "Point", "coordinates": [-82.5, 27.9]},
                          "properties": {}}]
        }))
        .unwrap();
        let adds = to_esri_features(&fc, &projection);
        let g = adds[0].geometry.as_ref().unwrap();
        assert_eq!((g.x, g.y), (-82.5, 27.9));
    }

    #[test]
    fn parses_edit_results() {
        let resp: ApplyEditsResponse = serde_json::from_value(json!({
            "addResults": [
                {"objectId": 10, "success": true},
                {"objectId": -1, "success": false,
                 "error": {"code": 1000, "description": "String or binary data would be truncated."}}
            ],
            "updateResults": [],
            "deleteResults": []
        }))
        .unwrap();
        assert_eq!(resp.failed_positions(2), vec![1]);
        // a short result list leaves the tail unaccounted for
        assert_eq!(resp.failed_positions(3), vec![1, 2]);
        let err = resp.add_results[1].error.as_ref().unwrap();
        assert_eq!(
            err.to_string(),
            "String or binary data would be truncated. (code 1000)"
        );
    }
}
