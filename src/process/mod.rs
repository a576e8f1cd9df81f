// src/process/mod.rs
pub mod clean;
pub mod convert;
pub mod date_parser;
pub mod recode;
pub mod utils;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::schema::fields::{CUST_STATUS, UTIL_STATUS};
use crate::schema::{SourceKind, Status};
use crate::source::{geojson::Point, SourceLayer, SourceRow};
use convert::{convert_to_final_types, ConvertStats};
use recode::{recode_domains, RecodeStats};

/// A record of the unified service-line class.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLine {
    /// Sequential id assigned on append, starting at 1.
    pub object_id: u64,
    pub source: SourceKind,
    /// Every unified field, in schema order. Dates are epoch millis.
    pub attributes: Map<String, Value>,
    pub geometry: Option<Point>,
}

/// The merged building-services collection.
#[derive(Debug, Default, Clone)]
pub struct ServiceLayer {
    pub records: Vec<ServiceLine>,
}

impl ServiceLayer {
    pub fn max_object_id(&self) -> u64 {
        self.records.iter().map(|r| r.object_id).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one processed row, assigning the next object id.
    fn append(&mut self, source: SourceKind, attributes: Map<String, Value>, geometry: Option<Point>) {
        let object_id = self.records.len() as u64 + 1;
        self.records.push(ServiceLine {
            object_id,
            source,
            attributes,
            geometry,
        });
    }
}

/// What the build pass did, for logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub rows: BTreeMap<&'static str, usize>,
    pub skipped_geometries: usize,
    pub stripped: usize,
    pub recoded: RecodeStats,
    pub converted: ConvertStats,
    pub backfilled: usize,
}

/// Rename the fields of a source row into the unified names.
pub fn remap(kind: SourceKind, properties: &Map<String, Value>) -> Map<String, Value> {
    kind.field_map()
        .map(|(src, dst)| {
            let v = properties.get(src).cloned().unwrap_or(Value::Null);
            (dst.to_string(), v)
        })
        .collect()
}

/// remap → strip placeholders → recode domains → final types.
pub fn process_row(kind: SourceKind, row: &SourceRow, report: &mut BuildReport) -> Map<String, Value> {
    let mut record = remap(kind, &row.properties);
    report.stripped += clean::strip_placeholders(&mut record);
    report.recoded += recode_domains(&mut record);
    let (typed, stats) = convert_to_final_types(&record);
    report.converted += stats;
    typed
}

/// Set every null status to `Unknown`. Returns how many values were filled.
pub fn backfill_statuses(layer: &mut ServiceLayer) -> usize {
    let unknown = Value::from(Status::Unknown.code());
    let mut filled = 0;
    for rec in &mut layer.records {
        for field in [UTIL_STATUS, CUST_STATUS] {
            let slot = rec.attributes.entry(field).or_insert(Value::Null);
            if slot.is_null() {
                *slot = unknown.clone();
                filled += 1;
            }
        }
    }
    filled
}

/// Merge the source layers (in the given order) into one service layer.
#[tracing::instrument(level = "info", skip_all)]
pub fn build_services(layers: &[SourceLayer]) -> (ServiceLayer, BuildReport) {
    let mut out = ServiceLayer::default();
    let mut report = BuildReport::default();

    for layer in layers {
        for row in &layer.rows {
            let attrs = process_row(layer.kind, row, &mut report);
            out.append(layer.kind, attrs, row.geometry);
        }
        *report.rows.entry(layer.kind.label()).or_default() += layer.rows.len();
        report.skipped_geometries += layer.skipped;
        info!(layer = layer.kind.label(), rows = layer.rows.len(), "finished layer");
    }

    report.backfilled = backfill_statuses(&mut out);
    debug!(?report, "build report");
    info!(
        total = out.len(),
        stripped = report.stripped,
        statuses_recoded = report.recoded.statuses,
        sources_recoded = report.recoded.sources,
        conversion_failures = report.converted.failures,
        backfilled = report.backfilled,
        "built building services"
    );
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(props: Value, geometry: Option<Point>) -> SourceRow {
        SourceRow {
            properties: props.as_object().cloned().unwrap(),
            geometry,
        }
    }

    fn layer(kind: SourceKind, rows: Vec<SourceRow>) -> SourceLayer {
        SourceLayer {
            kind,
            rows,
            skipped: 0,
        }
    }

    #[test]
    fn remap_uses_the_layer_address_field() {
        let props = json!({"Account_ID": "9", "Address": "1 Main St", "Address_1": "2 Elm St"});
        let props = props.as_object().unwrap();
        assert_eq!(remap(SourceKind::Apartment, props)["address"], json!("1 Main St"));
        assert_eq!(remap(SourceKind::School, props)["address"], json!("2 Elm St"));
    }

    #[test]
    fn builds_merged_layer_in_append_order() {
        let p = Point { x: -82.46, y: 27.95 };
        let layers = vec![
            layer(
                SourceKind::Apartment,
                vec![row(
                    json!({"Account_ID": "A1", "Address": "1 Main St", "Utility_Status": "Non-Lead",
                           "Customer_Status": "Unknown", "Utility_Diameter": 0}),
                    Some(p),
                )],
            ),
            layer(
                SourceKind::MobileHome,
                vec![row(
                    json!({"Account_ID": "M1", "Address_1": "Lot 4", "Utility_Diameter": "0.75",
                           "Customer_Status": "Galvanized Requiring Replacement",
                           "Utility_Verification_Date": "2024-12-05"}),
                    None,
                )],
            ),
            layer(
                SourceKind::School,
                vec![row(
                    json!({"Account_ID": "S1", "Address_1": "100 School Rd",
                           "Utility_Status": "<Null>", "Customer_Source": "Predictive Model v2"}),
                    Some(p),
                )],
            ),
        ];

        let (merged, report) = build_services(&layers);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.max_object_id(), 3);
        let ids: Vec<u64> = merged.records.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let apt = &merged.records[0].attributes;
        assert_eq!(apt["utilstatus"], json!(2));
        assert_eq!(apt["custstatus"], json!(0));
        assert!(apt["utildiameter"].is_null());

        let mh = &merged.records[1];
        assert_eq!(mh.source, SourceKind::MobileHome);
        assert_eq!(mh.attributes["address"], json!("Lot 4"));
        assert_eq!(mh.attributes["utildiameter"], json!(0.75));
        assert_eq!(mh.attributes["custstatus"], json!(3));
        assert_eq!(mh.attributes["utilstatus"], json!(0));
        assert_eq!(mh.attributes["utilverifdate"], json!(1_733_356_800_000i64));
        assert!(mh.geometry.is_none());

        let school = &merged.records[2].attributes;
        assert_eq!(school["utilstatus"], json!(0));
        assert_eq!(school["custsource"], json!("Other"));
        assert_eq!(school["custnotes"], json!("Predictive Model"));

        assert_eq!(report.rows["apartments"], 1);
        assert_eq!(report.rows["schools"], 1);
        // mobile home utility, school utility and school customer
        assert_eq!(report.backfilled, 3);
    }

    #[test]
    fn every_record_has_statuses_after_backfill() {
        let layers = vec![layer(
            SourceKind::Apartment,
            (0..5).map(|i| row(json!({"Account_ID": i.to_string()}), None)).collect(),
        )];
        let (merged, _) = build_services(&layers);
        for rec in &merged.records {
            assert!(!rec.attributes["utilstatus"].is_null());
            assert!(!rec.attributes["custstatus"].is_null());
        }
    }

    #[test]
    fn empty_input_gives_empty_layer() {
        let (merged, report) = build_services(&[]);
        assert!(merged.is_empty());
        assert_eq!(merged.max_object_id(), 0);
        assert_eq!(report.backfilled, 0);
    }
}
