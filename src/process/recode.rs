use serde_json::{Map, Value};
use tracing::warn;

use crate::process::utils::as_text;
use crate::schema::domains::{
    corrected_source, PREDICTIVE_MARKER, PREDICTIVE_NOTE, PREDICTIVE_SOURCE,
};
use crate::schema::fields::{CUST_NOTES, CUST_SOURCE, CUST_STATUS, UTIL_NOTES, UTIL_SOURCE, UTIL_STATUS};
use crate::schema::{Side, Status};

/// Counts of values touched by [`recode_domains`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecodeStats {
    pub statuses: usize,
    pub sources: usize,
    pub unrecognized: usize,
}

impl std::ops::AddAssign for RecodeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.statuses += rhs.statuses;
        self.sources += rhs.sources;
        self.unrecognized += rhs.unrecognized;
    }
}

/// Bring status and source values of a unified record onto the target domains.
pub fn recode_domains(record: &mut Map<String, Value>) -> RecodeStats {
    let mut stats = RecodeStats::default();
    recode_status(record, UTIL_STATUS, Side::Utility, &mut stats);
    recode_status(record, CUST_STATUS, Side::Customer, &mut stats);
    recode_source(record, UTIL_SOURCE, UTIL_NOTES, Side::Utility, &mut stats);
    recode_source(record, CUST_SOURCE, CUST_NOTES, Side::Customer, &mut stats);
    stats
}

fn recode_status(record: &mut Map<String, Value>, field: &str, side: Side, stats: &mut RecodeStats) {
    let Some(value) = record.get_mut(field) else {
        return;
    };
    if value.is_null() {
        return;
    }
    match Status::resolve(value, side) {
        Some(status) => {
            let coded = Value::from(status.code());
            if *value != coded {
                *value = coded;
                stats.statuses += 1;
            }
        }
        None => {
            warn!(field, value = %value, "status outside the domain, clearing");
            *value = Value::Null;
            stats.unrecognized += 1;
        }
    }
}

/// Predictive sources become "Other" on both sides; spelling fixes are customer-side only.
fn recode_source(
    record: &mut Map<String, Value>,
    source: &str,
    notes: &str,
    side: Side,
    stats: &mut RecodeStats,
) {
    let Some(current) = as_text(record.get(source)).map(str::to_string) else {
        return;
    };

    if current.contains(PREDICTIVE_MARKER) {
        record.insert(source.to_string(), Value::from(PREDICTIVE_SOURCE));
        let note = match as_text(record.get(notes)) {
            Some(existing) => format!("{}; {}", existing, PREDICTIVE_NOTE),
            None => PREDICTIVE_NOTE.to_string(),
        };
        record.insert(notes.to_string(), Value::from(note));
        stats.sources += 1;
    } else if let Some(fixed) = corrected_source(&current).filter(|_| side == Side::Customer) {
        record.insert(source.to_string(), Value::from(fixed));
        stats.sources += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn recodes_status_labels() {
        let mut r = rec(json!({
            "utilstatus": "Non-Lead",
            "custstatus": "Galvanized Requiring Replacement"
        }));
        let stats = recode_domains(&mut r);
        assert_eq!(r["utilstatus"], json!(2));
        assert_eq!(r["custstatus"], json!(3));
        assert_eq!(stats.statuses, 2);
    }

    #[test]
    fn customer_only_labels_are_cleared_on_utility_side() {
        let mut r = rec(json!({
            "utilstatus": "Lead Status Unknown",
            "custstatus": "Lead Status Unknown"
        }));
        let stats = recode_domains(&mut r);
        assert!(r["utilstatus"].is_null());
        assert_eq!(r["custstatus"], json!(0));
        assert_eq!(stats.unrecognized, 1);
    }

    #[test]
    fn existing_codes_are_left_alone() {
        let mut r = rec(json!({"utilstatus": 1, "custstatus": null}));
        let stats = recode_domains(&mut r);
        assert_eq!(r["utilstatus"], json!(1));
        assert!(r["custstatus"].is_null());
        assert_eq!(stats, RecodeStats::default());
    }

    #[test]
    fn predictive_sources_become_other_with_a_note() {
        let mut r = rec(json!({
            "utilsource": "Predictive Modeling",
            "utilnotes": null,
            "custsource": "Statistical/Predictive analysis",
            "custnotes": "Checked 2023"
        }));
        recode_domains(&mut r);
        assert_eq!(r["utilsource"], json!("Other"));
        assert_eq!(r["utilnotes"], json!("Predictive Model"));
        assert_eq!(r["custsource"], json!("Other"));
        assert_eq!(r["custnotes"], json!("Checked 2023; Predictive Model"));
    }

    #[test]
    fn misspelled_customer_sources_are_corrected() {
        let mut r = rec(json!({
            "custsource": "Previous Materials Evaluation",
            "utilsource": "Service line diameter is > 2 inches"
        }));
        let stats = recode_domains(&mut r);
        assert_eq!(r["custsource"], json!("Previous materials evaluation"));
        assert_eq!(r["utilsource"], json!("Service line diameter is > 2 inches"));
        assert_eq!(stats.sources, 1);
        assert!(r.get("custnotes").is_none());
    }
}
