// src/schema/domains.rs

use serde_json::Value;

/// Which half of the service line a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Utility,
    Customer,
}

/// Service-line material status domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unknown = 0,
    Lead = 1,
    NonLead = 2,
    GalvanizedRequiringReplacement = 3,
}

impl Status {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::Unknown),
            1 => Some(Status::Lead),
            2 => Some(Status::NonLead),
            3 => Some(Status::GalvanizedRequiringReplacement),
            _ => None,
        }
    }

    /// Map a legacy label to a domain value. Customer-side labels are a superset.
    pub fn from_label(label: &str, side: Side) -> Option<Self> {
        match (label.trim(), side) {
            ("Non-Lead", _) => Some(Status::NonLead),
            ("Unknown", _) => Some(Status::Unknown),
            ("Lead", _) => Some(Status::Lead),
            ("Lead Status Unknown", Side::Customer) => Some(Status::Unknown),
            ("Galvanized Requiring Replacement", Side::Customer) => {
                Some(Status::GalvanizedRequiringReplacement)
            }
            _ => None,
        }
    }

    /// Resolve a raw attribute value: a code, a numeric string or a label.
    pub fn resolve(value: &Value, side: Side) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(Self::from_code),
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(code) => Self::from_code(code),
                Err(_) => Self::from_label(s, side),
            },
            _ => None,
        }
    }
}

/// Source-of-information values that do not exist in the target domain.
static SOURCE_CORRECTIONS: &[(&str, &str)] = &[
    (
        "Previous Materials Evaluation",
        "Previous materials evaluation",
    ),
    (
        "Service line diameter is > 2 inches",
        "Service line diameter is greater than 2 inches",
    ),
];

pub const PREDICTIVE_MARKER: &str = "Predictive";
pub const PREDICTIVE_SOURCE: &str = "Other";
pub const PREDICTIVE_NOTE: &str = "Predictive Model";

/// Corrected spelling for a source value, if it needs one.
pub fn corrected_source(value: &str) -> Option<&'static str> {
    SOURCE_CORRECTIONS
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| *to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_map_per_side() {
        assert_eq!(
            Status::from_label("Non-Lead", Side::Utility),
            Some(Status::NonLead)
        );
        assert_eq!(
            Status::from_label("Lead Status Unknown", Side::Customer),
            Some(Status::Unknown)
        );
        assert_eq!(Status::from_label("Lead Status Unknown", Side::Utility), None);
        assert_eq!(
            Status::from_label("Galvanized Requiring Replacement", Side::Customer)
                .map(Status::code),
            Some(3)
        );
    }

    #[test]
    fn resolve_accepts_codes_and_numeric_strings() {
        assert_eq!(Status::resolve(&json!(2), Side::Utility), Some(Status::NonLead));
        assert_eq!(Status::resolve(&json!(1.0), Side::Utility), Some(Status::Lead));
        assert_eq!(Status::resolve(&json!("0"), Side::Customer), Some(Status::Unknown));
        assert_eq!(Status::resolve(&json!(7), Side::Customer), None);
        assert_eq!(Status::resolve(&json!("Copper"), Side::Customer), None);
        assert_eq!(Status::resolve(&Value::Null, Side::Customer), None);
    }

    #[test]
    fn source_corrections() {
        assert_eq!(
            corrected_source("Service line diameter is > 2 inches"),
            Some("Service line diameter is greater than 2 inches")
        );
        assert_eq!(corrected_source("Other"), None);
    }
}
