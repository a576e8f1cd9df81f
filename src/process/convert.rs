use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::process::date_parser;
use crate::schema::{Column, FieldType, UNIFIED_FIELDS};

/// Counts of values changed by [`convert_to_final_types`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStats {
    /// Values that could not be read as their field type.
    pub failures: usize,
    /// Numeric values that came out as zero and were treated as missing.
    pub zeroed: usize,
}

impl std::ops::AddAssign for ConvertStats {
    fn add_assign(&mut self, rhs: Self) {
        self.failures += rhs.failures;
        self.zeroed += rhs.zeroed;
    }
}

enum Converted {
    Value(Value),
    Zero,
    Failed,
}

/// Convert a unified record into the final field types, in schema order.
/// Fields missing from `record` come out as null; extra keys are dropped.
pub fn convert_to_final_types(record: &Map<String, Value>) -> (Map<String, Value>, ConvertStats) {
    let mut out = Map::with_capacity(UNIFIED_FIELDS.len());
    let mut stats = ConvertStats::default();

    for col in UNIFIED_FIELDS {
        let raw = record.get(col.name).unwrap_or(&Value::Null);
        let value = match convert_value(col, raw) {
            Converted::Value(v) => v,
            Converted::Zero => {
                stats.zeroed += 1;
                Value::Null
            }
            Converted::Failed => {
                warn!(field = col.name, value = %raw, ty = ?col.ty, "cannot convert value, clearing");
                stats.failures += 1;
                Value::Null
            }
        };
        out.insert(col.name.to_string(), value);
    }

    (out, stats)
}

fn convert_value(col: &Column, raw: &Value) -> Converted {
    if raw.is_null() {
        return Converted::Value(Value::Null);
    }
    match col.ty {
        FieldType::Text => Converted::Value(Value::from(to_text(raw))),
        FieldType::Double => match to_f64(raw) {
            Some(f) if f == 0.0 => Converted::Zero,
            Some(f) => Number::from_f64(f).map_or(Converted::Failed, |n| Converted::Value(Value::Number(n))),
            None => Converted::Failed,
        },
        FieldType::Integer => match to_i64(raw) {
            Some(0) => Converted::Zero,
            Some(i) => Converted::Value(Value::from(i)),
            None => Converted::Failed,
        },
        // codes are settled by recoding; zero is a real domain value here
        FieldType::Coded => match to_i64(raw) {
            Some(i) => Converted::Value(Value::from(i)),
            None => Converted::Failed,
        },
        FieldType::Date => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map_or(Converted::Failed, |ms| Converted::Value(Value::from(ms))),
            Value::String(s) => date_parser::parse_date_millis(s)
                .map_or(Converted::Failed, |ms| Converted::Value(Value::from(ms))),
            _ => Converted::Failed,
        },
    }
}

fn to_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn to_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('"').trim().parse().ok(),
        _ => None,
    }
}

fn to_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        }
        _ => None,
    }
}
