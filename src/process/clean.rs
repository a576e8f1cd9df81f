use crate::process::utils::{clean_str, is_placeholder};
use serde_json::{Map, Value};

/// Null out placeholder values and trim the remaining text, in place.
/// Returns how many cells were nulled.
pub fn strip_placeholders(record: &mut Map<String, Value>) -> usize {
    let mut stripped = 0;
    for value in record.values_mut() {
        if is_placeholder(value) {
            *value = Value::Null;
            stripped += 1;
        } else if let Value::String(s) = value {
            let trimmed = clean_str(s);
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }
    stripped
}
