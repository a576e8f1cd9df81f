use serde_json::Value;

/// Markers spreadsheet exports leave behind in otherwise empty cells.
const PLACEHOLDERS: &[&str] = &["", "0", "#REF!"];

/// Trim surrounding whitespace.
pub fn clean_str(raw: &str) -> &str {
    raw.trim()
}

/// True for values that mean "no data": `0`, `"0"`, blank text, `#REF!`,
/// or any text mentioning `Null`.
pub fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => {
            let s = clean_str(s);
            PLACEHOLDERS.contains(&s) || s.contains("Null")
        }
        _ => false,
    }
}

/// Non-empty text content of a value, if it has any.
pub fn as_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(clean_str)
        .filter(|s| !s.is_empty())
}
