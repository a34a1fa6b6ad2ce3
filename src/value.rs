use serde_json::Value;

/// Render a stored value the way it appears inside a response template:
/// strings render without quotes, everything else as compact JSON.
/// An explicit `null` renders as the literal `null` so that a downstream
/// template can distinguish it from a missing value.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whitespace-only strings count as blank everywhere a context name or
/// template is validated.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
