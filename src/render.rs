use serde_json::Value;

use crate::value::render_value;

/// Rendering seam to the host's template engine.
///
/// Implementations must tolerate arbitrary model shapes and never fail;
/// unknown paths render as the empty string. The core stays testable with
/// any implementation, including a closure over fixed strings.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, model: &Value) -> String;
}

/// Built-in renderer for `{{dotted.path}}` placeholders, enough for the bin
/// target and tests.
///
/// Path segments are object keys; `[2]`-style segments index into arrays
/// (negative indices count from the back), so `request.pathSegments.[1]`
/// works as expected. Text outside placeholders is copied verbatim, and a
/// template without placeholders renders to itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathRenderer;

impl TemplateRenderer for PathRenderer {
    fn render(&self, template: &str, model: &Value) -> String {
        let mut out = String::new();
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    if let Some(value) = lookup(model, after[..end].trim()) {
                        out.push_str(&render_value(value));
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated placeholder: keep the raw text.
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn lookup<'a>(model: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = model;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = if let Some(index) = parse_index(segment) {
            let entries = current.as_array()?;
            entries.get(crate::path::resolve_index(entries.len(), index)?)?
        } else {
            current.get(segment)?
        };
    }
    Some(current)
}

fn parse_index(segment: &str) -> Option<i64> {
    segment.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}
