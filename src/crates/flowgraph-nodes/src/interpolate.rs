//! `{{a.b.c}}` prompt interpolation against the run context
//!
//! Placeholders resolve dotted paths into the context map. Missing paths
//! are left literal so a typo'd placeholder is visible in the rendered
//! prompt instead of silently vanishing. Strings render bare; objects and
//! arrays render as indented JSON.

use serde_json::{Map, Value};

/// Resolve a dotted path (`a.b.c`) into a context map.
pub fn resolve_path<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = context.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Structured values become indented JSON so prompts stay readable.
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Replace every `{{path}}` in `template` with its context value.
pub fn interpolate(template: &str, context: &Map<String, Value>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let path = after_open[..end].trim();
                match resolve_path(context, path) {
                    Some(value) => output.push_str(&render(value)),
                    // Unknown key: keep the placeholder literal.
                    None => {
                        output.push_str("{{");
                        output.push_str(&after_open[..end]);
                        output.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated opener, emit the remainder as-is.
                output.push_str(&rest[start..]);
                return output;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_simple_substitution() {
        let context = ctx(json!({"issueTitle": "Fix the parser"}));
        assert_eq!(
            interpolate("Title: {{issueTitle}}", &context),
            "Title: Fix the parser"
        );
    }

    #[test]
    fn test_dotted_path() {
        let context = ctx(json!({"analysisResult": {"summary": "small change"}}));
        assert_eq!(
            interpolate("{{analysisResult.summary}}", &context),
            "small change"
        );
    }

    #[test]
    fn test_missing_key_stays_literal() {
        let context = ctx(json!({}));
        assert_eq!(interpolate("hello {{nope.deep}}", &context), "hello {{nope.deep}}");
    }

    #[test]
    fn test_numbers_and_bools_render_bare() {
        let context = ctx(json!({"issueNumber": 42, "testsPassed": true}));
        assert_eq!(
            interpolate("#{{issueNumber}} passed={{testsPassed}}", &context),
            "#42 passed=true"
        );
    }

    #[test]
    fn test_objects_render_as_indented_json() {
        let context = ctx(json!({"task": {"id": "t1"}}));
        let out = interpolate("{{task}}", &context);
        assert!(out.contains("\n"));
        assert!(out.contains("\"id\": \"t1\""));
    }

    #[test]
    fn test_multiple_placeholders() {
        let context = ctx(json!({"a": "1", "b": "2"}));
        assert_eq!(interpolate("{{a}}-{{b}}-{{a}}", &context), "1-2-1");
    }

    #[test]
    fn test_unterminated_placeholder_kept() {
        let context = ctx(json!({"a": "1"}));
        assert_eq!(interpolate("x {{a", &context), "x {{a");
    }

    #[test]
    fn test_whitespace_in_placeholder_tolerated() {
        let context = ctx(json!({"a": "1"}));
        assert_eq!(interpolate("{{ a }}", &context), "1");
    }
}
