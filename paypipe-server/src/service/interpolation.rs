//! Placeholder interpolation
//!
//! Request templates and output templates reference run variables with
//! `{{name}}`. Every occurrence in every string of a template is replaced by
//! the JSON serialization of the named variable. Strings included, so a
//! string variable arrives quoted. Unknown names are left untouched.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Variables available to templates during one run
pub type Variables = HashMap<String, JsonValue>;

/// Interpolates placeholders in a single string
pub fn interpolate_str(template: &str, variables: &Variables) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => serde_json::to_string(value).unwrap_or_default(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolates placeholders in every string of a JSON value
///
/// Object keys are left as they are; only string values are rewritten.
pub fn interpolate(template: &JsonValue, variables: &Variables) -> JsonValue {
    match template {
        JsonValue::String(s) => JsonValue::String(interpolate_str(s, variables)),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|v| interpolate(v, variables)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, JsonValue)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_last_result_is_serialized_into_input() {
        let template = json!({ "query": "q", "input": "{{lastResult}}" });
        let variables = vars(&[("lastResult", json!({ "price": 100 }))]);

        let out = interpolate(&template, &variables);
        assert_eq!(out, json!({ "query": "q", "input": "{\"price\":100}" }));
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let variables = vars(&[("step1", json!(1))]);
        assert_eq!(
            interpolate_str("a {{missing}} b {{step1}}", &variables),
            "a {{missing}} b 1"
        );
    }

    #[test]
    fn test_string_values_are_quoted() {
        let variables = vars(&[("name", json!("Ada"))]);
        assert_eq!(interpolate_str("hi {{name}}", &variables), "hi \"Ada\"");
    }

    #[test]
    fn test_nested_values_and_repeats() {
        let template = json!({
            "items": ["{{step1}}", 3, null, { "deep": "{{ step1 }}-{{step1}}" }],
            "{{step1}}": true
        });
        let variables = vars(&[("step1", json!([1, 2]))]);

        let out = interpolate(&template, &variables);
        assert_eq!(out["items"][0], "[1,2]");
        assert_eq!(out["items"][1], 3);
        assert_eq!(out["items"][3]["deep"], "[1,2]-[1,2]");
        assert_eq!(out["{{step1}}"], true);
    }
}
