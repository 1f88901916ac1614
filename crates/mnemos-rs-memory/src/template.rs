//! Placeholder extraction and substitution for prompt templates.
//!
//! Placeholders have the form `{{identifier}}` where `identifier` matches
//! `[a-zA-Z_]+`. Filling never fails: missing or unusable values degrade to a
//! visible marker so the prompt sent downstream never carries raw template
//! syntax.

use log::{debug, warn};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder filled from the run id argument.
pub const RUN_ID_VARIABLE: &str = "run_id";

const PLACEHOLDER_PATTERN: &str = r"\{\{([a-zA-Z_]+)\}\}";

fn placeholder_regex() -> Option<Regex> {
    Regex::new(PLACEHOLDER_PATTERN).ok()
}

/// Distinct placeholder names referenced by a template.
pub fn extract_variables(template: &str) -> BTreeSet<String> {
    let Some(regex) = placeholder_regex() else {
        return BTreeSet::new();
    };
    regex
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_string()))
        .collect()
}

/// Substitute variables into a template.
///
/// `run_id`, when given, fills `{{run_id}}` regardless of `variables`. Any
/// placeholder left afterwards (including ones carried in by substituted
/// values) becomes `[No data for <name>]`.
pub fn fill(template: &str, variables: &BTreeMap<String, Value>, run_id: Option<&str>) -> String {
    let Some(regex) = placeholder_regex() else {
        return template.to_string();
    };
    let mut missing = 0usize;
    let filled = regex.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        if name == RUN_ID_VARIABLE
            && let Some(run_id) = run_id
        {
            return run_id.to_string();
        }
        match variables.get(name) {
            Some(value) => render_value(name, value),
            None => {
                missing += 1;
                missing_marker(name)
            }
        }
    });
    // Values may themselves contain placeholder syntax.
    let filled = regex
        .replace_all(&filled, |caps: &Captures<'_>| missing_marker(&caps[1]))
        .into_owned();
    if missing > 0 {
        debug!("template filled with missing variables (missing={missing})");
    }
    filled
}

/// Render a single variable value for substitution.
pub fn render_value(name: &str, value: &Value) -> String {
    match value {
        Value::Null => format!("No {name} data available"),
        Value::Object(_) | Value::Array(_) => match serde_json::to_string_pretty(value) {
            Ok(text) => text,
            Err(err) => {
                warn!("failed to serialize template value (name={name}, error={err})");
                format!("Error: could not process {name} data")
            }
        },
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn missing_marker(name: &str) -> String {
    format!("[No data for {name}]")
}

#[cfg(test)]
mod tests {
    use super::{extract_variables, fill, render_value};
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use serde_json::{Value, json};
    use std::collections::{BTreeMap, BTreeSet};

    fn vars(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn has_placeholder(text: &str) -> bool {
        Regex::new(r"\{\{[a-zA-Z_]+\}\}")
            .expect("regex")
            .is_match(text)
    }

    #[test]
    fn extract_returns_distinct_names() {
        let names = extract_variables("Hi {{name}}, id={{run_id}} and again {{name}}");
        let expected: BTreeSet<String> = ["name", "run_id"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn extract_ignores_malformed_placeholders() {
        let names = extract_variables("{{a1}} {{ b }} {{c-d}} {{}} {single} {{ok}}");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["ok".to_string()]);
    }

    #[test]
    fn fill_null_value_uses_unavailable_text() {
        let filled = fill("Value: {{x}}", &vars(&[("x", Value::Null)]), None);
        assert_eq!(filled, "Value: No x data available");
    }

    #[test]
    fn fill_replaces_every_occurrence() {
        let template = "{{who}} and {{who}} met {{who}}";
        let filled = fill(template, &vars(&[("who", json!("Ada"))]), None);
        assert_eq!(filled, "Ada and Ada met Ada");
    }

    #[test]
    fn fill_pretty_prints_structured_values() {
        let profile = json!({ "name": "Ada", "langs": ["en", "fr"] });
        let filled = fill("Profile:\n{{profile}}", &vars(&[("profile", profile.clone())]), None);
        let expected = format!(
            "Profile:\n{}",
            serde_json::to_string_pretty(&profile).expect("json")
        );
        assert_eq!(filled, expected);
    }

    #[test]
    fn fill_renders_scalars_naturally() {
        let filled = fill(
            "{{count}} {{enabled}} {{ratio}}",
            &vars(&[
                ("count", json!(3)),
                ("enabled", json!(true)),
                ("ratio", json!(0.5)),
            ]),
            None,
        );
        assert_eq!(filled, "3 true 0.5");
    }

    #[test]
    fn fill_uses_run_id_argument() {
        let filled = fill(
            "run={{run_id}}",
            &vars(&[("run_id", json!("from-vars"))]),
            Some("run-42"),
        );
        assert_eq!(filled, "run=run-42");

        let filled = fill("run={{run_id}}", &BTreeMap::new(), None);
        assert_eq!(filled, "run=[No data for run_id]");
    }

    #[test]
    fn fill_marks_missing_variables() {
        let filled = fill("{{known}} / {{unknown}}", &vars(&[("known", json!("k"))]), None);
        assert_eq!(filled, "k / [No data for unknown]");
    }

    #[test]
    fn fill_leaves_malformed_placeholders() {
        let filled = fill("{{a1}} {{ok}}", &vars(&[("ok", json!("yes"))]), None);
        assert_eq!(filled, "{{a1}} yes");
    }

    #[test]
    fn fill_never_emits_placeholders_from_values() {
        let filled = fill(
            "{{inner}}",
            &vars(&[("inner", json!("nested {{other}} and {{{{deep}}}}"))]),
            None,
        );
        assert!(!has_placeholder(&filled));
        assert_eq!(filled, "nested [No data for other] and {{[No data for deep]}}");
    }

    #[test]
    fn fill_output_has_no_placeholders_for_mixed_inputs() {
        let templates = [
            "",
            "plain",
            "{{a}}{{b}}{{c}}",
            "{{{{a}}}}",
            "{{run_id}} {{x}} {{ y }}",
        ];
        let variables = vars(&[("a", json!("{{b}}")), ("b", Value::Null), ("x", json!([1, 2]))]);
        for template in templates {
            for run_id in [None, Some("r")] {
                let filled = fill(template, &variables, run_id);
                assert!(!has_placeholder(&filled), "{template:?} -> {filled:?}");
            }
        }
    }

    #[test]
    fn render_string_has_no_quotes() {
        assert_eq!(render_value("n", &json!("text")), "text");
    }
}
