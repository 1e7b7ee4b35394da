//! `{{dot.path}}` message templates

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

use crate::flatten::FlatRecord;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-\[\]]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Substitute `{{path}}` placeholders from a flattened record
///
/// Unresolved placeholders render as `<path>`.
pub fn render(template: &str, data: &FlatRecord<'_>) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            let path = &caps[1];
            match data.get(path) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => format!("<{}>", path),
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use serde_json::json;

    #[test]
    fn test_render_resolved_and_unresolved() {
        let input = json!({"resource": {"name": "db-1"}, "cost": {"monthlyDelta": 600}});
        let flat = flatten(&input);

        assert_eq!(
            render("{{resource.name}} adds ${{cost.monthlyDelta}}/mo", &flat),
            "db-1 adds $600/mo"
        );
        assert_eq!(render("owner: {{ resource.owner }}", &flat), "owner: <resource.owner>");
        assert_eq!(render("no placeholders", &flat), "no placeholders");
    }

    #[test]
    fn test_render_non_scalar() {
        let input = json!({"ports": [22, 443]});
        let flat = flatten(&input);
        assert_eq!(render("ports {{ports}}", &flat), "ports [22,443]");
    }
}
