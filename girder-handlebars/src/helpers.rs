//! Helpers available to every view

use handlebars::{Handlebars, handlebars_helper};
use serde_json::Value;

handlebars_helper!(eq: |a: Json, b: Json| a == b);
handlebars_helper!(ne: |a: Json, b: Json| a != b);
handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(len: |v: Json| match v {
    Value::Array(items) => items.len(),
    Value::Object(map) => map.len(),
    Value::String(s) => s.chars().count(),
    _ => 0,
});
// Pretty JSON dump of a model, escaped like any other output
handlebars_helper!(json: |v: Json| serde_json::to_string_pretty(v).unwrap_or_default());
handlebars_helper!(default: |v: Json, fallback: Json| {
    if v.is_null() || v.as_str() == Some("") {
        fallback.clone()
    } else {
        v.clone()
    }
});

pub fn register_builtin_helpers(handlebars: &mut Handlebars<'_>) {
    handlebars.register_helper("eq", Box::new(eq));
    handlebars.register_helper("ne", Box::new(ne));
    handlebars.register_helper("upper", Box::new(upper));
    handlebars.register_helper("lower", Box::new(lower));
    handlebars.register_helper("len", Box::new(len));
    handlebars.register_helper("json", Box::new(json));
    handlebars.register_helper("default", Box::new(default));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: Value) -> String {
        let mut handlebars = Handlebars::new();
        register_builtin_helpers(&mut handlebars);
        handlebars.render_template(template, &data).unwrap()
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(render("{{#if (eq a 1)}}yes{{/if}}", json!({"a": 1})), "yes");
        assert_eq!(render("{{#if (ne a 1)}}yes{{else}}no{{/if}}", json!({"a": 1})), "no");
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(render("{{upper name}}", json!({"name": "girder"})), "GIRDER");
        assert_eq!(render("{{lower name}}", json!({"name": "GIRDER"})), "girder");
    }

    #[test]
    fn test_len() {
        assert_eq!(render("{{len items}}", json!({"items": [1, 2, 3]})), "3");
        assert_eq!(render("{{len name}}", json!({"name": "abc"})), "3");
    }

    #[test]
    fn test_default() {
        assert_eq!(render("{{default title \"none\"}}", json!({})), "none");
        assert_eq!(render("{{default title \"none\"}}", json!({"title": "t"})), "t");
    }

    #[test]
    fn test_json_is_escaped() {
        assert_eq!(render("{{json v}}", json!({"v": "<b>"})), "&quot;&lt;b&gt;&quot;");
    }
}
