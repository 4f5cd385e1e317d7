//! Applies configured [`config::HeaderRule`] transformations to outgoing
//! provider requests.
//!
//! Rules are applied in declaration order, provider-level rules first and
//! then model-level rules, so a model-level rule can override whatever a
//! provider-level rule already set.

use ascii::AsciiString;
use config::HeaderRule;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Builds the outgoing header map for a provider request: inbound headers
/// forwarded per `Forward` rules, static values from `Insert`, with `Remove`
/// and `RenameDuplicate` applied afterwards, across every rule set in order.
pub fn build_headers(inbound: &HeaderMap, rule_sets: &[&[HeaderRule]]) -> HeaderMap {
    let mut out = HeaderMap::new();

    for rules in rule_sets {
        for rule in *rules {
            apply_one(&mut out, inbound, rule);
        }
    }

    out
}

fn apply_one(out: &mut HeaderMap, inbound: &HeaderMap, rule: &HeaderRule) {
    match rule {
        HeaderRule::Forward(forward) => {
            let Some(name) = parse_name(&forward.name) else {
                return;
            };

            let value = inbound
                .get(&name)
                .cloned()
                .or_else(|| forward.default.as_deref().and_then(parse_value));

            let Some(value) = value else {
                return;
            };

            let target = forward
                .rename
                .as_deref()
                .and_then(parse_name)
                .unwrap_or(name);

            out.insert(target, value);
        }
        HeaderRule::Insert(insert) => {
            let (Some(name), Some(value)) = (parse_name(&insert.name), parse_value(&insert.value)) else {
                return;
            };

            out.insert(name, value);
        }
        HeaderRule::Remove(remove) => {
            if let Some(name) = parse_name(&remove.name) {
                out.remove(name);
            }
        }
        HeaderRule::RenameDuplicate(rename) => {
            let Some(name) = parse_name(&rename.name) else {
                return;
            };

            let Some(value) = out.get(&name).cloned() else {
                return;
            };

            if let Some(new_name) = parse_name(&rename.rename) {
                out.insert(new_name, value);
            }

            if !rename.duplicate {
                out.remove(&name);
            }
        }
    }
}

fn parse_name(name: &str) -> Option<HeaderName> {
    // Validate as ASCII first so a typo'd header name in configuration
    // produces a log-worthy `None` rather than a panic deep in `http`.
    AsciiString::from_ascii(name).ok()?;
    HeaderName::from_bytes(name.as_bytes()).ok()
}

fn parse_value(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn rules(toml: &str) -> Vec<HeaderRule> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            rules: Vec<HeaderRule>,
        }

        toml::from_str::<Wrapper>(toml).unwrap().rules
    }

    #[test]
    fn forwards_inbound_header() {
        let rules = rules(indoc! {r#"
            [[rules]]
            rule = "forward"
            name = "x-client-id"
        "#});

        let mut inbound = HeaderMap::new();
        inbound.insert("x-client-id", HeaderValue::from_static("abc"));

        let out = build_headers(&inbound, &[&rules]);
        assert_eq!(out.get("x-client-id").unwrap(), "abc");
    }

    #[test]
    fn forward_uses_default_when_absent() {
        let rules = rules(indoc! {r#"
            [[rules]]
            rule = "forward"
            name = "x-client-id"
            default = "anonymous"
        "#});

        let out = build_headers(&HeaderMap::new(), &[&rules]);
        assert_eq!(out.get("x-client-id").unwrap(), "anonymous");
    }

    #[test]
    fn insert_overwrites_forwarded_value() {
        let rules = rules(indoc! {r#"
            [[rules]]
            rule = "forward"
            name = "x-foo"

            [[rules]]
            rule = "insert"
            name = "x-foo"
            value = "static"
        "#});

        let mut inbound = HeaderMap::new();
        inbound.insert("x-foo", HeaderValue::from_static("from-client"));

        let out = build_headers(&inbound, &[&rules]);
        assert_eq!(out.get("x-foo").unwrap(), "static");
    }

    #[test]
    fn remove_drops_header() {
        let rules = rules(indoc! {r#"
            [[rules]]
            rule = "insert"
            name = "x-foo"
            value = "bar"

            [[rules]]
            rule = "remove"
            name = "x-foo"
        "#});

        let out = build_headers(&HeaderMap::new(), &[&rules]);
        assert!(out.get("x-foo").is_none());
    }

    #[test]
    fn rename_duplicate_keeps_original_when_requested() {
        let rules = rules(indoc! {r#"
            [[rules]]
            rule = "insert"
            name = "x-foo"
            value = "bar"

            [[rules]]
            rule = "rename_duplicate"
            name = "x-foo"
            rename = "x-bar"
            duplicate = true
        "#});

        let out = build_headers(&HeaderMap::new(), &[&rules]);
        assert_eq!(out.get("x-foo").unwrap(), "bar");
        assert_eq!(out.get("x-bar").unwrap(), "bar");
    }

    #[test]
    fn model_rules_apply_after_provider_rules() {
        let provider_rules = rules(indoc! {r#"
            [[rules]]
            rule = "insert"
            name = "x-foo"
            value = "provider"
        "#});

        let model_rules = rules(indoc! {r#"
            [[rules]]
            rule = "insert"
            name = "x-foo"
            value = "model"
        "#});

        let out = build_headers(&HeaderMap::new(), &[&provider_rules, &model_rules]);
        assert_eq!(out.get("x-foo").unwrap(), "model");
    }
}
