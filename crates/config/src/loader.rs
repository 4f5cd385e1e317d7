use std::{fmt::Write, path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::Config;

/// Loads and validates the gateway configuration from a TOML file.
///
/// `{{ env.VAR }}` placeholders anywhere in string values are expanded
/// against the process environment before deserialization.
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate_has_downstreams(&config)?;

    Ok(config)
}

pub(crate) fn validate_has_downstreams(config: &Config) -> anyhow::Result<()> {
    if !config.llm.enabled || !config.llm.has_providers() {
        bail!(indoc! {r#"
            No LLM providers configured. At least one provider is required to function.

            Example configuration:

              [llm.providers.openai]
              type = "openai"
              api_key = "{{ env.OPENAI_API_KEY }}"

              [llm.providers.openai.models.gpt-4o]
        "#});
    }

    if !config.llm.has_protocol_endpoints() {
        bail!(indoc! {r#"
            LLM providers are configured but no protocol endpoints are enabled. At least one protocol endpoint must be enabled.

            Both protocols are enabled by default. To explicitly enable them in configuration:

              [llm.protocols.openai]
              enabled = true
              path = "/llm/openai"

              [llm.protocols.anthropic]
              enabled = true
              path = "/llm/anthropic"
        "#});
    }

    if config.llm.protocols.openai.enabled
        && config.llm.protocols.anthropic.enabled
        && config.llm.protocols.openai.path == config.llm.protocols.anthropic.path
    {
        bail!(
            "Duplicate LLM protocol endpoint path: OpenAI and Anthropic protocols cannot use the same path ({})",
            config.llm.protocols.openai.path
        );
    }

    if config.llm.protocols.openai.enabled
        && config.llm.protocols.responses.enabled
        && config.llm.protocols.openai.path == config.llm.protocols.responses.path
    {
        bail!(
            "Duplicate LLM protocol endpoint path: OpenAI and Responses protocols cannot use the same path ({})",
            config.llm.protocols.openai.path
        );
    }

    if config.llm.protocols.anthropic.enabled
        && config.llm.protocols.responses.enabled
        && config.llm.protocols.anthropic.path == config.llm.protocols.responses.path
    {
        bail!(
            "Duplicate LLM protocol endpoint path: Anthropic and Responses protocols cannot use the same path ({})",
            config.llm.protocols.anthropic.path
        );
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn expands_env_placeholders() {
        // SAFETY: single-threaded test, no concurrent env access.
        unsafe { std::env::set_var("LOADER_TEST_KEY", "sk-secret") };

        let mut value: Value = toml::from_str(indoc! {r#"
            [llm.providers.openai]
            type = "openai"
            api_key = "{{ env.LOADER_TEST_KEY }}"
        "#})
        .unwrap();

        expand_dynamic_strings(&mut Vec::new(), &mut value).unwrap();

        let api_key = value["llm"]["providers"]["openai"]["api_key"].as_str().unwrap();
        assert_eq!(api_key, "sk-secret");

        // SAFETY: single-threaded test, no concurrent env access.
        unsafe { std::env::remove_var("LOADER_TEST_KEY") };
    }

    #[test]
    fn rejects_missing_env_var() {
        let mut value: Value = toml::from_str(indoc! {r#"
            [llm.providers.openai]
            type = "openai"
            api_key = "{{ env.LOADER_TEST_DOES_NOT_EXIST }}"
        "#})
        .unwrap();

        let result = expand_dynamic_strings(&mut Vec::new(), &mut value);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_downstreams() {
        let config: Config = toml::from_str("").unwrap();
        let result = validate_has_downstreams(&config);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_protocol_paths() {
        let config: Config = toml::from_str(indoc! {r#"
            [llm.providers.openai]
            type = "openai"
            api_key = "sk-test"

            [llm.providers.openai.models.gpt-4o]

            [llm.protocols.anthropic]
            enabled = true
            path = "/llm/openai"
        "#})
        .unwrap();

        let result = validate_has_downstreams(&config);
        assert!(result.is_err());
    }
}
