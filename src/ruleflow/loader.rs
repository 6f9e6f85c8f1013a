//! Flow document loader
//!
//! Reads a [`FlowDefinition`] from JSON (`.json` files) or YAML (anything
//! else) and validates it before handing it out.

use std::fs;
use std::path::Path;

use super::types::FlowDefinition;
use crate::engine::error::Result;

/// Loads flow definitions from files
pub struct FlowLoader;

impl FlowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a flow definition from `path`
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<FlowDefinition> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let def = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse_yaml(&content)?
        };
        log::info!(
            "loaded flow definition '{}' with {} trigger(s) from {}",
            def.name,
            def.triggers.len(),
            path.display()
        );
        Ok(def)
    }

    pub fn parse_json(content: &str) -> Result<FlowDefinition> {
        let def: FlowDefinition = serde_json::from_str(content)?;
        def.validate()?;
        Ok(def)
    }

    pub fn parse_yaml(content: &str) -> Result<FlowDefinition> {
        let def: FlowDefinition = serde_yaml::from_str(content)?;
        def.validate()?;
        Ok(def)
    }
}

impl Default for FlowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::EngineError;

    const YAML: &str = r#"
name: signup
description: "Greets new users"
preConfig:
  - kind: setStore
    data:
      greeting: hello
triggers:
  - if:
      operand1: 1
      comparator: eq
      operand2: 1
      comparisonType: number
    trigger:
      id: 1
      name: greet
      startState: 1
      branches:
        1:
          rule: R1
          states: {}
      rules:
        R1:
          switch:
            default:
              do:
                - kind: sendRes
                  data:
                    responseCode: 0
              return: 0
"#;

    #[test]
    fn test_parse_yaml_definition() {
        let def = FlowLoader::parse_yaml(YAML).unwrap();
        assert_eq!(def.name, "signup");
        assert_eq!(def.pre_config.len(), 1);
        assert_eq!(def.triggers.len(), 1);

        let flow = &def.triggers[0].trigger;
        assert_eq!(flow.id, "1");
        assert_eq!(flow.branches[&1].rule, "R1");
        assert_eq!(flow.rules["R1"].switch.default.actions.len(), 1);
    }

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{
            "name": "ping",
            "triggers": [{"trigger": {
                "startState": 0,
                "branches": {"0": {"rule": "R"}},
                "rules": {"R": {"switch": {"default": {"do": [
                    {"resolveType": "setRes", "resolveData": {"pong": true}}
                ]}}}}
            }}]
        }"#;
        let def = FlowLoader::parse_json(json).unwrap();
        assert!(def.triggers[0].entry.is_none());
        assert_eq!(def.triggers[0].trigger.rules["R"].switch.default.return_state, 0);
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let json = r#"{"triggers": [{"trigger": {"startState": 4, "branches": {}, "rules": {}}}]}"#;
        let err = FlowLoader::parse_json(json).unwrap_err();
        assert!(matches!(err.root(), EngineError::BranchNotFound { state: 4, .. }));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
name:
  - invalid structure
"#;
        assert!(FlowLoader::parse_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("ruleflow-loader-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let yaml_path = dir.join("flow.yaml");
        fs::write(&yaml_path, YAML).unwrap();
        let def = FlowLoader::new().load(&yaml_path).unwrap();
        assert_eq!(def.name, "signup");

        let json_path = dir.join("flow.json");
        fs::write(&json_path, r#"{"name": "empty", "triggers": []}"#).unwrap();
        assert_eq!(FlowLoader::new().load(&json_path).unwrap().name, "empty");

        assert!(matches!(
            FlowLoader::new().load(dir.join("missing.yaml")),
            Err(EngineError::Io(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
