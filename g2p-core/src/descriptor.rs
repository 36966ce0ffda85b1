//! Pipeline descriptor loading
//!
//! Reads the YAML descriptor and builds the [`Pipeline`] graph:
//!
//! ```yaml
//! name: my-service
//! desc: production rollout checks
//! version: "1.0"
//! states:
//!   - name: blue
//!     compose-file: ./blue/docker-compose.yml
//!     checks:
//!       - name: http smoke
//!         image: curlimages/curl
//!         env:
//!           - TARGET=http://web:8080
//! ```

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{Checker, Pipeline, State};

/// Result type alias for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Errors raised while loading a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to read descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse descriptor: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid descriptor: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDescriptor {
    pub name: String,
    #[serde(default, alias = "description")]
    pub desc: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub states: Vec<StateDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDescriptor {
    pub name: String,
    #[serde(default, alias = "description")]
    pub desc: Option<String>,
    #[serde(rename = "compose-file")]
    pub compose_file: PathBuf,
    #[serde(default)]
    pub checks: Vec<CheckerDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckerDescriptor {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub env: Vec<String>,
}

/// Loads and validates a descriptor file
///
/// Relative compose-file paths are resolved against the descriptor's directory.
pub fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let source = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pipeline(&source, path.parent())
}

/// Parses descriptor source into a pipeline
pub fn parse_pipeline(source: &str, base_dir: Option<&Path>) -> Result<Pipeline> {
    let descriptor: PipelineDescriptor = serde_yaml::from_str(source)?;
    descriptor.validate()?;
    Ok(descriptor.into_pipeline(base_dir))
}

impl PipelineDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "pipeline name cannot be empty".to_string(),
            ));
        }

        for state in &self.states {
            if state.name.trim().is_empty() {
                return Err(DescriptorError::Invalid(
                    "state name cannot be empty".to_string(),
                ));
            }
            if state.compose_file.as_os_str().is_empty() {
                return Err(DescriptorError::Invalid(format!(
                    "state '{}' has an empty compose-file",
                    state.name
                )));
            }

            for checker in &state.checks {
                if checker.name.trim().is_empty() {
                    return Err(DescriptorError::Invalid(format!(
                        "state '{}' has a check without a name",
                        state.name
                    )));
                }
                if checker.image.trim().is_empty() {
                    return Err(DescriptorError::Invalid(format!(
                        "check '{}' in state '{}' has no image",
                        checker.name, state.name
                    )));
                }
                if let Some(assignment) = checker.env.iter().find(|a| !is_assignment(a)) {
                    return Err(DescriptorError::Invalid(format!(
                        "check '{}' in state '{}' has a malformed env entry '{}' (expected KEY=VALUE)",
                        checker.name, state.name, assignment
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn into_pipeline(self, base_dir: Option<&Path>) -> Pipeline {
        let states = self
            .states
            .into_iter()
            .map(|state| {
                let compose_file = match base_dir {
                    Some(dir) if state.compose_file.is_relative() => dir.join(&state.compose_file),
                    _ => state.compose_file,
                };
                let checkers = state
                    .checks
                    .into_iter()
                    .map(|check| Checker::new(check.name, check.image, check.env))
                    .collect();
                State::new(state.name, state.desc, compose_file, checkers)
            })
            .collect();

        Pipeline::new(self.name, self.desc, self.version, states)
    }
}

fn is_assignment(entry: &str) -> bool {
    matches!(entry.split_once('='), Some((key, _)) if !key.trim().is_empty())
}

/// Accepts `version: 1.2` as well as `version: "1.2"`
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(serde::de::Error::custom("version must be a scalar")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DESCRIPTOR: &str = r#"
name: shop
desc: rollout checks
version: 1.2
states:
  - name: blue
    desc: first stack
    compose-file: blue/docker-compose.yml
    checks:
      - name: http smoke
        image: curlimages/curl
        env:
          - TARGET=http://web:8080
          - RETRIES=3
      - name: db
        image: postgres:16
  - name: green
    compose-file: /srv/green.yml
"#;

    #[test]
    fn test_parse_pipeline() {
        let pipeline = parse_pipeline(DESCRIPTOR, None).unwrap();

        assert_eq!(pipeline.name, "shop");
        assert_eq!(pipeline.description.as_deref(), Some("rollout checks"));
        assert_eq!(pipeline.version.as_deref(), Some("1.2"));
        assert_eq!(pipeline.states.len(), 2);

        let blue = &pipeline.states[0];
        assert_eq!(blue.compose_file, PathBuf::from("blue/docker-compose.yml"));
        assert_eq!(blue.checkers.len(), 2);
        assert_eq!(blue.checkers[0].name, "http smoke");
        assert_eq!(
            blue.checkers[0].env,
            vec!["TARGET=http://web:8080", "RETRIES=3"]
        );
        assert!(blue.checkers[1].env.is_empty());

        assert!(pipeline.states[1].checkers.is_empty());
    }

    #[test]
    fn test_relative_compose_file_resolves_against_base_dir() {
        let pipeline = parse_pipeline(DESCRIPTOR, Some(Path::new("/etc/g2p"))).unwrap();

        assert_eq!(
            pipeline.states[0].compose_file,
            PathBuf::from("/etc/g2p/blue/docker-compose.yml")
        );
        assert_eq!(pipeline.states[1].compose_file, PathBuf::from("/srv/green.yml"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let source = r#"
name: shop
states:
  - name: blue
    compose-file: c.yml
    retries: 3
"#;

        let result = parse_pipeline(source, None);
        assert!(matches!(result, Err(DescriptorError::Parse(_))));
    }

    #[test]
    fn test_missing_image_is_rejected() {
        let source = r#"
name: shop
states:
  - name: blue
    compose-file: c.yml
    checks:
      - name: smoke
"#;

        assert!(parse_pipeline(source, None).is_err());
    }

    #[test]
    fn test_malformed_env_is_rejected() {
        let source = r#"
name: shop
states:
  - name: blue
    compose-file: c.yml
    checks:
      - name: smoke
        image: alpine
        env:
          - JUST_A_KEY
"#;

        let err = parse_pipeline(source, None).unwrap_err();
        assert!(err.to_string().contains("JUST_A_KEY"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let source = "name: \"  \"\nstates: []\n";

        let err = parse_pipeline(source, None).unwrap_err();
        assert!(matches!(err, DescriptorError::Invalid(_)));
    }

    #[test]
    fn test_load_pipeline_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g2p.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(DESCRIPTOR.as_bytes()).unwrap();

        let pipeline = load_pipeline(&path).unwrap();
        assert_eq!(
            pipeline.states[0].compose_file,
            dir.path().join("blue/docker-compose.yml")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_pipeline(Path::new("/nonexistent/g2p.yml"));
        assert!(matches!(result, Err(DescriptorError::Read { .. })));
    }
}
