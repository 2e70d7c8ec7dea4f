use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dsl::compiler::CompileOptions;
use crate::error::BuildError;
use crate::project::read_json;

/// Build configuration, read from `datascript.json`. Every field is optional
/// in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuildSettings {
    /// Namespace that generated functions live in.
    pub namespace: String,
    /// Scoreboard objective holding variables and temporaries.
    pub objective: String,
    /// Function receiving top-level statements.
    pub main_function: String,
    /// Directory (inside the namespace) for synthesized functions.
    pub generated_dir: String,
    /// Output root; `data/` is created inside it.
    pub output_dir: PathBuf,
    /// Optional static registry JSON for id and NBT validation.
    pub registry: Option<PathBuf>,
    /// Remove empty and unreferenced synthesized functions.
    pub optimize: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            namespace: "datascript".to_string(),
            objective: "datascript".to_string(),
            main_function: "main".to_string(),
            generated_dir: "__generated__".to_string(),
            output_dir: PathBuf::from("build"),
            registry: None,
            optimize: true,
        }
    }
}

fn valid_namespace(ns: &str) -> bool {
    !ns.is_empty()
        && ns
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
}

impl BuildSettings {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !valid_namespace(&self.namespace) {
            return Err(BuildError::Config(format!(
                "namespace `{}` may only contain a-z, 0-9, `_`, `-` and `.`",
                self.namespace
            )));
        }
        if self.objective.is_empty() || self.objective.contains(char::is_whitespace) {
            return Err(BuildError::Config(format!(
                "objective `{}` must be a single non-empty word",
                self.objective
            )));
        }
        for (field, value) in [("main_function", &self.main_function), ("generated_dir", &self.generated_dir)] {
            if value.is_empty() || value.contains(char::is_whitespace) || value.contains(':') {
                return Err(BuildError::Config(format!("{field} `{value}` is not a valid path")));
            }
        }
        Ok(())
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            namespace: self.namespace.clone(),
            objective: self.objective.clone(),
            main_function: self.main_function.clone(),
            generated_dir: self.generated_dir.clone(),
            optimize: self.optimize,
        }
    }
}

/// Load settings from `path`, or defaults when the file does not exist.
/// Relative paths inside the file are resolved against its directory.
pub fn load_settings(path: &Path) -> Result<BuildSettings, BuildError> {
    if !path.exists() {
        return Ok(BuildSettings::default());
    }
    let mut settings: BuildSettings = read_json(path)?;
    if let Some(base) = path.parent() {
        if settings.output_dir.is_relative() {
            settings.output_dir = base.join(&settings.output_dir);
        }
        if let Some(registry) = settings.registry.as_mut() {
            if registry.is_relative() {
                *registry = base.join(&*registry);
            }
        }
    }
    settings.validate()?;
    Ok(settings)
}

/// JSON schema of the settings file.
pub fn settings_schema() -> Result<String, BuildError> {
    let schema = schemars::schema_for!(BuildSettings);
    Ok(serde_json::to_string_pretty(&schema)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("datascript.json")).unwrap();
        assert_eq!(settings, BuildSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datascript.json");
        std::fs::write(&path, r#"{"namespace": "arena", "registry": "reg.json"}"#).unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.namespace, "arena");
        assert_eq!(settings.objective, "datascript");
        assert_eq!(settings.registry, Some(dir.path().join("reg.json")));
        assert!(settings.optimize);
    }

    #[test]
    fn invalid_namespace_is_rejected() {
        let settings = BuildSettings {
            namespace: "My Pack".into(),
            ..BuildSettings::default()
        };
        assert!(matches!(settings.validate(), Err(BuildError::Config(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datascript.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(load_settings(&path), Err(BuildError::Json(_))));
    }

    #[test]
    fn schema_lists_fields() {
        let schema = settings_schema().unwrap();
        assert!(schema.contains("generated_dir"));
        assert!(schema.contains("objective"));
    }
}
