use crate::error::{BulkEditError, BulkEditResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "batch-bulk-edit.yaml";
pub const DEFAULT_LOG_FILE: &str = "batch_bulk_editor.log";
/// Output directory created next to the root document by default.
pub const DEFAULT_OUTPUT_DIR: &str = "converted-outputs";

/// Tool configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent directory for timestamped output; defaults next to the root document.
    pub output_root: Option<PathBuf>,
    /// Log file written when `--debug` is on.
    pub log_file: PathBuf,
    /// Treat a sheet that matches no document as a hard failure.
    pub strict_sheets: bool,
    /// Extension of the documents a `StepRecipeID` points to, keyed by the
    /// referencing document's extension.
    pub child_extensions: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let child_extensions = [("pxml", "uxml"), ("uxml", "oxml")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self {
            output_root: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            strict_sheets: false,
            child_extensions,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&Path>) -> BulkEditResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> BulkEditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BulkEditError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            BulkEditError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> BulkEditResult<()> {
        if let Some(root) = var("BULK_EDIT_OUTPUT_ROOT") {
            self.output_root = Some(PathBuf::from(root));
        }
        if let Some(log_file) = var("BULK_EDIT_LOG_FILE") {
            self.log_file = PathBuf::from(log_file);
        }
        if let Some(strict) = var("BULK_EDIT_STRICT_SHEETS") {
            self.strict_sheets = match strict.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(BulkEditError::Config(format!(
                        "BULK_EDIT_STRICT_SHEETS must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Extension of documents referenced from a document with `extension`.
    pub fn child_extension(&self, extension: &str) -> Option<&str> {
        self.child_extensions
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Directory that receives timestamped output folders.
    pub fn output_root_for(&self, root_document: &Path) -> PathBuf {
        match &self.output_root {
            Some(root) => root.clone(),
            None => root_document
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// State threaded through one invocation.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub config: Config,
    pub debug: bool,
}

impl RunContext {
    pub fn new(config: Config, debug: bool) -> Self {
        Self { config, debug }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert!(!config.strict_sheets);
        assert_eq!(config.child_extension("PXML"), Some("uxml"));
        assert_eq!(config.child_extension("uxml"), Some("oxml"));
        assert_eq!(config.child_extension("oxml"), None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "output_root: /tmp/out").unwrap();
        writeln!(file, "strict_sheets: true").unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.output_root, Some(PathBuf::from("/tmp/out")));
        assert!(config.strict_sheets);
        // Unspecified keys keep their defaults
        assert_eq!(config.child_extension("pxml"), Some("uxml"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = tempdir().unwrap();
        let result = Config::load(Some(&temp_dir.path().join("nope.yaml")));
        assert!(matches!(result, Err(BulkEditError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "strict_sheets: [").unwrap();

        let err = Config::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BULK_EDIT_OUTPUT_ROOT", "/srv/out"),
            ("BULK_EDIT_STRICT_SHEETS", "yes"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.output_root, Some(PathBuf::from("/srv/out")));
        assert!(config.strict_sheets);

        let mut config = Config::default();
        let err = config.apply_env(|key| {
            (key == "BULK_EDIT_STRICT_SHEETS").then(|| "maybe".to_string())
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_output_root_defaults_next_to_document() {
        let config = Config::default();
        assert_eq!(
            config.output_root_for(Path::new("/data/recipes/TEST.pxml")),
            PathBuf::from("/data/recipes/converted-outputs")
        );
    }
}
