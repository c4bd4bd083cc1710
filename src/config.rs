// Configuration handling for Wrapman
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result, WrapmanError};
use crate::logging::utils;
use crate::matrix::{EcosystemVersionConfig, LanguageVersionConfig, VersionMatrix};
use crate::registry::LoadSettings;
use crate::wrapper::locator::is_nested_path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root holding one directory per language version
    pub wrappers_dir: PathBuf,
    #[serde(default = "default_relative_class_dir")]
    pub relative_class_dir: PathBuf,
    /// Libraries handed to every wrapper's bootstrap
    #[serde(default)]
    pub shared_libraries: Vec<PathBuf>,
    #[serde(default)]
    pub ecosystem_versions: Vec<EcosystemVersionConfig>,
    #[serde(default)]
    pub language_versions: Vec<LanguageVersionConfig>,
}

fn default_relative_class_dir() -> PathBuf {
    PathBuf::from("classes")
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let span = utils::config_loading_span(path);
        let _enter = span.enter();

        if !path.exists() {
            return Err(WrapmanError::Config(Box::new(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(
                    "Create a wrapman.yaml file or pass --config <path>".to_string(),
                ),
            })));
        }

        if !path.is_file() {
            return Err(WrapmanError::Config(Box::new(ConfigError::InvalidValue {
                message: "Configuration path is not a file".to_string(),
                field: "config_path".to_string(),
                value: path.display().to_string(),
                expected: "file path".to_string(),
                file_path: Some(path.to_path_buf()),
            })));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_with_context(&content, Some(path));
        utils::log_config_validation(path, config.is_ok());

        if let Ok(config) = config.as_mut() {
            if let Some(base) = path.parent() {
                config.resolve_relative_to(base);
            }
        }
        config
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_context(yaml, None)
    }

    fn from_yaml_with_context(yaml: &str, file_path: Option<&Path>) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            let mut config_error = *Box::<ConfigError>::from(e);
            if let ConfigError::InvalidYaml {
                file_path: ref mut path,
                ..
            } = config_error
            {
                *path = file_path.map(Path::to_path_buf);
            }
            WrapmanError::Config(Box::new(config_error))
        })?;

        config.validate(file_path)?;
        Ok(config)
    }

    fn validate(&self, file_path: Option<&Path>) -> Result<()> {
        let invalid = |field: String, value: String, message: &str, expected: &str| {
            WrapmanError::Config(Box::new(ConfigError::InvalidValue {
                message: message.to_string(),
                field,
                value,
                expected: expected.to_string(),
                file_path: file_path.map(Path::to_path_buf),
            }))
        };
        let duplicate = |kind: &str, version: &str| {
            WrapmanError::Config(Box::new(ConfigError::DuplicateVersion {
                kind: kind.to_string(),
                version: version.to_string(),
                file_path: file_path.map(Path::to_path_buf),
            }))
        };

        if self.wrappers_dir.as_os_str().is_empty() {
            return Err(invalid(
                "wrappers_dir".to_string(),
                String::new(),
                "Wrappers directory cannot be empty",
                "directory path",
            ));
        }

        if !is_nested_path(&self.relative_class_dir) {
            return Err(invalid(
                "relative_class_dir".to_string(),
                self.relative_class_dir.display().to_string(),
                "Class directory must be relative to the version directory",
                "relative path (e.g., classes)",
            ));
        }

        let mut language_versions = HashSet::new();
        for (idx, language) in self.language_versions.iter().enumerate() {
            if language.version.trim().is_empty() {
                return Err(invalid(
                    format!("language_versions[{idx}].version"),
                    language.version.clone(),
                    "Language version cannot be empty",
                    "non-empty version string",
                ));
            }
            if !language_versions.insert(language.version.as_str()) {
                return Err(duplicate("language", &language.version));
            }
        }

        let mut ecosystem_versions = HashSet::new();
        for (idx, ecosystem) in self.ecosystem_versions.iter().enumerate() {
            if ecosystem.version.trim().is_empty() {
                return Err(invalid(
                    format!("ecosystem_versions[{idx}].version"),
                    ecosystem.version.clone(),
                    "Ecosystem version cannot be empty",
                    "non-empty version string",
                ));
            }
            if !ecosystem_versions.insert(ecosystem.version.as_str()) {
                return Err(duplicate("ecosystem", &ecosystem.version));
            }

            for language in &ecosystem.supported_language_versions {
                if !language_versions.contains(language.as_str()) {
                    // Only this cell is affected; the registry reports it at load time.
                    tracing::warn!(
                        ecosystem_version = %ecosystem.version,
                        language_version = %language,
                        "Supported language version has no language_versions entry"
                    );
                }
            }
        }

        if self.ecosystem_versions.is_empty() {
            tracing::warn!("Configuration declares no ecosystem versions");
        }

        let candidates = self.matrix().default_candidates();
        if candidates.len() > 1 {
            tracing::warn!(
                candidates = ?candidates.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Several version pairs are flagged latest stable; the first loaded one becomes the default"
            );
        }

        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if self.wrappers_dir.is_relative() {
            self.wrappers_dir = base.join(&self.wrappers_dir);
        }
        for library in &mut self.shared_libraries {
            if library.is_relative() {
                *library = base.join(&*library);
            }
        }
    }

    pub fn matrix(&self) -> VersionMatrix {
        VersionMatrix::new(
            self.ecosystem_versions.clone(),
            self.language_versions.clone(),
        )
    }

    pub fn settings(&self) -> LoadSettings {
        LoadSettings::new(&self.wrappers_dir)
            .with_shared_libraries(self.shared_libraries.clone())
            .with_relative_class_dir(&self.relative_class_dir)
    }
}
