// Ecosystem / language version matrix
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outer version axis: one ecosystem release and the language versions it supports
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EcosystemVersionConfig {
    pub version: String,
    #[serde(default)]
    pub latest_stable: bool,
    #[serde(default)]
    pub supported_language_versions: Vec<String>,
}

/// Inner version axis: one compiler version
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageVersionConfig {
    pub version: String,
    #[serde(default)]
    pub latest_stable: bool,
}

/// Registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VersionPair {
    pub ecosystem_version: String,
    pub language_version: String,
}

impl VersionPair {
    pub fn new(ecosystem_version: impl Into<String>, language_version: impl Into<String>) -> Self {
        Self {
            ecosystem_version: ecosystem_version.into(),
            language_version: language_version.into(),
        }
    }
}

impl fmt::Display for VersionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ecosystem_version, self.language_version)
    }
}

impl EcosystemVersionConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            latest_stable: false,
            supported_language_versions: Vec::new(),
        }
    }

    pub fn latest_stable(mut self) -> Self {
        self.latest_stable = true;
        self
    }

    pub fn with_language_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_language_versions
            .extend(versions.into_iter().map(Into::into));
        self
    }
}

impl LanguageVersionConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            latest_stable: false,
        }
    }

    pub fn latest_stable(mut self) -> Self {
        self.latest_stable = true;
        self
    }
}

/// Read-only snapshot of the supported version pairs
#[derive(Debug, Clone, Default, Serialize)]
pub struct VersionMatrix {
    ecosystem_versions: Vec<EcosystemVersionConfig>,
    language_versions: Vec<LanguageVersionConfig>,
}

impl VersionMatrix {
    pub fn new(
        ecosystem_versions: Vec<EcosystemVersionConfig>,
        language_versions: Vec<LanguageVersionConfig>,
    ) -> Self {
        Self {
            ecosystem_versions,
            language_versions,
        }
    }

    pub fn ecosystem_versions(&self) -> &[EcosystemVersionConfig] {
        &self.ecosystem_versions
    }

    pub fn language_versions(&self) -> &[LanguageVersionConfig] {
        &self.language_versions
    }

    /// First language config declared under `version`
    pub fn language_config(&self, version: &str) -> Option<&LanguageVersionConfig> {
        self.language_versions.iter().find(|c| c.version == version)
    }

    /// Every declared cell in matrix order
    pub fn cells(&self) -> impl Iterator<Item = (&EcosystemVersionConfig, &str)> + '_ {
        self.ecosystem_versions.iter().flat_map(|ecosystem| {
            ecosystem
                .supported_language_versions
                .iter()
                .map(move |language| (ecosystem, language.as_str()))
        })
    }

    /// Cells whose ecosystem and language configs are both latest stable, in matrix order
    pub fn default_candidates(&self) -> Vec<VersionPair> {
        self.cells()
            .filter(|(ecosystem, language)| {
                ecosystem.latest_stable
                    && self
                        .language_config(language)
                        .is_some_and(|config| config.latest_stable)
            })
            .map(|(ecosystem, language)| VersionPair::new(&ecosystem.version, language))
            .collect()
    }
}
