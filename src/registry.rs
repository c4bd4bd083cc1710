// Versioned wrapper registry
//
// Initialization walks the version matrix once, loading one isolated wrapper per
// (ecosystem version, language version) cell. Failed cells are recorded and
// skipped. The resulting registry is immutable and safe to share across threads.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use crate::error::RegistryError;
use crate::logging::utils;
use crate::matrix::{EcosystemVersionConfig, VersionMatrix, VersionPair};
use crate::wrapper::artifact::panic_message;
use crate::wrapper::{ArtifactLocator, IsolatedLoader, LoadResult, LoadedWrapper};

/// Inputs shared by every cell
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub wrappers_dir: PathBuf,
    pub shared_libraries: Vec<PathBuf>,
    pub relative_class_dir: PathBuf,
}

impl LoadSettings {
    pub fn new(wrappers_dir: impl Into<PathBuf>) -> Self {
        Self {
            wrappers_dir: wrappers_dir.into(),
            shared_libraries: Vec::new(),
            relative_class_dir: PathBuf::from("classes"),
        }
    }

    pub fn with_shared_libraries(mut self, libraries: Vec<PathBuf>) -> Self {
        self.shared_libraries = libraries;
        self
    }

    pub fn with_relative_class_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.relative_class_dir = dir.into();
        self
    }
}

/// A matrix cell that did not make it into the registry
#[derive(Debug)]
pub struct CellFailure {
    pub pair: VersionPair,
    pub error: RegistryError,
}

/// Outcome of [`WrapperRegistry::init`]
#[derive(Debug)]
pub struct RegistryInit {
    pub registry: WrapperRegistry,
    pub failures: Vec<CellFailure>,
}

impl RegistryInit {
    pub fn failed_pairs(&self) -> Vec<&VersionPair> {
        self.failures.iter().map(|failure| &failure.pair).collect()
    }
}

/// Loaded wrappers keyed by ecosystem version, then language version
#[derive(Debug, Default)]
pub struct WrapperRegistry {
    wrappers: HashMap<String, HashMap<String, LoadedWrapper>>,
    default: Option<VersionPair>,
}

impl WrapperRegistry {
    /// Load every cell of `matrix`. Never fails as a whole; an empty registry
    /// without a default is a valid outcome.
    ///
    /// When several loaded cells are flagged latest stable on both axes, the
    /// first one in matrix order becomes the default.
    pub fn init(
        matrix: &VersionMatrix,
        settings: &LoadSettings,
        loader: &IsolatedLoader,
    ) -> RegistryInit {
        let mut builder = RegistryBuilder::default();
        let mut seen = HashSet::new();

        for (ecosystem, language_version) in matrix.cells() {
            let pair = VersionPair::new(&ecosystem.version, language_version);
            if !seen.insert(pair.clone()) {
                tracing::warn!(pair = %pair, "Duplicate matrix cell ignored");
                continue;
            }

            let span = utils::cell_loading_span(&pair.ecosystem_version, &pair.language_version);
            let _enter = span.enter();

            match load_cell(matrix, settings, loader, ecosystem, language_version) {
                Ok((wrapper, flagged_default)) => builder.insert(pair, wrapper, flagged_default),
                Err(error) => {
                    utils::log_cell_failure(
                        &pair.ecosystem_version,
                        &pair.language_version,
                        &error.to_string(),
                    );
                    builder.failures.push(CellFailure { pair, error });
                }
            }
        }

        builder.build()
    }

    pub fn ecosystem_versions(&self) -> BTreeSet<&str> {
        self.wrappers.keys().map(String::as_str).collect()
    }

    /// Empty for unknown ecosystem versions
    pub fn language_versions(&self, ecosystem_version: &str) -> BTreeSet<&str> {
        self.wrappers
            .get(ecosystem_version)
            .map(|languages| languages.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn all_wrappers(&self) -> impl Iterator<Item = &LoadedWrapper> {
        self.wrappers.values().flat_map(|languages| languages.values())
    }

    /// Every loaded pair, sorted
    pub fn pairs(&self) -> Vec<VersionPair> {
        let mut pairs: Vec<VersionPair> = self
            .wrappers
            .iter()
            .flat_map(|(ecosystem, languages)| {
                languages
                    .keys()
                    .map(move |language| VersionPair::new(ecosystem, language))
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Exact match; both versions `None` asks for the default wrapper.
    ///
    /// Only one version given, or an unknown pair, yields `Ok(None)`.
    pub fn lookup(
        &self,
        ecosystem_version: Option<&str>,
        language_version: Option<&str>,
    ) -> LoadResult<Option<&LoadedWrapper>> {
        match (ecosystem_version, language_version) {
            (None, None) => self.default_wrapper().map(Some),
            (Some(ecosystem), Some(language)) => Ok(self.get(ecosystem, language)),
            _ => Ok(None),
        }
    }

    pub fn get(&self, ecosystem_version: &str, language_version: &str) -> Option<&LoadedWrapper> {
        self.wrappers
            .get(ecosystem_version)
            .and_then(|languages| languages.get(language_version))
    }

    pub fn default_wrapper(&self) -> LoadResult<&LoadedWrapper> {
        self.default
            .as_ref()
            .and_then(|pair| self.get(&pair.ecosystem_version, &pair.language_version))
            .ok_or(RegistryError::NoDefaultAvailable)
    }

    pub fn default_pair(&self) -> Option<&VersionPair> {
        self.default.as_ref()
    }

    pub fn contains(&self, pair: &VersionPair) -> bool {
        self.get(&pair.ecosystem_version, &pair.language_version)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.wrappers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns the initialized wrapper and whether the cell is flagged as default
fn load_cell(
    matrix: &VersionMatrix,
    settings: &LoadSettings,
    loader: &IsolatedLoader,
    ecosystem: &EcosystemVersionConfig,
    language_version: &str,
) -> LoadResult<(LoadedWrapper, bool)> {
    let language = matrix.language_config(language_version).ok_or_else(|| {
        RegistryError::LanguageConfigNotFound {
            ecosystem_version: ecosystem.version.clone(),
            language_version: language_version.to_string(),
        }
    })?;

    let classpath = ArtifactLocator::locate(
        language_version,
        &settings.wrappers_dir,
        &settings.relative_class_dir,
    )?;
    let mut loaded = loader.load(&classpath)?;

    let initialization_error = |reason: String| RegistryError::InitializationError {
        ecosystem_version: ecosystem.version.clone(),
        language_version: language_version.to_string(),
        reason,
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        loaded
            .wrapper_mut()
            .init(&settings.shared_libraries, ecosystem, language)
    }))
    .map_err(|payload| {
        initialization_error(format!("init panicked: {}", panic_message(payload.as_ref())))
    })?;
    outcome.map_err(|e| initialization_error(e.to_string()))?;

    Ok((loaded, ecosystem.latest_stable && language.latest_stable))
}

/// Mutable state of a single init pass
#[derive(Default)]
struct RegistryBuilder {
    wrappers: HashMap<String, HashMap<String, LoadedWrapper>>,
    default: Option<VersionPair>,
    failures: Vec<CellFailure>,
}

impl RegistryBuilder {
    fn insert(&mut self, pair: VersionPair, wrapper: LoadedWrapper, flagged_default: bool) {
        let becomes_default = flagged_default && self.default.is_none();
        if flagged_default && !becomes_default {
            if let Some(current) = &self.default {
                tracing::warn!(
                    pair = %pair,
                    default = %current,
                    "Several cells are flagged latest stable; keeping the first as default"
                );
            }
        }

        utils::log_cell_loaded(&pair.ecosystem_version, &pair.language_version, becomes_default);

        if becomes_default {
            self.default = Some(pair.clone());
        }
        self.wrappers
            .entry(pair.ecosystem_version)
            .or_default()
            .insert(pair.language_version, wrapper);
    }

    fn build(self) -> RegistryInit {
        let registry = WrapperRegistry {
            wrappers: self.wrappers,
            default: self.default,
        };

        let default = registry
            .default_pair()
            .map(|pair| (pair.ecosystem_version.as_str(), pair.language_version.as_str()));
        utils::log_registry_summary(registry.len(), self.failures.len(), default);

        RegistryInit {
            registry,
            failures: self.failures,
        }
    }
}
