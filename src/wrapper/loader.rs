// Builds one isolated namespace per classpath and instantiates the wrapper inside it

use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::error::RegistryError;

use super::artifact::{Artifact, ArtifactOpener, OpenSession};
use super::dylib::DylibOpener;
use super::namespace::{HostNamespace, IsolatedNamespace, SymbolScope};
use super::traits::{CompilerWrapper, INITIALIZER_SYMBOL};
use super::LoadResult;

/// A wrapper together with the namespace its code was loaded into
pub struct LoadedWrapper {
    // Dropped before `namespace`: the wrapper's code lives in the namespace's libraries.
    wrapper: Box<dyn CompilerWrapper>,
    namespace: IsolatedNamespace,
}

impl LoadedWrapper {
    pub fn wrapper(&self) -> &dyn CompilerWrapper {
        self.wrapper.as_ref()
    }

    pub fn wrapper_mut(&mut self) -> &mut dyn CompilerWrapper {
        self.wrapper.as_mut()
    }

    pub fn namespace(&self) -> &IsolatedNamespace {
        &self.namespace
    }

    /// Whether both handles refer to the same loaded instance
    pub fn ptr_eq(a: &LoadedWrapper, b: &LoadedWrapper) -> bool {
        std::ptr::eq(a, b)
    }
}

impl Deref for LoadedWrapper {
    type Target = dyn CompilerWrapper;

    fn deref(&self) -> &Self::Target {
        self.wrapper.as_ref()
    }
}

impl std::fmt::Debug for LoadedWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedWrapper")
            .field("compiler_version", &self.wrapper.compiler_version())
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Loads wrappers in fresh namespaces that fall back to a shared parent scope
pub struct IsolatedLoader {
    opener: Arc<dyn ArtifactOpener>,
    parent: Arc<dyn SymbolScope>,
    symbol: String,
}

impl IsolatedLoader {
    pub fn new(opener: Arc<dyn ArtifactOpener>, parent: Arc<dyn SymbolScope>) -> Self {
        Self {
            opener,
            parent,
            symbol: INITIALIZER_SYMBOL.to_string(),
        }
    }

    /// Shared libraries on the classpath in the platform's strongest
    /// isolation, host wrappers from `inventory`
    pub fn dylib() -> Self {
        Self::new(
            Arc::new(DylibOpener::default()),
            Arc::new(HostNamespace::from_inventory()),
        )
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Construct the wrapper without initializing it
    pub fn load(&self, classpath: &[Url]) -> LoadResult<LoadedWrapper> {
        let namespace = self.build_namespace(classpath)?;

        let wrapper = namespace.instantiate(&self.symbol).unwrap_or_else(|| {
            Err(RegistryError::InstantiationError {
                symbol: self.symbol.clone(),
                location: describe_classpath(classpath),
                reason: format!(
                    "symbol not defined by {} artifact(s) or the host",
                    namespace.artifact_count()
                ),
            })
        })?;

        Ok(LoadedWrapper { wrapper, namespace })
    }

    fn build_namespace(&self, classpath: &[Url]) -> LoadResult<IsolatedNamespace> {
        let mut artifacts = Vec::new();
        let mut session = self.opener.session();

        for url in classpath {
            let path = url
                .to_file_path()
                .map_err(|_| self.instantiation_error(url.as_str(), "not a local file location"))?;

            if path.is_dir() {
                let entries = fs::read_dir(&path)
                    .map_err(|e| self.instantiation_error(url.as_str(), &e.to_string()))?;
                for entry in entries {
                    let entry =
                        entry.map_err(|e| self.instantiation_error(url.as_str(), &e.to_string()))?;
                    if entry.path().is_file() {
                        self.open_into(session.as_mut(), &entry.path(), &mut artifacts)?;
                    }
                }
            } else if path.is_file() {
                self.open_into(session.as_mut(), &path, &mut artifacts)?;
            } else {
                tracing::debug!(location = %url, "Skipping missing classpath entry");
            }
        }

        Ok(IsolatedNamespace::new(artifacts, Arc::clone(&self.parent)))
    }

    fn open_into(
        &self,
        session: &mut dyn OpenSession,
        path: &Path,
        artifacts: &mut Vec<Box<dyn Artifact>>,
    ) -> LoadResult<()> {
        match session.open(path) {
            Ok(Some(artifact)) => artifacts.push(artifact),
            Ok(None) => {}
            Err(e) => {
                return Err(self.instantiation_error(
                    &path.display().to_string(),
                    &format!("cannot open artifact: {e}"),
                ))
            }
        }
        Ok(())
    }

    fn instantiation_error(&self, location: &str, reason: &str) -> RegistryError {
        RegistryError::InstantiationError {
            symbol: self.symbol.clone(),
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn describe_classpath(classpath: &[Url]) -> String {
    classpath
        .iter()
        .map(Url::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
