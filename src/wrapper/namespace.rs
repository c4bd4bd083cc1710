// Symbol resolution scopes: the shared host scope and per-version isolated scopes

use std::path::Path;
use std::sync::Arc;

use super::artifact::{Artifact, NativeConstructor, SymbolTable};
use super::traits::CompilerWrapper;
use super::LoadResult;

/// Something that can resolve a symbol name to a freshly constructed wrapper
pub trait SymbolScope: Send + Sync {
    /// `None` when the symbol is not defined in this scope
    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>>;
}

/// Host-side wrapper constructor linked into the running binary.
///
/// ```ignore
/// inventory::submit! {
///     wrapman::wrapper::HostSymbol {
///         name: wrapman::wrapper::INITIALIZER_SYMBOL,
///         construct: || Box::new(BundledWrapper::default()),
///     }
/// }
/// ```
pub struct HostSymbol {
    pub name: &'static str,
    pub construct: fn() -> Box<dyn CompilerWrapper>,
}

inventory::collect!(HostSymbol);

const HOST_LOCATION: &str = "<host>";

/// The shared namespace every isolated namespace falls back to
#[derive(Debug, Default, Clone)]
pub struct HostNamespace {
    symbols: SymbolTable,
}

impl HostNamespace {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every [`HostSymbol`] submitted anywhere in the binary
    pub fn from_inventory() -> Self {
        let mut namespace = Self::empty();
        for host_symbol in inventory::iter::<HostSymbol> {
            let construct = host_symbol.construct;
            namespace
                .symbols
                .define(host_symbol.name, Arc::new(move || construct()));
        }
        namespace
    }

    pub fn with_symbol(mut self, name: impl Into<String>, constructor: NativeConstructor) -> Self {
        self.symbols.define(name, constructor);
        self
    }

    pub fn defines(&self, symbol: &str) -> bool {
        self.symbols.defines(symbol)
    }
}

impl SymbolScope for HostNamespace {
    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>> {
        self.symbols.instantiate(symbol, Path::new(HOST_LOCATION))
    }
}

/// Per-version namespace. Resolution is self-first: own artifacts in
/// classpath order, then the parent scope.
pub struct IsolatedNamespace {
    artifacts: Vec<Box<dyn Artifact>>,
    parent: Arc<dyn SymbolScope>,
}

impl IsolatedNamespace {
    pub fn new(artifacts: Vec<Box<dyn Artifact>>, parent: Arc<dyn SymbolScope>) -> Self {
        Self { artifacts, parent }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    pub fn artifact_locations(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.iter().map(|artifact| artifact.location())
    }
}

impl SymbolScope for IsolatedNamespace {
    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>> {
        for artifact in &self.artifacts {
            if let Some(result) = artifact.instantiate(symbol) {
                tracing::debug!(
                    symbol = %symbol,
                    location = %artifact.location().display(),
                    "Resolved symbol in isolated namespace"
                );
                return Some(result);
            }
        }

        let result = self.parent.instantiate(symbol);
        if result.is_some() {
            tracing::debug!(symbol = %symbol, "Resolved symbol in parent namespace");
        }
        result
    }
}

impl std::fmt::Debug for IsolatedNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedNamespace")
            .field("artifacts", &self.artifact_locations().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{EcosystemVersionConfig, LanguageVersionConfig};
    use crate::wrapper::artifact::{native_constructor, StaticArtifact};
    use crate::wrapper::traits::{BoxError, CompileOutcome, SourceFile};
    use std::path::PathBuf;

    struct Tagged(&'static str);

    impl CompilerWrapper for Tagged {
        fn init(
            &mut self,
            _shared_libraries: &[PathBuf],
            _ecosystem: &EcosystemVersionConfig,
            _language: &LanguageVersionConfig,
        ) -> Result<(), BoxError> {
            Ok(())
        }

        fn compiler_version(&self) -> &str {
            self.0
        }

        fn compile(&self, _sources: &[SourceFile]) -> Result<CompileOutcome, BoxError> {
            Ok(CompileOutcome::default())
        }
    }

    fn artifact(location: &str, symbol: &str, tag: &'static str) -> Box<dyn Artifact> {
        let mut symbols = SymbolTable::new();
        symbols.define(symbol, native_constructor(move || Tagged(tag)));
        Box::new(StaticArtifact::new(location, symbols))
    }

    fn host(tag: &'static str) -> Arc<dyn SymbolScope> {
        Arc::new(HostNamespace::empty().with_symbol("entry", native_constructor(move || Tagged(tag))))
    }

    #[test]
    fn test_own_artifacts_shadow_host() {
        let namespace = IsolatedNamespace::new(vec![artifact("a.so", "entry", "own")], host("host"));
        let wrapper = namespace.instantiate("entry").unwrap().unwrap();
        assert_eq!(wrapper.compiler_version(), "own");
    }

    #[test]
    fn test_falls_back_to_host() {
        let namespace =
            IsolatedNamespace::new(vec![artifact("a.so", "other", "own")], host("host"));
        let wrapper = namespace.instantiate("entry").unwrap().unwrap();
        assert_eq!(wrapper.compiler_version(), "host");
    }

    #[test]
    fn test_first_artifact_in_classpath_order_wins() {
        let namespace = IsolatedNamespace::new(
            vec![artifact("a.so", "entry", "first"), artifact("b.so", "entry", "second")],
            Arc::new(HostNamespace::empty()),
        );
        let wrapper = namespace.instantiate("entry").unwrap().unwrap();
        assert_eq!(wrapper.compiler_version(), "first");
    }

    #[test]
    fn test_unknown_symbol() {
        let namespace = IsolatedNamespace::new(Vec::new(), Arc::new(HostNamespace::empty()));
        assert!(namespace.instantiate("entry").is_none());
    }
}
