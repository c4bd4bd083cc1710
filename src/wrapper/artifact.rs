// Loadable artifacts and the symbols they define

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RegistryError;

use super::traits::{BoxError, CompilerWrapper};
use super::LoadResult;

/// In-process constructor for a wrapper
pub type NativeConstructor = Arc<dyn Fn() -> Box<dyn CompilerWrapper> + Send + Sync>;

/// Wrap a plain constructor closure as a [`NativeConstructor`]
pub fn native_constructor<F, W>(construct: F) -> NativeConstructor
where
    F: Fn() -> W + Send + Sync + 'static,
    W: CompilerWrapper + 'static,
{
    Arc::new(move || Box::new(construct()) as Box<dyn CompilerWrapper>)
}

/// One opened classpath entry (a shared library, or an in-memory symbol table)
pub trait Artifact: Send + Sync {
    fn location(&self) -> &Path;

    /// `None` when this artifact does not define `symbol`
    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>>;
}

/// Turns classpath files into artifacts
pub trait ArtifactOpener: Send + Sync {
    /// Start a fresh link scope. Every artifact of one namespace is opened
    /// through the same session, and no two namespaces share a session.
    fn session(&self) -> Box<dyn OpenSession>;
}

/// Opens the artifacts of a single namespace
pub trait OpenSession {
    /// `Ok(None)` for files this opener does not treat as artifacts
    fn open(&mut self, path: &Path) -> Result<Option<Box<dyn Artifact>>, BoxError>;
}

/// Symbols defined by name, each backed by a native constructor
#[derive(Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, NativeConstructor>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, constructor: NativeConstructor) {
        self.symbols.insert(name.into(), constructor);
    }

    pub fn defines(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.symbols.keys().map(String::as_str).collect()
    }

    pub fn instantiate(
        &self,
        symbol: &str,
        location: &Path,
    ) -> Option<LoadResult<Box<dyn CompilerWrapper>>> {
        self.symbols
            .get(symbol)
            .map(|constructor| construct_native(symbol, location, constructor))
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("symbols", &self.names())
            .finish()
    }
}

/// Artifact whose symbols live in memory
#[derive(Debug)]
pub struct StaticArtifact {
    location: PathBuf,
    symbols: SymbolTable,
}

impl StaticArtifact {
    pub fn new(location: impl Into<PathBuf>, symbols: SymbolTable) -> Self {
        Self {
            location: location.into(),
            symbols,
        }
    }
}

impl Artifact for StaticArtifact {
    fn location(&self) -> &Path {
        &self.location
    }

    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>> {
        self.symbols.instantiate(symbol, &self.location)
    }
}

/// Run a native constructor, turning a panic into an instantiation failure
pub fn construct_native(
    symbol: &str,
    location: &Path,
    constructor: &NativeConstructor,
) -> LoadResult<Box<dyn CompilerWrapper>> {
    panic::catch_unwind(AssertUnwindSafe(|| constructor())).map_err(|payload| {
        RegistryError::InstantiationError {
            symbol: symbol.to_string(),
            location: location.display().to_string(),
            reason: format!("constructor panicked: {}", panic_message(payload.as_ref())),
        }
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
