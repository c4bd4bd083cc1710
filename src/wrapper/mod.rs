// Versioned compiler wrapper loading
// Each language version is loaded from its own artifact directory into an isolated namespace

pub mod artifact;
pub mod dylib;
pub mod export;
pub mod loader;
pub mod locator;
pub mod namespace;
pub mod traits;

use crate::error::RegistryError;

pub type LoadResult<T> = std::result::Result<T, RegistryError>;

// Re-export main types for easier access
pub use artifact::{
    construct_native, native_constructor, Artifact, ArtifactOpener, NativeConstructor,
    OpenSession, StaticArtifact, SymbolTable,
};
pub use dylib::{DylibArtifact, DylibOpener, DylibSession, LinkIsolation, LIBRARY_EXTENSIONS};
pub use export::PanicGuard;
pub use loader::{IsolatedLoader, LoadedWrapper};
pub use locator::{ArtifactLocator, ARTIFACTS_DIR};
pub use namespace::{HostNamespace, HostSymbol, IsolatedNamespace, SymbolScope};
pub use traits::{
    BoxError, CompileOutcome, CompilerWrapper, SourceFile, WrapperCreateFn, WrapperDestroyFn,
    DESTRUCTOR_SYMBOL, INITIALIZER_SYMBOL,
};
