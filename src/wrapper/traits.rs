// Compiler wrapper contract shared by the host and wrapper artifacts

use std::path::PathBuf;

use crate::matrix::{EcosystemVersionConfig, LanguageVersionConfig};

/// Error type wrappers report across the plugin boundary
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name of the zero-argument constructor every wrapper artifact exports
pub const INITIALIZER_SYMBOL: &str = "wrapman_wrapper_create";

/// Name of the matching destructor. Optional; without it the host frees the
/// instance with its own allocator.
pub const DESTRUCTOR_SYMBOL: &str = "wrapman_wrapper_destroy";

/// Signature of [`INITIALIZER_SYMBOL`] in a wrapper shared library.
///
/// The returned pointer comes from `Box::into_raw`, or is null when
/// construction failed. Host and wrapper must be built with the same
/// toolchain since the trait object layout is not a stable ABI. Use
/// [`export_compiler_wrapper!`](crate::export_compiler_wrapper) rather than
/// writing these functions by hand.
#[allow(improper_ctypes_definitions)]
pub type WrapperCreateFn = unsafe extern "C-unwind" fn() -> *mut dyn CompilerWrapper;

/// Signature of [`DESTRUCTOR_SYMBOL`]: drops an instance returned by the constructor
#[allow(improper_ctypes_definitions)]
pub type WrapperDestroyFn = unsafe extern "C-unwind" fn(*mut dyn CompilerWrapper);

/// One version of the compiler backend.
///
/// Instances are constructed uninitialized inside their own namespace;
/// the registry calls [`CompilerWrapper::init`] exactly once before the
/// instance becomes visible to lookups.
pub trait CompilerWrapper: Send + Sync {
    /// Compiler bootstrap for this version
    fn init(
        &mut self,
        shared_libraries: &[PathBuf],
        ecosystem: &EcosystemVersionConfig,
        language: &LanguageVersionConfig,
    ) -> Result<(), BoxError>;

    /// Version reported by the wrapper implementation itself
    fn compiler_version(&self) -> &str;

    fn compile(&self, sources: &[SourceFile]) -> Result<CompileOutcome, BoxError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: Vec<String>,
}
