// Library side of the wrapper contract
//
// A wrapper shared library links its own copy of the Rust runtime, so a panic
// raised inside it cannot be caught by the host. Everything here runs inside
// the wrapper library and turns panics into null pointers or errors before
// they reach the boundary.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use crate::matrix::{EcosystemVersionConfig, LanguageVersionConfig};

use super::artifact::panic_message;
use super::traits::{BoxError, CompileOutcome, CompilerWrapper, SourceFile};

/// Reports a panic in a wrapper method as an error of that method
pub struct PanicGuard<W> {
    inner: W,
}

impl<W: CompilerWrapper> PanicGuard<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn guarded<T>(
    operation: &str,
    call: impl FnOnce() -> Result<T, BoxError>,
) -> Result<T, BoxError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(format!("{operation} panicked: {}", panic_message(payload.as_ref())).into())
    })
}

impl<W: CompilerWrapper> CompilerWrapper for PanicGuard<W> {
    fn init(
        &mut self,
        shared_libraries: &[PathBuf],
        ecosystem: &EcosystemVersionConfig,
        language: &LanguageVersionConfig,
    ) -> Result<(), BoxError> {
        guarded("init", || {
            self.inner.init(shared_libraries, ecosystem, language)
        })
    }

    fn compiler_version(&self) -> &str {
        self.inner.compiler_version()
    }

    fn compile(&self, sources: &[SourceFile]) -> Result<CompileOutcome, BoxError> {
        guarded("compile", || self.inner.compile(sources))
    }
}

/// Body of a generated constructor: null when `construct` panics
#[doc(hidden)]
pub fn create_raw<F, W>(construct: F) -> *mut dyn CompilerWrapper
where
    F: FnOnce() -> W,
    W: CompilerWrapper + 'static,
{
    match panic::catch_unwind(AssertUnwindSafe(construct)) {
        Ok(wrapper) => {
            let boxed: Box<dyn CompilerWrapper> = Box::new(PanicGuard::new(wrapper));
            Box::into_raw(boxed)
        }
        Err(_) => std::ptr::null_mut::<Unconstructed>() as *mut dyn CompilerWrapper,
    }
}

/// Body of a generated destructor
///
/// # Safety
/// `raw` is null or came from [`create_raw`] in the same library and was not freed yet.
#[doc(hidden)]
pub unsafe fn destroy_raw(raw: *mut dyn CompilerWrapper) {
    if !raw.is_null() {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| drop(Box::from_raw(raw))));
    }
}

/// Type behind the null pointer of a failed construction; never instantiated
#[doc(hidden)]
pub enum Unconstructed {}

impl CompilerWrapper for Unconstructed {
    fn init(
        &mut self,
        _shared_libraries: &[PathBuf],
        _ecosystem: &EcosystemVersionConfig,
        _language: &LanguageVersionConfig,
    ) -> Result<(), BoxError> {
        match *self {}
    }

    fn compiler_version(&self) -> &str {
        match *self {}
    }

    fn compile(&self, _sources: &[SourceFile]) -> Result<CompileOutcome, BoxError> {
        match *self {}
    }
}

/// Export a wrapper constructor and destructor from a `cdylib`.
///
/// ```ignore
/// wrapman::export_compiler_wrapper!(KotlinWrapper::default);
///
/// // Custom symbol names
/// wrapman::export_compiler_wrapper!(legacy_create, legacy_destroy => || KotlinWrapper::legacy());
/// ```
#[macro_export]
macro_rules! export_compiler_wrapper {
    ($create:ident, $destroy:ident => $constructor:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn $create() -> *mut dyn $crate::wrapper::CompilerWrapper {
            $crate::wrapper::export::create_raw($constructor)
        }

        /// # Safety
        /// `raw` must come from the matching constructor.
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C-unwind" fn $destroy(raw: *mut dyn $crate::wrapper::CompilerWrapper) {
            $crate::wrapper::export::destroy_raw(raw)
        }
    };
    ($constructor:expr) => {
        $crate::export_compiler_wrapper!(
            wrapman_wrapper_create,
            wrapman_wrapper_destroy => $constructor
        );
    };
}
