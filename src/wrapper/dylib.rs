// Shared-library artifacts loaded through libloading
//
// With `LinkIsolation::Namespace` (the default on glibc) every session opens
// its libraries in a fresh link-map namespace through `dlmopen`, so two
// versions never share a library or its dependencies, even when the files
// are identical or carry the same soname. glibc reserves static TLS for a
// small number of namespaces (tunable `glibc.rtld.nns`); a cell that runs out
// fails to open its artifacts like any other load failure.

use libloading::{Library, Symbol};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use crate::error::RegistryError;
use crate::matrix::{EcosystemVersionConfig, LanguageVersionConfig};

use super::artifact::{panic_message, Artifact, ArtifactOpener, OpenSession};
use super::traits::{
    BoxError, CompileOutcome, CompilerWrapper, SourceFile, WrapperCreateFn, WrapperDestroyFn,
    DESTRUCTOR_SYMBOL,
};
use super::LoadResult;

/// Extensions treated as wrapper libraries
pub const LIBRARY_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// How far the libraries of one namespace are separated from everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkIsolation {
    /// Private link-map namespace per session (`dlmopen`, glibc only).
    ///
    /// The namespace carries its own C library and allocator. Compile
    /// outcomes and errors a wrapper returns are copied into host memory and
    /// the originals are leaked rather than freed by the wrong allocator.
    /// Instances are released through the library's exported destructor.
    Namespace,
    /// Local symbol scope in the process-wide link map. Libraries already
    /// loaded by path or soname are shared between sessions.
    Local,
}

impl LinkIsolation {
    /// Strongest isolation the platform supports
    pub fn preferred() -> Self {
        if cfg!(all(target_os = "linux", target_env = "gnu")) {
            LinkIsolation::Namespace
        } else {
            LinkIsolation::Local
        }
    }
}

impl Default for LinkIsolation {
    fn default() -> Self {
        Self::preferred()
    }
}

/// Opens `.so` / `.dylib` / `.dll` files
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibOpener {
    isolation: LinkIsolation,
}

impl DylibOpener {
    pub fn new(isolation: LinkIsolation) -> Self {
        Self { isolation }
    }

    pub fn isolation(&self) -> LinkIsolation {
        self.isolation
    }

    pub fn is_library(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(&ext))
    }
}

impl ArtifactOpener for DylibOpener {
    fn session(&self) -> Box<dyn OpenSession> {
        Box::new(DylibSession {
            isolation: self.isolation,
            #[cfg(all(target_os = "linux", target_env = "gnu"))]
            namespace: None,
        })
    }
}

/// Libraries opened for one isolated namespace
pub struct DylibSession {
    isolation: LinkIsolation,
    /// Link-map namespace created by the first library of this session
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    namespace: Option<libc::Lmid_t>,
}

impl OpenSession for DylibSession {
    fn open(&mut self, path: &Path) -> Result<Option<Box<dyn Artifact>>, BoxError> {
        if !DylibOpener::is_library(path) {
            return Ok(None);
        }

        let library = match self.isolation {
            // SAFETY: running library initializers is inherent to loading wrapper artifacts.
            LinkIsolation::Local => unsafe { open_local(path) }?,
            LinkIsolation::Namespace => self.open_in_namespace(path)?,
        };
        tracing::debug!(
            path = %path.display(),
            isolation = ?self.isolation,
            "Opened wrapper library"
        );

        Ok(Some(Box::new(DylibArtifact {
            path: path.to_path_buf(),
            library,
            foreign_heap: self.isolation == LinkIsolation::Namespace,
        })))
    }
}

impl DylibSession {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn open_in_namespace(&mut self, path: &Path) -> Result<Library, BoxError> {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let filename = CString::new(path.as_os_str().as_bytes())?;
        let target = self.namespace.unwrap_or(libc::LM_ID_NEWLM);

        // SAFETY: `filename` is a valid C string; initializers run as with dlopen.
        let handle = unsafe { libc::dlmopen(target, filename.as_ptr(), RTLD_NOW | RTLD_LOCAL) };
        if handle.is_null() {
            return Err(last_dl_error("dlmopen").into());
        }

        if self.namespace.is_none() {
            let mut assigned: libc::Lmid_t = 0;
            // SAFETY: RTLD_DI_LMID writes one Lmid_t through the pointer.
            let status = unsafe {
                libc::dlinfo(
                    handle,
                    libc::RTLD_DI_LMID,
                    (&mut assigned as *mut libc::Lmid_t).cast(),
                )
            };
            if status != 0 {
                let message = last_dl_error("dlinfo");
                // SAFETY: `handle` came from dlmopen above and is not used again.
                unsafe { libc::dlclose(handle) };
                return Err(message.into());
            }
            tracing::debug!(namespace = assigned, "Created link-map namespace");
            self.namespace = Some(assigned);
        }

        // SAFETY: `handle` is a live dlmopen handle; `Library` takes over the dlclose.
        Ok(Library::from(unsafe { UnixLibrary::from_raw(handle) }))
    }

    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    fn open_in_namespace(&mut self, _path: &Path) -> Result<Library, BoxError> {
        Err("link-map namespaces require glibc; use LinkIsolation::Local".into())
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn last_dl_error(call: &str) -> String {
    // SAFETY: dlerror returns null or a NUL-terminated thread-local message.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        format!("{call} failed")
    } else {
        let text = unsafe { std::ffi::CStr::from_ptr(message) };
        format!("{call} failed: {}", text.to_string_lossy())
    }
}

/// RTLD_NOW so unresolved symbols surface here rather than mid-compilation
#[cfg(unix)]
unsafe fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL).map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    Library::new(path)
}

pub struct DylibArtifact {
    path: PathBuf,
    library: Library,
    /// Library allocates from a C library other than the host's
    foreign_heap: bool,
}

impl DylibArtifact {
    fn instantiation_error(&self, symbol: &str, reason: String) -> RegistryError {
        RegistryError::InstantiationError {
            symbol: symbol.to_string(),
            location: self.path.display().to_string(),
            reason,
        }
    }
}

impl Artifact for DylibArtifact {
    fn location(&self) -> &Path {
        &self.path
    }

    fn instantiate(&self, symbol: &str) -> Option<LoadResult<Box<dyn CompilerWrapper>>> {
        // SAFETY: wrapper artifacts export `symbol` with the `WrapperCreateFn` signature.
        let create: Symbol<WrapperCreateFn> = unsafe { self.library.get(symbol.as_bytes()) }.ok()?;
        let destroy: Option<WrapperDestroyFn> =
            unsafe { self.library.get::<WrapperDestroyFn>(DESTRUCTOR_SYMBOL.as_bytes()) }
                .ok()
                .map(|destroy| *destroy);

        // Only catches panics of a library sharing the host runtime; exported
        // constructors catch their own.
        let raw = match panic::catch_unwind(AssertUnwindSafe(|| unsafe { create() })) {
            Ok(raw) => raw,
            Err(payload) => {
                return Some(Err(self.instantiation_error(
                    symbol,
                    format!("constructor panicked: {}", panic_message(payload.as_ref())),
                )))
            }
        };

        let Some(raw) = NonNull::new(raw) else {
            return Some(Err(
                self.instantiation_error(symbol, "constructor returned null".to_string())
            ));
        };

        Some(Ok(Box::new(ForeignWrapper {
            raw,
            destroy,
            foreign_heap: self.foreign_heap,
        })))
    }
}

/// Instance owned by a wrapper library, released through its own destructor
struct ForeignWrapper {
    raw: NonNull<dyn CompilerWrapper>,
    destroy: Option<WrapperDestroyFn>,
    foreign_heap: bool,
}

impl ForeignWrapper {
    /// Move a returned value into host memory when the library has its own heap
    fn adopt<T>(
        &self,
        result: Result<T, BoxError>,
        copy: impl FnOnce(&T) -> T,
    ) -> Result<T, BoxError> {
        if !self.foreign_heap {
            return result;
        }
        match result {
            Ok(value) => {
                let owned = copy(&value);
                mem::forget(value);
                Ok(owned)
            }
            Err(e) => {
                let message = e.to_string();
                mem::forget(e);
                Err(message.into())
            }
        }
    }
}

// SAFETY: the pointee is a `CompilerWrapper`, which is `Send + Sync`.
unsafe impl Send for ForeignWrapper {}
unsafe impl Sync for ForeignWrapper {}

impl CompilerWrapper for ForeignWrapper {
    fn init(
        &mut self,
        shared_libraries: &[PathBuf],
        ecosystem: &EcosystemVersionConfig,
        language: &LanguageVersionConfig,
    ) -> Result<(), BoxError> {
        // SAFETY: `raw` stays valid until drop and is uniquely owned here.
        let result = unsafe { self.raw.as_mut() }.init(shared_libraries, ecosystem, language);
        self.adopt(result, |_| ())
    }

    fn compiler_version(&self) -> &str {
        unsafe { self.raw.as_ref() }.compiler_version()
    }

    fn compile(&self, sources: &[SourceFile]) -> Result<CompileOutcome, BoxError> {
        let result = unsafe { self.raw.as_ref() }.compile(sources);
        self.adopt(result, CompileOutcome::clone)
    }
}

impl Drop for ForeignWrapper {
    fn drop(&mut self) {
        match self.destroy {
            // SAFETY: `raw` came from the same library's constructor.
            Some(destroy) => unsafe { destroy(self.raw.as_ptr()) },
            None => drop(unsafe { Box::from_raw(self.raw.as_ptr()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_library() {
        assert!(DylibOpener::is_library(Path::new("libwrapper.so")));
        assert!(DylibOpener::is_library(Path::new("wrapper.dll")));
        assert!(DylibOpener::is_library(Path::new("libwrapper.dylib")));
        assert!(!DylibOpener::is_library(Path::new("kotlin-compiler.jar")));
        assert!(!DylibOpener::is_library(Path::new("README")));
    }

    #[test]
    fn test_default_isolation_matches_platform() {
        let expected = if cfg!(all(target_os = "linux", target_env = "gnu")) {
            LinkIsolation::Namespace
        } else {
            LinkIsolation::Local
        };
        assert_eq!(DylibOpener::default().isolation(), expected);
    }

    #[test]
    fn test_non_library_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "not a library").unwrap();

        for isolation in [LinkIsolation::Namespace, LinkIsolation::Local] {
            let mut session = DylibOpener::new(isolation).session();
            assert!(session.open(&path).unwrap().is_none());
        }
    }

    #[test]
    fn test_corrupt_library_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libbroken.so");
        fs::write(&path, "definitely not an ELF image").unwrap();

        for isolation in [LinkIsolation::preferred(), LinkIsolation::Local] {
            let mut session = DylibOpener::new(isolation).session();
            assert!(session.open(&path).is_err());
        }
    }
}
