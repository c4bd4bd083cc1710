// Compiler wrapper exported from a shared library
//
// The first language version bootstrapped by a loaded copy of this library is
// kept in a process-wide static. Two cells sharing one copy therefore report
// the same version, while copies in separate link-map namespaces do not.
// A language version ending in `-crash` panics during bootstrap.

use std::path::PathBuf;
use std::sync::OnceLock;

use wrapman::matrix::{EcosystemVersionConfig, LanguageVersionConfig};
use wrapman::wrapper::{BoxError, CompileOutcome, CompilerWrapper, SourceFile};

static BOUND_VERSION: OnceLock<String> = OnceLock::new();

#[derive(Default)]
pub struct FixtureWrapper {
    release: String,
}

impl CompilerWrapper for FixtureWrapper {
    fn init(
        &mut self,
        _shared_libraries: &[PathBuf],
        _ecosystem: &EcosystemVersionConfig,
        language: &LanguageVersionConfig,
    ) -> Result<(), BoxError> {
        if language.version.ends_with("-crash") {
            panic!("bootstrap of {} crashed", language.version);
        }
        self.release = BOUND_VERSION
            .get_or_init(|| language.version.clone())
            .clone();
        Ok(())
    }

    fn compiler_version(&self) -> &str {
        &self.release
    }

    fn compile(&self, sources: &[SourceFile]) -> Result<CompileOutcome, BoxError> {
        Ok(CompileOutcome {
            success: true,
            diagnostics: sources
                .iter()
                .map(|source| format!("{} compiled by {}", source.name, self.release))
                .collect(),
        })
    }
}

wrapman::export_compiler_wrapper!(FixtureWrapper::default);

wrapman::export_compiler_wrapper!(
    wrapman_fixture_refusing_create,
    wrapman_fixture_refusing_destroy => || -> FixtureWrapper {
        panic!("fixture constructor refused to start")
    }
);
