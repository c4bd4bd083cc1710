// Wrapman - Library module
// Loads isolated, versioned compiler wrappers and serves version-keyed lookups

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod registry;
pub mod wrapper;

// Re-export main types for easier access
pub use config::Config;
pub use error::{exit_codes, CliError, ConfigError, RegistryError, Result, WrapmanError};
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use matrix::{EcosystemVersionConfig, LanguageVersionConfig, VersionMatrix, VersionPair};
pub use registry::{CellFailure, LoadSettings, RegistryInit, WrapperRegistry};
pub use wrapper::{
    ArtifactLocator, CompileOutcome, CompilerWrapper, HostNamespace, HostSymbol, IsolatedLoader,
    LoadedWrapper, SourceFile, INITIALIZER_SYMBOL,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// Build information (set by build script)
pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Get formatted version string with build information
pub fn version_info() -> String {
    format!("{NAME} {VERSION} (commit: {GIT_COMMIT}, built: {BUILD_DATE})")
}
