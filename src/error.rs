// Error handling framework for Wrapman
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WrapmanError>;

/// Main error type for Wrapman
#[derive(Debug, Error)]
pub enum WrapmanError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Wrapper registry error: {0}")]
    Registry(#[from] Box<RegistryError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CLI argument error: {0}")]
    Cli(#[from] Box<CliError>),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Invalid configuration value: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
        file_path: Option<PathBuf>,
    },

    #[error("Duplicate {kind} version: {version}")]
    DuplicateVersion {
        kind: String,
        version: String,
        file_path: Option<PathBuf>,
    },
}

/// Failures while loading a single wrapper, plus the explicit default request.
///
/// Every variant except [`RegistryError::NoDefaultAvailable`] is confined to
/// one matrix cell during registry initialization.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Artifacts not found for {language_version}: {reason}")]
    ArtifactsNotFound {
        language_version: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Cannot instantiate {symbol} from {location}: {reason}")]
    InstantiationError {
        symbol: String,
        location: String,
        reason: String,
    },

    #[error("Wrapper initialization failed for {ecosystem_version}/{language_version}: {reason}")]
    InitializationError {
        ecosystem_version: String,
        language_version: String,
        reason: String,
    },

    #[error("No language version config for {language_version} (ecosystem {ecosystem_version})")]
    LanguageConfigNotFound {
        ecosystem_version: String,
        language_version: String,
    },

    #[error("No default wrapper available")]
    NoDefaultAvailable,
}

/// CLI argument and command-line interface errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid argument: {argument}")]
    InvalidArgument {
        argument: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("Conflicting arguments: {first} and {second}")]
    ConflictingArguments {
        first: String,
        second: String,
        suggestion: String,
    },
}

impl RegistryError {
    /// Short machine-readable name for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::ArtifactsNotFound { .. } => "artifacts_not_found",
            RegistryError::InstantiationError { .. } => "instantiation",
            RegistryError::InitializationError { .. } => "initialization",
            RegistryError::LanguageConfigNotFound { .. } => "language_config_not_found",
            RegistryError::NoDefaultAvailable => "no_default_available",
        }
    }
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &WrapmanError) -> String {
        use tracing::error;
        match error {
            WrapmanError::Config(_) => {
                error!(error_type = "config", error = %error, "Configuration error occurred");
            }
            WrapmanError::Registry(_) => {
                error!(error_type = "registry", error = %error, "Wrapper registry error occurred");
            }
            WrapmanError::Cli(_) => {
                error!(error_type = "cli", error = %error, "CLI error occurred");
            }
            WrapmanError::Io(_) => {
                error!(error_type = "io", error = %error, "IO operation failed");
            }
            WrapmanError::Json(_) => {
                error!(error_type = "json", error = %error, "JSON serialization failed");
            }
        }

        let mut output = String::new();
        if self.use_colors {
            output.push_str("\x1b[31m"); // Red color
        }
        output.push_str("Error: ");
        if self.use_colors {
            output.push_str("\x1b[0m"); // Reset color
        }
        output.push_str(&error.to_string());

        match error {
            WrapmanError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            WrapmanError::Registry(registry_err) => {
                self.add_registry_context(&mut output, registry_err.as_ref());
            }
            WrapmanError::Cli(cli_err) => {
                self.add_cli_context(&mut output, cli_err.as_ref());
            }
            _ => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ConfigError::InvalidValue {
                field, expected, ..
            } => {
                output.push_str(&format!("\n  Field: {field} (expected {expected})"));
            }
            _ => {}
        }
    }

    fn add_registry_context(&self, output: &mut String, error: &RegistryError) {
        match error {
            RegistryError::ArtifactsNotFound { path, .. } => {
                output.push_str(&format!("\n  Looked in: {}", path.display()));
            }
            RegistryError::NoDefaultAvailable => {
                output.push_str(
                    "\n  Help: Flag one ecosystem version and one of its language versions as latest_stable",
                );
            }
            _ => {}
        }
    }

    fn add_cli_context(&self, output: &mut String, error: &CliError) {
        match error {
            CliError::InvalidArgument {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            CliError::ConflictingArguments { suggestion, .. } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            _ => {}
        }
    }
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const REGISTRY_ERROR: i32 = 3;
    pub const REGISTRY_EMPTY: i32 = 4;
    pub const CLI_ERROR: i32 = 7;
}

impl WrapmanError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            WrapmanError::Config(_) => exit_codes::CONFIG_ERROR,
            WrapmanError::Registry(_) => exit_codes::REGISTRY_ERROR,
            WrapmanError::Cli(_) => exit_codes::CLI_ERROR,
            WrapmanError::Io(_) | WrapmanError::Json(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        let formatter = ErrorFormatter::new(use_colors);
        formatter.format_error(self)
    }
}

impl From<RegistryError> for WrapmanError {
    fn from(error: RegistryError) -> Self {
        WrapmanError::Registry(Box::new(error))
    }
}

impl From<ConfigError> for WrapmanError {
    fn from(error: ConfigError) -> Self {
        WrapmanError::Config(Box::new(error))
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WrapmanError::Registry(Box::new(RegistryError::NoDefaultAvailable));
        assert_eq!(
            error.to_string(),
            "Wrapper registry error: No default wrapper available"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = WrapmanError::from(io_error);
        assert!(error.to_string().contains("IO operation failed"));
        assert_eq!(error.exit_code(), exit_codes::GENERAL_ERROR);
    }

    #[test]
    fn test_exit_codes() {
        let config = WrapmanError::from(ConfigError::NotFound {
            path: PathBuf::from("wrapman.yaml"),
            suggestion: None,
        });
        assert_eq!(config.exit_code(), exit_codes::CONFIG_ERROR);

        let registry = WrapmanError::from(RegistryError::NoDefaultAvailable);
        assert_eq!(registry.exit_code(), exit_codes::REGISTRY_ERROR);
    }

    #[test]
    fn test_registry_error_kind() {
        let error = RegistryError::ArtifactsNotFound {
            language_version: "1.3.0".to_string(),
            path: PathBuf::from("/srv/wrappers/1.3.0/kotlin"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(error.kind(), "artifacts_not_found");
        assert!(error.to_string().contains("1.3.0"));
    }

    #[test]
    fn test_user_message_includes_help() {
        let error = WrapmanError::from(RegistryError::NoDefaultAvailable);
        let message = error.user_message(false);
        assert!(message.starts_with("Error: "));
        assert!(message.contains("latest_stable"));
    }
}
