// CLI interface for Wrapman using clap
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::{exit_codes, CliError, Result, WrapmanError};
use crate::registry::{RegistryInit, WrapperRegistry};
use crate::wrapper::IsolatedLoader;

#[derive(Parser)]
#[command(
    name = "wrapman",
    about = "Wrapman - Loads isolated, versioned compiler wrappers side by side in one process",
    version = crate::VERSION,
    long_about = "Wrapman loads one isolated compiler wrapper per (ecosystem version, language version) pair declared in its configuration and reports which pairs are available."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "wrapman.yaml")]
    pub config: String,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Prefix log records with a timestamp
    #[arg(long, global = true)]
    pub log_timestamps: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every configured wrapper and report the result (default command)
    Check,

    /// List loaded ecosystem versions, or the loaded language versions of one ecosystem
    Versions {
        /// Ecosystem version whose language versions to list
        #[arg(long)]
        ecosystem: Option<String>,
    },

    /// Print the configured version matrix as JSON
    Matrix,

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completion for
        shell: Shell,
    },
}

#[derive(Serialize)]
struct CheckReport<'a> {
    loaded: Vec<String>,
    default: Option<String>,
    failures: Vec<FailureReport<'a>>,
}

#[derive(Serialize)]
struct FailureReport<'a> {
    ecosystem_version: &'a str,
    language_version: &'a str,
    kind: &'static str,
    cause: String,
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        self.init_logging();

        if self.verbose && self.quiet {
            return Err(WrapmanError::Cli(Box::new(CliError::ConflictingArguments {
                first: "--verbose".to_string(),
                second: "--quiet".to_string(),
                suggestion: "Use either --verbose for more output or --quiet for less output, but not both".to_string(),
            })));
        }

        if let Some(format) = self.log_format.as_deref() {
            if !["pretty", "json", "compact"].contains(&format) {
                return Err(WrapmanError::Cli(Box::new(CliError::InvalidArgument {
                    argument: "--log-format".to_string(),
                    message: format!("Unknown log format '{format}'"),
                    suggestion: Some("Use one of: pretty, json, compact".to_string()),
                })));
            }
        }

        match &self.command {
            Some(Commands::Check) | None => self.check(),
            Some(Commands::Versions { ecosystem }) => self.versions(ecosystem.as_deref()),
            Some(Commands::Matrix) => {
                let config = self.load_config()?;
                print_json(&config.matrix())?;
                Ok(exit_codes::SUCCESS)
            }
            Some(Commands::GenerateCompletion { shell }) => {
                let mut cmd = Self::command();
                let name = cmd.get_name().to_string();
                generate(*shell, &mut cmd, name, &mut std::io::stdout());
                Ok(exit_codes::SUCCESS)
            }
        }
    }

    fn check(&self) -> Result<i32> {
        let init = self.init_registry()?;
        let registry = &init.registry;

        let report = CheckReport {
            loaded: registry.pairs().iter().map(ToString::to_string).collect(),
            default: registry.default_pair().map(ToString::to_string),
            failures: init
                .failures
                .iter()
                .map(|failure| FailureReport {
                    ecosystem_version: &failure.pair.ecosystem_version,
                    language_version: &failure.pair.language_version,
                    kind: failure.error.kind(),
                    cause: failure.error.to_string(),
                })
                .collect(),
        };

        if !self.quiet {
            print_json(&report)?;
        }

        if registry.is_empty() {
            Ok(exit_codes::REGISTRY_EMPTY)
        } else {
            Ok(exit_codes::SUCCESS)
        }
    }

    fn versions(&self, ecosystem: Option<&str>) -> Result<i32> {
        let init = self.init_registry()?;
        let versions = match ecosystem {
            Some(ecosystem) => init.registry.language_versions(ecosystem),
            None => init.registry.ecosystem_versions(),
        };
        print_json(&versions)?;
        Ok(exit_codes::SUCCESS)
    }

    fn load_config(&self) -> Result<Config> {
        Config::from_file(Path::new(&self.config))
    }

    fn init_registry(&self) -> Result<RegistryInit> {
        let config = self.load_config()?;
        Ok(WrapperRegistry::init(
            &config.matrix(),
            &config.settings(),
            &IsolatedLoader::dylib(),
        ))
    }

    fn init_logging(&self) {
        use crate::logging::{init_logging, LogConfig, LogFormat};

        let log_config = LogConfig::from_cli(self.verbose, self.quiet, self.color.clone())
            .with_format(LogFormat::from_name(self.log_format.as_deref()))
            .with_timestamps(self.log_timestamps);

        if let Err(e) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
