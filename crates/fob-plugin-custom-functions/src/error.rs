//! Error types for custom functions metadata generation and artifact output

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Join generator-reported errors, one per line, each prefixed with the input option
fn format_generation_errors(input: &str, errors: &[String]) -> String {
    errors
        .iter()
        .map(|err| format!("{} {}", input, err))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors raised while running the external metadata generator
#[derive(Error, Debug, Diagnostic)]
pub enum GeneratorError {
    /// JavaScript runtime binary could not be found
    #[error("JavaScript runtime '{binary_name}' not found in PATH")]
    #[diagnostic(
        code(fob::custom_functions::runtime_not_found),
        help("Install Node.js (or Bun) and make sure it is available in your PATH")
    )]
    RuntimeNotFound { binary_name: String },

    /// Failed to spawn or talk to the generator process
    #[error("Failed to run metadata generator process: {source}")]
    #[diagnostic(code(fob::custom_functions::spawn_failed))]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },

    /// Generator process exited with non-zero status
    #[error("Metadata generator exited with code {exit_code}")]
    #[diagnostic(code(fob::custom_functions::exit_error))]
    ExitError {
        exit_code: i32,
        #[help]
        stderr: String,
    },

    /// Generator process timed out
    #[error("Metadata generator timed out after {timeout_secs} seconds")]
    #[diagnostic(
        code(fob::custom_functions::timeout),
        help("Increase generator.timeoutSecs or check that custom-functions-metadata is installed")
    )]
    Timeout { timeout_secs: u64 },

    /// Output from the generator exceeded the maximum allowed size
    #[error("Generator output too large: {actual_bytes} bytes (max: {max_bytes} bytes)")]
    #[diagnostic(code(fob::custom_functions::output_too_large))]
    OutputTooLarge {
        actual_bytes: usize,
        max_bytes: usize,
    },

    /// Generator output was not a valid generation result
    #[error("Invalid generator output: {source}")]
    #[diagnostic(
        code(fob::custom_functions::invalid_output),
        help("The generator must print a JSON object with errors, associate and metadataJson")
    )]
    InvalidOutput {
        #[source]
        source: serde_json::Error,
    },
}

impl GeneratorError {
    pub fn runtime_not_found(binary_name: impl Into<String>) -> Self {
        Self::RuntimeNotFound {
            binary_name: binary_name.into(),
        }
    }

    pub fn spawn_failed(source: std::io::Error) -> Self {
        Self::SpawnFailed { source }
    }

    pub fn exit_error(exit_code: i32, stderr: String) -> Self {
        Self::ExitError { exit_code, stderr }
    }

    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    pub fn output_too_large(actual_bytes: usize, max_bytes: usize) -> Self {
        Self::OutputTooLarge {
            actual_bytes,
            max_bytes,
        }
    }

    pub fn invalid_output(source: serde_json::Error) -> Self {
        Self::InvalidOutput { source }
    }
}

/// Errors surfaced by the plugin to the bundler or its caller
#[derive(Error, Debug, Diagnostic)]
pub enum CustomFunctionsError {
    /// Configuration could not be loaded or extracted
    #[error("Invalid custom functions configuration: {0}")]
    #[diagnostic(
        code(fob::custom_functions::config),
        help("Check the customFunctions section of fob.config.json and FOB_CUSTOM_FUNCTIONS_* variables")
    )]
    Config(String),

    /// No input files were configured
    #[error("No custom functions input files configured")]
    #[diagnostic(
        code(fob::custom_functions::no_inputs),
        help("Set `input` to a source file or a list of source files")
    )]
    NoInputs,

    /// Current working directory could not be determined for path resolution
    #[error("Failed to determine the project root: {0}")]
    #[diagnostic(code(fob::custom_functions::current_dir))]
    CurrentDir(#[source] std::io::Error),

    /// Generator reported errors for the configured input files
    #[error("{}", format_generation_errors(.input, .errors))]
    #[diagnostic(code(fob::custom_functions::generation))]
    Generation { input: String, errors: Vec<String> },

    /// Generator could not be run at all
    #[error("Failed to generate metadata: {0}")]
    #[diagnostic(code(fob::custom_functions::generator))]
    Generator(#[from] GeneratorError),

    /// Writing an artifact to disk failed
    #[error("Failed to write metadata file {}: {source}", .path.display())]
    #[diagnostic(
        code(fob::custom_functions::write_failed),
        help("Check output directory permissions")
    )]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CustomFunctionsError {
    pub fn generation(input: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Generation {
            input: input.into(),
            errors,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
