//! Metadata generation via the `custom-functions-metadata` npm package
//!
//! The plugin never parses source files itself. It hands the resolved input
//! paths to a [`MetadataGenerator`] and trusts whatever comes back. The default
//! implementation runs a tiny bridge script under Node.js (or Bun) from the
//! project root, writing the input list to stdin and reading the generation
//! result as JSON from stdout.

use crate::config::GeneratorOptions;
use crate::error::GeneratorError;
use crate::metadata::GenerateResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

/// Maximum allowed size for generator output (50 MB)
const MAX_OUTPUT_SIZE: usize = 50 * 1024 * 1024;

/// Bridge script: reads a JSON array of files from stdin, prints the result as JSON
const BRIDGE_SCRIPT: &str = r#"
const { generateCustomFunctionsMetadata } = require("custom-functions-metadata");
let input = "";
process.stdin.setEncoding("utf8");
process.stdin.on("data", (chunk) => (input += chunk));
process.stdin.on("end", () => {
  generateCustomFunctionsMetadata(JSON.parse(input), true).then(
    (result) => {
      process.stdout.write(
        JSON.stringify({
          errors: result.errors,
          associate: result.associate,
          metadataJson: result.metadataJson,
        })
      );
    },
    (error) => {
      process.stderr.write(String((error && error.message) || error));
      process.exit(1);
    }
  );
});
"#;

/// Produces custom functions metadata for a set of source files
#[async_trait]
pub trait MetadataGenerator: std::fmt::Debug + Send + Sync {
    /// Generate metadata for the given absolute input paths
    async fn generate(&self, inputs: &[PathBuf]) -> Result<GenerateResult, GeneratorError>;
}

/// Generator that always returns the same result
///
/// Useful when metadata is produced ahead of time, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataGenerator {
    result: GenerateResult,
}

impl StaticMetadataGenerator {
    pub fn new(result: GenerateResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl MetadataGenerator for StaticMetadataGenerator {
    async fn generate(&self, _inputs: &[PathBuf]) -> Result<GenerateResult, GeneratorError> {
        Ok(self.result.clone())
    }
}

/// JavaScript runtimes able to run the bridge script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsRuntime {
    /// Node.js
    Node,
    /// Bun
    Bun,
}

impl JsRuntime {
    /// Detect the runtime from package.json and lockfiles
    ///
    /// Priority: packageManager field > bun lockfile > Node.js
    fn detect(project_root: &Path) -> Self {
        if let Ok(content) = std::fs::read_to_string(project_root.join("package.json")) {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(pm) = parsed.get("packageManager").and_then(|v| v.as_str()) {
                    if pm.starts_with("bun") {
                        return Self::Bun;
                    }
                }
            }
        }

        if project_root.join("bun.lockb").exists() || project_root.join("bun.lock").exists() {
            return Self::Bun;
        }

        Self::Node
    }

    /// Parse a runtime name from configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "node" | "nodejs" => Some(Self::Node),
            "bun" => Some(Self::Bun),
            _ => None,
        }
    }

    /// Binary to spawn for this runtime
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Bun => "bun",
        }
    }

    /// Arguments that evaluate the bridge script
    fn eval_args(&self) -> [&'static str; 2] {
        match self {
            Self::Node => ["-e", BRIDGE_SCRIPT],
            Self::Bun => ["--eval", BRIDGE_SCRIPT],
        }
    }
}

/// Runs `custom-functions-metadata` through a JavaScript runtime
#[derive(Debug, Clone)]
pub struct NodeMetadataGenerator {
    /// Runtime used to execute the bridge script
    runtime: JsRuntime,

    /// Working directory, so `require` resolves the project's node_modules
    project_root: PathBuf,

    /// Timeout for a generation run in seconds
    timeout_secs: u64,
}

impl NodeMetadataGenerator {
    /// Create a generator, auto-detecting the runtime
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            runtime: JsRuntime::detect(&project_root),
            project_root,
            timeout_secs: crate::config::DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create a generator from plugin options
    ///
    /// Unknown runtime names fall back to auto-detection.
    pub fn from_options(options: &GeneratorOptions, project_root: PathBuf) -> Self {
        let runtime = options
            .runtime
            .as_deref()
            .and_then(JsRuntime::from_name)
            .unwrap_or_else(|| JsRuntime::detect(&project_root));

        Self {
            runtime,
            project_root,
            timeout_secs: options.timeout_secs,
        }
    }

    pub fn with_runtime(mut self, runtime: JsRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn runtime(&self) -> JsRuntime {
        self.runtime
    }
}

#[async_trait]
impl MetadataGenerator for NodeMetadataGenerator {
    async fn generate(&self, inputs: &[PathBuf]) -> Result<GenerateResult, GeneratorError> {
        let payload = serde_json::to_vec(inputs).map_err(GeneratorError::invalid_output)?;

        let mut cmd = Command::new(self.runtime.binary());
        cmd.args(self.runtime.eval_args())
            .current_dir(&self.project_root);

        let output = run_with_input(cmd, &payload, self.timeout_secs)
            .await
            .map_err(|e| match e {
                GeneratorError::SpawnFailed { source }
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    GeneratorError::runtime_not_found(self.runtime.binary())
                }
                other => other,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(GeneratorError::exit_error(exit_code, stderr));
        }

        parse_output(&output.stdout)
    }
}

/// Spawn `cmd`, feed `payload` on stdin and collect its output
///
/// Writing stdin and waiting for exit share one deadline; the child is
/// killed when the deadline passes.
async fn run_with_input(
    mut cmd: Command,
    payload: &[u8],
    timeout_secs: u64,
) -> Result<Output, GeneratorError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(GeneratorError::spawn_failed)?;

    let mut stdin = child.stdin.take().ok_or_else(|| {
        GeneratorError::spawn_failed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "Failed to capture stdin",
        ))
    })?;

    let run = async move {
        stdin.write_all(payload).await?;
        drop(stdin); // EOF starts generation
        child.wait_with_output().await
    };

    timeout(Duration::from_secs(timeout_secs), run)
        .await
        .map_err(|_| GeneratorError::timeout(timeout_secs))?
        .map_err(GeneratorError::spawn_failed)
}

/// Parse bridge script stdout into a generation result
fn parse_output(stdout: &[u8]) -> Result<GenerateResult, GeneratorError> {
    if stdout.len() > MAX_OUTPUT_SIZE {
        return Err(GeneratorError::output_too_large(
            stdout.len(),
            MAX_OUTPUT_SIZE,
        ));
    }

    serde_json::from_slice(stdout).map_err(GeneratorError::invalid_output)
}
