//! Custom functions plugin configuration
//!
//! Options can be built in code or loaded from the `customFunctions` section
//! of `fob.config.json`, with `FOB_CUSTOM_FUNCTIONS_*` environment variables
//! taking precedence over the file.

use crate::error::CustomFunctionsError;
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up in the project root when no explicit path is given
pub const CONFIG_FILE: &str = "fob.config.json";

/// Key of the plugin section inside the config file
pub const CONFIG_KEY: &str = "customFunctions";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "FOB_CUSTOM_FUNCTIONS_";

/// Env key (after the prefix) read by the `logging` feature, not an option
pub const LOG_ENV_KEY: &str = "LOG";

/// Default timeout for the generator process
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_output() -> PathBuf {
    PathBuf::from("functions.json")
}

fn default_module_name() -> String {
    "functions.js".to_string()
}

/// Output directory used when neither the plugin nor the bundler names one
pub const DEFAULT_OUT_DIR: &str = "dist";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Source files declaring custom functions: a single path or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputFiles {
    One(String),
    Many(Vec<String>),
}

impl InputFiles {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(file) => std::slice::from_ref(file),
            Self::Many(files) => files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// First configured input as written by the user
    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }
}

impl Default for InputFiles {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl fmt::Display for InputFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_slice().join(","))
    }
}

impl From<&str> for InputFiles {
    fn from(file: &str) -> Self {
        Self::One(file.to_string())
    }
}

impl From<String> for InputFiles {
    fn from(file: String) -> Self {
        Self::One(file)
    }
}

impl From<Vec<String>> for InputFiles {
    fn from(files: Vec<String>) -> Self {
        Self::Many(files)
    }
}

impl From<Vec<&str>> for InputFiles {
    fn from(files: Vec<&str>) -> Self {
        Self::Many(files.into_iter().map(str::to_string).collect())
    }
}

/// Options for the Node-backed metadata generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorOptions {
    /// JavaScript runtime used to run `custom-functions-metadata`
    ///
    /// Supported values: "node", "bun". Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Seconds to wait for the generator before giving up
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            runtime: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// User-facing plugin options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomFunctionsOptions {
    /// Source file(s) declaring custom functions
    #[serde(default)]
    pub input: InputFiles,

    /// Metadata artifact path, relative to the output directory
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// File name of the generated aggregation module
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Production output directory, relative to the project root
    ///
    /// When unset, artifacts follow the bundler's own output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// Project root; defaults to the bundler's working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Generator process settings
    #[serde(default)]
    pub generator: GeneratorOptions,
}

impl Default for CustomFunctionsOptions {
    fn default() -> Self {
        Self {
            input: InputFiles::default(),
            output: default_output(),
            module_name: default_module_name(),
            out_dir: None,
            root: None,
            generator: GeneratorOptions::default(),
        }
    }
}

impl CustomFunctionsOptions {
    /// Create options for the given input file(s) and metadata output path
    pub fn new(input: impl Into<InputFiles>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(out_dir.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.generator.runtime = Some(runtime.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.generator.timeout_secs = timeout_secs;
        self
    }

    /// Load options from multiple sources.
    /// Priority: environment variables > config file > defaults
    ///
    /// When `config_path` is `None`, `fob.config.json` in `root` is used if it exists.
    /// A missing `root` option is filled in with `root`.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self, CustomFunctionsError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = config_path.map(Path::to_path_buf).or_else(|| {
            let default_path = root.join(CONFIG_FILE);
            default_path.exists().then_some(default_path)
        });

        if let Some(path) = config_file {
            figment = figment.merge(Figment::from(Json::file(path)).focus(CONFIG_KEY));
        }

        // FOB_CUSTOM_FUNCTIONS_OUT_DIR -> outDir, FOB_CUSTOM_FUNCTIONS_GENERATOR__RUNTIME -> generator.runtime
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&[LOG_ENV_KEY])
                .lowercase(false)
                .map(|key| env_key_to_camel(key.as_str()).into())
                .split("__"),
        );

        let mut options: Self = figment
            .extract()
            .map_err(|e| CustomFunctionsError::Config(e.to_string()))?;

        if options.root.is_none() {
            options.root = Some(root.to_path_buf());
        }

        Ok(options)
    }

    /// Resolve every configured path against the project root
    pub fn resolve(&self) -> Result<ResolvedOptions, CustomFunctionsError> {
        if self.input.is_empty() {
            return Err(CustomFunctionsError::NoInputs);
        }

        let root = match &self.root {
            Some(root) if root.is_absolute() => root.clean(),
            Some(root) => current_dir()?.join(root).clean(),
            None => current_dir()?.clean(),
        };

        let inputs = self
            .input
            .as_slice()
            .iter()
            .map(|file| root.join(file).clean())
            .collect();

        Ok(ResolvedOptions {
            input: self.input.clone(),
            inputs,
            output: self.output.clone(),
            module_name: self.module_name.clone(),
            out_dir: self.out_dir.as_ref().map(|dir| root.join(dir).clean()),
            root,
            generator: self.generator.clone(),
        })
    }
}

fn current_dir() -> Result<PathBuf, CustomFunctionsError> {
    std::env::current_dir().map_err(CustomFunctionsError::CurrentDir)
}

/// Convert an environment key such as `OUT_DIR` or `GENERATOR__TIMEOUT_SECS`
/// into the camelCase form used by the config file, keeping `__` separators
fn env_key_to_camel(key: &str) -> String {
    key.split("__")
        .map(|segment| {
            let mut camel = String::with_capacity(segment.len());
            for (i, word) in segment.split('_').filter(|w| !w.is_empty()).enumerate() {
                let lower = word.to_ascii_lowercase();
                if i == 0 {
                    camel.push_str(&lower);
                } else {
                    let mut chars = lower.chars();
                    if let Some(first) = chars.next() {
                        camel.push(first.to_ascii_uppercase());
                        camel.push_str(chars.as_str());
                    }
                }
            }
            camel
        })
        .collect::<Vec<_>>()
        .join("__")
}

/// Options with every path made absolute
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Input option exactly as configured
    pub input: InputFiles,

    /// Absolute, cleaned input files
    pub inputs: Vec<PathBuf>,

    /// Metadata artifact path relative to the output location
    pub output: PathBuf,

    /// Aggregation module file name
    pub module_name: String,

    /// Absolute project root
    pub root: PathBuf,

    /// Absolute production output directory, if configured on the plugin
    pub out_dir: Option<PathBuf>,

    pub generator: GeneratorOptions,
}

impl ResolvedOptions {
    /// Resolved input file whose path is a suffix of the module id
    pub fn find_input(&self, id: &str) -> Option<&Path> {
        self.inputs
            .iter()
            .find(|file| id.ends_with(file.to_string_lossy().as_ref()))
            .map(PathBuf::as_path)
    }

    /// Directory receiving the production artifacts
    ///
    /// An explicit `outDir` wins. Otherwise the bundler's output directory is
    /// used, relative to the bundler's working directory.
    pub fn artifact_dir(&self, host_cwd: &Path, host_out_dir: &str) -> PathBuf {
        if let Some(dir) = &self.out_dir {
            return dir.clone();
        }

        let cwd = if host_cwd.as_os_str().is_empty() {
            self.root.as_path()
        } else {
            host_cwd
        };
        let dir = if host_out_dir.is_empty() {
            DEFAULT_OUT_DIR
        } else {
            host_out_dir
        };
        let dir = cwd.join(dir);
        if dir.is_absolute() {
            dir.clean()
        } else {
            self.root.join(dir).clean()
        }
    }

    /// Metadata artifact location inside `dir`
    pub fn metadata_path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.output).clean()
    }

    /// Aggregation module location inside `dir`, next to the metadata artifact
    pub fn module_path_in(&self, dir: &Path) -> PathBuf {
        let metadata = self.metadata_path_in(dir);
        match metadata.parent() {
            Some(parent) => parent.join(&self.module_name),
            None => dir.join(&self.module_name),
        }
    }

    /// URL suffix that identifies metadata requests on the dev server
    pub fn output_route(&self) -> String {
        self.output
            .to_string_lossy()
            .replace('\\', "/")
            .trim_start_matches("./")
            .to_string()
    }
}
