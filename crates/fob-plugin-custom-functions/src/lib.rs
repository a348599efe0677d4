//! Rolldown plugin for spreadsheet custom functions
//!
//! This crate generates the metadata describing custom functions declared in
//! source files, registers each function with the host at runtime, and emits
//! the metadata artifact plus an aggregation module. It uses three hooks:
//!
//! - `build_start` hook: runs the metadata generator once for all inputs
//! - `transform` hook: appends `CustomFunctions.associate(...)` calls to inputs
//! - `write_bundle` hook: writes `functions.json` and `functions.js` to the bundler's output dir
//!
//! During development the same artifacts are served by [`DevMiddleware`].
//!
//! ## Architecture
//!
//! ```text
//! build_start → generator → GenerateResult (stored)
//!                                 ↓
//! input file → transform() → source + registration calls
//!                                 ↓
//! write_bundle → <out dir>/functions.json + <out dir>/functions.js
//! dev request  → DevMiddleware → root/functions.json | root/functions.js
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use fob_plugin_custom_functions::{CustomFunctionsOptions, FobCustomFunctionsPlugin};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CustomFunctionsOptions::new("src/functions.ts", "functions.json");
//! // Use with your Rolldown bundler configuration
//! let plugin = Arc::new(FobCustomFunctionsPlugin::new(options)?);
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use rolldown_plugin::{
    HookBuildStartArgs, HookNoopReturn, HookTransformArgs, HookTransformOutput,
    HookTransformReturn, HookUsage, HookWriteBundleArgs, Plugin, PluginContext,
    SharedTransformPluginContext,
};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

mod aggregate;
mod config;
mod dev;
mod error;
mod generator;
mod metadata;
mod output;
mod registration;
mod state;

#[cfg(feature = "logging")]
pub mod logging;

pub use aggregate::render_aggregation_module;
pub use config::{CustomFunctionsOptions, GeneratorOptions, InputFiles, ResolvedOptions};
pub use dev::{handle_custom_functions, DevMiddleware};
pub use error::{CustomFunctionsError, GeneratorError};
pub use generator::{JsRuntime, MetadataGenerator, NodeMetadataGenerator, StaticMetadataGenerator};
pub use metadata::{Association, GenerateResult};
pub use output::{write_artifact, write_artifacts, WrittenArtifacts};
pub use registration::{append_registrations, registration_statement, TransformOutcome};
pub use state::GenerationState;

/// Rolldown plugin that generates and wires up custom functions metadata
///
/// The generation result is owned by the plugin instance and shared with the
/// dev middleware; it is replaced at every `build_start`.
#[derive(Clone, Debug)]
pub struct FobCustomFunctionsPlugin {
    /// Options as configured, before path resolution
    config: Arc<CustomFunctionsOptions>,

    /// External metadata generator
    generator: Arc<dyn MetadataGenerator>,

    /// Resolved options and latest successful generation result
    state: Arc<GenerationState>,
}

impl FobCustomFunctionsPlugin {
    /// Create a plugin backed by the Node.js `custom-functions-metadata` generator
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use fob_plugin_custom_functions::{CustomFunctionsOptions, FobCustomFunctionsPlugin};
    ///
    /// let options = CustomFunctionsOptions::new(vec!["src/a.ts", "src/b.ts"], "functions.json");
    /// let plugin = FobCustomFunctionsPlugin::new(options).unwrap();
    /// ```
    pub fn new(options: CustomFunctionsOptions) -> Result<Self, CustomFunctionsError> {
        let resolved = options.resolve()?;
        let generator =
            NodeMetadataGenerator::from_options(&resolved.generator, resolved.root.clone());
        Ok(Self::from_parts(options, resolved, Arc::new(generator)))
    }

    /// Create a plugin with a custom metadata generator
    pub fn with_generator(
        options: CustomFunctionsOptions,
        generator: Arc<dyn MetadataGenerator>,
    ) -> Result<Self, CustomFunctionsError> {
        let resolved = options.resolve()?;
        Ok(Self::from_parts(options, resolved, generator))
    }

    fn from_parts(
        config: CustomFunctionsOptions,
        resolved: ResolvedOptions,
        generator: Arc<dyn MetadataGenerator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            generator,
            state: Arc::new(GenerationState::new(resolved)),
        }
    }

    /// Currently active resolved options
    pub fn options(&self) -> Arc<ResolvedOptions> {
        self.state.options()
    }

    /// Re-resolve paths against the bundler's working directory
    ///
    /// Only applies when no `root` was configured; an explicit root always wins.
    pub fn adopt_host_cwd(&self, cwd: &Path) -> Result<(), CustomFunctionsError> {
        if self.config.root.is_some() || cwd.as_os_str().is_empty() {
            return Ok(());
        }

        let resolved = self.config.as_ref().clone().with_root(cwd).resolve()?;
        debug!(
            "[fob-custom-functions] Resolving inputs against {}",
            resolved.root.display()
        );
        self.state.set_options(resolved);
        Ok(())
    }

    /// Latest successful generation result
    pub fn generate_result(&self) -> Option<Arc<GenerateResult>> {
        self.state.get()
    }

    /// Middleware serving the artifacts from this plugin's generation result
    pub fn dev_middleware(&self) -> DevMiddleware {
        DevMiddleware::new(self.state.clone())
    }

    /// Run the generator and store its result
    ///
    /// Any error reported by the generator fails the whole run; nothing is
    /// stored in that case and previously stored results are dropped.
    pub async fn generate(&self) -> Result<Arc<GenerateResult>, CustomFunctionsError> {
        let options = self.state.options();
        info!(
            "[fob-custom-functions] Generating metadata for {} file(s)",
            options.inputs.len()
        );

        let result = match self.generator.generate(&options.inputs).await {
            Ok(result) => result,
            Err(e) => {
                self.state.clear();
                return Err(e.into());
            }
        };

        if !result.is_ok() {
            self.state.clear();
            let input = options.input.to_string();
            for err in &result.errors {
                error!("[fob-custom-functions] {} {}", input, err);
            }
            return Err(CustomFunctionsError::generation(input, result.errors));
        }

        debug!(
            "[fob-custom-functions] Generated {} association(s)",
            result.associate.len()
        );

        let result = Arc::new(result);
        self.state.store(result.clone());
        Ok(result)
    }

    /// Append registration calls to a configured input file
    pub fn transform_source(&self, id: &str, code: &str) -> TransformOutcome {
        let options = self.state.options();
        let Some(input) = options.find_input(id) else {
            return TransformOutcome::Skip;
        };

        let Some(result) = self.state.get() else {
            debug!(
                "[fob-custom-functions] No metadata available yet for {}, leaving unchanged",
                id
            );
            return TransformOutcome::Unchanged(code.to_string());
        };

        let associations: Vec<&Association> = result.associations_for(input).collect();
        debug!(
            "[fob-custom-functions] Registering {} function(s) in {}",
            associations.len(),
            id
        );

        TransformOutcome::Transformed(append_registrations(code, associations))
    }

    /// Hook output for a module, `None` when the module is not an input
    fn transform_output(&self, id: &str, code: &str) -> Option<HookTransformOutput> {
        self.transform_source(id, code)
            .into_code()
            .map(|code| HookTransformOutput {
                code: Some(code),
                map: None,
                side_effects: None,
                module_type: None,
            })
    }

    /// Write production artifacts into `dir`
    ///
    /// Returns `Ok(None)` when there is no successful generation result.
    pub async fn write_build_artifacts(
        &self,
        dir: &Path,
    ) -> Result<Option<WrittenArtifacts>, CustomFunctionsError> {
        let Some(result) = self.state.get() else {
            return Ok(None);
        };

        let options = self.state.options();
        let written = write_artifacts(&result, &options, dir).await?;
        info!(
            "[fob-custom-functions] Wrote {} and {}",
            written.metadata.display(),
            written.module.display()
        );
        Ok(Some(written))
    }
}

impl Plugin for FobCustomFunctionsPlugin {
    /// Returns the plugin name for debugging and logging
    fn name(&self) -> Cow<'static, str> {
        "fob-custom-functions".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::BuildStart | HookUsage::Transform | HookUsage::WriteBundle
    }

    /// Generate metadata once, before any module is transformed
    fn build_start(
        &self,
        _ctx: &PluginContext,
        args: &HookBuildStartArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let plugin = self.clone();
        let cwd = args.options.cwd.clone();

        async move {
            plugin.adopt_host_cwd(&cwd)?;
            plugin.generate().await?;
            Ok(())
        }
    }

    /// Transform hook - appends registration calls to input files
    ///
    /// # Returns
    ///
    /// - `Ok(Some(output))` - Input file (with registrations when metadata exists)
    /// - `Ok(None)` - Not a configured input file
    fn transform(
        &self,
        _ctx: SharedTransformPluginContext,
        args: &HookTransformArgs<'_>,
    ) -> impl std::future::Future<Output = HookTransformReturn> + Send {
        let output = self.transform_output(args.id, args.code);

        async move { Ok(output) }
    }

    /// Write the metadata artifact and aggregation module next to the bundle
    fn write_bundle(
        &self,
        _ctx: &PluginContext,
        args: &mut HookWriteBundleArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let plugin = self.clone();
        let dir = plugin
            .options()
            .artifact_dir(&args.options.cwd, &args.options.out_dir);

        async move {
            plugin.write_build_artifacts(&dir).await.with_context(|| {
                format!(
                    "Failed to emit custom functions artifacts to {}",
                    dir.display()
                )
            })?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolldown_common::NormalizedBundlerOptions;
    use std::path::PathBuf;

    fn plugin_with(result: GenerateResult) -> FobCustomFunctionsPlugin {
        let options = CustomFunctionsOptions::new(vec!["src/a.ts", "src/b.ts"], "functions.json")
            .with_root("/project");
        FobCustomFunctionsPlugin::with_generator(
            options,
            Arc::new(StaticMetadataGenerator::new(result)),
        )
        .unwrap()
    }

    fn sample_result() -> GenerateResult {
        GenerateResult {
            errors: vec![],
            associate: vec![
                Association::new("ADD", "add", "/project/src/a.ts"),
                Association::new("MUL", "mul", "/project/src/b.ts"),
                Association::new("CLOCK", "clock", "/project/src/a.ts"),
            ],
            metadata_json: r#"{"functions":[]}"#.to_string(),
        }
    }

    #[test]
    fn test_plugin_creation() {
        let plugin = plugin_with(GenerateResult::default());
        assert_eq!(plugin.name(), "fob-custom-functions");
        assert_eq!(
            plugin.options().inputs[0],
            Path::new("/project/src/a.ts").to_path_buf()
        );
    }

    #[test]
    fn test_plugin_requires_inputs() {
        let result = FobCustomFunctionsPlugin::new(CustomFunctionsOptions::default());
        assert!(matches!(result, Err(CustomFunctionsError::NoInputs)));
    }

    #[test]
    fn test_hook_usage() {
        let usage = plugin_with(GenerateResult::default()).register_hook_usage();
        assert!(usage.contains(HookUsage::BuildStart));
        assert!(usage.contains(HookUsage::Transform));
        assert!(usage.contains(HookUsage::WriteBundle));
        assert!(!usage.contains(HookUsage::Load));
    }

    #[test]
    fn test_transform_skips_other_files() {
        let plugin = plugin_with(sample_result());
        assert_eq!(
            plugin.transform_source("/project/src/index.ts", "code"),
            TransformOutcome::Skip
        );
    }

    #[test]
    fn test_transform_before_generation_is_unchanged() {
        let plugin = plugin_with(sample_result());
        assert_eq!(
            plugin.transform_source("/project/src/a.ts", "code"),
            TransformOutcome::Unchanged("code".to_string())
        );
    }

    #[tokio::test]
    async fn test_transform_appends_matching_registrations() {
        let plugin = plugin_with(sample_result());
        plugin.generate().await.unwrap();

        let TransformOutcome::Transformed(code) =
            plugin.transform_source("/project/src/a.ts", "export function add() {}")
        else {
            panic!("expected transformed output");
        };

        assert_eq!(code.matches("CustomFunctions.associate(").count(), 2);
        assert!(code.ends_with(
            "\nCustomFunctions.associate(\"ADD\", add);\nCustomFunctions.associate(\"CLOCK\", clock);"
        ));
        assert!(!code.contains("MUL"));
    }

    #[tokio::test]
    async fn test_generation_errors_fail_and_clear() {
        let plugin = plugin_with(GenerateResult {
            errors: vec!["Unsupported type".to_string()],
            ..sample_result()
        });

        let err = plugin.generate().await.unwrap_err();
        assert_eq!(err.to_string(), "src/a.ts,src/b.ts Unsupported type");
        assert!(plugin.generate_result().is_none());
        assert_eq!(
            plugin.transform_source("/project/src/a.ts", "code"),
            TransformOutcome::Unchanged("code".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_without_result_is_noop() {
        let plugin = plugin_with(sample_result());
        assert_eq!(
            plugin
                .write_build_artifacts(Path::new("/project/dist"))
                .await
                .unwrap(),
            None
        );
    }

    fn bundler_options(cwd: &str) -> Arc<NormalizedBundlerOptions> {
        Arc::new(NormalizedBundlerOptions {
            cwd: cwd.into(),
            out_dir: "dist".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_transform_hook_output() {
        let plugin = plugin_with(sample_result());
        assert!(plugin.transform_output("/project/src/index.ts", "code").is_none());

        let unchanged = plugin.transform_output("/project/src/b.ts", "code").unwrap();
        assert_eq!(unchanged.code.as_deref(), Some("code"));
        assert!(unchanged.module_type.is_none());

        plugin.generate().await.unwrap();
        let output = plugin.transform_output("/project/src/b.ts", "code").unwrap();
        assert_eq!(
            output.code.as_deref(),
            Some("code\nCustomFunctions.associate(\"MUL\", mul);")
        );
        assert!(output.map.is_none());
    }

    #[tokio::test]
    async fn test_build_start_hook_fails_on_generation_errors() {
        let plugin = plugin_with(GenerateResult {
            errors: vec!["Unsupported type".to_string()],
            ..sample_result()
        });
        let ctx = PluginContext::new_napi_context();
        let options = bundler_options("/project");
        let args = HookBuildStartArgs { options: &options };

        let err = plugin.build_start(&ctx, &args).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported type"));
        assert!(plugin.generate_result().is_none());
    }

    #[tokio::test]
    async fn test_build_start_hook_stores_result() {
        let plugin = plugin_with(sample_result());
        let ctx = PluginContext::new_napi_context();
        let options = bundler_options("/project");
        let args = HookBuildStartArgs { options: &options };

        plugin.build_start(&ctx, &args).await.unwrap();
        assert_eq!(plugin.generate_result().unwrap().associate.len(), 3);
    }

    #[tokio::test]
    async fn test_build_start_resolves_inputs_against_bundler_cwd() {
        let options = CustomFunctionsOptions::new("src/a.ts", "functions.json");
        let plugin = FobCustomFunctionsPlugin::with_generator(
            options,
            Arc::new(StaticMetadataGenerator::new(sample_result())),
        )
        .unwrap();
        let ctx = PluginContext::new_napi_context();
        let bundler = bundler_options("/project");

        plugin
            .build_start(&ctx, &HookBuildStartArgs { options: &bundler })
            .await
            .unwrap();

        assert_eq!(plugin.options().root, PathBuf::from("/project"));
        assert_eq!(
            plugin.options().inputs,
            vec![PathBuf::from("/project/src/a.ts")]
        );
        assert!(matches!(
            plugin.transform_source("/project/src/a.ts", "code"),
            TransformOutcome::Transformed(_)
        ));
    }

    #[tokio::test]
    async fn test_build_start_keeps_explicit_root() {
        let plugin = plugin_with(sample_result());
        let ctx = PluginContext::new_napi_context();
        let bundler = bundler_options("/elsewhere");

        plugin
            .build_start(&ctx, &HookBuildStartArgs { options: &bundler })
            .await
            .unwrap();

        assert_eq!(plugin.options().root, PathBuf::from("/project"));
    }
}
