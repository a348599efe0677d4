//! Writing the metadata artifact and aggregation module to disk

use crate::aggregate::render_aggregation_module;
use crate::config::ResolvedOptions;
use crate::error::CustomFunctionsError;
use crate::metadata::GenerateResult;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths written by [`write_artifacts`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub metadata: PathBuf,
    pub module: PathBuf,
}

/// Write `contents` to `path`, creating parent directories first
pub async fn write_artifact(path: &Path, contents: &str) -> Result<(), CustomFunctionsError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CustomFunctionsError::write(path, e))?;
    }

    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CustomFunctionsError::write(path, e))?;

    debug!(
        "[fob-custom-functions] Wrote {} ({} bytes)",
        path.display(),
        contents.len()
    );
    Ok(())
}

/// Render the aggregation module for its location on disk
pub fn aggregation_module_for(result: &GenerateResult, module_path: &Path) -> String {
    let module_dir = module_path.parent().unwrap_or(Path::new(""));
    render_aggregation_module(&result.associate, module_dir)
}

/// Write the metadata artifact and aggregation module into `dir`
pub async fn write_artifacts(
    result: &GenerateResult,
    options: &ResolvedOptions,
    dir: &Path,
) -> Result<WrittenArtifacts, CustomFunctionsError> {
    let metadata = options.metadata_path_in(dir);
    write_artifact(&metadata, &result.metadata_json).await?;

    let module = options.module_path_in(dir);
    write_artifact(&module, &aggregation_module_for(result, &module)).await?;

    Ok(WrittenArtifacts { metadata, module })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomFunctionsOptions;
    use crate::metadata::Association;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_artifact_creates_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/deeper/functions.json");

        write_artifact(&path, "{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_write_artifact_reports_path() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let err = write_artifact(&blocker.join("functions.json"), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, CustomFunctionsError::Write { .. }));
        assert!(err.to_string().contains("functions.json"));
    }

    #[tokio::test]
    async fn test_write_artifacts() {
        let temp = TempDir::new().unwrap();
        let options = CustomFunctionsOptions::new("src/functions.ts", "functions.json")
            .with_root(temp.path())
            .resolve()
            .unwrap();
        let source = options.inputs[0].to_string_lossy().to_string();
        let result = GenerateResult {
            errors: vec![],
            associate: vec![Association::new("ADD", "add", source)],
            metadata_json: r#"{"functions":[]}"#.to_string(),
        };

        let dist = temp.path().join("dist");
        let written = write_artifacts(&result, &options, &dist).await.unwrap();

        assert_eq!(written.metadata, dist.join("functions.json"));
        assert_eq!(
            std::fs::read_to_string(&written.metadata).unwrap(),
            r#"{"functions":[]}"#
        );

        let module = std::fs::read_to_string(&written.module).unwrap();
        assert!(module.contains("import { add } from \"../src/functions.ts\";"));
        assert!(module.contains("export {\n  add,\n};"));
    }
}
