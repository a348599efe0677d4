//! Generation result types exchanged with the metadata generator
//!
//! These mirror the JSON shape produced by the `custom-functions-metadata`
//! package. The plugin never looks inside `metadata_json`; it is written out
//! verbatim.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Links a generated registration id to a function and the file declaring it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    /// Registration id used by the spreadsheet host
    pub id: String,

    /// Name of the JavaScript function implementing the custom function
    pub function_name: String,

    /// Path of the source file that declares the function
    pub source_file_name: String,
}

impl Association {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        source_file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            source_file_name: source_file_name.into(),
        }
    }

    /// Whether this association was declared in `file`
    pub fn is_declared_in(&self, file: &Path) -> bool {
        Path::new(&self.source_file_name) == file
    }
}

/// Result of one metadata generation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    /// Errors reported by the generator; any entry fails the build
    #[serde(default)]
    pub errors: Vec<String>,

    /// Registration records for every discovered custom function
    #[serde(default)]
    pub associate: Vec<Association>,

    /// Serialized metadata document
    #[serde(default)]
    pub metadata_json: String,
}

impl GenerateResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Associations declared in `file`, in generator order
    pub fn associations_for<'a>(
        &'a self,
        file: &'a Path,
    ) -> impl Iterator<Item = &'a Association> + 'a {
        self.associate
            .iter()
            .filter(move |item| item.is_declared_in(file))
    }
}
