//! Registration statements appended to custom function source files

use crate::metadata::Association;

/// Result of offering a module to the transform step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Module is not a configured input
    Skip,
    /// Module is an input but no generation result is available yet
    Unchanged(String),
    /// Registration statements were appended
    Transformed(String),
}

impl TransformOutcome {
    /// Code to hand back to the bundler, if any
    pub fn into_code(self) -> Option<String> {
        match self {
            Self::Skip => None,
            Self::Unchanged(code) | Self::Transformed(code) => Some(code),
        }
    }
}

/// `CustomFunctions.associate("<id>", <functionName>);`
pub fn registration_statement(association: &Association) -> String {
    // serde_json gives a correctly escaped JS string literal
    let id = serde_json::to_string(&association.id)
        .unwrap_or_else(|_| format!("\"{}\"", association.id));
    format!(
        "CustomFunctions.associate({}, {});",
        id, association.function_name
    )
}

/// Append one registration statement per association, in order
pub fn append_registrations<'a>(
    code: &str,
    associations: impl IntoIterator<Item = &'a Association>,
) -> String {
    let mut transformed = code.to_string();
    for association in associations {
        transformed.push('\n');
        transformed.push_str(&registration_statement(association));
    }
    transformed
}
