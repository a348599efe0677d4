//! Aggregation module: imports every custom function and re-exports them
//!
//! ```text
//! import { add, clock } from "../src/functions.ts";
//! import { mul } from "../src/math.ts";
//!
//! export {
//!   add,
//!   clock,
//!   mul,
//! };
//! ```

use crate::metadata::Association;
use indexmap::{IndexMap, IndexSet};
use std::path::{Component, Path};
use tracing::warn;

/// Render the aggregation module for a module file living in `module_dir`
///
/// Imports are grouped per source file in first-seen order, and the export
/// list follows the import lines. A function name is imported and exported
/// once; later duplicates from other files are dropped.
pub fn render_aggregation_module(associations: &[Association], module_dir: &Path) -> String {
    let mut exported: IndexSet<&str> = IndexSet::new();
    let mut imports: IndexMap<&str, Vec<&str>> = IndexMap::new();

    for association in associations {
        let name = association.function_name.as_str();
        let names = imports
            .entry(association.source_file_name.as_str())
            .or_default();

        if exported.insert(name) {
            names.push(name);
        } else if !names.contains(&name) {
            warn!(
                "[fob-custom-functions] Function '{}' from {} is already exported, skipping",
                name, association.source_file_name
            );
        }
    }

    let mut module = String::new();

    for (source, names) in &imports {
        if names.is_empty() {
            continue;
        }
        module.push_str(&format!(
            "import {{ {} }} from {};\n",
            names.join(", "),
            quote(&import_specifier(module_dir, Path::new(source)))
        ));
    }

    if !imports.is_empty() {
        module.push('\n');
    }

    module.push_str("export {\n");
    for name in imports.values().flatten() {
        module.push_str(&format!("  {},\n", name));
    }
    module.push_str("};\n");

    module
}

fn quote(specifier: &str) -> String {
    serde_json::to_string(specifier).unwrap_or_else(|_| format!("\"{}\"", specifier))
}

/// Relative import specifier from `from_dir` to `to`, always `./` or `../` prefixed
fn import_specifier(from_dir: &Path, to: &Path) -> String {
    if !to.is_absolute() {
        let relative = to.to_string_lossy().replace('\\', "/");
        return if relative.starts_with("./") || relative.starts_with("../") {
            relative
        } else {
            format!("./{}", relative)
        };
    }

    let from: Vec<Component<'_>> = from_dir.components().collect();
    let target: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    let joined = parts.join("/");
    if joined.starts_with("../") {
        joined
    } else {
        format!("./{}", joined)
    }
}
