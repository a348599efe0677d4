//! State shared between plugin hooks and the dev server

use crate::config::ResolvedOptions;
use crate::metadata::GenerateResult;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds the active resolved options and the latest successful generation result
///
/// Options may be re-resolved in `build_start` once the bundler's working
/// directory is known. The result is written once per build and read by every
/// other hook. Neither lock is held across an await point.
#[derive(Debug)]
pub struct GenerationState {
    options: RwLock<Arc<ResolvedOptions>>,
    result: RwLock<Option<Arc<GenerateResult>>>,
}

impl GenerationState {
    pub fn new(options: ResolvedOptions) -> Self {
        Self {
            options: RwLock::new(Arc::new(options)),
            result: RwLock::new(None),
        }
    }

    pub fn options(&self) -> Arc<ResolvedOptions> {
        self.options.read().clone()
    }

    pub(crate) fn set_options(&self, options: ResolvedOptions) {
        *self.options.write() = Arc::new(options);
    }

    /// Current result; only results without errors are ever stored
    pub fn get(&self) -> Option<Arc<GenerateResult>> {
        self.result.read().clone()
    }

    pub(crate) fn store(&self, result: Arc<GenerateResult>) {
        debug_assert!(result.is_ok());
        *self.result.write() = Some(result);
    }

    pub(crate) fn clear(&self) {
        *self.result.write() = None;
    }
}
