//! Development server middleware.
//!
//! Serves the metadata artifact and the aggregation module on demand while
//! the dev server is running. Both are (re)written under the project root
//! before being returned, so tools reading them from disk see the same bytes.
//! Every other request goes to the next handler untouched.

use crate::config::ResolvedOptions;
use crate::error::CustomFunctionsError;
use crate::metadata::GenerateResult;
use crate::output::{aggregation_module_for, write_artifact};
use crate::state::GenerationState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tracing::error;

/// Synthetic routes answered by the middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DevRoute {
    Metadata,
    Module,
}

/// Axum middleware state for custom functions dev routes
#[derive(Debug, Clone)]
pub struct DevMiddleware {
    state: Arc<GenerationState>,
}

impl DevMiddleware {
    pub fn new(state: Arc<GenerationState>) -> Self {
        Self { state }
    }

    /// Wrap every route of `router` (fallback included) with the middleware
    pub fn install<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, handle_custom_functions))
    }

    fn route_for(options: &ResolvedOptions, path: &str) -> Option<DevRoute> {
        if path.ends_with(&options.output_route()) {
            Some(DevRoute::Metadata)
        } else if path.ends_with(&options.module_name) {
            Some(DevRoute::Module)
        } else {
            None
        }
    }

    async fn serve(
        options: &ResolvedOptions,
        route: DevRoute,
        result: &GenerateResult,
    ) -> Result<Response, CustomFunctionsError> {
        let root = &options.root;

        let (content, content_type) = match route {
            DevRoute::Metadata => {
                let path = options.metadata_path_in(root);
                write_artifact(&path, &result.metadata_json).await?;
                (result.metadata_json.clone(), "application/json")
            }
            DevRoute::Module => {
                let path = options.module_path_in(root);
                let module = aggregation_module_for(result, &path);
                write_artifact(&path, &module).await?;
                (module, "application/javascript")
            }
        };

        Ok((
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response())
    }
}

/// Handle a dev server request, answering custom functions routes directly
///
/// Write failures are logged and the request falls through to `next`.
pub async fn handle_custom_functions(
    State(dev): State<DevMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let options = dev.state.options();
    let route = DevMiddleware::route_for(&options, request.uri().path());

    if let (Some(route), Some(result)) = (route, dev.state.get()) {
        match DevMiddleware::serve(&options, route, &result).await {
            Ok(response) => return response,
            Err(e) => error!("[fob-custom-functions] {}", e),
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomFunctionsOptions;

    fn options(output: &str) -> ResolvedOptions {
        CustomFunctionsOptions::new("src/functions.ts", output)
            .with_root("/project")
            .resolve()
            .unwrap()
    }

    fn route(options: &ResolvedOptions, path: &str) -> Option<DevRoute> {
        DevMiddleware::route_for(options, path)
    }

    #[test]
    fn test_route_matching() {
        let options = options("functions.json");

        assert_eq!(route(&options, "/functions.json"), Some(DevRoute::Metadata));
        assert_eq!(
            route(&options, "/taskpane/functions.json"),
            Some(DevRoute::Metadata)
        );
        assert_eq!(route(&options, "/functions.js"), Some(DevRoute::Module));
        assert_eq!(route(&options, "/index.html"), None);
    }

    #[test]
    fn test_route_matching_nested_output() {
        let options = options("./public/functions.json");

        assert_eq!(
            route(&options, "/public/functions.json"),
            Some(DevRoute::Metadata)
        );
        assert_eq!(route(&options, "/functions.json"), None);
    }
}
