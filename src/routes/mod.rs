//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Feature modules own their handlers and hand them over as route groups. This
//! module only composes them: it mounts each group in declared order onto a
//! single Axum router and wraps the result in request tracing.
//!
//! DESIGN
//! ======
//! Groups are identified by name. Mounting a name twice keeps the first mount
//! and logs the duplicate. Every path is first inserted into a `matchit`
//! router, the same matcher Axum uses, so overlapping patterns such as
//! `/items/{id}` and `/items/{name}` become a startup error with both group
//! names attached instead of an Axum panic.

pub mod catalog;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::MethodRouter;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::AppState;

// =============================================================================
// ROUTE GROUP
// =============================================================================

/// A named bundle of handlers that can be mounted onto the server.
pub trait RouteGroup: Send + Sync {
    fn name(&self) -> &'static str;

    fn routes(&self) -> GroupRoutes;
}

/// Paths and handlers offered by one route group.
#[derive(Default)]
pub struct GroupRoutes {
    entries: Vec<(String, MethodRouter<AppState>)>,
}

impl GroupRoutes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, path: impl Into<String>, handler: MethodRouter<AppState>) -> Self {
        self.entries.push((path.into(), handler));
        self
    }
}

// =============================================================================
// COMPOSER
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("route {path} from group `{second}` is already registered by group `{first}`")]
    PathConflict { path: String, first: &'static str, second: &'static str },

    #[error("route {path:?} in group `{group}` is invalid: {reason}")]
    InvalidPath { path: String, group: &'static str, reason: String },
}

/// One row of the externally visible route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub group: &'static str,
    pub path: String,
}

/// The composed router plus the table it was built from.
pub struct ComposedRoutes {
    pub router: Router,
    pub table: Vec<RouteEntry>,
}

/// Ordered list of route groups to mount.
#[derive(Default)]
pub struct RouteComposer {
    groups: Vec<Arc<dyn RouteGroup>>,
}

impl RouteComposer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group. A group whose name is already mounted is skipped.
    #[must_use]
    pub fn mount(mut self, group: Arc<dyn RouteGroup>) -> Self {
        let name = group.name();
        if self.groups.iter().any(|g| g.name() == name) {
            warn!(group = name, "route group mounted twice; keeping first mount");
            return self;
        }
        self.groups.push(group);
        self
    }

    /// Mounted group names in mount order.
    #[must_use]
    pub fn group_names(&self) -> Vec<&'static str> {
        self.groups.iter().map(|g| g.name()).collect()
    }

    /// Build the router. Each group's `routes()` is called exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if a path is malformed or claimed twice.
    pub fn compose(&self, state: AppState) -> Result<ComposedRoutes, ComposeError> {
        let mut owners: HashMap<String, &'static str> = HashMap::new();
        let mut matcher: matchit::Router<&'static str> = matchit::Router::new();
        let mut table = Vec::new();
        let mut router: Router<AppState> = Router::new();

        for group in &self.groups {
            let name = group.name();
            for (path, handler) in group.routes().entries {
                if let Some(reason) = shape_error(&path) {
                    return Err(ComposeError::InvalidPath { path, group: name, reason: reason.to_string() });
                }
                match matcher.insert(path.as_str(), name) {
                    Ok(()) => {}
                    Err(matchit::InsertError::Conflict { with }) => {
                        let first = owners.get(&with).copied().unwrap_or(name);
                        return Err(ComposeError::PathConflict { path, first, second: name });
                    }
                    Err(e) => {
                        return Err(ComposeError::InvalidPath { path, group: name, reason: e.to_string() });
                    }
                }
                owners.insert(path.clone(), name);
                router = router.route(&path, handler);
                table.push(RouteEntry { group: name, path });
            }
        }

        info!(groups = self.groups.len(), routes = table.len(), "routes composed");

        let router = router.layer(TraceLayer::new_for_http()).with_state(state);
        Ok(ComposedRoutes { router, table })
    }
}

/// Shape rules Axum enforces on top of the matcher.
fn shape_error(path: &str) -> Option<&'static str> {
    if !path.starts_with('/') {
        return Some("must start with '/'");
    }
    // Pre-0.8 `:param` and `*rest` syntax.
    if path.split('/').any(|segment| segment.starts_with(':') || segment.starts_with('*')) {
        return Some("segments must not start with ':' or '*'; use {param} or {*rest}");
    }
    None
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
