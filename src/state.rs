//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and is
//! the only path by which route groups reach the identity context and the
//! working directories. Both are built once during startup and never
//! replaced.

use std::sync::Arc;

use crate::identity::IdentityContext;
use crate::workdirs::WorkingDirs;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityContext>,
    pub dirs: Arc<WorkingDirs>,
}

impl AppState {
    #[must_use]
    pub fn new(identity: IdentityContext, dirs: WorkingDirs) -> Self {
        Self { identity: Arc::new(identity), dirs: Arc::new(dirs) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_identity() {
        let state = test_helpers::test_app_state();
        let clone = state.clone();
        assert!(Arc::ptr_eq(&state.identity, &clone.identity));
        assert!(Arc::ptr_eq(&state.dirs, &clone.dirs));
        assert_eq!(clone.identity.project_id(), Some("test-project"));
    }
}
