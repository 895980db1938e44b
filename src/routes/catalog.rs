//! Route group catalogue.
//!
//! The feature modules (transcription, memories, chat, plugins, speech
//! profiles, screenpipe ingestion, workflows, notifications, firmware) are
//! maintained outside this crate. Each is represented here by a collaborator
//! group that reserves its `/v1/<group>` prefix and answers a status probe, so
//! the composed surface matches the production mount list.

use std::sync::Arc;

use axum::response::Json;
use axum::routing::get;
use serde::Serialize;

use super::{GroupRoutes, RouteComposer, RouteGroup};

/// `(name, prefix)` in production mount order.
pub const DEFAULT_GROUPS: [(&str, &str); 9] = [
    ("transcribe", "/v1/transcribe"),
    ("memories", "/v1/memories"),
    ("chat", "/v1/chat"),
    ("plugins", "/v1/plugins"),
    ("speech_profile", "/v1/speech-profile"),
    ("screenpipe", "/v1/screenpipe"),
    ("workflow", "/v1/workflow"),
    ("notifications", "/v1/notifications"),
    ("firmware", "/v1/firmware"),
];

#[derive(Debug, Serialize)]
pub struct GroupStatus {
    pub group: &'static str,
    pub status: &'static str,
}

/// Placeholder for an externally owned route group.
#[derive(Debug, Clone, Copy)]
pub struct CollaboratorGroup {
    name: &'static str,
    prefix: &'static str,
}

impl CollaboratorGroup {
    #[must_use]
    pub const fn new(name: &'static str, prefix: &'static str) -> Self {
        Self { name, prefix }
    }

    #[must_use]
    pub fn status_path(&self) -> String {
        format!("{}/status", self.prefix)
    }
}

impl RouteGroup for CollaboratorGroup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn routes(&self) -> GroupRoutes {
        let group = self.name;
        GroupRoutes::new().route(
            self.status_path(),
            get(move || async move { Json(GroupStatus { group, status: "ok" }) }),
        )
    }
}

/// Composer preloaded with every production route group.
#[must_use]
pub fn default_composer() -> RouteComposer {
    DEFAULT_GROUPS
        .iter()
        .fold(RouteComposer::new(), |composer, &(name, prefix)| {
            composer.mount(Arc::new(CollaboratorGroup::new(name, prefix)))
        })
}
