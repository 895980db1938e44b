use super::*;
use crate::routes::catalog::{CollaboratorGroup, DEFAULT_GROUPS, default_composer};
use crate::state::test_helpers::test_app_state;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Group with caller-chosen paths that counts `routes()` calls.
struct FixedGroup {
    name: &'static str,
    paths: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FixedGroup {
    fn new(name: &'static str, paths: &[&'static str]) -> Arc<Self> {
        Arc::new(Self { name, paths: paths.to_vec(), calls: AtomicUsize::new(0) })
    }
}

impl RouteGroup for FixedGroup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn routes(&self) -> GroupRoutes {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths
            .iter()
            .fold(GroupRoutes::new(), |routes, path| routes.route(*path, post(|| async { "posted" })))
    }
}

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// =============================================================================
// COMPOSITION
// =============================================================================

#[tokio::test]
async fn default_catalogue_mounts_in_declared_order() {
    let composer = default_composer();
    let expected: Vec<&str> = DEFAULT_GROUPS.iter().map(|(name, _)| *name).collect();
    assert_eq!(composer.group_names(), expected);

    let composed = composer.compose(test_app_state()).unwrap();
    assert_eq!(composed.table.len(), DEFAULT_GROUPS.len());
    assert_eq!(composed.table[0], RouteEntry { group: "transcribe", path: "/v1/transcribe/status".into() });
    assert_eq!(composed.table[8].group, "firmware");
}

#[tokio::test]
async fn composition_is_deterministic() {
    let first = default_composer().compose(test_app_state()).unwrap();
    let second = default_composer().compose(test_app_state()).unwrap();
    assert_eq!(first.table, second.table);
}

#[tokio::test]
async fn duplicate_group_is_mounted_once() {
    let workflow: Arc<dyn RouteGroup> = Arc::new(CollaboratorGroup::new("workflow", "/v1/workflow"));
    let composer = RouteComposer::new()
        .mount(Arc::new(CollaboratorGroup::new("memories", "/v1/memories")))
        .mount(workflow.clone())
        .mount(Arc::new(CollaboratorGroup::new("notifications", "/v1/notifications")))
        .mount(workflow);

    assert_eq!(composer.group_names(), ["memories", "workflow", "notifications"]);
    let composed = composer.compose(test_app_state()).unwrap();
    let workflow_routes = composed.table.iter().filter(|e| e.group == "workflow").count();
    assert_eq!(workflow_routes, 1);
}

#[tokio::test]
async fn same_name_keeps_first_mount() {
    let first = FixedGroup::new("chat", &["/v1/chat/a"]);
    let second = FixedGroup::new("chat", &["/v1/chat/b"]);
    let composer = RouteComposer::new().mount(first.clone()).mount(second.clone());

    let composed = composer.compose(test_app_state()).unwrap();
    assert_eq!(composed.table, vec![RouteEntry { group: "chat", path: "/v1/chat/a".into() }]);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cross_group_path_collision_is_an_error() {
    let composer = RouteComposer::new()
        .mount(FixedGroup::new("memories", &["/v1/shared"]))
        .mount(FixedGroup::new("chat", &["/v1/chat", "/v1/shared"]));

    let err = composer.compose(test_app_state()).err().unwrap();
    assert_eq!(err, ComposeError::PathConflict { path: "/v1/shared".into(), first: "memories", second: "chat" });
}

#[tokio::test]
async fn path_repeated_within_a_group_is_an_error() {
    let composer = RouteComposer::new().mount(FixedGroup::new("plugins", &["/v1/plugins", "/v1/plugins"]));
    let err = composer.compose(test_app_state()).err().unwrap();
    assert!(matches!(err, ComposeError::PathConflict { first: "plugins", second: "plugins", .. }));
}

#[tokio::test]
async fn relative_path_is_rejected() {
    let composer = RouteComposer::new().mount(FixedGroup::new("firmware", &["v1/firmware"]));
    let err = composer.compose(test_app_state()).err().unwrap();
    assert_eq!(
        err,
        ComposeError::InvalidPath { path: "v1/firmware".into(), group: "firmware", reason: "must start with '/'".into() }
    );
}

#[tokio::test]
async fn overlapping_parameter_names_across_groups_conflict() {
    let composer = RouteComposer::new()
        .mount(FixedGroup::new("memories", &["/v1/items/{id}"]))
        .mount(FixedGroup::new("chat", &["/v1/items/{name}"]));

    let err = composer.compose(test_app_state()).err().unwrap();
    assert_eq!(err, ComposeError::PathConflict { path: "/v1/items/{name}".into(), first: "memories", second: "chat" });
}

#[tokio::test]
async fn legacy_wildcard_syntax_is_rejected() {
    let composer = RouteComposer::new().mount(FixedGroup::new("firmware", &["/v1/firmware/*rest"]));
    let err = composer.compose(test_app_state()).err().unwrap();
    assert!(matches!(err, ComposeError::InvalidPath { group: "firmware", .. }));
}

#[tokio::test]
async fn distinct_parameterized_paths_compose() {
    let composer = RouteComposer::new()
        .mount(FixedGroup::new("memories", &["/v1/memories/{id}"]))
        .mount(FixedGroup::new("chat", &["/v1/chat/{id}", "/v1/chat/{id}/messages"]));

    let composed = composer.compose(test_app_state()).unwrap();
    assert_eq!(composed.table.len(), 3);
}

#[tokio::test]
async fn each_group_is_asked_for_routes_once() {
    let group = FixedGroup::new("screenpipe", &["/v1/screenpipe"]);
    let composer = RouteComposer::new().mount(group.clone());
    composer.compose(test_app_state()).unwrap();
    assert_eq!(group.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// SERVING
// =============================================================================

#[tokio::test]
async fn composed_router_serves_every_group() {
    let composed = default_composer().compose(test_app_state()).unwrap();
    let addr = spawn_server(composed.router).await;
    let client = reqwest::Client::new();

    for (name, prefix) in DEFAULT_GROUPS {
        let resp = client.get(format!("http://{addr}{prefix}/status")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "{name} should answer");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["group"], name);
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn unmounted_path_is_not_found() {
    let composed = default_composer().compose(test_app_state()).unwrap();
    let addr = spawn_server(composed.router).await;
    let resp = reqwest::get(format!("http://{addr}/v1/unknown")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn group_handlers_receive_method_routing() {
    let group = Arc::new(FixedGroupWithGet);
    let composed = RouteComposer::new().mount(group).compose(test_app_state()).unwrap();
    let addr = spawn_server(composed.router).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/v1/speech-profile/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
}

struct FixedGroupWithGet;

impl RouteGroup for FixedGroupWithGet {
    fn name(&self) -> &'static str {
        "speech_profile"
    }

    fn routes(&self) -> GroupRoutes {
        GroupRoutes::new().route("/v1/speech-profile/status", get(|| async { "ready" }))
    }
}
