//! Process startup: initialize, compose, serve.
//!
//! SYSTEM CONTEXT
//! ==============
//! `prepare` is the blocking, one-time critical section: identity, working
//! directories, route composition, and the notification schedule, in that
//! order. Any failure returns before a listener exists, so no request can
//! reach a partially initialized process. `serve` then binds the scheduler to
//! server start and runs until a shutdown signal arrives.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::identity::{AmbientResolver, ApplicationDefaultResolver, IdentityContext, IdentityError};
use crate::notifications::{DispatchError, NotificationDispatchTask};
use crate::routes::catalog::default_composer;
use crate::routes::{ComposeError, ComposedRoutes, RouteComposer};
use crate::scheduler::{Cadence, CadenceError, TaskScheduler};
use crate::state::AppState;
use crate::workdirs::{WorkdirError, WorkingDirs};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("identity initialization failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("working directories: {0}")]
    Workdir(#[from] WorkdirError),

    #[error("route composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("notification schedule: {0}")]
    Cadence(#[from] CadenceError),

    #[error("notification dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("server failed: {0}")]
    Serve(io::Error),
}

/// Everything built by the startup critical section.
pub struct Prepared {
    pub state: AppState,
    pub routes: ComposedRoutes,
    pub cadence: Cadence,
    pub notifications: NotificationDispatchTask,
}

/// Run the sequential startup steps.
///
/// # Errors
///
/// Returns the first startup-fatal error; later steps do not run.
pub fn prepare(
    config: &AppConfig,
    ambient: &dyn AmbientResolver,
    composer: &RouteComposer,
) -> Result<Prepared, StartupError> {
    let identity = IdentityContext::initialize(config.service_account_json.as_deref(), ambient)?;

    let dirs = WorkingDirs::new(&config.data_root);
    dirs.provision()?;

    let state = AppState::new(identity, dirs);
    let routes = composer.compose(state.clone())?;

    let cadence = Cadence::parse(&config.notifications.cadence)?;
    let notifications = NotificationDispatchTask::new(&config.notifications, Arc::clone(&state.identity))?;
    info!(
        cadence = cadence.expression(),
        dispatch_enabled = notifications.is_enabled(),
        "notification trigger configured"
    );

    Ok(Prepared { state, routes, cadence, notifications })
}

/// Start the scheduler and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server loop fails.
pub async fn serve<F>(listener: TcpListener, prepared: Prepared, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Prepared { routes, cadence, notifications, .. } = prepared;

    let mut scheduler = TaskScheduler::new();
    scheduler.add(cadence, Arc::new(notifications));

    let addr = listener.local_addr().map_err(StartupError::Serve)?;
    info!(%addr, routes = routes.table.len(), "backend listening");

    axum::serve(listener, routes.router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(StartupError::Serve)?;

    scheduler.shutdown();
    info!("backend stopped");
    Ok(())
}

/// Full production startup with the default route catalogue.
///
/// # Errors
///
/// Returns any startup-fatal error or a server failure.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    let prepared = prepare(&config, &ApplicationDefaultResolver::from_env(), &default_composer())?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;

    serve(listener, prepared, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
