//! Backend API server: startup, route composition, and background scheduling.

pub mod bootstrap;
pub mod config;
pub mod deploy;
pub mod identity;
pub mod notifications;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod workdirs;
