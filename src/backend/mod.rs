use database::FolioContext;
use log::info;
use server::start_server;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use utils::{config::FolioConfig, error::BackendResult, scheduled_tasks};

pub mod api;
pub mod database;
pub mod oauth;
mod server;
pub mod services;
pub mod utils;

/// Starts the http server with the given config. `override_hostname` replaces the configured
/// bind address, and `notify_start` is signalled once the server listens.
pub async fn start(
    config: FolioConfig,
    override_hostname: Option<SocketAddr>,
    notify_start: Option<oneshot::Sender<()>>,
) -> BackendResult<()> {
    let context = FolioContext::init(config)?;
    start_with_context(context, override_hostname, notify_start).await
}

/// Same as [start], with an already initialized context.
pub async fn start_with_context(
    context: FolioContext,
    override_hostname: Option<SocketAddr>,
    notify_start: Option<oneshot::Sender<()>>,
) -> BackendResult<()> {
    info!(
        "Enabled login providers: {}",
        context.oauth.names().join(", ")
    );
    // tasks stop when the handle is dropped
    let _scheduler = scheduled_tasks::start(context.clone());
    start_server(context, override_hostname, notify_start).await
}
