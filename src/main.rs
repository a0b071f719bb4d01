use std::sync::Arc;

use anyhow::Context;
use locrelay::{
    AppState,
    config::Settings,
    dispatch::Dispatcher,
    hub::SseHub,
    store::SqliteStore,
    transport::{ChatTransport, TelegramTransport},
    web::{self, Webhook},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Events buffered per subscription channel before slow viewers skip some.
const CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(Settings::load().context("failed to load configuration")?);
    init_logging(&settings);
    info!(?settings, "configuration loaded");

    let store = Arc::new(
        SqliteStore::connect(&settings.database_url)
            .await
            .context("failed to open identity store")?,
    );

    let transport = Arc::new(TelegramTransport::new(settings.bot_token.clone()));
    let bot_name = transport.whoami().await.context("bot authorization failed")?;
    info!("authorized on account {bot_name}");

    let hub = Arc::new(SseHub::new(CHANNEL_CAPACITY, settings.group_limit));
    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(settings.queue_capacity);

    let hook_id = Uuid::new_v4().to_string();
    let secret_token = Uuid::new_v4().simple().to_string();
    transport
        .register_webhook(&settings.webhook_url(&hook_id), &secret_token)
        .await
        .context("failed to register webhook")?;
    if let Err(e) = transport.register_commands().await {
        error!("failed to register bot commands: {e}");
    }

    let state = AppState {
        store: store.clone(),
        hub: hub.clone(),
        webhook: Arc::new(Webhook::new(hook_id, secret_token, bot_name, tx)),
        shutdown: shutdown.clone(),
    };
    let app = web::router(state, &settings);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address))?;
    info!(address = %settings.bind_address, "listening");

    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        }
    });

    let dispatcher = Dispatcher::new(store.clone(), transport.clone(), hub.clone(), settings);
    let dispatch = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { dispatcher.run(rx, shutdown).await }
    });

    wait_for_signal().await;
    info!("shutting down");
    shutdown.cancel();

    if let Err(e) = dispatch.await {
        error!("dispatch loop panicked: {e}");
    }
    if let Err(e) = transport.delete_webhook().await {
        error!("failed to delete webhook: {e}");
    }
    hub.close();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("http server failed: {e}"),
        Err(e) => error!("http server panicked: {e}"),
    }
    store.close().await;

    info!("bye");
    Ok(())
}

fn init_logging(settings: &Settings) {
    let default = if settings.bot_debug {
        "info,locrelay=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
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
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
