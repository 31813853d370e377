//! coilbridge daemon
//!
//! Bridges three RTU-style coil controllers (two solenoid-valve banks and a
//! twin pump) between an MQTT broker and an HTTP status/control API:
//!
//! - Polls every device over MQTT at a fixed interval and caches the latest
//!   decoded reading.
//! - Serves the cache as JSON, including a server-sent-events push variant.
//! - Turns validated control requests into protocol-correct command frames.
//! - Steers the pump out of local-override mode by mirroring its coil state
//!   back to it.
//!
//! The protocol codec and state handling live in `coilbridge_lib`.

use anyhow::{Context, Result};
use clap::Parser;
use coilbridge_lib::cache::StateCache;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::panic;
use std::sync::Arc;
use tokio::sync::broadcast;

mod commandline;
mod config;
mod http;
mod mqtt;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// Resolves when a termination signal arrives. There is no teardown for
/// in-flight operations beyond the MQTT disconnect in `main`.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .with_context(|| "Cannot install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.with_context(|| "Cannot listen for ctrl-c")?;
            }
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .with_context(|| "Cannot listen for ctrl-c")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "coilbridge started. Log level: {}",
        args.verbose.log_level_filter()
    );

    let config = config::load(args.config.as_deref())?;
    trace!("Config: {config:?}");

    let (client, stream) = mqtt::connect(&config.mqtt).await?;
    mqtt::subscribe(&client).await?;

    let cache = Arc::new(StateCache::new());
    let (events, _) = broadcast::channel::<mqtt::StatusEvent>(32);

    let poll_task = mqtt::spawn_poll_loop(client.clone(), config.mqtt.poll_interval);

    let message_task = tokio::spawn(mqtt::run_message_loop(
        client.clone(),
        stream,
        cache.clone(),
        events.clone(),
        config.mqtt.correction_delay,
    ));

    let state = Arc::new(http::AppState {
        cache,
        client: client.clone(),
        events,
        token: config.http.token.clone(),
        open_reads: config.http.open_reads,
    });
    let http_config = config.http.clone();
    let http_task = tokio::spawn(async move {
        if let Err(err) = http::serve(&http_config, state).await {
            error!("{err:#}");
        }
    });

    shutdown_signal().await?;
    info!("Stopping...");

    poll_task.abort();
    message_task.abort();
    http_task.abort();

    client
        .disconnect(None)
        .await
        .with_context(|| "Error disconnecting mqtt client")?;

    Ok(())
}
