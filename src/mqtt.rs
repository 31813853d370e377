//! MQTT orchestration: connection, poll loop and inbound dispatch.
//!
//! Polling is a heartbeat, not request/response correlation: the constant
//! read request goes out for every device on every tick, and any inbound
//! status frame (solicited or device-initiated) overwrites the cache for its
//! topic. Decode failures are logged and dropped; transport failures are
//! logged and retried on the next tick. Nothing here is fatal.

use crate::config::MqttConfig;
use anyhow::{Context, Result};
use coilbridge_lib::{cache::StateCache, dispatch, profile::Device, protocol, protocol::Reading};
use futures::stream::StreamExt;
use log::*;
use paho_mqtt as mqtt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// One cache update, fanned out to the HTTP push subscribers.
pub type StatusEvent = (Device, Reading);

/// QoS for poll requests; losing one is harmless, the next tick repeats it.
const POLL_QOS: i32 = mqtt::QOS_0;
/// QoS for commands and overrides; delivery is acknowledged at least once.
const COMMAND_QOS: i32 = mqtt::QOS_1;

/// Creates the client and opens its message stream, then connects.
pub async fn connect(
    config: &MqttConfig,
) -> Result<(mqtt::AsyncClient, mqtt::AsyncReceiver<Option<mqtt::Message>>)> {
    let mut client =
        mqtt::AsyncClient::new(config.url.clone()).with_context(|| "Error creating mqtt client")?;

    // The stream must exist before connecting so no message is dropped.
    let stream = client.get_stream(25);

    let mut builder = mqtt::ConnectOptionsBuilder::new();
    let mut builder = builder
        .keep_alive_interval(Duration::from_secs(20))
        .clean_session(true);
    if let Some(username) = &config.username {
        builder = builder.user_name(username);
    }
    if let Some(password) = &config.password {
        builder = builder.password(password.as_str());
    }

    client
        .connect(builder.finalize())
        .await
        .with_context(|| format!("Mqtt client unable to connect to {}", config.url))?;
    info!("Connected to mqtt broker at {}", config.url);

    Ok((client, stream))
}

/// Subscribes to the status topic of every bridged device.
pub async fn subscribe(client: &mqtt::AsyncClient) -> Result<()> {
    let topics: Vec<&str> = Device::ALL.iter().map(|d| d.status_topic()).collect();
    client
        .subscribe_many(&topics, &[POLL_QOS; 3])
        .await
        .with_context(|| "Cannot subscribe to device status topics")?;
    debug!("Subscribed to {topics:?}");
    Ok(())
}

/// Publishes the constant poll request for each device, then sleeps, forever.
/// Runs independently of whether any response ever arrives.
pub fn spawn_poll_loop(
    client: mqtt::AsyncClient,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            for device in Device::ALL {
                let request = protocol::poll_request(device.profile());
                let msg = mqtt::Message::new(device.request_topic(), request, POLL_QOS);
                if let Err(err) = client.publish(msg).await {
                    warn!("Cannot publish poll request for {device}: {err}");
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
}

/// Publishes a command frame with an at-least-once delivery acknowledgment.
pub async fn publish_command(
    client: &mqtt::AsyncClient,
    device: Device,
    frame: Vec<u8>,
) -> Result<()> {
    let msg = mqtt::Message::new(device.request_topic(), frame, COMMAND_QOS);
    client
        .publish(msg)
        .await
        .with_context(|| format!("Cannot publish command for {device}"))
}

/// Routes inbound status frames into the cache until the process shuts down.
///
/// A `None` stream item means the connection dropped; reconnect with a fixed
/// backoff and resubscribe (sessions are not persistent).
pub async fn run_message_loop(
    client: mqtt::AsyncClient,
    stream: mqtt::AsyncReceiver<Option<mqtt::Message>>,
    cache: Arc<StateCache>,
    events: broadcast::Sender<StatusEvent>,
    correction_delay: Duration,
) {
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        let Some(msg) = item else {
            warn!("Lost mqtt connection, attempting reconnect");
            while let Err(err) = client.reconnect().await {
                warn!("Error reconnecting: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if let Err(err) = subscribe(&client).await {
                warn!("Error resubscribing after reconnect: {err}");
            }
            continue;
        };

        let Some(device) = Device::for_status_topic(msg.topic()) else {
            debug!("Ignoring message on unexpected topic {}", msg.topic());
            continue;
        };

        match dispatch::apply_status(&cache, device, msg.payload()) {
            Ok((reading, correction)) => {
                trace!("{device}: {reading:?}");
                let _ = events.send((device, reading));
                if let Some(frame) = correction {
                    info!("{device} reported local mode, scheduling remote override");
                    let client = client.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(correction_delay).await;
                        if let Err(err) = publish_command(&client, device, frame).await {
                            warn!("{err:#}");
                        }
                    });
                }
            }
            Err(err) => {
                // Stale or foreign traffic on the topic; cache stays as-is.
                warn!("Discarding frame from {device}: {err}");
            }
        }
    }
}
