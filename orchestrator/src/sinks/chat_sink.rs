//! sinks/chat_sink.rs — Chat Notification Sink (§6)
//!
//! Posts a formatted summary of each estimate to a chat channel. Best-effort and
//! order-insensitive (§5): a post that fails every retry is dropped and counted,
//! never allowed to stall hint intake.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use witness_types::EventEstimate;

use super::{retry_with_backoff, DropCounter, QUEUE_DEPTH_WARNING_THRESHOLD};

const MAX_ATTEMPTS: u32 = 3;

pub struct ChatNotification {
    pub channel: String,
    pub server_label: String,
    pub estimate: EventEstimate,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    channel: &'a str,
    title: &'a str,
    server: &'a str,
    x: f64,
    y: f64,
    z: f64,
    error_radius: f64,
    color_tag: &'a str,
}

/// Spawn the single-writer drain task posting to `webhook_url`. Returns a sender
/// and a shared drop counter.
pub fn spawn(webhook_url: String) -> (mpsc::UnboundedSender<ChatNotification>, Arc<DropCounter>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatNotification>();
    let drops = Arc::new(DropCounter::default());
    let drops_task = drops.clone();
    let client = Client::new();

    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            if rx.len() > QUEUE_DEPTH_WARNING_THRESHOLD {
                tracing::warn!("chat sink queue depth {} exceeds warning threshold", rx.len());
            }
            let ok = retry_with_backoff(|| post(&client, &webhook_url, &notification), MAX_ATTEMPTS).await;
            if !ok {
                drops_task.increment();
            }
        }
        info!("chat sink drain task exiting: channel closed");
    });

    (tx, drops)
}

async fn post(client: &Client, webhook_url: &str, notification: &ChatNotification) -> Result<(), reqwest::Error> {
    let color_tag = if notification.estimate.flags.is_empty() { "green" } else { "yellow" };
    let payload = ChatPayload {
        channel: &notification.channel,
        title: "Wither spawn located",
        server: &notification.server_label,
        x: notification.estimate.x,
        y: notification.estimate.average_y(),
        z: notification.estimate.z,
        error_radius: notification.estimate.error_radius,
        color_tag,
    };

    client.post(webhook_url).json(&payload).send().await?.error_for_status()?;
    Ok(())
}
