use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScribeConfig;
use crate::events::{EventLog, GameEvent, PlayerInfo, PlayerInfoCell};

/// Batch layout: the player info record leads, events follow in insertion
/// order.
pub fn build_payload(player: &PlayerInfo, events: &[GameEvent]) -> Result<Value> {
    let mut batch = Vec::with_capacity(events.len() + 1);
    batch.push(serde_json::to_value(player).context("serializing player info")?);
    for event in events {
        batch.push(serde_json::to_value(event).context("serializing event")?);
    }
    Ok(Value::Array(batch))
}

/// The collector may acknowledge processing with a points total.
pub fn points_from_response(body: &Value) -> Option<i64> {
    body.get("points").and_then(Value::as_i64)
}

async fn send_batch(
    client: &reqwest::Client,
    config: &ScribeConfig,
    payload: Value,
) -> Result<Option<i64>> {
    let response = client
        .post(&config.collector_url)
        .bearer_auth(&config.registration_key)
        .json(&payload)
        .send()
        .await
        .context("posting event batch")?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("collector rejected batch with status {status}");
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    Ok(points_from_response(&body))
}

/// Periodically drains the event log and ships it to the collector. A batch
/// with no known player identity is left in the log for the next cycle; a
/// failed send is logged and dropped. Shutdown stops the interval without
/// cancelling a send already in flight.
pub fn spawn_sender_worker(
    config: Arc<ScribeConfig>,
    log: Arc<EventLog>,
    player: Arc<PlayerInfoCell>,
    notify_tx: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.send_interval_secs.max(1)));
        // The first tick fires immediately; skip it so a fresh start does
        // not send an empty batch.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    debug!("sender worker shutting down");
                    break;
                }
            }

            if log.is_empty() {
                continue;
            }
            let Some(player_info) = player.load() else {
                debug!("player identity unknown, holding batch");
                continue;
            };
            let events = log.drain();
            let count = events.len();
            let payload = match build_payload(&player_info, &events) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(?err, "failed to serialize batch, dropping {count} events");
                    continue;
                }
            };

            let client = client.clone();
            let config = Arc::clone(&config);
            let notify_tx = notify_tx.clone();
            tokio::spawn(async move {
                match send_batch(&client, &config, payload).await {
                    Ok(points) => {
                        info!(count, ?points, "event batch delivered");
                        if config.chat_notifications {
                            let message = match points {
                                Some(points) => {
                                    format!("Synced {count} events ({points} points).")
                                }
                                None => format!("Synced {count} events."),
                            };
                            if notify_tx.send(message).await.is_err() {
                                debug!("notification channel closed");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(?err, count, "batch send failed, events dropped");
                    }
                }
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_payload, points_from_response};
    use crate::events::{EventLog, PlayerInfo};

    fn player() -> PlayerInfo {
        PlayerInfo {
            player_name: "Tester".to_owned(),
            player_id: 9,
            combat_level: 100,
            total_level: 1500,
            total_xp: 25_000_000,
        }
    }

    #[test]
    fn payload_leads_with_player_info() {
        let log = EventLog::new();
        log.record("XP_GAIN", None, json!({"skill": "Attack"}));
        log.record("REWARD", None, json!({"rewardSource": "Casket"}));
        let events = log.drain();

        let payload = build_payload(&player(), &events).expect("expected payload");
        let batch = payload.as_array().expect("expected array payload");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0]["playerName"], json!("Tester"));
        assert_eq!(batch[0]["totalXp"], json!(25_000_000u64));
        assert_eq!(batch[1]["eventType"], json!("XP_GAIN"));
        assert_eq!(batch[2]["eventType"], json!("REWARD"));
    }

    #[test]
    fn event_projection_uses_wire_field_names() {
        let log = EventLog::new();
        log.record("WORLD_CHANGE", None, json!({"worldId": 302}));
        let events = log.drain();

        let payload = build_payload(&player(), &events).expect("expected payload");
        let event = &payload[1];
        assert!(event.get("eventType").is_some());
        assert!(event.get("timestamp").is_some());
        // Absent location is omitted entirely rather than sent as null.
        assert!(event.get("playerLocation").is_none());
    }

    #[test]
    fn points_parse_from_acknowledgment() {
        assert_eq!(points_from_response(&json!({"points": 25})), Some(25));
        assert_eq!(points_from_response(&json!({"status": "ok"})), None);
        assert_eq!(points_from_response(&json!(null)), None);
    }
}
