use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::config::ScribeConfig;
use crate::events::{EventLog, PlayerInfoCell};
use crate::protocol::{parse_raw_signal, RawSignal};
use crate::tracker::EventTracker;

/// Spawns the bridge feed worker: connects to the client bridge websocket,
/// dispatches every raw signal through the tracker, and writes queued chat
/// notifications back over the same socket.
pub fn spawn_feed_worker(
    config: Arc<ScribeConfig>,
    log: Arc<EventLog>,
    player: Arc<PlayerInfoCell>,
    notify_rx: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_feed_loop(config, log, player, notify_rx, shutdown))
}

async fn run_feed_loop(
    config: Arc<ScribeConfig>,
    log: Arc<EventLog>,
    player: Arc<PlayerInfoCell>,
    mut notify_rx: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tracker = EventTracker::new(Arc::clone(&log));

    loop {
        match connect_async(&config.bridge_ws).await {
            Ok((mut socket, _response)) => {
                info!("connected to client bridge");
                loop {
                    tokio::select! {
                        next = socket.next() => {
                            let Some(next) = next else {
                                break;
                            };
                            let text = match next {
                                Ok(tokio_tungstenite::tungstenite::Message::Text(text)) => text,
                                Ok(tokio_tungstenite::tungstenite::Message::Close(_)) => break,
                                Ok(_) => continue,
                                Err(err) => {
                                    warn!(?err, "bridge stream read error");
                                    break;
                                }
                            };
                            let signal = match parse_raw_signal(&text) {
                                Ok(signal) => signal,
                                Err(err) => {
                                    debug!(?err, "unrecognized bridge payload");
                                    continue;
                                }
                            };
                            let is_sync = matches!(signal, RawSignal::ClientSync(_));
                            tracker.handle_signal(signal, Utc::now());
                            if is_sync {
                                player.store(tracker.player_info());
                            }
                        }
                        notification = notify_rx.recv() => {
                            let Some(text) = notification else {
                                continue;
                            };
                            let payload = json!({
                                "type": "notification",
                                "text": text,
                            });
                            if socket
                                .send(tokio_tungstenite::tungstenite::Message::Text(
                                    payload.to_string(),
                                ))
                                .await
                                .is_err()
                            {
                                warn!("failed to push chat notification to bridge");
                                break;
                            }
                        }
                        _ = shutdown.changed() => {
                            debug!("feed worker shutting down");
                            return;
                        }
                    }
                }
                warn!("bridge stream disconnected, retrying");
            }
            Err(err) => {
                warn!(?err, "failed connecting to client bridge");
            }
        }
        tokio::select! {
            _ = sleep(Duration::from_secs(5)) => {}
            _ = shutdown.changed() => {
                debug!("feed worker shutting down");
                return;
            }
        }
    }
}
