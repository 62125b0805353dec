use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use campus_types::events::{GatewayCommand, PushEvent};

/// Reconnect backoff: 1s doubling to a 30s cap, plus 0-20% jitter so a
/// fleet of clients does not reconnect in lockstep.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

const MAX_LOG_FRAME_CHARS: usize = 200;

/// Messages the adapter delivers to its consumer.
#[derive(Debug)]
pub enum GatewayMessage {
    /// A push event, passed through as received. No ordering, dedup or
    /// delivery guarantees beyond best-effort.
    Event(PushEvent),
    /// The subscribe handshake completed. `reconnect` is false for the
    /// session's first connect, true afterwards. Each reconnect warrants one
    /// snapshot refresh: the gateway has no replay, so events missed while
    /// disconnected are only recoverable through the next snapshot.
    Connected { reconnect: bool },
    /// Connection lost; the adapter backs off and retries on its own.
    Disconnected,
}

/// Gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL; http(s) schemes are rewritten to ws(s).
    pub url: String,
    pub token: String,
    /// Event streams to subscribe to.
    pub channels: Vec<String>,
}

/// Spawn the adapter task and return its event receiver. The task maintains
/// one live connection for the life of the session and ends when the
/// receiver is dropped.
pub fn spawn(config: GatewayConfig) -> mpsc::UnboundedReceiver<GatewayMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(config, tx));
    rx
}

async fn run(config: GatewayConfig, tx: mpsc::UnboundedSender<GatewayMessage>) {
    let ws_url = ws_url(&config.url, &config.token);
    let mut attempt: u32 = 0;
    let mut connected_before = false;

    loop {
        match tokio_tungstenite::connect_async(&ws_url).await {
            Ok((stream, _)) => {
                attempt = 0;
                let reconnect = connected_before;
                connected_before = true;
                if pump(stream, &config.channels, &tx, reconnect).await {
                    return;
                }
                if tx.send(GatewayMessage::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("gateway connect failed: {}", e);
            }
        }

        attempt += 1;
        let delay = backoff_delay(attempt);
        trace!("gateway retrying in {:?} (attempt {})", delay, attempt);
        tokio::time::sleep(delay).await;
        if tx.is_closed() {
            return;
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Run one connection: subscribe, then forward frames until the socket
/// drops. Returns true when the consumer is gone and the adapter should
/// stop for good.
async fn pump(
    stream: WsStream,
    channels: &[String],
    tx: &mpsc::UnboundedSender<GatewayMessage>,
    reconnect: bool,
) -> bool {
    let (mut sink, mut source) = stream.split();

    let subscribe = GatewayCommand::Subscribe {
        channels: channels.to_vec(),
    };
    let text = match serde_json::to_string(&subscribe) {
        Ok(text) => text,
        Err(e) => {
            warn!("cannot encode subscribe command: {}", e);
            return false;
        }
    };
    if sink.send(Message::Text(text)).await.is_err() {
        return false;
    }

    info!(
        reconnect,
        "gateway connected, subscribed to {} streams",
        channels.len()
    );
    if tx.send(GatewayMessage::Connected { reconnect }).is_err() {
        return true;
    }

    while let Some(frame) = source.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("gateway read error: {}", e);
                break;
            }
        };
        match frame {
            Message::Text(text) => match serde_json::from_str::<PushEvent>(&text) {
                Ok(event) => {
                    if tx.send(GatewayMessage::Event(event)).is_err() {
                        return true;
                    }
                }
                Err(e) => {
                    let preview = text.chars().take(MAX_LOG_FRAME_CHARS).collect::<String>();
                    warn!("dropping malformed gateway frame: {} -- raw: {}", e, preview);
                }
            },
            Message::Ping(payload) => {
                if sink.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    false
}

fn ws_url(base: &str, token: &str) -> String {
    format!(
        "{}/gateway?token={}",
        base.replace("http://", "ws://")
            .replace("https://", "wss://")
            .trim_end_matches('/'),
        token
    )
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(5);
    let capped = (BACKOFF_BASE * 2u32.pow(exp)).min(BACKOFF_CAP);
    let jitter_ms = rand::rng().random_range(0..=(capped.as_millis() as u64) / 5);
    capped + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_types::events::PushEventKind;

    #[test]
    fn http_schemes_rewrite_to_ws() {
        assert_eq!(
            ws_url("https://portal.example/", "tok"),
            "wss://portal.example/gateway?token=tok"
        );
        assert_eq!(
            ws_url("http://localhost:3000", "tok"),
            "ws://localhost:3000/gateway?token=tok"
        );
        assert_eq!(
            ws_url("wss://portal.example", "tok"),
            "wss://portal.example/gateway?token=tok"
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        // Jitter adds at most 20%, so bound checks use the envelope.
        assert!(backoff_delay(1) >= Duration::from_secs(1));
        assert!(backoff_delay(1) <= Duration::from_millis(1200));
        assert!(backoff_delay(3) >= Duration::from_secs(4));
        assert!(backoff_delay(100) <= Duration::from_secs(36));
    }

    #[test]
    fn event_frames_parse() {
        let raw = r#"{
            "channel": "notifications",
            "type": "created",
            "entityId": "7d5160cf-92a7-43c5-90cd-84d2b2b1b64e",
            "entityType": "notification",
            "payload": {
                "id": "7d5160cf-92a7-43c5-90cd-84d2b2b1b64e",
                "type": "message",
                "isRead": false,
                "createdAt": "2026-08-01T10:00:00Z"
            }
        }"#;
        let event: PushEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, PushEventKind::Created);
        let item = event.item().unwrap();
        assert!(!item.is_read);
    }

    #[test]
    fn malformed_frames_fail_to_parse() {
        // Missing entityId.
        let missing_id = r#"{"channel":"notifications","type":"created","entityType":"notification"}"#;
        assert!(serde_json::from_str::<PushEvent>(missing_id).is_err());

        // Unknown event type.
        let bad_kind = r#"{"channel":"n","type":"upserted","entityId":"7d5160cf-92a7-43c5-90cd-84d2b2b1b64e","entityType":"notification"}"#;
        assert!(serde_json::from_str::<PushEvent>(bad_kind).is_err());

        assert!(serde_json::from_str::<PushEvent>("not json").is_err());
    }
}
