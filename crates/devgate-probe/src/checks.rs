use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::target::ProbeTarget;
use crate::threat_events::create_threat_event;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Named backend WebSocket channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    General,
    ThreatIntelligence,
    ThreatMap,
}

impl Channel {
    pub const ALL: [Channel; 3] = [
        Channel::General,
        Channel::ThreatIntelligence,
        Channel::ThreatMap,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Channel::General => "/ws/",
            Channel::ThreatIntelligence => "/ws/threat-intelligence/",
            Channel::ThreatMap => "/ws/threat-map/",
        }
    }

    /// Short tag used to prefix console lines
    pub fn tag(&self) -> &'static str {
        match self {
            Channel::General => "general",
            Channel::ThreatIntelligence => "ti",
            Channel::ThreatMap => "map",
        }
    }

    pub fn max_messages(&self) -> usize {
        match self {
            Channel::General => 3,
            Channel::ThreatIntelligence => 5,
            Channel::ThreatMap => 10,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        match self {
            Channel::General | Channel::ThreatIntelligence => Duration::from_secs(10),
            Channel::ThreatMap => Duration::from_secs(15),
        }
    }

    /// Messages sent right after connecting
    pub fn opening_messages(&self, filters: &ThreatFilters, timestamp: u64) -> Vec<Value> {
        match self {
            Channel::General => vec![
                json!({"type": "subscribe", "channel": "system_notifications"}),
                json!({"type": "ping", "timestamp": timestamp}),
            ],
            Channel::ThreatIntelligence => vec![
                json!({"type": "get_stats"}),
                json!({"type": "get_recent_threats", "limit": 5}),
            ],
            Channel::ThreatMap => {
                let filters = json!({"days": filters.days, "severity": filters.severity});
                vec![
                    json!({"type": "subscribe_filters", "filters": filters.clone()}),
                    json!({"type": "get_threats", "filters": filters}),
                ]
            }
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::General => f.write_str("general"),
            Channel::ThreatIntelligence => f.write_str("threat-intelligence"),
            Channel::ThreatMap => f.write_str("threat-map"),
        }
    }
}

/// Filters for the threat-map channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatFilters {
    pub days: u32,
    pub severity: String,
}

impl Default for ThreatFilters {
    fn default() -> Self {
        Self {
            days: 30,
            severity: "high".to_string(),
        }
    }
}

/// Per-run settings shared by all channel checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    pub filters: ThreatFilters,
    /// Post a threat event after subscribing to the threat-map channel
    pub create_event: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            filters: ThreatFilters::default(),
            create_event: true,
        }
    }
}

/// Result of one channel check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub channel: Channel,
    pub received: Vec<String>,
    /// Why reading stopped before `max_messages`, if it did
    pub stopped: Option<String>,
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Connect to a channel, send its opening messages and read the replies.
///
/// Connection failures are errors; anything that ends the read loop after
/// connecting (timeout, close, transport error) is recorded in
/// [`CheckReport::stopped`].
pub async fn run_check(
    base_url: &str,
    token: &str,
    channel: Channel,
    options: &CheckOptions,
) -> Result<CheckReport, ProbeError> {
    let target = ProbeTarget::from_base_url(base_url, channel.path())?;
    let url = target.url(token);
    let tag = channel.tag();

    println!("Connecting to {} WS: {}", channel, target.endpoint());
    let (mut stream, _) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
        .await
        .map_err(|_| ProbeError::ConnectTimeout {
            url: target.endpoint(),
            timeout: CONNECT_TIMEOUT,
        })??;
    println!("Connected ({} WS)", channel);

    for message in channel.opening_messages(&options.filters, unix_timestamp()) {
        let text = serde_json::to_string(&message)?;
        debug!("[{}] Sending {}", tag, text);
        stream.send(Message::Text(text)).await?;
    }

    if channel == Channel::ThreatMap && options.create_event {
        if let Err(e) = create_threat_event(base_url, token).await {
            warn!("Failed to create threat event: {}", e);
        }
    }

    let mut received = Vec::new();
    let mut stopped = None;
    while received.len() < channel.max_messages() {
        let payload = match timeout(channel.read_timeout(), stream.next()).await {
            Err(_) => {
                stopped = Some(format!("timed out after {:?}", channel.read_timeout()));
                break;
            }
            Ok(None) => {
                stopped = Some("connection closed".to_string());
                break;
            }
            Ok(Some(Err(e))) => {
                stopped = Some(e.to_string());
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(Message::Binary(data)))) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Some(Ok(Message::Close(frame)))) => {
                stopped = Some(match frame {
                    Some(frame) => format!(
                        "closed by server: {} {}",
                        u16::from(frame.code),
                        frame.reason
                    ),
                    None => "closed by server".to_string(),
                });
                break;
            }
            Ok(Some(Ok(_))) => continue,
        };
        println!("[{}] Received: {}", tag, payload);
        received.push(payload);
    }

    if let Some(reason) = &stopped {
        println!("[{}] No more messages or error: {}", tag, reason);
    }

    if let Err(e) = stream.close(None).await {
        debug!("[{}] Close handshake failed: {}", tag, e);
    }
    println!("Closed ({} WS)", channel);

    if received.is_empty() {
        warn!("No messages received on the {} channel", channel);
    }

    Ok(CheckReport {
        channel,
        received,
        stopped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_paths() {
        assert_eq!(Channel::General.path(), "/ws/");
        assert_eq!(
            Channel::ThreatIntelligence.path(),
            "/ws/threat-intelligence/"
        );
        assert_eq!(Channel::ThreatMap.path(), "/ws/threat-map/");
    }

    #[test]
    fn test_read_limits() {
        assert_eq!(Channel::General.max_messages(), 3);
        assert_eq!(Channel::ThreatIntelligence.max_messages(), 5);
        assert_eq!(Channel::ThreatMap.max_messages(), 10);
        assert_eq!(Channel::ThreatMap.read_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_general_opening_messages() {
        let messages = Channel::General.opening_messages(&ThreatFilters::default(), 1_700_000_000);
        assert_eq!(
            messages,
            vec![
                json!({"type": "subscribe", "channel": "system_notifications"}),
                json!({"type": "ping", "timestamp": 1_700_000_000u64}),
            ]
        );
    }

    #[test]
    fn test_threat_intelligence_opening_messages() {
        let messages = Channel::ThreatIntelligence.opening_messages(&ThreatFilters::default(), 0);
        assert_eq!(messages[0]["type"], "get_stats");
        assert_eq!(messages[1]["type"], "get_recent_threats");
        assert_eq!(messages[1]["limit"], 5);
    }

    #[test]
    fn test_threat_map_uses_filters() {
        let filters = ThreatFilters {
            days: 7,
            severity: "medium".to_string(),
        };
        let messages = Channel::ThreatMap.opening_messages(&filters, 0);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "subscribe_filters");
        assert_eq!(messages[1]["type"], "get_threats");
        for message in &messages {
            assert_eq!(message["filters"]["days"], 7);
            assert_eq!(message["filters"]["severity"], "medium");
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = run_check(
            &format!("http://127.0.0.1:{}", port),
            "t",
            Channel::General,
            &CheckOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(ProbeError::WebSocket(_))));
    }
}
