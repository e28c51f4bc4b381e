use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ProbeError;

pub const THREAT_EVENTS_PATH: &str = "/api/threatmap/events/";
const CREATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Threat event posted to make the threat-map channel broadcast
#[derive(Debug, Clone, Serialize)]
pub struct ThreatEvent {
    pub threat_type: &'static str,
    pub severity: &'static str,
    pub ip_address: &'static str,
    pub country: &'static str,
    pub city: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub description: &'static str,
    pub file_name: &'static str,
    pub file_hash: String,
}

impl Default for ThreatEvent {
    fn default() -> Self {
        Self {
            threat_type: "worm",
            severity: "high",
            ip_address: "8.8.4.4",
            country: "United States",
            city: "Atlanta",
            latitude: 33.7490,
            longitude: -84.3880,
            description: "Realtime injected worm from WS test",
            file_name: "ws_test_payload.exe",
            file_hash: "b".repeat(64),
        }
    }
}

/// Create a threat event through the REST API and return the response status.
///
/// Any HTTP status is returned as-is; only transport failures are errors.
pub async fn create_threat_event(base_url: &str, token: &str) -> Result<u16, ProbeError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), THREAT_EVENTS_PATH);
    debug!("Posting threat event to {}", url);

    println!("Creating ThreatEvent via API to trigger WS update...");
    let client = reqwest::Client::builder().timeout(CREATE_TIMEOUT).build()?;
    let response = client
        .post(&url)
        .bearer_auth(token)
        .json(&ThreatEvent::default())
        .send()
        .await?;

    let status = response.status().as_u16();
    println!("Create event status: {}", status);

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("Create event response: {}", json),
        Err(_) => println!("Create event response (raw): {}", text),
    }

    Ok(status)
}
